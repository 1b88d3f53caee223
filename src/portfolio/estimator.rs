//! # Return Estimation
//!
//! $$
//! \hat\Sigma = (1-\delta) S + \delta\, \frac{\operatorname{tr} S}{p} I,
//! \qquad \hat\mu_i = f \cdot \bar r_i
//! $$
//!
//! Annualized expected returns and a Ledoit-Wolf shrunk covariance from a
//! [`PriceMatrix`]. Nothing is cached; every call recomputes from the prices.

use std::borrow::Cow;

use nalgebra::DMatrix;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;
use tracing::debug;

use super::data::PriceMatrix;
use super::error::OptimizationError;
use super::error::StrategyError;
use super::error::StrategyResult;
use super::validate::validate;

/// Trading days used to annualize daily statistics.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Relative eigenvalue slack tolerated by the positive semi-definite check.
const PSD_TOLERANCE: f64 = 1e-10;

/// How expected returns are estimated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReturnMethod {
  /// Arithmetic mean of simple period returns times periods per year.
  #[default]
  MeanHistorical,
  /// Compound annual growth rate of the period returns.
  Compounded,
}

/// Covariance shrinkage toward the constant-variance target `tr(S)/p * I`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Shrinkage {
  /// Ledoit-Wolf optimal intensity.
  #[default]
  LedoitWolf,
  /// Caller-chosen intensity in `[0, 1]`.
  Fixed(f64),
}

/// Estimator settings.
#[derive(Clone, Debug, PartialEq)]
pub struct EstimatorConfig {
  /// Return periods per year (252 for daily prices).
  pub periods_per_year: f64,
  pub return_method: ReturnMethod,
  pub shrinkage: Shrinkage,
  /// Use only the most recent rows; `None` uses the full history.
  pub window: Option<usize>,
}

impl Default for EstimatorConfig {
  fn default() -> Self {
    Self {
      periods_per_year: TRADING_DAYS_PER_YEAR,
      return_method: ReturnMethod::MeanHistorical,
      shrinkage: Shrinkage::LedoitWolf,
      window: None,
    }
  }
}

/// Expected returns and covariance for one price window.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnStatistics {
  /// Annualized expected return per ticker.
  pub expected_returns: Array1<f64>,
  /// Annualized shrunk covariance, symmetric positive semi-definite.
  pub covariance: Array2<f64>,
  /// Shrinkage intensity that was applied.
  pub shrinkage: f64,
}

/// Shrunk covariance together with the intensity used.
#[derive(Clone, Debug, PartialEq)]
pub struct ShrunkCovariance {
  pub matrix: Array2<f64>,
  pub intensity: f64,
}

/// Derives [`ReturnStatistics`] according to an [`EstimatorConfig`].
#[derive(Clone, Debug, Default)]
pub struct ReturnEstimator {
  config: EstimatorConfig,
}

impl ReturnEstimator {
  pub fn new(config: EstimatorConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &EstimatorConfig {
    &self.config
  }

  /// Annualized expected returns using the configured method and window.
  pub fn expected_returns(&self, prices: &PriceMatrix) -> StrategyResult<Array1<f64>> {
    self.expected_returns_of(&*self.windowed(prices)?)
  }

  /// Annualized shrunk covariance using the configured shrinkage and window.
  pub fn shrunk_covariance(&self, prices: &PriceMatrix) -> StrategyResult<ShrunkCovariance> {
    self.shrunk_covariance_of(&*self.windowed(prices)?)
  }

  pub fn estimate(&self, prices: &PriceMatrix) -> StrategyResult<ReturnStatistics> {
    let prices = self.windowed(prices)?;
    let expected_returns = self.expected_returns_of(&prices)?;
    let ShrunkCovariance { matrix, intensity } = self.shrunk_covariance_of(&prices)?;

    Ok(ReturnStatistics {
      expected_returns,
      covariance: matrix,
      shrinkage: intensity,
    })
  }

  fn expected_returns_of(&self, prices: &PriceMatrix) -> StrategyResult<Array1<f64>> {
    match self.config.return_method {
      ReturnMethod::MeanHistorical => annualized_mean_return(prices, self.config.periods_per_year),
      ReturnMethod::Compounded => compounded_annual_return(prices, self.config.periods_per_year),
    }
  }

  fn shrunk_covariance_of(&self, prices: &PriceMatrix) -> StrategyResult<ShrunkCovariance> {
    shrunk_covariance(prices, self.config.periods_per_year, self.config.shrinkage)
  }

  /// The configured trailing window, borrowing the full history when unset.
  fn windowed<'a>(&self, prices: &'a PriceMatrix) -> StrategyResult<Cow<'a, PriceMatrix>> {
    match self.config.window {
      Some(rows) if rows < 2 => Err(StrategyError::Parameter(format!(
        "estimation window must span at least 2 rows, got {rows}"
      ))),
      Some(rows) => prices.tail(rows).map(Cow::Owned),
      None => Ok(Cow::Borrowed(prices)),
    }
  }
}

fn check_periods(periods_per_year: f64) -> StrategyResult<()> {
  if !(periods_per_year.is_finite() && periods_per_year > 0.0) {
    return Err(StrategyError::Parameter(format!(
      "periods per year must be positive, got {periods_per_year}"
    )));
  }
  Ok(())
}

/// Valid (non-missing) returns of every ticker column.
fn valid_returns(prices: &PriceMatrix) -> StrategyResult<Vec<Vec<f64>>> {
  let returns = prices.simple_returns();
  returns
    .axis_iter(Axis(1))
    .zip(prices.tickers())
    .map(|(col, ticker)| {
      let valid: Vec<f64> = col.iter().copied().filter(|r| !r.is_nan()).collect();
      if valid.is_empty() {
        Err(StrategyError::InsufficientData(format!(
          "{ticker} has no period return without a missing price"
        )))
      } else {
        Ok(valid)
      }
    })
    .collect()
}

/// Mean simple period return per ticker, scaled by `periods_per_year`.
///
/// Missing returns are skipped.
pub fn annualized_mean_return(
  prices: &PriceMatrix,
  periods_per_year: f64,
) -> StrategyResult<Array1<f64>> {
  validate(prices, 1, 2)?;
  check_periods(periods_per_year)?;

  let mu = valid_returns(prices)?
    .iter()
    .map(|r| r.iter().sum::<f64>() / r.len() as f64 * periods_per_year)
    .collect();
  Ok(mu)
}

/// Compound annual growth rate per ticker:
/// `prod(1 + r)^(periods_per_year / n) - 1` over the `n` valid returns.
pub fn compounded_annual_return(
  prices: &PriceMatrix,
  periods_per_year: f64,
) -> StrategyResult<Array1<f64>> {
  validate(prices, 1, 2)?;
  check_periods(periods_per_year)?;

  let mu = valid_returns(prices)?
    .iter()
    .map(|r| {
      let growth: f64 = r.iter().map(|x| 1.0 + x).product();
      growth.powf(periods_per_year / r.len() as f64) - 1.0
    })
    .collect();
  Ok(mu)
}

/// Period returns with missing values replaced by zero.
fn filled_returns(prices: &PriceMatrix) -> Array2<f64> {
  prices
    .simple_returns()
    .mapv(|r| if r.is_nan() { 0.0 } else { r })
}

/// Annualized sample covariance (ddof = 1) of period returns.
pub fn sample_covariance(prices: &PriceMatrix, periods_per_year: f64) -> StrategyResult<Array2<f64>> {
  validate(prices, 1, 3)?;
  check_periods(periods_per_year)?;

  let returns = filled_returns(prices);
  let cov = returns
    .t()
    .cov(1.0)
    .map_err(|e| StrategyError::InsufficientData(e.to_string()))?;
  Ok(cov * periods_per_year)
}

/// Ledoit-Wolf shrinkage of the (biased) empirical covariance of `returns`
/// (`n_observations × n_assets`) toward `tr(S)/p * I`.
///
/// Returns the shrunk matrix (not annualized) and the intensity.
pub fn ledoit_wolf(returns: &Array2<f64>) -> (Array2<f64>, f64) {
  let (n, p) = returns.dim();
  if n == 0 || p == 0 {
    return (Array2::zeros((p, p)), 0.0);
  }

  let means = returns.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(p));
  let x = returns - &means;
  let n_f = n as f64;
  let p_f = p as f64;

  let emp = x.t().dot(&x) / n_f;
  let trace = emp.diag().sum();
  let mu = trace / p_f;

  let x2 = x.mapv(|v| v * v);
  let beta_ = x2.t().dot(&x2).sum();
  let delta_ = emp.iter().map(|v| v * v).sum::<f64>();

  let beta = (beta_ / n_f - delta_) / (p_f * n_f);
  let delta = (delta_ - 2.0 * mu * trace + p_f * mu * mu) / p_f;
  let beta = beta.min(delta);

  let intensity = if beta <= 0.0 || delta <= 0.0 {
    0.0
  } else {
    (beta / delta).clamp(0.0, 1.0)
  };

  let mut shrunk = emp * (1.0 - intensity);
  for i in 0..p {
    shrunk[[i, i]] += intensity * mu;
  }
  (shrunk, intensity)
}

/// Annualized covariance of period returns after shrinkage toward the
/// constant-variance diagonal target, checked positive semi-definite.
pub fn shrunk_covariance(
  prices: &PriceMatrix,
  periods_per_year: f64,
  shrinkage: Shrinkage,
) -> StrategyResult<ShrunkCovariance> {
  validate(prices, 1, 2)?;
  check_periods(periods_per_year)?;

  let returns = filled_returns(prices);
  let (shrunk, intensity) = match shrinkage {
    Shrinkage::LedoitWolf => ledoit_wolf(&returns),
    Shrinkage::Fixed(delta) => {
      if !(0.0..=1.0).contains(&delta) {
        return Err(StrategyError::Parameter(format!(
          "shrinkage intensity must be in [0, 1], got {delta}"
        )));
      }
      if returns.nrows() < 2 {
        return Err(StrategyError::InsufficientData(
          "fixed shrinkage needs at least 2 period returns".into(),
        ));
      }
      let sample = returns
        .t()
        .cov(1.0)
        .map_err(|e| StrategyError::InsufficientData(e.to_string()))?;
      let target = sample.diag().sum() / sample.nrows() as f64;
      let mut shrunk = sample * (1.0 - delta);
      for i in 0..shrunk.nrows() {
        shrunk[[i, i]] += delta * target;
      }
      (shrunk, delta)
    }
  };

  let matrix = (&shrunk + &shrunk.t()) * (0.5 * periods_per_year);
  ensure_positive_semi_definite(&matrix)?;

  debug!(
    assets = matrix.nrows(),
    observations = returns.nrows(),
    intensity,
    "shrunk covariance estimated"
  );

  Ok(ShrunkCovariance { matrix, intensity })
}

/// Fail unless `cov` is finite with no eigenvalue below `-PSD_TOLERANCE` (relative).
pub(crate) fn ensure_positive_semi_definite(cov: &Array2<f64>) -> Result<(), OptimizationError> {
  if cov.iter().any(|v| !v.is_finite()) {
    return Err(OptimizationError::NotPositiveSemiDefinite {
      min_eigenvalue: f64::NAN,
    });
  }

  let n = cov.nrows();
  let m = DMatrix::from_fn(n, n, |i, j| cov[[i, j]]);
  let eigenvalues = m.symmetric_eigenvalues();
  let min_eigenvalue = eigenvalues.min();
  let scale = eigenvalues.amax().max(1.0);

  if min_eigenvalue < -PSD_TOLERANCE * scale {
    return Err(OptimizationError::NotPositiveSemiDefinite { min_eigenvalue });
  }
  Ok(())
}
