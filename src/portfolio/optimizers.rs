//! # Mean-Variance Optimizers
//!
//! $$
//! \max_{\mathbf{w} \ge 0,\ \mathbf 1^\top \mathbf{w} = 1}
//! \frac{\mathbf{w}^\top \mu - r_f}{\sqrt{\mathbf{w}^\top \Sigma \mathbf{w}}}
//! \qquad
//! \min_{\mathbf{w} \ge 0,\ \mathbf 1^\top \mathbf{w} = 1} \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Long-only maximum Sharpe and minimum volatility allocations on the
//! shrunk covariance of [`ReturnEstimator`].

use ndarray::Array1;
use ndarray::Array2;
use ndarray::array;
use tracing::debug;
use tracing::warn;

use super::data::PriceMatrix;
use super::data::SectorMap;
use super::engine::AllocationStrategy;
use super::error::OptimizationError;
use super::error::StrategyError;
use super::error::StrategyResult;
use super::estimator::EstimatorConfig;
use super::estimator::ReturnEstimator;
use super::solver::SolverConfig;
use super::solver::solve_budget_qp;
use super::types::Allocation;
use super::types::Diagnostics;
use super::types::OptimizerDiagnostics;
use super::types::PortfolioPerformance;
use super::types::StrategyKind;
use super::validate::validate;
use super::validate::validate_risk_free;

/// Decimal places kept by [`clean_weights`] for optimizer output.
pub const WEIGHT_DECIMALS: u32 = 4;

/// Default annual risk-free rate.
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;

/// Runtime configuration for [`MaxSharpe`].
#[derive(Clone, Debug, PartialEq)]
pub struct MaxSharpeConfig {
  /// Annual risk-free rate subtracted from expected returns.
  pub risk_free_rate: f64,
  pub estimator: EstimatorConfig,
  pub solver: SolverConfig,
}

impl Default for MaxSharpeConfig {
  fn default() -> Self {
    Self {
      risk_free_rate: DEFAULT_RISK_FREE_RATE,
      estimator: EstimatorConfig::default(),
      solver: SolverConfig::default(),
    }
  }
}

/// Runtime configuration for [`MinVolatility`].
#[derive(Clone, Debug, PartialEq)]
pub struct MinVolatilityConfig {
  pub estimator: EstimatorConfig,
  pub solver: SolverConfig,
  /// Only used for the reported Sharpe ratio.
  pub risk_free_rate: f64,
}

impl Default for MinVolatilityConfig {
  fn default() -> Self {
    Self {
      estimator: EstimatorConfig::default(),
      solver: SolverConfig::default(),
      risk_free_rate: DEFAULT_RISK_FREE_RATE,
    }
  }
}

/// Expected return, volatility and Sharpe ratio of `w`.
pub fn portfolio_performance(
  w: &Array1<f64>,
  mu: &Array1<f64>,
  cov: &Array2<f64>,
  risk_free: f64,
) -> PortfolioPerformance {
  let expected_return = w.dot(mu);
  let port_var = w.dot(&cov.dot(w));
  let volatility = port_var.max(0.0).sqrt();
  let sharpe = if volatility > 1e-15 {
    (expected_return - risk_free) / volatility
  } else {
    0.0
  };

  PortfolioPerformance {
    expected_return,
    volatility,
    sharpe,
  }
}

/// Clamp negatives to zero, round to `decimals` places and renormalize.
pub fn clean_weights(w: &Array1<f64>, decimals: u32) -> Result<Array1<f64>, OptimizationError> {
  let factor = 10f64.powi(decimals as i32);
  let rounded = w.mapv(|v| (v.max(0.0) * factor).round() / factor);
  let total = rounded.sum();

  if !(total > 0.0) || !total.is_finite() {
    return Err(OptimizationError::Infeasible(
      "no weight survives rounding".into(),
    ));
  }
  Ok(rounded / total)
}

/// Raw tangency weights and solver iterations.
///
/// Solves `min y'Σy` s.t. `(μ - r_f)'y = 1`, `y >= 0` and rescales
/// `w = y / Σy`. Infeasible when no asset beats the risk-free rate.
pub fn optimize_max_sharpe(
  mu: &Array1<f64>,
  cov: &Array2<f64>,
  risk_free: f64,
  solver: &SolverConfig,
) -> Result<(Array1<f64>, usize), OptimizationError> {
  let excess = mu.mapv(|m| m - risk_free);
  let positive_excess: f64 = excess.iter().filter(|&&e| e > 0.0).sum();
  if !(positive_excess > 0.0) {
    return Err(OptimizationError::Infeasible(format!(
      "no asset has an expected return above the risk-free rate {risk_free}"
    )));
  }

  let y0 = excess.mapv(|e| if e > 0.0 { 1.0 / positive_excess } else { 0.0 });
  let solution = solve_budget_qp(cov, &excess, y0, solver)?;

  let total = solution.x.sum();
  if !(total > 0.0) {
    return Err(OptimizationError::Infeasible(
      "tangency solution has no positive weight".into(),
    ));
  }
  Ok((solution.x / total, solution.iterations))
}

/// Raw global minimum variance weights and solver iterations.
pub fn optimize_min_volatility(
  cov: &Array2<f64>,
  solver: &SolverConfig,
) -> Result<(Array1<f64>, usize), OptimizationError> {
  let n = cov.nrows();
  if n == 0 {
    return Err(OptimizationError::Infeasible("empty covariance".into()));
  }

  let x0 = Array1::from_elem(n, 1.0 / n as f64);
  let solution = solve_budget_qp(cov, &Array1::ones(n), x0, solver)?;
  Ok((solution.x, solution.iterations))
}

/// Long-only tangency portfolio.
#[derive(Clone, Debug, Default)]
pub struct MaxSharpe {
  config: MaxSharpeConfig,
}

impl MaxSharpe {
  pub fn new(config: MaxSharpeConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &MaxSharpeConfig {
    &self.config
  }
}

impl AllocationStrategy for MaxSharpe {
  fn kind(&self) -> StrategyKind {
    StrategyKind::MaxSharpe
  }

  fn run(&self, prices: &PriceMatrix, _sectors: Option<&SectorMap>) -> StrategyResult<Allocation> {
    if prices.n_tickers() < 2 {
      return Err(StrategyError::Parameter(format!(
        "maximum Sharpe needs at least 2 tickers, got {}",
        prices.n_tickers()
      )));
    }
    validate(prices, 2, 2)?;
    let risk_free = self.config.risk_free_rate;
    validate_risk_free(risk_free)?;

    let stats = ReturnEstimator::new(self.config.estimator.clone()).estimate(prices)?;
    let (raw, iterations) = optimize_max_sharpe(
      &stats.expected_returns,
      &stats.covariance,
      risk_free,
      &self.config.solver,
    )
    .map_err(|e| {
      warn!(error = %e, "maximum Sharpe optimization failed");
      e
    })?;

    let weights = clean_weights(&raw, WEIGHT_DECIMALS)?;
    let performance =
      portfolio_performance(&weights, &stats.expected_returns, &stats.covariance, risk_free);

    debug!(
      iterations,
      shrinkage = stats.shrinkage,
      sharpe = performance.sharpe,
      "maximum Sharpe weights solved"
    );

    Ok(Allocation::new(
      self.kind(),
      prices.tickers().to_vec(),
      weights,
      Diagnostics::Optimizer(OptimizerDiagnostics {
        performance,
        risk_free_rate: risk_free,
        shrinkage: stats.shrinkage,
        iterations,
      }),
    ))
  }
}

/// Long-only global minimum variance portfolio.
#[derive(Clone, Debug, Default)]
pub struct MinVolatility {
  config: MinVolatilityConfig,
}

impl MinVolatility {
  pub fn new(config: MinVolatilityConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &MinVolatilityConfig {
    &self.config
  }
}

impl AllocationStrategy for MinVolatility {
  fn kind(&self) -> StrategyKind {
    StrategyKind::MinVolatility
  }

  fn run(&self, prices: &PriceMatrix, _sectors: Option<&SectorMap>) -> StrategyResult<Allocation> {
    if prices.n_tickers() == 1 {
      debug!("single ticker universe, minimum volatility is fully invested");
      return Ok(Allocation::new(
        self.kind(),
        prices.tickers().to_vec(),
        array![1.0],
        Diagnostics::None,
      ));
    }
    validate(prices, 2, 2)?;
    validate_risk_free(self.config.risk_free_rate)?;

    let stats = ReturnEstimator::new(self.config.estimator.clone()).estimate(prices)?;
    let (raw, iterations) =
      optimize_min_volatility(&stats.covariance, &self.config.solver).map_err(|e| {
        warn!(error = %e, "minimum volatility optimization failed");
        e
      })?;

    let weights = clean_weights(&raw, WEIGHT_DECIMALS)?;
    let performance = portfolio_performance(
      &weights,
      &stats.expected_returns,
      &stats.covariance,
      self.config.risk_free_rate,
    );

    debug!(
      iterations,
      shrinkage = stats.shrinkage,
      volatility = performance.volatility,
      "minimum volatility weights solved"
    );

    Ok(Allocation::new(
      self.kind(),
      prices.tickers().to_vec(),
      weights,
      Diagnostics::Optimizer(OptimizerDiagnostics {
        performance,
        risk_free_rate: self.config.risk_free_rate,
        shrinkage: stats.shrinkage,
        iterations,
      }),
    ))
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use tracing_test::traced_test;

  use super::*;
  use crate::portfolio::data::daily_matrix;
  use crate::portfolio::data::series;

  /// A trends up about 1% a day with visible noise, B is flat and quiet.
  fn trend_and_flat() -> PriceMatrix {
    daily_matrix(vec![
      (
        "A",
        series(300, |t| {
          let t = t as f64;
          100.0 * 1.01_f64.powf(t) * (1.0 + 0.01 * (1.3 * t).sin())
        }),
      ),
      ("B", series(300, |t| 100.0 * (1.0 + 0.001 * (0.7 * t as f64).sin()))),
    ])
  }

  #[test]
  fn performance_of_two_asset_portfolio() {
    let w = array![0.5, 0.5];
    let mu = array![0.10, 0.06];
    let cov = array![[0.04, 0.0], [0.0, 0.01]];

    let perf = portfolio_performance(&w, &mu, &cov, 0.02);
    assert_abs_diff_eq!(perf.expected_return, 0.08, epsilon = 1e-12);
    assert_abs_diff_eq!(perf.volatility, 0.0125_f64.sqrt(), epsilon = 1e-12);
    assert_abs_diff_eq!(perf.sharpe, 0.06 / 0.0125_f64.sqrt(), epsilon = 1e-12);
  }

  #[test]
  fn clean_weights_rounds_and_renormalizes() {
    let third = 1.0 / 3.0;
    let w = clean_weights(&array![third, third, third, -1e-9], 4).unwrap();
    assert_abs_diff_eq!(w.sum(), 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(w[0], third, epsilon = 1e-12);
    assert_eq!(w[3], 0.0);

    assert!(clean_weights(&array![0.00001, -0.2], 4).is_err());
  }

  #[test]
  fn tangency_weights_for_uncorrelated_assets() {
    // Unconstrained tangency is proportional to Σ⁻¹(μ - r_f) = (2, 2).
    let mu = array![0.10, 0.04];
    let cov = array![[0.04, 0.0], [0.0, 0.01]];
    let (w, _) = optimize_max_sharpe(&mu, &cov, 0.02, &SolverConfig::default()).unwrap();

    assert_abs_diff_eq!(w[0], 0.5, epsilon = 1e-9);
    assert_abs_diff_eq!(w[1], 0.5, epsilon = 1e-9);
  }

  #[test]
  fn tangency_is_infeasible_below_risk_free() {
    let mu = array![0.01, -0.03];
    let cov = array![[0.04, 0.0], [0.0, 0.01]];
    let err = optimize_max_sharpe(&mu, &cov, 0.02, &SolverConfig::default()).unwrap_err();
    assert!(matches!(err, OptimizationError::Infeasible(_)));
  }

  #[test]
  fn min_volatility_is_inverse_variance_when_uncorrelated() {
    let cov = array![[0.04, 0.0], [0.0, 0.01]];
    let (w, _) = optimize_min_volatility(&cov, &SolverConfig::default()).unwrap();
    assert_abs_diff_eq!(w[0], 0.2, epsilon = 1e-9);
    assert_abs_diff_eq!(w[1], 0.8, epsilon = 1e-9);
  }

  #[test]
  #[traced_test]
  fn max_sharpe_prefers_trending_asset() {
    let alloc = MaxSharpe::default().run(&trend_and_flat(), None).unwrap();

    assert!(alloc.check_invariant().is_ok());
    assert!(alloc.weight("A").unwrap() > 0.9);
    assert!(logs_contain("maximum Sharpe weights solved"));

    let Diagnostics::Optimizer(diag) = alloc.diagnostics() else {
      panic!("expected optimizer diagnostics");
    };
    assert_eq!(diag.risk_free_rate, 0.02);
    assert!(diag.performance.sharpe > 0.0);
    assert!(diag.iterations >= 1);
  }

  #[test]
  fn min_volatility_prefers_quiet_asset() {
    let alloc = MinVolatility::default().run(&trend_and_flat(), None).unwrap();

    assert!(alloc.check_invariant().is_ok());
    assert!(alloc.weight("B").unwrap() > 0.9);
  }

  #[test]
  fn single_ticker_rules() {
    let pm = daily_matrix(vec![("ONLY", vec![10.0, 11.0, 12.0])]);

    let alloc = MinVolatility::default().run(&pm, None).unwrap();
    assert_eq!(alloc.weight("ONLY"), Some(1.0));
    assert_eq!(alloc.diagnostics(), &Diagnostics::None);

    assert!(matches!(
      MaxSharpe::default().run(&pm, None),
      Err(StrategyError::Parameter(_))
    ));
  }

  #[test]
  #[traced_test]
  fn max_sharpe_reports_infeasible_universe() {
    let pm = daily_matrix(vec![
      ("DOWN1", series(50, |t| 100.0 * 0.99_f64.powi(t as i32))),
      ("DOWN2", series(50, |t| 80.0 * 0.995_f64.powi(t as i32) * (1.0 + 0.01 * (t as f64).sin()))),
    ]);

    let err = MaxSharpe::default().run(&pm, None).unwrap_err();
    assert!(matches!(
      err,
      StrategyError::Optimization(OptimizationError::Infeasible(_))
    ));
    assert!(logs_contain("maximum Sharpe optimization failed"));
  }

  #[test]
  fn optimizers_need_two_rows() {
    let pm = daily_matrix(vec![("AAA", vec![1.0]), ("BBB", vec![2.0])]);
    assert!(matches!(
      MinVolatility::default().run(&pm, None),
      Err(StrategyError::InsufficientData(_))
    ));
  }
}
