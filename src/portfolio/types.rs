//! # Portfolio Types
//!
//! $$
//! \mathbf{w}^\*=\arg\max_{\mathbf{w}} \frac{\mathbb E[R_p]-r_f}{\sigma_p}
//! $$
//!
//! Strategy identifiers, allocation output and per-strategy diagnostics.

use std::fmt::Display;
use std::str::FromStr;

use ndarray::Array1;

use super::error::StrategyError;
use super::error::StrategyResult;

/// Tolerance on the sum of a non-empty allocation.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Supported allocation strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StrategyKind {
  /// Equal weight across the best performing sectors.
  SectorRelativeStrength,
  /// Equal weight across assets trading above their moving average.
  Gtaa,
  /// Long-only tangency portfolio.
  MaxSharpe,
  /// Long-only global minimum variance portfolio.
  MinVolatility,
}

impl StrategyKind {
  pub const ALL: [StrategyKind; 4] = [
    StrategyKind::SectorRelativeStrength,
    StrategyKind::Gtaa,
    StrategyKind::MaxSharpe,
    StrategyKind::MinVolatility,
  ];

  /// Human readable strategy name.
  pub fn label(&self) -> &'static str {
    match self {
      Self::SectorRelativeStrength => "Sector Relative Strength",
      Self::Gtaa => "GTAA 13",
      Self::MaxSharpe => "Maximum Sharpe",
      Self::MinVolatility => "Minimum Volatility",
    }
  }
}

impl Display for StrategyKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.label())
  }
}

impl FromStr for StrategyKind {
  type Err = StrategyError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let key: String = s
      .to_lowercase()
      .chars()
      .filter(|c| c.is_ascii_alphanumeric())
      .collect();

    match key.as_str() {
      "sectorrelativestrength" | "srs" | "sector" => Ok(Self::SectorRelativeStrength),
      "gtaa" | "gtaa13" | "trend" => Ok(Self::Gtaa),
      "maximumsharpe" | "maxsharpe" | "sharpe" | "tangency" => Ok(Self::MaxSharpe),
      "minimumvolatility" | "minvolatility" | "minvol" | "minvariance" => Ok(Self::MinVolatility),
      _ => Err(StrategyError::Parameter(format!("unknown strategy '{s}'"))),
    }
  }
}

/// Model performance of a weight vector.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PortfolioPerformance {
  /// Expected portfolio return (annualized).
  pub expected_return: f64,
  /// Portfolio volatility (annualized).
  pub volatility: f64,
  /// `(expected_return - risk_free) / volatility`, zero for a riskless portfolio.
  pub sharpe: f64,
}

/// Average lookback return of one sector.
#[derive(Clone, Debug, PartialEq)]
pub struct SectorScore {
  pub sector: String,
  pub average_return: f64,
  /// Tickers contributing a return to the average.
  pub members: usize,
  pub selected: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SectorDiagnostics {
  pub lookback_days: usize,
  /// Lookback return per ticker, `None` when a price endpoint is missing.
  pub recent_returns: Vec<Option<f64>>,
  /// Resolved sector per ticker.
  pub sectors: Vec<String>,
  /// Sectors ordered best first.
  pub ranking: Vec<SectorScore>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrendDiagnostics {
  pub window: usize,
  pub signals: Vec<bool>,
  pub latest_prices: Vec<f64>,
  /// Trailing moving average per ticker, `None` when the window has gaps.
  pub moving_averages: Vec<Option<f64>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OptimizerDiagnostics {
  pub performance: PortfolioPerformance,
  pub risk_free_rate: f64,
  /// Ledoit-Wolf (or fixed) intensity applied to the sample covariance.
  pub shrinkage: f64,
  /// Active-set iterations used by the solver.
  pub iterations: usize,
}

/// Strategy specific auxiliary output, outside the weight invariant.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Diagnostics {
  #[default]
  None,
  SectorRelativeStrength(SectorDiagnostics),
  Trend(TrendDiagnostics),
  Optimizer(OptimizerDiagnostics),
}

/// Target weights per ticker, in price-matrix column order.
#[derive(Clone, Debug, PartialEq)]
pub struct Allocation {
  strategy: StrategyKind,
  tickers: Vec<String>,
  weights: Array1<f64>,
  diagnostics: Diagnostics,
}

impl Allocation {
  pub(crate) fn new(
    strategy: StrategyKind,
    tickers: Vec<String>,
    weights: Array1<f64>,
    diagnostics: Diagnostics,
  ) -> Self {
    debug_assert_eq!(tickers.len(), weights.len());
    Self {
      strategy,
      tickers,
      weights,
      diagnostics,
    }
  }

  /// All-zero allocation (no positions).
  pub(crate) fn empty(strategy: StrategyKind, tickers: Vec<String>, diagnostics: Diagnostics) -> Self {
    let weights = Array1::zeros(tickers.len());
    Self::new(strategy, tickers, weights, diagnostics)
  }

  pub fn strategy(&self) -> StrategyKind {
    self.strategy
  }

  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  pub fn weights(&self) -> &Array1<f64> {
    &self.weights
  }

  pub fn diagnostics(&self) -> &Diagnostics {
    &self.diagnostics
  }

  /// Weight of `ticker`, `None` when it is not in the universe.
  pub fn weight(&self, ticker: &str) -> Option<f64> {
    self
      .tickers
      .iter()
      .position(|t| t == ticker)
      .map(|i| self.weights[i])
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
    self
      .tickers
      .iter()
      .map(String::as_str)
      .zip(self.weights.iter().copied())
  }

  /// Tickers with strictly positive weight.
  pub fn holdings(&self) -> Vec<(&str, f64)> {
    self.iter().filter(|(_, w)| *w > 0.0).collect()
  }

  pub fn total_weight(&self) -> f64 {
    self.weights.sum()
  }

  /// `true` when no ticker holds a position.
  pub fn is_empty(&self) -> bool {
    self.weights.iter().all(|&w| w == 0.0)
  }

  /// Check that every weight is in `[0, 1]` and the weights sum to one
  /// (within [`WEIGHT_TOLERANCE`]) or are all exactly zero.
  pub fn check_invariant(&self) -> StrategyResult<()> {
    for (ticker, w) in self.iter() {
      if !w.is_finite() || !(0.0..=1.0).contains(&w) {
        return Err(StrategyError::InvalidAllocation(format!(
          "weight of {ticker} is {w}"
        )));
      }
    }

    if self.is_empty() {
      return Ok(());
    }

    let total = self.total_weight();
    if (total - 1.0).abs() > WEIGHT_TOLERANCE {
      return Err(StrategyError::InvalidAllocation(format!(
        "weights sum to {total}"
      )));
    }
    Ok(())
  }
}
