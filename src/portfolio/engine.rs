//! # Strategy Engine
//!
//! $$
//! \mathbf{w} = \operatorname{Strategy}(P, S)
//! $$
//!
//! Common interface of the allocation strategies and a single entry point that
//! dispatches to the configured one.

use tracing::debug;
use tracing::debug_span;
use tracing::warn;

use super::data::PriceMatrix;
use super::data::SectorMap;
use super::error::StrategyResult;
use super::momentum::SectorRelativeStrength;
use super::optimizers::MaxSharpe;
use super::optimizers::MinVolatility;
use super::trend::Gtaa;
use super::types::Allocation;
use super::types::StrategyKind;

/// An allocation algorithm over a price history and optional sector map.
pub trait AllocationStrategy {
  fn kind(&self) -> StrategyKind;

  /// Compute target weights. Pure; identical inputs give identical weights.
  fn run(&self, prices: &PriceMatrix, sectors: Option<&SectorMap>) -> StrategyResult<Allocation>;
}

/// Closed set of strategies with their parameters.
#[derive(Clone, Debug)]
pub enum Strategy {
  SectorRelativeStrength(SectorRelativeStrength),
  Gtaa(Gtaa),
  MaxSharpe(MaxSharpe),
  MinVolatility(MinVolatility),
}

impl Strategy {
  /// Strategy of `kind` with default parameters.
  pub fn default_for(kind: StrategyKind) -> Self {
    match kind {
      StrategyKind::SectorRelativeStrength => Self::SectorRelativeStrength(Default::default()),
      StrategyKind::Gtaa => Self::Gtaa(Default::default()),
      StrategyKind::MaxSharpe => Self::MaxSharpe(Default::default()),
      StrategyKind::MinVolatility => Self::MinVolatility(Default::default()),
    }
  }
}

impl AllocationStrategy for Strategy {
  fn kind(&self) -> StrategyKind {
    match self {
      Self::SectorRelativeStrength(s) => s.kind(),
      Self::Gtaa(s) => s.kind(),
      Self::MaxSharpe(s) => s.kind(),
      Self::MinVolatility(s) => s.kind(),
    }
  }

  fn run(&self, prices: &PriceMatrix, sectors: Option<&SectorMap>) -> StrategyResult<Allocation> {
    match self {
      Self::SectorRelativeStrength(s) => s.run(prices, sectors),
      Self::Gtaa(s) => s.run(prices, sectors),
      Self::MaxSharpe(s) => s.run(prices, sectors),
      Self::MinVolatility(s) => s.run(prices, sectors),
    }
  }
}

impl From<SectorRelativeStrength> for Strategy {
  fn from(s: SectorRelativeStrength) -> Self {
    Self::SectorRelativeStrength(s)
  }
}

impl From<Gtaa> for Strategy {
  fn from(s: Gtaa) -> Self {
    Self::Gtaa(s)
  }
}

impl From<MaxSharpe> for Strategy {
  fn from(s: MaxSharpe) -> Self {
    Self::MaxSharpe(s)
  }
}

impl From<MinVolatility> for Strategy {
  fn from(s: MinVolatility) -> Self {
    Self::MinVolatility(s)
  }
}

/// Single entry point that runs one strategy and checks its output.
#[derive(Clone, Debug)]
pub struct StrategyEngine {
  strategy: Strategy,
}

impl StrategyEngine {
  pub fn new(strategy: impl Into<Strategy>) -> Self {
    Self {
      strategy: strategy.into(),
    }
  }

  /// Engine running `kind` with default parameters.
  pub fn from_kind(kind: StrategyKind) -> Self {
    Self::new(Strategy::default_for(kind))
  }

  pub fn strategy(&self) -> &Strategy {
    &self.strategy
  }

  /// Run the strategy; the returned allocation always satisfies
  /// [`Allocation::check_invariant`].
  pub fn run(&self, prices: &PriceMatrix, sectors: Option<&SectorMap>) -> StrategyResult<Allocation> {
    let kind = self.strategy.kind();
    let span = debug_span!(
      "allocate",
      strategy = %kind,
      tickers = prices.n_tickers(),
      rows = prices.n_rows()
    );
    let _enter = span.enter();

    let allocation = self.strategy.run(prices, sectors).map_err(|e| {
      warn!(error = %e, "allocation failed");
      e
    })?;
    allocation.check_invariant()?;

    if allocation.is_empty() {
      warn!("allocation holds no positions");
    } else {
      debug!(holdings = allocation.holdings().len(), "allocation computed");
    }
    Ok(allocation)
  }
}

impl Default for StrategyEngine {
  fn default() -> Self {
    Self::from_kind(StrategyKind::MaxSharpe)
  }
}

#[cfg(test)]
mod tests {
  use tracing_test::traced_test;

  use super::*;
  use crate::portfolio::data::daily_matrix;
  use crate::portfolio::data::series;
  use crate::portfolio::error::StrategyError;
  use crate::portfolio::trend::GtaaConfig;

  fn universe() -> PriceMatrix {
    daily_matrix(vec![
      ("AAA", series(260, |t| 100.0 * (1.0 + 0.0005 * t as f64) * (1.0 + 0.02 * (0.9 * t as f64).sin()))),
      ("BBB", series(260, |t| 50.0 * (1.0 + 0.0003 * t as f64) * (1.0 + 0.01 * (1.7 * t as f64).sin()))),
      ("CCC", series(260, |t| 20.0 * (1.0 - 0.0002 * t as f64) * (1.0 + 0.015 * (0.4 * t as f64).sin()))),
    ])
  }

  #[test]
  fn dispatch_matches_strategy_kind() {
    for kind in StrategyKind::ALL {
      let engine = StrategyEngine::from_kind(kind);
      assert_eq!(engine.strategy().kind(), kind);
    }
  }

  #[test]
  fn every_strategy_returns_a_valid_allocation() {
    let pm = universe();
    let sectors: SectorMap = [("AAA", "Tech"), ("BBB", "Tech"), ("CCC", "Energy")]
      .into_iter()
      .collect();

    for kind in StrategyKind::ALL {
      let alloc = StrategyEngine::from_kind(kind).run(&pm, Some(&sectors)).unwrap();
      assert_eq!(alloc.strategy(), kind);
      assert_eq!(alloc.tickers(), pm.tickers());
      assert!(alloc.check_invariant().is_ok());
    }
  }

  #[test]
  #[traced_test]
  fn failures_are_logged_and_returned() {
    let pm = daily_matrix(vec![("AAA", series(30, |t| 100.0 + t as f64))]);
    let engine = StrategyEngine::new(Gtaa::new(GtaaConfig::new(2)));

    assert!(matches!(engine.run(&pm, None), Err(StrategyError::Parameter(_))));
    assert!(logs_contain("allocation failed"));
  }
}
