//! # Sector Relative Strength
//!
//! $$
//! R_i = \frac{P_{T,i}}{P_{T-L,i}} - 1, \qquad
//! \bar R_s = \frac{1}{|s|} \sum_{i \in s} R_i
//! $$
//!
//! Sectors are ranked by the average lookback return of their members and
//! every ticker of the best `top_n_sectors` sectors is held in equal weight.

use std::cmp::Reverse;

use impl_new_derive::ImplNew;
use ndarray::Array1;
use ordered_float::OrderedFloat;
use tracing::debug;
use tracing::warn;

use super::data::PriceMatrix;
use super::data::SectorMap;
use super::engine::AllocationStrategy;
use super::error::StrategyError;
use super::error::StrategyResult;
use super::types::Allocation;
use super::types::Diagnostics;
use super::types::SectorDiagnostics;
use super::types::SectorScore;
use super::types::StrategyKind;
use super::validate::validate;
use super::validate::validate_window;

/// Lookback and breadth of the sector rotation.
#[derive(ImplNew, Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectorRelativeStrengthConfig {
  /// Rows between the reference price and the latest price.
  pub lookback_days: usize,
  /// Number of best ranked sectors to hold.
  pub top_n_sectors: usize,
}

impl Default for SectorRelativeStrengthConfig {
  fn default() -> Self {
    Self {
      lookback_days: 90,
      top_n_sectors: 3,
    }
  }
}

#[derive(Clone, Debug, Default)]
pub struct SectorRelativeStrength {
  config: SectorRelativeStrengthConfig,
}

impl SectorRelativeStrength {
  pub fn new(config: SectorRelativeStrengthConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &SectorRelativeStrengthConfig {
    &self.config
  }
}

/// Simple return over the last `lookback` rows per ticker.
///
/// `None` when either endpoint price is missing.
pub fn lookback_returns(prices: &PriceMatrix, lookback: usize) -> Vec<Option<f64>> {
  let last = prices.n_rows() - 1;
  let Some(start) = last.checked_sub(lookback) else {
    return vec![None; prices.n_tickers()];
  };

  (0..prices.n_tickers())
    .map(|col| match (prices.price(start, col), prices.price(last, col)) {
      (Some(p0), Some(p1)) => Some(p1 / p0 - 1.0),
      _ => None,
    })
    .collect()
}

/// Average return per sector, best first, with the top `top_n` marked selected.
///
/// Sectors enter in first-seen column order and the sort is stable, so equal
/// averages keep that order. Tickers without a return are ignored.
pub fn rank_sectors(sectors: &[String], returns: &[Option<f64>], top_n: usize) -> Vec<SectorScore> {
  let mut ranking: Vec<SectorScore> = Vec::new();

  for (sector, r) in sectors.iter().zip(returns) {
    let Some(r) = r else { continue };
    match ranking.iter_mut().find(|s| &s.sector == sector) {
      Some(score) => {
        score.average_return += r;
        score.members += 1;
      }
      None => ranking.push(SectorScore {
        sector: sector.clone(),
        average_return: *r,
        members: 1,
        selected: false,
      }),
    }
  }

  for score in &mut ranking {
    score.average_return /= score.members as f64;
  }
  ranking.sort_by_key(|s| Reverse(OrderedFloat(s.average_return)));

  for score in ranking.iter_mut().take(top_n) {
    score.selected = true;
  }
  ranking
}

/// Equal weights over `members`, zero elsewhere.
pub(crate) fn equal_weights(len: usize, members: &[usize]) -> Array1<f64> {
  let mut weights = Array1::zeros(len);
  if members.is_empty() {
    return weights;
  }

  let w = 1.0 / members.len() as f64;
  for &i in members {
    weights[i] = w;
  }
  weights
}

impl AllocationStrategy for SectorRelativeStrength {
  fn kind(&self) -> StrategyKind {
    StrategyKind::SectorRelativeStrength
  }

  fn run(&self, prices: &PriceMatrix, sectors: Option<&SectorMap>) -> StrategyResult<Allocation> {
    let SectorRelativeStrengthConfig {
      lookback_days,
      top_n_sectors,
    } = self.config;

    validate(prices, 1, 1)?;
    validate_window(lookback_days, prices.n_rows(), "lookback")?;
    if top_n_sectors == 0 {
      return Err(StrategyError::Parameter(
        "number of selected sectors must be at least 1".into(),
      ));
    }

    let unclassified = SectorMap::default();
    let sector_map = sectors.unwrap_or(&unclassified);
    let ticker_sectors: Vec<String> = prices
      .tickers()
      .iter()
      .map(|t| sector_map.sector_of(t).to_string())
      .collect();

    let recent_returns = lookback_returns(prices, lookback_days);
    let ranking = rank_sectors(&ticker_sectors, &recent_returns, top_n_sectors);

    // Tickers without a return still belong to their sector.
    let members: Vec<usize> = (0..prices.n_tickers())
      .filter(|&i| {
        ranking
          .iter()
          .any(|s| s.selected && s.sector == ticker_sectors[i])
      })
      .collect();

    let diagnostics = Diagnostics::SectorRelativeStrength(SectorDiagnostics {
      lookback_days,
      recent_returns,
      sectors: ticker_sectors,
      ranking,
    });

    if members.is_empty() {
      warn!(lookback_days, "no ticker in a selected sector, holding no positions");
      return Ok(Allocation::empty(
        self.kind(),
        prices.tickers().to_vec(),
        diagnostics,
      ));
    }

    debug!(
      lookback_days,
      top_n_sectors,
      holdings = members.len(),
      "sector relative strength ranked"
    );

    Ok(Allocation::new(
      self.kind(),
      prices.tickers().to_vec(),
      equal_weights(prices.n_tickers(), &members),
      diagnostics,
    ))
  }
}
