//! # Synthetic Prices
//!
//! $$
//! S_{t+\Delta t} = S_t \exp\left((\mu - \tfrac12\sigma^2)\Delta t + \sigma\sqrt{\Delta t}\,Z\right)
//! $$
//!
//! Seeded geometric Brownian motion universes on a business-day calendar.

use chrono::Datelike;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::Weekday;
use impl_new_derive::ImplNew;
use ndarray::Array2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::Distribution;
use rand_distr::Normal;

use super::data::PriceMatrix;
use super::data::SectorMap;
use super::error::StrategyError;
use super::error::StrategyResult;
use super::estimator::TRADING_DAYS_PER_YEAR;

/// One simulated asset.
#[derive(ImplNew, Clone, Debug, PartialEq)]
pub struct GbmAsset {
  pub ticker: String,
  pub sector: String,
  /// Annual drift.
  pub mu: f64,
  /// Annual volatility.
  pub sigma: f64,
  /// Initial price.
  pub s0: f64,
}

/// Independent GBM paths sampled with a fixed seed.
#[derive(ImplNew, Clone, Debug, PartialEq)]
pub struct GbmUniverse {
  pub n_rows: usize,
  pub seed: u64,
  pub start: NaiveDate,
  pub assets: Vec<GbmAsset>,
}

impl GbmUniverse {
  /// Twelve assets over five sectors with distinct drift and volatility.
  pub fn sector_sample(n_rows: usize, seed: u64) -> Self {
    let specs = [
      ("TECH1", "Technology", 0.18, 0.30, 120.0),
      ("TECH2", "Technology", 0.15, 0.28, 85.0),
      ("TECH3", "Technology", 0.10, 0.35, 40.0),
      ("ENGY1", "Energy", 0.04, 0.32, 70.0),
      ("ENGY2", "Energy", -0.02, 0.30, 55.0),
      ("ENGY3", "Energy", 0.06, 0.27, 33.0),
      ("UTIL1", "Utilities", 0.05, 0.12, 60.0),
      ("UTIL2", "Utilities", 0.04, 0.10, 48.0),
      ("FIN1", "Financials", 0.09, 0.22, 90.0),
      ("FIN2", "Financials", 0.07, 0.20, 36.0),
      ("FIN3", "Financials", 0.11, 0.25, 28.0),
      ("BOND", "Fixed Income", 0.03, 0.05, 100.0),
    ];

    let assets = specs
      .iter()
      .map(|&(ticker, sector, mu, sigma, s0)| GbmAsset::new(ticker.into(), sector.into(), mu, sigma, s0))
      .collect();

    let start = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap_or_default();
    Self::new(n_rows, seed, start, assets)
  }

  /// Sample a price matrix, one business day per row.
  pub fn prices(&self) -> StrategyResult<PriceMatrix> {
    if self.n_rows == 0 {
      return Err(StrategyError::Parameter("universe needs at least one row".into()));
    }

    let dt = 1.0 / TRADING_DAYS_PER_YEAR;
    let normal = Normal::new(0.0, 1.0).map_err(|e| StrategyError::Parameter(e.to_string()))?;
    let mut rng = StdRng::seed_from_u64(self.seed);
    let mut prices = Array2::<f64>::zeros((self.n_rows, self.assets.len()));

    for (col, asset) in self.assets.iter().enumerate() {
      if !(asset.sigma >= 0.0 && asset.s0 > 0.0 && asset.mu.is_finite()) {
        return Err(StrategyError::Parameter(format!(
          "invalid GBM parameters for {}",
          asset.ticker
        )));
      }

      let drift = (asset.mu - 0.5 * asset.sigma * asset.sigma) * dt;
      let vol = asset.sigma * dt.sqrt();
      let mut s = asset.s0;
      prices[[0, col]] = s;
      for row in 1..self.n_rows {
        s *= (drift + vol * normal.sample(&mut rng)).exp();
        prices[[row, col]] = s;
      }
    }

    let tickers = self.assets.iter().map(|a| a.ticker.clone()).collect();
    PriceMatrix::new(business_days(self.start, self.n_rows), tickers, prices)
  }

  pub fn sectors(&self) -> SectorMap {
    self
      .assets
      .iter()
      .map(|a| (a.ticker.as_str(), a.sector.as_str()))
      .collect()
  }
}

/// `n` consecutive weekdays starting at (or after) `start`.
pub fn business_days(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
  let mut dates = Vec::with_capacity(n);
  let mut day = start;
  while dates.len() < n {
    if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
      dates.push(day);
    }
    day += Duration::days(1);
  }
  dates
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn business_days_skip_weekends() {
    // 2024-01-05 is a Friday.
    let friday = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
    let days = business_days(friday, 3);

    assert_eq!(days[1], NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
    assert_eq!(days[2].weekday(), Weekday::Tue);
  }

  #[test]
  fn same_seed_same_paths() {
    let universe = GbmUniverse::sector_sample(50, 7);
    let a = universe.prices().unwrap();
    let b = universe.prices().unwrap();

    assert_eq!(a.values(), b.values());
    assert_eq!(a.n_tickers(), 12);
    assert_eq!(a.price(0, 0), Some(120.0));
    assert!(a.values().iter().all(|p| *p > 0.0));

    let other = GbmUniverse::sector_sample(50, 8).prices().unwrap();
    assert_ne!(a.values(), other.values());
  }

  #[test]
  fn sector_map_covers_every_asset() {
    let universe = GbmUniverse::sector_sample(10, 1);
    let sectors = universe.sectors();

    assert_eq!(sectors.len(), 12);
    assert_eq!(sectors.sector_of("UTIL2"), "Utilities");
  }

  #[test]
  fn rejects_negative_volatility() {
    let mut universe = GbmUniverse::sector_sample(10, 1);
    universe.assets[0].sigma = -0.1;
    assert!(matches!(universe.prices(), Err(StrategyError::Parameter(_))));
  }
}
