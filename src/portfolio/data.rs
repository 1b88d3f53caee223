//! # Portfolio Data
//!
//! $$
//! r_{t,i} = \frac{P_{t,i}}{P_{t-1,i}} - 1
//! $$
//!
//! Immutable price matrix (dates × tickers) and sector classification.
//! Missing prices are stored as `NaN` and surfaced as `None` by accessors.

use std::collections::HashMap;

use chrono::NaiveDate;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use ndarray::Axis;
use ndarray::s;

use super::error::StrategyError;
use super::error::StrategyResult;

/// Sector label assigned to tickers absent from a [`SectorMap`].
pub const UNKNOWN_SECTOR: &str = "Unknown";

/// Historical prices indexed by ascending dates (rows) and tickers (columns).
#[derive(Clone, Debug)]
pub struct PriceMatrix {
  dates: Vec<NaiveDate>,
  tickers: Vec<String>,
  index: HashMap<String, usize>,
  prices: Array2<f64>,
}

impl PriceMatrix {
  /// Build a matrix from a `(dates.len(), tickers.len())` price array.
  ///
  /// Cells may be `NaN` to mark a missing price; every other cell must be a
  /// positive finite price and the most recent row must be complete.
  pub fn new(
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    prices: Array2<f64>,
  ) -> StrategyResult<Self> {
    if tickers.is_empty() {
      return Err(StrategyError::InvalidData(
        "price matrix has no ticker columns".into(),
      ));
    }
    if dates.is_empty() {
      return Err(StrategyError::InvalidData(
        "price matrix has no timestamp rows".into(),
      ));
    }
    if prices.dim() != (dates.len(), tickers.len()) {
      return Err(StrategyError::InvalidData(format!(
        "price array has shape {:?}, expected ({}, {})",
        prices.dim(),
        dates.len(),
        tickers.len()
      )));
    }
    if let Some(w) = dates.windows(2).find(|w| w[0] >= w[1]) {
      return Err(StrategyError::InvalidData(format!(
        "timestamps must be strictly ascending ({} is followed by {})",
        w[0], w[1]
      )));
    }

    let mut index = HashMap::with_capacity(tickers.len());
    for (i, ticker) in tickers.iter().enumerate() {
      if index.insert(ticker.clone(), i).is_some() {
        return Err(StrategyError::InvalidData(format!(
          "duplicate ticker column {ticker}"
        )));
      }
    }

    for ((row, col), &p) in prices.indexed_iter() {
      if !p.is_nan() && !(p.is_finite() && p > 0.0) {
        return Err(StrategyError::InvalidData(format!(
          "price of {} on {} must be positive and finite, got {p}",
          tickers[col], dates[row]
        )));
      }
    }

    let last = prices.row(prices.nrows() - 1);
    if let Some(col) = last.iter().position(|p| p.is_nan()) {
      return Err(StrategyError::InvalidData(format!(
        "most recent row ({}) is missing a price for {}",
        dates[dates.len() - 1],
        tickers[col]
      )));
    }

    Ok(Self {
      dates,
      tickers,
      index,
      prices,
    })
  }

  /// Build a matrix from `(ticker, prices)` columns of equal length.
  pub fn from_columns<S: Into<String>>(
    dates: Vec<NaiveDate>,
    columns: Vec<(S, Vec<f64>)>,
  ) -> StrategyResult<Self> {
    let n_rows = dates.len();
    if let Some((_, col)) = columns.iter().find(|(_, c)| c.len() != n_rows) {
      return Err(StrategyError::InvalidData(format!(
        "column has {} prices, expected {n_rows}",
        col.len()
      )));
    }

    let mut tickers = Vec::with_capacity(columns.len());
    let mut values = Vec::with_capacity(columns.len());
    for (ticker, col) in columns {
      tickers.push(ticker.into());
      values.push(col);
    }

    let prices = Array2::from_shape_fn((n_rows, tickers.len()), |(r, c)| values[c][r]);
    Self::new(dates, tickers, prices)
  }

  pub fn n_rows(&self) -> usize {
    self.dates.len()
  }

  pub fn n_tickers(&self) -> usize {
    self.tickers.len()
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  /// Raw prices, `NaN` marking missing cells.
  pub fn values(&self) -> ArrayView2<'_, f64> {
    self.prices.view()
  }

  pub fn ticker_index(&self, ticker: &str) -> Option<usize> {
    self.index.get(ticker).copied()
  }

  /// Price at `(row, col)`, `None` when missing or out of range.
  pub fn price(&self, row: usize, col: usize) -> Option<f64> {
    self.prices.get((row, col)).copied().filter(|p| !p.is_nan())
  }

  /// Full price column for a ticker.
  pub fn column(&self, ticker: &str) -> Option<ArrayView1<'_, f64>> {
    self
      .ticker_index(ticker)
      .map(|i| self.prices.column(i))
  }

  /// Most recent row; always complete.
  pub fn last_row(&self) -> ArrayView1<'_, f64> {
    self.prices.row(self.prices.nrows() - 1)
  }

  /// The most recent `rows` rows as a new matrix.
  pub fn tail(&self, rows: usize) -> StrategyResult<Self> {
    if rows == 0 || rows > self.n_rows() {
      return Err(StrategyError::Parameter(format!(
        "tail window of {rows} rows is outside 1..={}",
        self.n_rows()
      )));
    }

    let start = self.n_rows() - rows;
    Ok(Self {
      dates: self.dates[start..].to_vec(),
      tickers: self.tickers.clone(),
      index: self.index.clone(),
      prices: self.prices.slice(s![start.., ..]).to_owned(),
    })
  }

  /// Simple period returns, one row shorter than the matrix.
  ///
  /// A return is `NaN` when either of its prices is missing.
  pub fn simple_returns(&self) -> Array2<f64> {
    let n = self.n_rows();
    if n < 2 {
      return Array2::zeros((0, self.n_tickers()));
    }

    let prev = self.prices.slice(s![..n - 1, ..]);
    let next = self.prices.slice(s![1.., ..]);
    let mut out = &next / &prev;
    out.mapv_inplace(|v| v - 1.0);
    out
  }

  /// Number of present prices per ticker.
  pub fn observation_counts(&self) -> Vec<usize> {
    self
      .prices
      .axis_iter(Axis(1))
      .map(|col| col.iter().filter(|p| !p.is_nan()).count())
      .collect()
  }
}

/// Ticker to sector classification.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SectorMap {
  sectors: HashMap<String, String>,
}

impl SectorMap {
  pub fn new() -> Self {
    Self::default()
  }

  /// Return a copy of the map with `ticker` assigned to `sector`.
  pub fn with(mut self, ticker: impl Into<String>, sector: impl Into<String>) -> Self {
    self.sectors.insert(ticker.into(), sector.into());
    self
  }

  /// Sector of `ticker`, [`UNKNOWN_SECTOR`] when unclassified.
  pub fn sector_of(&self, ticker: &str) -> &str {
    self
      .sectors
      .get(ticker)
      .map(String::as_str)
      .unwrap_or(UNKNOWN_SECTOR)
  }

  pub fn contains(&self, ticker: &str) -> bool {
    self.sectors.contains_key(ticker)
  }

  pub fn len(&self) -> usize {
    self.sectors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.sectors.is_empty()
  }
}

impl<T: Into<String>, S: Into<String>> FromIterator<(T, S)> for SectorMap {
  fn from_iter<I: IntoIterator<Item = (T, S)>>(iter: I) -> Self {
    Self {
      sectors: iter
        .into_iter()
        .map(|(t, s)| (t.into(), s.into()))
        .collect(),
    }
  }
}

/// Consecutive calendar dates starting 2020-01-01.
#[cfg(test)]
pub(crate) fn daily_dates(n: usize) -> Vec<NaiveDate> {
  let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
  (0..n)
    .map(|i| start + chrono::Duration::days(i as i64))
    .collect()
}

/// `n` samples of `f(t)` for `t = 0..n`.
#[cfg(test)]
pub(crate) fn series(n: usize, f: impl Fn(usize) -> f64) -> Vec<f64> {
  (0..n).map(f).collect()
}

/// Matrix over [`daily_dates`] built from equal-length columns.
#[cfg(test)]
pub(crate) fn daily_matrix(columns: Vec<(&str, Vec<f64>)>) -> PriceMatrix {
  let n_rows = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
  PriceMatrix::from_columns(daily_dates(n_rows), columns).unwrap()
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn rejects_missing_prices_in_last_row() {
    let err = PriceMatrix::from_columns(
      daily_dates(3),
      vec![("AAA", vec![1.0, 2.0, 3.0]), ("BBB", vec![1.0, 2.0, f64::NAN])],
    )
    .unwrap_err();

    assert!(matches!(err, StrategyError::InvalidData(_)));
  }

  #[test]
  fn rejects_unordered_dates_and_duplicate_tickers() {
    let mut dates = daily_dates(2);
    dates.reverse();
    let unordered = PriceMatrix::new(dates, vec!["AAA".into()], array![[1.0], [2.0]]);
    assert!(matches!(unordered, Err(StrategyError::InvalidData(_))));

    let duplicated = PriceMatrix::new(
      daily_dates(1),
      vec!["AAA".into(), "AAA".into()],
      array![[1.0, 2.0]],
    );
    assert!(matches!(duplicated, Err(StrategyError::InvalidData(_))));
  }

  #[test]
  fn rejects_non_positive_prices() {
    let err = PriceMatrix::from_columns(daily_dates(2), vec![("AAA", vec![0.0, 1.0])]).unwrap_err();
    assert!(matches!(err, StrategyError::InvalidData(_)));
  }

  #[test]
  fn simple_returns_propagate_missing_prices() {
    let pm = PriceMatrix::from_columns(
      daily_dates(4),
      vec![("AAA", vec![100.0, f64::NAN, 121.0, 133.1])],
    )
    .unwrap();

    let r = pm.simple_returns();
    assert_eq!(r.nrows(), 3);
    assert!(r[[0, 0]].is_nan());
    assert!(r[[1, 0]].is_nan());
    assert_abs_diff_eq!(r[[2, 0]], 0.1, epsilon = 1e-12);
    assert_eq!(pm.price(1, 0), None);
    assert_eq!(pm.observation_counts(), vec![3]);
  }

  #[test]
  fn tail_keeps_most_recent_rows() {
    let pm = daily_matrix(vec![("AAA", series(10, |t| 1.0 + t as f64))]);
    let tail = pm.tail(3).unwrap();

    assert_eq!(tail.n_rows(), 3);
    assert_eq!(tail.dates()[0], pm.dates()[7]);
    assert_eq!(tail.price(0, 0), Some(8.0));
    assert!(matches!(pm.tail(11), Err(StrategyError::Parameter(_))));
  }

  #[test]
  fn sector_map_defaults_to_unknown() {
    let sectors: SectorMap = [("AAA", "Tech")].into_iter().collect();
    let sectors = sectors.with("BBB", "Energy");

    assert_eq!(sectors.sector_of("AAA"), "Tech");
    assert_eq!(sectors.sector_of("BBB"), "Energy");
    assert_eq!(sectors.sector_of("CCC"), UNKNOWN_SECTOR);
    assert_eq!(sectors.len(), 2);
  }
}
