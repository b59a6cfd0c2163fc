//! # Aligned Market Matrix
//!
//! $$
//! C_{tj} = \frac{P_{t,j}}{P_{t-1,j}}\,(1-f_j^{\text{daily}})
//! $$
//!
//! Rectangular price-change matrix over the trading days every retained
//! asset shares. Rows are periods, columns follow the sorted ticker order.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use ndarray::Array2;
use ndarray::ArrayView2;
use tracing::debug;
use tracing::info;

use super::asset::Asset;
use super::asset::daily_fee_factor;
use super::data::covariance_matrix;
use super::types::Allocation;
use crate::config::MarketConfig;
use crate::error::AllocationError;
use crate::error::Result;

/// Dense, aligned multi-asset price history.
#[derive(Clone, Debug, PartialEq)]
pub struct AlignedMarketMatrix {
  tickers: Vec<String>,
  fee_rates: Vec<f64>,
  dates: Vec<NaiveDate>,
  prices: Array2<f64>,
  changes: Array2<f64>,
}

impl AlignedMarketMatrix {
  /// Filter short histories, align on common dates and build the ratio matrix.
  pub fn build(assets: &[Asset], market: &MarketConfig) -> Result<Self> {
    let mut seen = BTreeSet::new();
    for asset in assets {
      asset.validate()?;
      if !seen.insert(asset.ticker.as_str()) {
        return Err(AllocationError::InvalidInput(format!(
          "duplicate ticker {}",
          asset.ticker
        )));
      }
    }

    let mut survivors: BTreeMap<&str, &Asset> = BTreeMap::new();
    for asset in assets {
      if asset.prices.len() < market.min_history_days {
        debug!(
          ticker = %asset.ticker,
          observations = asset.prices.len(),
          required = market.min_history_days,
          "dropping asset with short history"
        );
        continue;
      }
      survivors.insert(&asset.ticker, asset);
    }

    let Some(first) = survivors.values().next() else {
      return Err(AllocationError::InsufficientData(format!(
        "no asset has at least {} observations",
        market.min_history_days
      )));
    };

    // A date shared by every survivor is in particular a date of the first one.
    let dates: Vec<NaiveDate> = first
      .prices
      .keys()
      .filter(|d| **d <= market.as_of)
      .filter(|d| survivors.values().all(|a| a.prices.contains_key(*d)))
      .copied()
      .collect();

    if dates.len() < 2 {
      return Err(AllocationError::InsufficientData(format!(
        "{} aligned trading day(s) across {} assets, need at least 2",
        dates.len(),
        survivors.len()
      )));
    }

    let tickers: Vec<String> = survivors.keys().map(|t| t.to_string()).collect();
    let fee_rates: Vec<f64> = survivors.values().map(|a| a.fee_rate).collect();
    let n_assets = tickers.len();

    let prices = Array2::from_shape_fn((dates.len(), n_assets), |(t, j)| {
      let asset = survivors[tickers[j].as_str()];
      asset.prices[&dates[t]]
    });

    let fee_factors: Vec<f64> = fee_rates
      .iter()
      .map(|&f| daily_fee_factor(f, market.trading_days_per_year))
      .collect();
    let changes = Array2::from_shape_fn((dates.len() - 1, n_assets), |(t, j)| {
      prices[[t + 1, j]] / prices[[t, j]] * fee_factors[j]
    });

    info!(
      assets = n_assets,
      dropped = assets.len() - n_assets,
      periods = changes.nrows(),
      "aligned market matrix"
    );

    Ok(Self {
      tickers,
      fee_rates,
      dates,
      prices,
      changes,
    })
  }

  /// Canonical, lexicographically sorted asset order.
  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  pub fn fee_rates(&self) -> &[f64] {
    &self.fee_rates
  }

  /// Aligned trading days; one more than the number of change periods.
  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  /// Aligned prices, rows = dates, columns = tickers.
  pub fn prices(&self) -> ArrayView2<'_, f64> {
    self.prices.view()
  }

  /// Net-of-fee day-over-day ratios, rows = periods, columns = tickers.
  pub fn changes(&self) -> ArrayView2<'_, f64> {
    self.changes.view()
  }

  pub fn n_assets(&self) -> usize {
    self.tickers.len()
  }

  pub fn n_periods(&self) -> usize {
    self.changes.nrows()
  }

  pub fn column_index(&self, ticker: &str) -> Option<usize> {
    self.tickers.binary_search_by(|t| t.as_str().cmp(ticker)).ok()
  }

  /// Population covariance of the price-change columns.
  pub fn covariance(&self) -> Array2<f64> {
    covariance_matrix(self.changes.view())
  }

  /// Allocation from `(ticker, weight)` pairs; tickers not listed get zero.
  pub fn allocation_from_pairs<'a, I>(&self, pairs: I) -> Result<Allocation>
  where
    I: IntoIterator<Item = (&'a str, f64)>,
  {
    let mut weights = vec![0.0; self.n_assets()];
    for (ticker, weight) in pairs {
      let idx = self.column_index(ticker).ok_or_else(|| {
        AllocationError::InvalidAllocation(format!("{ticker} is not in the market matrix"))
      })?;
      weights[idx] += weight;
    }
    let allocation = Allocation::from_weights(weights);
    allocation.validate(self.n_assets())?;
    Ok(allocation)
  }
}

/// Identity of a matrix build: a cached matrix is reused only when all of
/// these match.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MatrixKey {
  pub tickers: Vec<String>,
  pub as_of: NaiveDate,
  pub min_history_days: usize,
}

impl MatrixKey {
  pub fn new(assets: &[Asset], market: &MarketConfig) -> Self {
    let mut tickers: Vec<String> = assets.iter().map(|a| a.ticker.clone()).collect();
    tickers.sort();
    tickers.dedup();
    Self {
      tickers,
      as_of: market.as_of,
      min_history_days: market.min_history_days,
    }
  }
}

/// Memoises aligned matrices per [`MatrixKey`].
#[derive(Debug, Default)]
pub struct MatrixCache {
  entries: HashMap<MatrixKey, Arc<AlignedMarketMatrix>>,
}

impl MatrixCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get_or_build(
    &mut self,
    assets: &[Asset],
    market: &MarketConfig,
  ) -> Result<Arc<AlignedMarketMatrix>> {
    let key = MatrixKey::new(assets, market);
    if let Some(m) = self.entries.get(&key) {
      debug!(assets = key.tickers.len(), "market matrix cache hit");
      return Ok(Arc::clone(m));
    }
    let matrix = Arc::new(AlignedMarketMatrix::build(assets, market)?);
    self.entries.insert(key, Arc::clone(&matrix));
    Ok(matrix)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2018, 1, d).unwrap()
  }

  fn asset(ticker: &str, prices: &[f64]) -> Asset {
    let series = prices
      .iter()
      .enumerate()
      .map(|(i, &p)| (date(i as u32 + 1), p))
      .collect();
    Asset::new(ticker.to_string(), series, 0.0)
  }

  fn market(min_history_days: usize) -> MarketConfig {
    MarketConfig {
      trading_days_per_year: 261.0,
      min_history_days,
      as_of: date(31),
      conservative_percentile: 0.5,
    }
  }

  fn database() -> Vec<Asset> {
    vec![
      asset("3", &[300.0, 303.0, 306.0, 309.0]),
      asset("1", &[101.0, 102.0, 103.0]),
      asset("2", &[200.0, 202.0, 206.0, 208.0, 210.0]),
    ]
  }

  #[test]
  fn drops_short_histories_and_sorts_tickers() {
    let m = AlignedMarketMatrix::build(&database(), &market(4)).unwrap();
    assert_eq!(m.tickers(), &["2".to_string(), "3".to_string()]);
    assert_eq!(m.n_assets(), 2);
  }

  #[test]
  fn keeps_only_dates_shared_by_every_asset() {
    let m = AlignedMarketMatrix::build(&database(), &market(4)).unwrap();
    let prices = m.prices();
    assert_eq!(prices.nrows(), 4);
    assert_eq!(prices.row(0).to_vec(), vec![200.0, 300.0]);
    assert_eq!(prices.row(1).to_vec(), vec![202.0, 303.0]);
    assert_eq!(prices.row(2).to_vec(), vec![206.0, 306.0]);
    assert_eq!(prices.row(3).to_vec(), vec![208.0, 309.0]);
    assert_eq!(m.n_periods(), 3);
    assert_eq!(m.dates().len(), 4);
  }

  #[test]
  fn removing_one_short_asset_removes_only_that_asset() {
    let with_all = AlignedMarketMatrix::build(&database(), &market(3)).unwrap();
    assert_eq!(with_all.n_assets(), 3);

    let mut assets = database();
    assets[1] = asset("1", &[101.0, 102.0]);
    let without = AlignedMarketMatrix::build(&assets, &market(3)).unwrap();
    assert_eq!(without.tickers(), &["2".to_string(), "3".to_string()]);
  }

  #[test]
  fn as_of_cutoff_truncates_rows() {
    let mut cfg = market(4);
    cfg.as_of = date(3);
    let m = AlignedMarketMatrix::build(&database(), &cfg).unwrap();
    assert_eq!(m.dates().last(), Some(&date(3)));
    assert_eq!(m.n_periods(), 2);
  }

  #[test]
  fn insufficient_data_is_reported() {
    assert!(matches!(
      AlignedMarketMatrix::build(&database(), &market(10)),
      Err(AllocationError::InsufficientData(_))
    ));

    let mut cfg = market(4);
    cfg.as_of = date(1);
    assert!(matches!(
      AlignedMarketMatrix::build(&database(), &cfg),
      Err(AllocationError::InsufficientData(_))
    ));
  }

  #[test]
  fn duplicate_tickers_are_rejected() {
    let assets = vec![asset("A", &[1.0, 2.0]), asset("A", &[1.0, 2.0])];
    assert!(matches!(
      AlignedMarketMatrix::build(&assets, &market(2)),
      Err(AllocationError::InvalidInput(_))
    ));

    // The short copy would be filtered out, but the clash is still reported.
    let assets = vec![asset("A", &[1.0, 2.0, 3.0]), asset("A", &[1.0])];
    assert!(matches!(
      AlignedMarketMatrix::build(&assets, &market(3)),
      Err(AllocationError::InvalidInput(_))
    ));
  }

  #[test]
  fn covariance_of_database_fixture() {
    let m = AlignedMarketMatrix::build(&database(), &market(4)).unwrap();
    let cov = m.covariance();
    assert_abs_diff_eq!(cov[[0, 0]], 2.20041322e-05, epsilon = 1e-12);
    assert_abs_diff_eq!(cov[[1, 1]], 6.40800126e-09, epsilon = 1e-14);
  }

  #[test]
  fn fees_reduce_price_changes() {
    let mut assets = vec![asset("A", &[100.0, 110.0, 121.0])];
    assets[0].fee_rate = 0.05;
    let m = AlignedMarketMatrix::build(&assets, &market(2)).unwrap();
    assert_eq!(m.fee_rates(), &[0.05]);
    let factor = 1.0 - (1.05f64.powf(1.0 / 261.0) - 1.0);
    assert_abs_diff_eq!(m.changes()[[0, 0]], 1.1 * factor, epsilon = 1e-12);
  }

  #[test]
  fn allocation_from_pairs_follows_canonical_order() {
    let m = AlignedMarketMatrix::build(&database(), &market(3)).unwrap();
    let a = m
      .allocation_from_pairs([("3", 0.1), ("1", 0.5), ("2", 0.4)])
      .unwrap();
    assert_eq!(a.weights(), &[0.5, 0.4, 0.1]);
    assert!(m.allocation_from_pairs([("ZZZ", 1.0)]).is_err());
  }

  #[test]
  fn cache_is_keyed_by_cutoff_and_threshold() {
    let mut cache = MatrixCache::new();
    assert!(cache.is_empty());
    let a = cache.get_or_build(&database(), &market(4)).unwrap();
    let b = cache.get_or_build(&database(), &market(4)).unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    let c = cache.get_or_build(&database(), &market(3)).unwrap();
    assert_eq!(c.n_assets(), 3);
    assert_eq!(cache.len(), 2);

    let mut cfg = market(4);
    cfg.as_of = date(3);
    let d = cache.get_or_build(&database(), &cfg).unwrap();
    assert_eq!(d.n_periods(), 2);
    assert_eq!(cache.len(), 3);
  }
}
