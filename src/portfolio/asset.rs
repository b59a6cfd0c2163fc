//! # Asset Return Model
//!
//! $$
//! \hat R_{\text{cons}} = \Big(\bar R + t_{p,\nu}\,\frac{\sigma}{\sqrt{\nu}}\Big)(1-f),
//! \qquad \nu = \frac{n}{d}
//! $$
//!
//! Per-asset net-of-fee return statistics with a Student-t lower bound.
//! Years, not days, are the independent samples: daily returns within a
//! year are serially correlated, so short histories get wide intervals.

use std::collections::BTreeMap;
use std::io::Read;

use chrono::NaiveDate;
use csv::ReaderBuilder;
use csv::Trim;
use impl_new_derive::ImplNew;
use statrs::distribution::ContinuousCDF;
use statrs::distribution::StudentsT;

use super::data::geometric_mean;
use super::data::sample_std;
use crate::config::MarketConfig;
use crate::error::AllocationError;
use crate::error::Result;

/// An investable asset: ticker, chronological adjusted closes and fee rate.
#[derive(ImplNew, Clone, Debug, PartialEq)]
pub struct Asset {
  pub ticker: String,
  pub prices: BTreeMap<NaiveDate, f64>,
  /// Periodic (annual) fee as a fraction, e.g. `0.0004`.
  pub fee_rate: f64,
}

impl Asset {
  /// Reject non-positive prices and negative fees.
  pub fn validate(&self) -> Result<()> {
    if self.ticker.is_empty() {
      return Err(AllocationError::InvalidInput("empty ticker".into()));
    }
    if !(self.fee_rate.is_finite() && self.fee_rate >= 0.0) {
      return Err(AllocationError::InvalidInput(format!(
        "{}: fee rate must be non-negative, got {}",
        self.ticker, self.fee_rate
      )));
    }
    if let Some((date, price)) = self
      .prices
      .iter()
      .find(|(_, p)| !(p.is_finite() && **p > 0.0))
    {
      return Err(AllocationError::InvalidInput(format!(
        "{}: non-positive price {price} on {date}",
        self.ticker
      )));
    }
    Ok(())
  }

  /// Load a `date,price` history with a header row. Dates are `%Y-%m-%d`;
  /// quoted fields and surrounding whitespace are accepted.
  pub fn from_csv<R: Read>(ticker: String, fee_rate: f64, reader: R) -> Result<Self> {
    let mut rdr = ReaderBuilder::new()
      .has_headers(true)
      .trim(Trim::All)
      .from_reader(reader);

    let mut prices = BTreeMap::new();
    for record in rdr.records() {
      let record = record.map_err(|e| AllocationError::InvalidInput(format!("{ticker}: {e}")))?;
      let line = record.position().map_or(0, |p| p.line());
      let (Some(date), Some(price)) = (record.get(0), record.get(1)) else {
        return Err(AllocationError::InvalidInput(format!(
          "{ticker}: line {line}: expected `date,price`"
        )));
      };
      let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| {
        AllocationError::InvalidInput(format!("{ticker}: line {line}: bad date {date:?}: {e}"))
      })?;
      let price: f64 = price.parse().map_err(|e| {
        AllocationError::InvalidInput(format!("{ticker}: line {line}: bad price {price:?}: {e}"))
      })?;
      prices.insert(date, price);
    }

    Ok(Self::new(ticker, prices, fee_rate))
  }

  /// Multiplicative fee factor applied to one trading day's return.
  pub fn daily_fee_factor(&self, trading_days_per_year: f64) -> f64 {
    daily_fee_factor(self.fee_rate, trading_days_per_year)
  }
}

/// `1 - ((1 + fee)^(1/d) - 1)`.
pub(crate) fn daily_fee_factor(fee_rate: f64, trading_days_per_year: f64) -> f64 {
  let daily_fee = (1.0 + fee_rate).powf(1.0 / trading_days_per_year) - 1.0;
  1.0 - daily_fee
}

/// Return statistics for one asset, fixed at construction.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetReturnModel {
  ticker: String,
  fee_rate: f64,
  trading_days_per_year: f64,
  daily_returns: Vec<f64>,
  annualized_return: f64,
  annualized_volatility: f64,
}

impl AssetReturnModel {
  /// Build the model from an asset's full price history.
  pub fn new(asset: &Asset, market: &MarketConfig) -> Result<Self> {
    asset.validate()?;
    if asset.prices.len() < 2 {
      return Err(AllocationError::InsufficientData(format!(
        "{}: need at least 2 prices, got {}",
        asset.ticker,
        asset.prices.len()
      )));
    }

    let tdy = market.trading_days_per_year;
    let fee_factor = asset.daily_fee_factor(tdy);
    let prices: Vec<f64> = asset.prices.values().copied().collect();
    let daily_returns: Vec<f64> = prices
      .windows(2)
      .map(|w| w[1] / w[0] * fee_factor)
      .collect();

    let annualized_return = geometric_mean(&daily_returns).powf(tdy);
    // A single observation carries no dispersion estimate.
    let annualized_volatility = if daily_returns.len() > 1 {
      sample_std(&daily_returns) * tdy.sqrt()
    } else {
      0.0
    };

    Ok(Self {
      ticker: asset.ticker.clone(),
      fee_rate: asset.fee_rate,
      trading_days_per_year: tdy,
      daily_returns,
      annualized_return,
      annualized_volatility,
    })
  }

  pub fn ticker(&self) -> &str {
    &self.ticker
  }

  pub fn fee_rate(&self) -> f64 {
    self.fee_rate
  }

  /// Net-of-fee day-over-day price ratios.
  pub fn daily_returns(&self) -> &[f64] {
    &self.daily_returns
  }

  /// Geometric daily mean raised to the trading days per year.
  pub fn annualized_return(&self) -> f64 {
    self.annualized_return
  }

  /// Sample standard deviation of daily returns scaled by `sqrt(d)`.
  pub fn annualized_volatility(&self) -> f64 {
    self.annualized_volatility
  }

  pub fn years_of_data(&self) -> f64 {
    self.daily_returns.len() as f64 / self.trading_days_per_year
  }

  /// Lower confidence bound on the annual return at `percentile`, net of fees.
  pub fn conservative_annualized_return(&self, percentile: f64) -> Result<f64> {
    if !(percentile > 0.0 && percentile < 1.0) {
      return Err(AllocationError::InvalidInput(format!(
        "percentile must be in (0, 1), got {percentile}"
      )));
    }

    let years = self.years_of_data();
    if !(years > 0.0) {
      return Err(AllocationError::InsufficientData(format!(
        "{}: zero years of return data",
        self.ticker
      )));
    }

    let t = StudentsT::new(0.0, 1.0, years)
      .map_err(|e| AllocationError::InvalidInput(format!("{}: {e}", self.ticker)))?;
    let t_value = t.inverse_cdf(percentile);
    let estimate = self.annualized_return + t_value * self.annualized_volatility / years.sqrt();

    Ok(estimate - estimate * self.fee_rate)
  }
}
