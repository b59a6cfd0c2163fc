//! # Reports
//!
//! Allocation rows sorted by descending weight and per-asset return
//! summaries, as plain rows, CSV or console tables.

use std::io::Write;

use csv::Writer;
use prettytable::Table;
use prettytable::row;

use super::asset::Asset;
use super::asset::AssetReturnModel;
use super::types::ScoreBreakdown;
use super::types::ScoredAllocation;
use crate::config::MarketConfig;
use crate::error::AllocationError;
use crate::error::Result;

/// One `(ticker, weight)` line of a recommended allocation.
#[derive(Clone, Debug, PartialEq)]
pub struct AllocationRow {
  pub ticker: String,
  pub weight: f64,
}

/// Rows for `weights` in `tickers` order, sorted by descending weight
/// (ties by ticker).
pub fn allocation_rows(tickers: &[String], weights: &[f64]) -> Result<Vec<AllocationRow>> {
  if tickers.len() != weights.len() {
    return Err(AllocationError::InvalidAllocation(format!(
      "{} tickers but {} weights",
      tickers.len(),
      weights.len()
    )));
  }

  let mut rows: Vec<AllocationRow> = tickers
    .iter()
    .zip(weights)
    .map(|(t, &w)| AllocationRow {
      ticker: t.clone(),
      weight: w,
    })
    .collect();
  rows.sort_by(|a, b| {
    b.weight
      .total_cmp(&a.weight)
      .then_with(|| a.ticker.cmp(&b.ticker))
  });
  Ok(rows)
}

/// Final allocation with its score breakdown.
#[derive(Clone, Debug)]
pub struct AllocationReport {
  rows: Vec<AllocationRow>,
  breakdown: ScoreBreakdown,
}

impl AllocationReport {
  pub fn new(tickers: &[String], best: &ScoredAllocation) -> Result<Self> {
    Ok(Self {
      rows: allocation_rows(tickers, best.weights())?,
      breakdown: best.breakdown(),
    })
  }

  pub fn rows(&self) -> &[AllocationRow] {
    &self.rows
  }

  pub fn breakdown(&self) -> ScoreBreakdown {
    self.breakdown
  }

  /// `Ticker,Allocation` header followed by one record per row.
  pub fn write_csv<W: Write>(&self, out: W) -> csv::Result<()> {
    let mut writer = Writer::from_writer(out);
    writer.write_record(["Ticker", "Allocation"])?;
    for r in &self.rows {
      let weight = r.weight.to_string();
      writer.write_record([r.ticker.as_str(), weight.as_str()])?;
    }
    writer.flush()?;
    Ok(())
  }

  pub fn to_table(&self) -> Table {
    let mut table = Table::new();
    table.set_titles(row!["Ticker", "Weight"]);
    for r in &self.rows {
      table.add_row(row![r.ticker, format!("{:.2}%", r.weight * 100.0)]);
    }
    table
  }
}

/// Per-asset return statistics.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetSummary {
  pub ticker: String,
  pub fee_rate: f64,
  pub annualized_return: f64,
  pub annualized_volatility: f64,
  pub conservative_return: f64,
}

/// Summaries for every asset, sorted by ticker, using the configured
/// conservative percentile.
pub fn asset_summaries(assets: &[Asset], market: &MarketConfig) -> Result<Vec<AssetSummary>> {
  let mut out = assets
    .iter()
    .map(|a| {
      let model = AssetReturnModel::new(a, market)?;
      Ok(AssetSummary {
        ticker: model.ticker().to_string(),
        fee_rate: model.fee_rate(),
        annualized_return: model.annualized_return(),
        annualized_volatility: model.annualized_volatility(),
        conservative_return: model.conservative_annualized_return(market.conservative_percentile)?,
      })
    })
    .collect::<Result<Vec<_>>>()?;
  out.sort_by(|a, b| a.ticker.cmp(&b.ticker));
  Ok(out)
}

pub fn summaries_table(summaries: &[AssetSummary]) -> Table {
  let mut table = Table::new();
  table.set_titles(row![
    "Ticker",
    "Expense Ratio",
    "Mean Annual Return",
    "St. Dev. Annual Return",
    "Cons. Annual Return"
  ]);
  for s in summaries {
    table.add_row(row![
      s.ticker,
      format!("{:.4}", s.fee_rate),
      format!("{:.4}", s.annualized_return),
      format!("{:.4}", s.annualized_volatility),
      format!("{:.4}", s.conservative_return)
    ]);
  }
  table
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;
  use ndarray::Array1;

  use super::*;
  use crate::portfolio::types::Allocation;

  #[test]
  fn rows_sort_by_descending_weight_then_ticker() {
    let tickers = vec!["A".to_string(), "B".to_string(), "C".to_string()];
    let rows = allocation_rows(&tickers, &[0.2, 0.5, 0.3]).unwrap();
    let order: Vec<&str> = rows.iter().map(|r| r.ticker.as_str()).collect();
    assert_eq!(order, vec!["B", "C", "A"]);

    let tied = allocation_rows(&tickers, &[0.25, 0.5, 0.25]).unwrap();
    let order: Vec<&str> = tied.iter().map(|r| r.ticker.as_str()).collect();
    assert_eq!(order, vec!["B", "A", "C"]);
  }

  #[test]
  fn csv_quotes_tickers_with_commas() {
    let best = ScoredAllocation::new(
      Allocation::from_weights(vec![0.25, 0.75]),
      Array1::zeros(0),
      ScoreBreakdown {
        average_return: 1.0,
        downside_risk: 0.01,
        downside_correlation: 1.0,
        score: 0.0,
      },
    );
    let tickers = vec!["A,B".to_string(), "C".to_string()];
    let report = AllocationReport::new(&tickers, &best).unwrap();

    let mut buf = Vec::new();
    report.write_csv(&mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();
    assert_eq!(text, "Ticker,Allocation\nC,0.75\n\"A,B\",0.25\n");
  }

  #[test]
  fn rows_reject_length_mismatch() {
    let tickers = vec!["A".to_string()];
    assert!(allocation_rows(&tickers, &[0.5, 0.5]).is_err());
  }

  #[test]
  fn summaries_are_sorted_and_complete() {
    let start = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
    let series = |prices: &[f64]| {
      prices
        .iter()
        .enumerate()
        .map(|(i, &p)| (start + chrono::Days::new(i as u64), p))
        .collect()
    };
    let assets = vec![
      Asset::new("ZZ".into(), series(&[10.0, 10.1, 10.3]), 0.001),
      Asset::new("AA".into(), series(&[5.0, 5.05, 5.0, 5.1]), 0.0),
    ];
    let market = MarketConfig {
      trading_days_per_year: 1.0,
      min_history_days: 2,
      as_of: start,
      conservative_percentile: 0.5,
    };
    let summaries = asset_summaries(&assets, &market).unwrap();
    assert_eq!(summaries[0].ticker, "AA");
    assert_eq!(summaries[1].ticker, "ZZ");
    assert!(summaries.iter().all(|s| s.conservative_return.is_finite()));
    assert_eq!(summaries_table(&summaries).len(), 2);
  }
}
