use std::env;
use std::fs::File;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use sortino_allocator::AllocatorConfig;
use sortino_allocator::portfolio::AllocationEngine;
use sortino_allocator::portfolio::Asset;
use sortino_allocator::portfolio::summaries_table;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::FmtSubscriber;

const DEFAULT_REQUIRED_RETURN: f64 = 1.05;

/// The file stem is the ticker; fees are not known here and default to zero.
fn read_asset(path: &Path) -> Result<Asset> {
  let ticker = path
    .file_stem()
    .and_then(|s| s.to_str())
    .with_context(|| format!("no ticker in file name {}", path.display()))?
    .to_uppercase();
  let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
  Asset::from_csv(ticker, 0.0, file).with_context(|| format!("reading {}", path.display()))
}

fn main() -> Result<()> {
  let subscriber = FmtSubscriber::builder()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_target(false)
    .finish();
  tracing::subscriber::set_global_default(subscriber).context("installing tracing subscriber")?;

  let paths: Vec<String> = env::args().skip(1).collect();
  if paths.is_empty() {
    bail!("usage: sortino-allocator <prices.csv>...");
  }
  let required_return = match env::var("REQUIRED_RETURN") {
    Ok(v) => v.parse().context("REQUIRED_RETURN must be a number")?,
    Err(_) => DEFAULT_REQUIRED_RETURN,
  };

  let assets = paths
    .iter()
    .map(|p| read_asset(Path::new(p)))
    .collect::<Result<Vec<_>>>()?;

  let mut engine = AllocationEngine::new(AllocatorConfig::default())?;
  summaries_table(&engine.summarize(&assets)?).printstd();

  info!(required_return, assets = assets.len(), "optimizing");
  let report = engine.run(&assets, required_return)?;
  report.to_table().printstd();
  println!("{}", report.breakdown());

  Ok(())
}
