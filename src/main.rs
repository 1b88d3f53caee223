use anyhow::Context;
use anyhow::Result;
use portfolio_alloc::portfolio::Diagnostics;
use portfolio_alloc::portfolio::GbmUniverse;
use portfolio_alloc::StrategyEngine;
use portfolio_alloc::StrategyKind;
use prettytable::Table;
use prettytable::row;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let universe = GbmUniverse::sector_sample(504, 42);
  let prices = universe.prices().context("sampling synthetic prices")?;
  let sectors = universe.sectors();

  let mut allocations = Vec::with_capacity(StrategyKind::ALL.len());
  for kind in StrategyKind::ALL {
    let allocation = StrategyEngine::from_kind(kind)
      .run(&prices, Some(&sectors))
      .with_context(|| format!("running {kind}"))?;
    allocations.push(allocation);
  }

  let mut table = Table::new();
  table.add_row(row![
    "Ticker",
    "Sector",
    "Sector RS",
    "GTAA",
    "Max Sharpe",
    "Min Vol"
  ]);
  for (col, ticker) in prices.tickers().iter().enumerate() {
    let w: Vec<String> = allocations
      .iter()
      .map(|a| format!("{:.2}%", a.weights()[col] * 100.0))
      .collect();
    table.add_row(row![
      ticker,
      sectors.sector_of(ticker),
      r->w[0],
      r->w[1],
      r->w[2],
      r->w[3]
    ]);
  }
  table.printstd();

  for allocation in &allocations {
    if let Diagnostics::Optimizer(diag) = allocation.diagnostics() {
      println!(
        "{}: expected return {:.2}%, volatility {:.2}%, Sharpe {:.3}, shrinkage {:.4}",
        allocation.strategy(),
        diag.performance.expected_return * 100.0,
        diag.performance.volatility * 100.0,
        diag.performance.sharpe,
        diag.shrinkage
      );
    }
  }

  Ok(())
}
