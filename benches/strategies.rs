use std::hint::black_box;
use std::time::Duration;

use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;
use portfolio_alloc::portfolio::GbmUniverse;
use portfolio_alloc::portfolio::ReturnEstimator;
use portfolio_alloc::StrategyEngine;
use portfolio_alloc::StrategyKind;

fn bench_strategies(c: &mut Criterion) {
  let mut group = c.benchmark_group("Strategies");
  group.measurement_time(Duration::from_secs(3));
  group.warm_up_time(Duration::from_millis(500));

  for &n_rows in &[252usize, 1_260usize] {
    let universe = GbmUniverse::sector_sample(n_rows, 11);
    let prices = universe.prices().unwrap();
    let sectors = universe.sectors();

    for kind in StrategyKind::ALL {
      let engine = StrategyEngine::from_kind(kind);
      group.bench_with_input(BenchmarkId::new(kind.label(), n_rows), &n_rows, |b, _| {
        b.iter(|| black_box(engine.run(&prices, Some(&sectors)).unwrap()))
      });
    }

    group.bench_with_input(
      BenchmarkId::new("estimator/ledoit_wolf", n_rows),
      &n_rows,
      |b, _| {
        let estimator = ReturnEstimator::default();
        b.iter(|| black_box(estimator.estimate(&prices).unwrap()))
      },
    );
  }

  group.finish();
}

criterion_group!(benches, bench_strategies);
criterion_main!(benches);
