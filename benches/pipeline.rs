//! Benchmarks for the failed-2 analysis pipeline.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use failtwo::prelude::*;

const MIN: i64 = 60_000;

/// Generate deterministic 1-minute bars
fn generate_bars(n: usize) -> Vec<Candle> {
  let mut bars = Vec::with_capacity(n);
  let mut price = 100.0;

  for i in 0..n {
    let change = ((i * 7 + 13) % 100) as f64 / 50.0 - 1.0; // Deterministic "random"
    let volatility = 2.0 + ((i * 3) % 10) as f64 / 5.0;

    let o = price;
    let c = price + change;
    let h = o.max(c) + volatility * 0.5;
    let l = o.min(c) - volatility * 0.5;

    bars.push(Candle::new(i as i64 * MIN, o, h, l, c));
    price = c;
  }

  bars
}

fn bench_validate(c: &mut Criterion) {
  let bars = generate_bars(10_000);
  let validator = Validator::new();

  c.bench_function("validate_10000_bars", |b| {
    b.iter(|| {
      let _ = black_box(validator.validate(black_box(&bars)));
    })
  });
}

fn bench_resample(c: &mut Criterion) {
  let series = Validator::new().validate(generate_bars(10_000)).series;
  let resampler = Resampler::new();

  c.bench_function("resample_10000_bars_15min", |b| {
    b.iter(|| {
      let _ = black_box(resampler.resample(black_box(&series), Timeframe::M15));
    })
  });
}

fn bench_detect_and_measure(c: &mut Criterion) {
  let series = Validator::new().validate(generate_bars(10_000)).series;
  let tiers = TierGrid::default();
  let detector = PatternDetector::default();
  let measurer = RetracementMeasurer::new(&tiers);

  c.bench_function("detect_measure_10000_bars", |b| {
    b.iter(|| {
      let events: Vec<_> = detector.scan(black_box(&series)).collect();
      let _ = black_box(measurer.measure_all(series.candles(), &events));
    })
  });
}

fn bench_scaling(c: &mut Criterion) {
  let analyzer = AnalyzerBuilder::new().build().unwrap();

  let mut group = c.benchmark_group("scaling");

  for size in [1_000, 10_000, 50_000, 100_000].iter() {
    let bars = generate_bars(*size);

    group.bench_with_input(BenchmarkId::new("run", size), size, |b, _| {
      b.iter(|| {
        let _ = black_box(analyzer.run("BENCH", black_box(&bars)));
      })
    });
  }

  group.finish();
}

fn bench_parallel_run(c: &mut Criterion) {
  let bars1 = generate_bars(20_000);
  let bars2 = generate_bars(20_000);
  let bars3 = generate_bars(20_000);
  let bars4 = generate_bars(20_000);

  let analyzer = AnalyzerBuilder::new().build().unwrap();

  let instruments: Vec<(&str, &[Candle])> =
    vec![("MES", &bars1), ("MNQ", &bars2), ("MYM", &bars3), ("M2K", &bars4)];

  c.bench_function("parallel_run_4_instruments", |b| {
    b.iter(|| {
      let _ = black_box(analyze_parallel(black_box(&analyzer), black_box(instruments.clone())));
    })
  });
}

criterion_group!(
  benches,
  bench_validate,
  bench_resample,
  bench_detect_and_measure,
  bench_scaling,
  bench_parallel_run,
);

criterion_main!(benches);
