mod fixtures;

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use rentbuy::monte_carlo::{Execution, MonteCarloRunner};
use rentbuy::mortgage::{MortgageSchedule, MortgageTerms};
use rentbuy::profile::MonteCarloProfile;
use rentbuy::rates::StochasticRates;

use fixtures::{BASE, WEST_MATCHED, assumptions, build_simulator};

// ── Group 1: single_simulation — horizon scaling ─────────────────────────────

fn bench_single_simulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_simulation");
    for &horizon in &[10u32, 30, 60] {
        let sim = build_simulator(&BASE, horizon);
        group.throughput(Throughput::Elements(horizon as u64));
        group.bench_with_input(BenchmarkId::from_parameter(horizon), &sim, |b, sim| {
            b.iter(|| sim.run_deterministic())
        });
    }
    group.finish();
}

// ── Group 2: rate_path — two-stage sampling cost ─────────────────────────────

fn bench_rate_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_path");
    let a = assumptions(&BASE);
    for (name, rho) in [("independent", 0.0), ("ar1", 0.6)] {
        let rates = StochasticRates::new(MonteCarloProfile::STRESS)
            .with_autocorrelation(rho)
            .expect("valid autocorrelation");
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter_batched(
                || ChaCha20Rng::seed_from_u64(42),
                |mut rng| rates.sample_path(&a, 30, &mut rng),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

// ── Group 3: mortgage_schedule — amortization in isolation ───────────────────

fn bench_mortgage_schedule(c: &mut Criterion) {
    let mut group = c.benchmark_group("mortgage_schedule");
    let terms = MortgageTerms { principal: 400_000.0, annual_rate: 0.06, term_years: 30 };
    for &horizon in &[15u32, 30, 50] {
        group.bench_with_input(BenchmarkId::from_parameter(horizon), &horizon, |b, &h| {
            b.iter(|| MortgageSchedule::build(terms, h))
        });
    }
    group.finish();
}

// ── Group 4: monte_carlo — trial count scaling ───────────────────────────────

fn bench_monte_carlo(c: &mut Criterion) {
    let mut group = c.benchmark_group("monte_carlo");
    group.sample_size(10);
    let sim = build_simulator(&WEST_MATCHED, 30);
    for &trials in &[100u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(trials));
        for (mode, execution) in [("parallel", Execution::Parallel), ("sequential", Execution::Sequential)] {
            let runner = MonteCarloRunner::new(trials, 42, MonteCarloProfile::BASELINE)
                .with_execution(execution);
            group.bench_with_input(BenchmarkId::new(mode, trials), &runner, |b, runner| {
                b.iter(|| runner.run(&sim))
            });
        }
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_single_simulation,
    bench_rate_path,
    bench_mortgage_schedule,
    bench_monte_carlo,
);
criterion_main!(benches);
