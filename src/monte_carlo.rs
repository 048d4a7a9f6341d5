use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::error::{Result, ValidationError};
use crate::profile::MonteCarloProfile;
use crate::rates::StochasticRates;
use crate::simulation::{SimulationResult, YearlySimulator};
use crate::types::{TrialId, Year};

/// Generator for one trial: the run seed selects the key, the trial index the
/// stream. A pure function of its arguments, so trials can run in any order.
pub fn trial_rng(seed: u64, trial: TrialId) -> ChaCha20Rng {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    rng.set_stream(trial.0);
    rng
}

/// What one trial contributes to the distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialOutcome {
    pub trial: TrialId,
    pub owner_final: f64,
    pub renter_final: f64,
    pub breakeven_year: Option<Year>,
    pub renter_depleted: bool,
    /// Full trajectory, kept only when the runner retains results.
    pub result: Option<SimulationResult>,
}

impl TrialOutcome {
    fn from_result(trial: TrialId, result: SimulationResult, keep: bool) -> Self {
        TrialOutcome {
            trial,
            owner_final: result.owner_final,
            renter_final: result.renter_final,
            breakeven_year: result.breakeven_year(),
            renter_depleted: result.renter_depleted_years > 0,
            result: keep.then_some(result),
        }
    }

    /// Owner final net worth minus renter final net worth.
    pub fn difference(&self) -> f64 {
        self.owner_final - self.renter_final
    }
}

// ── Distribution ──────────────────────────────────────────────────────────────

/// Append-only accumulator. Outcomes are either committed whole or not at all.
#[derive(Debug, Default)]
pub struct DistributionBuilder {
    outcomes: Vec<TrialOutcome>,
}

impl DistributionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        DistributionBuilder { outcomes: Vec::with_capacity(capacity) }
    }

    pub fn commit(&mut self, outcome: TrialOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Freeze into a read-only distribution ordered by trial index.
    pub fn seal(mut self) -> Distribution {
        self.outcomes.sort_by_key(|o| o.trial);
        Distribution { outcomes: self.outcomes.into() }
    }
}

/// Sealed trial outcomes. Cloning shares the same storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    outcomes: Arc<[TrialOutcome]>,
}

impl Distribution {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn outcomes(&self) -> &[TrialOutcome] {
        &self.outcomes
    }

    pub fn differences(&self) -> Vec<f64> {
        self.outcomes.iter().map(TrialOutcome::difference).collect()
    }

    /// Retained trajectories, in trial order.
    pub fn results(&self) -> impl Iterator<Item = &SimulationResult> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref())
    }
}

// ── Runner ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Execution {
    #[default]
    Parallel,
    Sequential,
}

/// Outcome of a possibly interrupted run.
#[derive(Debug, Clone)]
pub struct MonteCarloRun {
    pub distribution: Distribution,
    pub requested: u64,
    pub completed: u64,
    /// Trials that finished past the first skipped index and were dropped.
    /// Always zero for sequential execution.
    pub discarded: u64,
    pub interrupted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonteCarloRunner {
    pub trials: u64,
    pub seed: u64,
    pub rates: StochasticRates,
    pub keep_results: bool,
    pub execution: Execution,
}

impl MonteCarloRunner {
    pub fn new(trials: u64, seed: u64, profile: MonteCarloProfile) -> Self {
        MonteCarloRunner {
            trials,
            seed,
            rates: StochasticRates::new(profile),
            keep_results: false,
            execution: Execution::Parallel,
        }
    }

    pub fn with_autocorrelation(mut self, rho: f64) -> Result<Self, ValidationError> {
        self.rates = self.rates.with_autocorrelation(rho)?;
        Ok(self)
    }

    pub fn keep_results(mut self, keep: bool) -> Self {
        self.keep_results = keep;
        self
    }

    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.trials == 0 {
            return Err(ValidationError::ZeroTrials);
        }
        self.rates.validate()
    }

    /// Sample one trial's path, then its owner cost levels, and simulate it.
    pub fn run_trial(&self, sim: &YearlySimulator, trial: TrialId) -> Result<TrialOutcome> {
        let mut rng = trial_rng(self.seed, trial);
        let path = self.rates.sample_path(sim.assumptions(), sim.params().horizon, &mut rng);
        let costs = self.rates.sample_costs(sim.assumptions(), &mut rng);
        let result = sim.run_with_costs(&path, &costs)?;
        Ok(TrialOutcome::from_result(trial, result, self.keep_results))
    }

    pub fn run(&self, sim: &YearlySimulator) -> Result<MonteCarloRun> {
        self.run_until(sim, &AtomicBool::new(false))
    }

    /// Run every trial unless `stop` is raised first. The flag is checked
    /// before each trial; the committed outcomes are always the completed
    /// prefix `0..completed` of the trial sequence.
    ///
    /// In parallel, trials already in flight when the flag is raised still
    /// finish. Any that land past the first skipped index are dropped and
    /// counted in [`MonteCarloRun::discarded`].
    pub fn run_until(&self, sim: &YearlySimulator, stop: &AtomicBool) -> Result<MonteCarloRun> {
        self.validate()?;
        info!(
            trials = self.trials,
            seed = self.seed,
            profile = self.rates.profile.name,
            execution = ?self.execution,
            "monte carlo run started"
        );

        let attempt = |i: u64| -> Option<Result<TrialOutcome>> {
            if stop.load(Ordering::Relaxed) {
                return None;
            }
            Some(self.run_trial(sim, TrialId(i)))
        };

        let slots: Vec<Option<Result<TrialOutcome>>> = match self.execution {
            Execution::Parallel => (0..self.trials).into_par_iter().map(attempt).collect(),
            Execution::Sequential => {
                let mut slots = Vec::with_capacity(self.trials as usize);
                for i in 0..self.trials {
                    let slot = attempt(i);
                    let stopped = slot.is_none();
                    slots.push(slot);
                    if stopped {
                        break;
                    }
                }
                slots
            }
        };

        let mut builder = DistributionBuilder::with_capacity(slots.len());
        let mut slots = slots.into_iter();
        for slot in slots.by_ref() {
            match slot {
                Some(outcome) => builder.commit(outcome?),
                None => break,
            }
        }
        let discarded = slots.flatten().count() as u64;

        let completed = builder.len() as u64;
        let interrupted = completed < self.trials;
        if interrupted {
            info!(completed, discarded, requested = self.trials, "monte carlo run interrupted");
        } else {
            info!(completed, "monte carlo run complete");
        }

        Ok(MonteCarloRun {
            distribution: builder.seal(),
            requested: self.trials,
            completed,
            discarded,
            interrupted,
        })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::assumptions::{AssumptionField, AssumptionRequest, resolve};
    use crate::config::{Catalog, RunParameters};
    use crate::error::Error;
    use crate::rates::RateProvider;
    use crate::types::{FilingStatus, Regime, RentBasis};

    fn simulator_for(scenario: &str, region: &str) -> YearlySimulator {
        let regime = Regime {
            rent_basis: RentBasis::Market,
            filing_status: FilingStatus::Married,
            sell_at_end: true,
        };
        let a = resolve(&Catalog::canonical(), &AssumptionRequest::new(scenario, region, regime))
            .unwrap();
        YearlySimulator::new(a, RunParameters::canonical()).unwrap()
    }

    fn simulator() -> YearlySimulator {
        simulator_for("base", "US")
    }

    fn prob_owner_wins(run: &MonteCarloRun) -> f64 {
        let d = run.distribution.differences();
        d.iter().filter(|&&x| x > 0.0).count() as f64 / d.len() as f64
    }

    // ── Reproducibility ───────────────────────────────────────────────────────

    #[test]
    fn stress_run_reproduces_exactly() {
        let sim = simulator();
        let runner = MonteCarloRunner::new(1_000, 42, MonteCarloProfile::STRESS);
        let a = runner.run(&sim).unwrap();
        let b = runner.run(&sim).unwrap();
        assert_eq!(a.completed, 1_000);
        assert_eq!(prob_owner_wins(&a).to_bits(), prob_owner_wins(&b).to_bits());
        assert_eq!(a.distribution, b.distribution);
    }

    #[test]
    fn sequential_matches_parallel() {
        let sim = simulator();
        let runner = MonteCarloRunner::new(200, 7, MonteCarloProfile::VOLATILE);
        let par = runner.run(&sim).unwrap();
        let seq = runner.with_execution(Execution::Sequential).run(&sim).unwrap();
        assert_eq!(par.distribution, seq.distribution);
    }

    #[test]
    fn trial_zero_matches_seeded_provider() {
        let sim = simulator();
        let profile = MonteCarloProfile::BASELINE;
        let runner = MonteCarloRunner::new(3, 11, profile).keep_results(true);
        let run = runner.run(&sim).unwrap();

        let path = RateProvider::stochastic(profile, 11)
            .path(sim.assumptions(), sim.params().horizon)
            .unwrap();
        let result = run.distribution.outcomes()[0].result.as_ref().unwrap();
        let rates: Vec<_> = result.years.iter().map(|s| s.rates).collect();
        assert_eq!(rates, path.years());

        let mut rng = trial_rng(11, TrialId(0));
        let _ = runner.rates.sample_path(sim.assumptions(), sim.params().horizon, &mut rng);
        let costs = runner.rates.sample_costs(sim.assumptions(), &mut rng);
        assert_eq!(result, &sim.run_with_costs(&path, &costs).unwrap());
    }

    #[test]
    fn trials_use_distinct_streams() {
        let sim = simulator();
        let run = MonteCarloRunner::new(50, 3, MonteCarloProfile::BASELINE).run(&sim).unwrap();
        let mut d = run.distribution.differences();
        d.sort_by(f64::total_cmp);
        d.dedup();
        assert_eq!(d.len(), 50, "every trial should see a different path");
    }

    #[test]
    fn results_are_dropped_unless_kept() {
        let sim = simulator();
        let runner = MonteCarloRunner::new(10, 1, MonteCarloProfile::BASELINE);
        assert_eq!(runner.run(&sim).unwrap().distribution.results().count(), 0);
        let kept = runner.keep_results(true).run(&sim).unwrap();
        assert_eq!(kept.distribution.results().count(), 10);
    }

    // ── Validation and interruption ───────────────────────────────────────────

    #[test]
    fn zero_trials_is_rejected() {
        let err = MonteCarloRunner::new(0, 1, MonteCarloProfile::BASELINE)
            .run(&simulator())
            .unwrap_err();
        assert_eq!(err, Error::Validation(ValidationError::ZeroTrials));
    }

    #[test]
    fn raised_stop_commits_nothing() {
        let stop = AtomicBool::new(true);
        for execution in [Execution::Parallel, Execution::Sequential] {
            let run = MonteCarloRunner::new(100, 1, MonteCarloProfile::BASELINE)
                .with_execution(execution)
                .run_until(&simulator(), &stop)
                .unwrap();
            assert!(run.interrupted);
            assert_eq!(run.completed, 0);
            assert_eq!(run.discarded, 0);
            assert!(run.distribution.is_empty());
        }
    }

    #[test]
    fn stop_mid_run_keeps_a_prefix_of_the_full_run() {
        let sim = simulator();
        let runner = MonteCarloRunner::new(4_000, 17, MonteCarloProfile::BASELINE);
        let full = runner.run(&sim).unwrap();

        for execution in [Execution::Parallel, Execution::Sequential] {
            let runner = runner.with_execution(execution);
            let stop = AtomicBool::new(false);
            let run = std::thread::scope(|scope| {
                scope.spawn(|| {
                    std::thread::sleep(std::time::Duration::from_millis(5));
                    stop.store(true, Ordering::Relaxed);
                });
                runner.run_until(&sim, &stop).unwrap()
            });

            let k = run.completed as usize;
            assert_eq!(run.distribution.outcomes(), &full.distribution.outcomes()[..k]);
            assert_eq!(run.interrupted, run.completed < run.requested);
            assert!(run.completed + run.discarded <= run.requested);
            if execution == Execution::Sequential {
                assert_eq!(run.discarded, 0);
            }
        }
    }

    #[test]
    fn builder_seals_in_trial_order() {
        let sim = simulator();
        let runner = MonteCarloRunner::new(5, 9, MonteCarloProfile::BASELINE);
        let mut builder = DistributionBuilder::new();
        for i in [3, 0, 4, 1, 2] {
            builder.commit(runner.run_trial(&sim, TrialId(i)).unwrap());
        }
        let sealed = builder.seal();
        let ids: Vec<u64> = sealed.outcomes().iter().map(|o| o.trial.0).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(sealed, runner.run(&sim).unwrap().distribution);
    }

    // ── Monotonicity ──────────────────────────────────────────────────────────

    #[test]
    fn faster_appreciation_does_not_lower_owner_odds() {
        let base = simulator();
        let a = base.assumptions();
        let faster = a.with(AssumptionField::HomeAppreciation, a.home_appreciation + 0.01);
        let faster = YearlySimulator::new(faster, *base.params()).unwrap();

        let runner = MonteCarloRunner::new(2_000, 42, MonteCarloProfile::BASELINE);
        let p_base = prob_owner_wins(&runner.run(&base).unwrap());
        let p_faster = prob_owner_wins(&runner.run(&faster).unwrap());
        assert!(p_faster + 0.01 >= p_base, "{p_faster} < {p_base}");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_execution_order_does_not_matter(
            seed in any::<u64>(),
            trials in 1u64..40,
            profile_idx in 0usize..4,
        ) {
            let sim = simulator_for("bear", "US-South");
            let runner = MonteCarloRunner::new(trials, seed, MonteCarloProfile::PRESETS[profile_idx]);
            let par = runner.run(&sim).unwrap();
            let seq = runner.with_execution(Execution::Sequential).run(&sim).unwrap();
            prop_assert_eq!(par.distribution, seq.distribution);
        }
    }
}
