use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::StandardNormal;
use serde::Serialize;

use crate::assumptions::Assumptions;
use crate::error::ValidationError;
use crate::profile::MonteCarloProfile;
use crate::types::Year;

/// Realized rates for one simulated year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearRates {
    pub investment_return: f64,
    pub home_appreciation: f64,
    pub rent_growth: f64,
    pub inflation: f64,
}

impl YearRates {
    pub fn baseline(a: &Assumptions) -> Self {
        YearRates {
            investment_return: a.investment_return,
            home_appreciation: a.home_appreciation,
            rent_growth: a.rent_growth,
            inflation: a.inflation,
        }
    }

    pub fn get(&self, var: RateVariable) -> f64 {
        match var {
            RateVariable::InvestmentReturn => self.investment_return,
            RateVariable::HomeAppreciation => self.home_appreciation,
            RateVariable::RentGrowth => self.rent_growth,
            RateVariable::Inflation => self.inflation,
        }
    }

    fn set(&mut self, var: RateVariable, value: f64) {
        match var {
            RateVariable::InvestmentReturn => self.investment_return = value,
            RateVariable::HomeAppreciation => self.home_appreciation = value,
            RateVariable::RentGrowth => self.rent_growth = value,
            RateVariable::Inflation => self.inflation = value,
        }
    }
}

/// Owner cost levels held fixed for a whole trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OwnerCosts {
    pub maintenance_rate: f64,
    pub insurance_rate: f64,
    /// Annual HOA dues in today's money.
    pub hoa_amount: f64,
}

impl OwnerCosts {
    pub fn baseline(a: &Assumptions) -> Self {
        OwnerCosts {
            maintenance_rate: a.maintenance_rate,
            insurance_rate: a.insurance_rate,
            hoa_amount: a.hoa_amount,
        }
    }
}

/// Owner cost levels sampled once per trial, after the rate path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CostVariable {
    MaintenanceRate,
    InsuranceRate,
    HoaAmount,
}

impl CostVariable {
    /// Sampling order. Changing it changes every seeded trial.
    const ALL: [CostVariable; 3] =
        [CostVariable::MaintenanceRate, CostVariable::InsuranceRate, CostVariable::HoaAmount];

    /// Structural standard deviation before the parameter scale. Insurance is
    /// about $300 a year on a $500k home; HOA about $50 a month.
    fn sd(self) -> f64 {
        match self {
            CostVariable::MaintenanceRate => 0.003,
            CostVariable::InsuranceRate => 0.0006,
            CostVariable::HoaAmount => 600.0,
        }
    }

    fn bounds(self) -> (f64, f64) {
        match self {
            CostVariable::MaintenanceRate => (0.005, 0.03),
            CostVariable::InsuranceRate | CostVariable::HoaAmount => (0.0, f64::INFINITY),
        }
    }

    fn get(self, costs: &OwnerCosts) -> f64 {
        match self {
            CostVariable::MaintenanceRate => costs.maintenance_rate,
            CostVariable::InsuranceRate => costs.insurance_rate,
            CostVariable::HoaAmount => costs.hoa_amount,
        }
    }

    fn set(self, costs: &mut OwnerCosts, value: f64) {
        match self {
            CostVariable::MaintenanceRate => costs.maintenance_rate = value,
            CostVariable::InsuranceRate => costs.insurance_rate = value,
            CostVariable::HoaAmount => costs.hoa_amount = value,
        }
    }
}

/// One entry per horizon year. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatePath {
    years: Vec<YearRates>,
}

impl RatePath {
    /// Every year equals the baseline verbatim.
    pub fn constant(baseline: &Assumptions, horizon: u32) -> Self {
        RatePath { years: vec![YearRates::baseline(baseline); horizon as usize] }
    }

    /// Wrap an externally supplied path (historical replay, tests).
    pub fn from_years(years: Vec<YearRates>) -> Self {
        RatePath { years }
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    pub fn year(&self, year: Year) -> Option<&YearRates> {
        year.index().and_then(|i| self.years.get(i))
    }

    pub fn years(&self) -> &[YearRates] {
        &self.years
    }

    pub fn check_horizon(&self, horizon: u32) -> Result<(), ValidationError> {
        if self.years.len() != horizon as usize {
            return Err(ValidationError::RatePathLength {
                expected: horizon as usize,
                actual: self.years.len(),
            });
        }
        Ok(())
    }
}

/// How year-to-year noise combines with the structural value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseKind {
    /// `structural + σz`, in rate points.
    Additive,
    /// `(1 + structural)·exp(σz − σ²/2) − 1`; the growth factor stays positive.
    Multiplicative,
}

/// The four economic drivers sampled per trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateVariable {
    InvestmentReturn,
    HomeAppreciation,
    RentGrowth,
    Inflation,
}

impl RateVariable {
    /// Sampling order. Changing it changes every seeded path.
    pub const ALL: [RateVariable; 4] = [
        RateVariable::InvestmentReturn,
        RateVariable::HomeAppreciation,
        RateVariable::RentGrowth,
        RateVariable::Inflation,
    ];

    pub fn noise_kind(self) -> NoiseKind {
        match self {
            RateVariable::InvestmentReturn | RateVariable::HomeAppreciation => {
                NoiseKind::Multiplicative
            }
            RateVariable::RentGrowth | RateVariable::Inflation => NoiseKind::Additive,
        }
    }

    fn structural_sd(self, a: &Assumptions) -> f64 {
        match self {
            RateVariable::InvestmentReturn => a.investment_return_sd,
            RateVariable::HomeAppreciation => a.home_appreciation_sd,
            RateVariable::RentGrowth => a.rent_growth_sd,
            RateVariable::Inflation => a.inflation_sd,
        }
    }

    fn path_vol(self, a: &Assumptions) -> f64 {
        match self {
            RateVariable::InvestmentReturn => a.investment_return_vol,
            RateVariable::HomeAppreciation => a.home_appreciation_vol,
            RateVariable::RentGrowth => a.rent_growth_vol,
            RateVariable::Inflation => a.inflation_vol,
        }
    }

    /// Plausible range for the per-trial long-run level.
    fn structural_bounds(self) -> (f64, f64) {
        match self {
            RateVariable::InvestmentReturn => (-0.05, 0.20),
            RateVariable::HomeAppreciation => (-0.10, 0.20),
            RateVariable::RentGrowth => (0.0, 0.15),
            RateVariable::Inflation => (0.0, 0.10),
        }
    }

    /// Plausible range for a single year's realized rate.
    fn path_bounds(self) -> (f64, f64) {
        match self {
            RateVariable::InvestmentReturn => (-0.40, 0.40),
            RateVariable::HomeAppreciation => (-0.30, 0.30),
            RateVariable::RentGrowth => (-0.05, 0.15),
            RateVariable::Inflation => (-0.02, 0.10),
        }
    }
}

/// Two-stage sampler: one structural draw per trial, then per-year noise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StochasticRates {
    pub profile: MonteCarloProfile,
    /// AR(1) coefficient on each variable's yearly noise. Zero means
    /// independent years.
    pub autocorrelation: f64,
}

impl StochasticRates {
    pub fn new(profile: MonteCarloProfile) -> Self {
        StochasticRates { profile, autocorrelation: 0.0 }
    }

    pub fn with_autocorrelation(mut self, rho: f64) -> Result<Self, ValidationError> {
        if !(rho.is_finite() && rho.abs() < 1.0) {
            return Err(ValidationError::InvalidAutocorrelation { value: rho });
        }
        self.autocorrelation = rho;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.profile.validate()?;
        if !(self.autocorrelation.is_finite() && self.autocorrelation.abs() < 1.0) {
            return Err(ValidationError::InvalidAutocorrelation { value: self.autocorrelation });
        }
        Ok(())
    }

    /// Stage A: the trial's long-run level for each variable, shared by every year.
    pub fn structural_draw(&self, baseline: &Assumptions, rng: &mut impl Rng) -> YearRates {
        let mut rates = YearRates::baseline(baseline);
        for var in RateVariable::ALL {
            let z: f64 = rng.sample(StandardNormal);
            let sd = var.structural_sd(baseline) * self.profile.parameter_uncertainty_scale;
            if sd > 0.0 {
                let (lo, hi) = var.structural_bounds();
                rates.set(var, (rates.get(var) + sd * z).clamp(lo, hi));
            }
        }
        rates
    }

    /// Stage A followed by Stage B for `horizon` years.
    ///
    /// Draw order is fixed (four structural normals, then four normals per
    /// year in [`RateVariable::ALL`] order) so a seeded generator always
    /// yields the same path.
    pub fn sample_path(&self, baseline: &Assumptions, horizon: u32, rng: &mut impl Rng) -> RatePath {
        let structural = self.structural_draw(baseline, rng);
        let rho = self.autocorrelation;
        let innovation_scale = (1.0 - rho * rho).sqrt();
        let mut noise = [0.0_f64; 4];
        let mut years = Vec::with_capacity(horizon as usize);

        for t in 0..horizon {
            let mut realized = structural;
            for (i, var) in RateVariable::ALL.into_iter().enumerate() {
                let z: f64 = rng.sample(StandardNormal);
                noise[i] = if t == 0 { z } else { rho * noise[i] + innovation_scale * z };

                let sigma = var.path_vol(baseline) * self.profile.path_volatility_scale;
                if sigma == 0.0 {
                    continue;
                }
                let level = structural.get(var);
                let value = match var.noise_kind() {
                    NoiseKind::Additive => level + sigma * noise[i],
                    NoiseKind::Multiplicative => {
                        (1.0 + level) * (sigma * noise[i] - 0.5 * sigma * sigma).exp() - 1.0
                    }
                };
                let (lo, hi) = var.path_bounds();
                realized.set(var, value.clamp(lo, hi));
            }
            years.push(realized);
        }

        RatePath { years }
    }

    /// Per-trial owner cost levels: maintenance rate, insurance rate and HOA
    /// dues, each `Normal(baseline, sd × parameter scale)` clipped to its
    /// bounds. Call after [`StochasticRates::sample_path`] on the same
    /// generator; the three normals are always drawn, in a fixed order.
    pub fn sample_costs(&self, baseline: &Assumptions, rng: &mut impl Rng) -> OwnerCosts {
        let mut costs = OwnerCosts::baseline(baseline);
        for var in CostVariable::ALL {
            let z: f64 = rng.sample(StandardNormal);
            let sd = var.sd() * self.profile.parameter_uncertainty_scale;
            if sd > 0.0 {
                let (lo, hi) = var.bounds();
                let value = (var.get(&costs) + sd * z).clamp(lo, hi);
                var.set(&mut costs, value);
            }
        }
        costs
    }
}

/// Produces the rate path a simulation runs on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum RateProvider {
    /// Baseline rates every year, no randomness.
    Deterministic,
    /// Seeded two-stage sampling.
    Stochastic { rates: StochasticRates, seed: u64 },
}

impl RateProvider {
    pub fn stochastic(profile: MonteCarloProfile, seed: u64) -> Self {
        RateProvider::Stochastic { rates: StochasticRates::new(profile), seed }
    }

    pub fn path(&self, baseline: &Assumptions, horizon: u32) -> Result<RatePath, ValidationError> {
        if horizon == 0 {
            return Err(ValidationError::NonPositiveHorizon { horizon });
        }
        match self {
            RateProvider::Deterministic => Ok(RatePath::constant(baseline, horizon)),
            RateProvider::Stochastic { rates, seed } => {
                rates.validate()?;
                let mut rng = ChaCha20Rng::seed_from_u64(*seed);
                Ok(rates.sample_path(baseline, horizon, &mut rng))
            }
        }
    }
}
