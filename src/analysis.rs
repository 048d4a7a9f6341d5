use serde::Serialize;

use crate::monte_carlo::{Distribution, TrialOutcome};
use crate::types::Year;

/// Distribution statistics for a continuous metric across N trials.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistStats {
    pub n: usize,
    pub min: f64,
    pub p1: f64,
    pub p5: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

fn percentile_stats(values: &mut [f64]) -> Option<DistStats> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let n = values.len();

    let interp = |p: f64| -> f64 {
        let h = p * (n - 1) as f64;
        let lo = h.floor() as usize;
        let hi = (lo + 1).min(n - 1);
        let frac = h - lo as f64;
        values[lo] * (1.0 - frac) + values[hi] * frac
    };

    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = if n > 1 {
        values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
    } else {
        0.0
    };

    Some(DistStats {
        n,
        min: values[0],
        p1: interp(0.01),
        p5: interp(0.05),
        p10: interp(0.10),
        p25: interp(0.25),
        p50: interp(0.50),
        p75: interp(0.75),
        p90: interp(0.90),
        p95: interp(0.95),
        p99: interp(0.99),
        max: values[n - 1],
        mean,
        std_dev: variance.sqrt(),
    })
}

fn fraction(count: usize, n: usize) -> f64 {
    count as f64 / n as f64
}

/// How bad buying gets when it goes wrong.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Downside {
    pub prob_owner_loses: f64,
    /// Difference (owner − renter) at the 5th and 10th percentiles.
    pub p5: f64,
    pub p10: f64,
}

/// Summary of a sealed distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionSummary {
    pub trials: usize,
    /// Owner final net worth minus renter final net worth.
    pub difference: DistStats,
    pub owner: DistStats,
    pub renter: DistStats,
    /// Fraction of trials where the owner finishes strictly ahead.
    pub prob_owner_wins: f64,
    pub downside: Downside,
    /// Fraction of trials in which the owner pulls level at some point.
    pub prob_breakeven: f64,
    pub median_breakeven_year: Option<Year>,
    /// Fraction of trials in which the renter portfolio ran dry at least once.
    pub renter_depletion_rate: f64,
}

/// Statistics over every committed trial. `None` for an empty distribution.
pub fn summarize(distribution: &Distribution) -> Option<DistributionSummary> {
    let outcomes = distribution.outcomes();
    let n = outcomes.len();

    let mut differences: Vec<f64> = outcomes.iter().map(TrialOutcome::difference).collect();
    let mut owner: Vec<f64> = outcomes.iter().map(|o| o.owner_final).collect();
    let mut renter: Vec<f64> = outcomes.iter().map(|o| o.renter_final).collect();

    let wins = differences.iter().filter(|&&d| d > 0.0).count();
    let losses = differences.iter().filter(|&&d| d < 0.0).count();

    let mut breakevens: Vec<Year> = outcomes.iter().filter_map(|o| o.breakeven_year).collect();
    breakevens.sort();
    let median_breakeven_year = breakevens.get(breakevens.len() / 2).copied();
    let depleted = outcomes.iter().filter(|o| o.renter_depleted).count();

    let difference = percentile_stats(&mut differences)?;
    Some(DistributionSummary {
        trials: n,
        downside: Downside {
            prob_owner_loses: fraction(losses, n),
            p5: difference.p5,
            p10: difference.p10,
        },
        difference,
        owner: percentile_stats(&mut owner)?,
        renter: percentile_stats(&mut renter)?,
        prob_owner_wins: fraction(wins, n),
        prob_breakeven: fraction(breakevens.len(), n),
        median_breakeven_year,
        renter_depletion_rate: fraction(depleted, n),
    })
}

/// Cross-trial spread of the pre-sale net worth gap in one year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearBand {
    pub year: Year,
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
    /// Fraction of trials where the owner is strictly ahead that year.
    pub prob_owner_leads: f64,
}

/// Per-year bands over retained trajectories. Empty unless the run kept its
/// results.
pub fn yearly_bands(distribution: &Distribution) -> Vec<YearBand> {
    let horizon = distribution.results().map(|r| r.years.len()).max().unwrap_or(0);
    let mut bands = Vec::with_capacity(horizon);

    for idx in 0..horizon {
        let mut gaps: Vec<f64> = distribution
            .results()
            .filter_map(|r| r.years.get(idx))
            .map(|s| s.difference())
            .collect();
        let leads = gaps.iter().filter(|&&d| d > 0.0).count();
        let n = gaps.len();
        let Some(stats) = percentile_stats(&mut gaps) else {
            continue;
        };
        bands.push(YearBand {
            year: Year::from_index(idx),
            p10: stats.p10,
            p50: stats.p50,
            p90: stats.p90,
            prob_owner_leads: fraction(leads, n),
        });
    }

    bands
}
