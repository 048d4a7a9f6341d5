use serde::Serialize;
use tracing::debug;

use crate::assumptions::{AssumptionField, AssumptionRequest, resolve};
use crate::config::{Catalog, RunParameters};
use crate::error::Result;
use crate::simulation::YearlySimulator;

/// Absolute bump applied to rate fields.
const RATE_BUMP: f64 = 0.01;
/// Relative bump applied to currency amounts.
const AMOUNT_BUMP: f64 = 0.01;

/// Fields that change a deterministic run. Structural sds and path vols only
/// matter under sampling.
pub const DETERMINISTIC_FIELDS: [AssumptionField; 13] = [
    AssumptionField::InvestmentReturn,
    AssumptionField::HomeAppreciation,
    AssumptionField::RentGrowth,
    AssumptionField::Inflation,
    AssumptionField::PropertyTaxRate,
    AssumptionField::InsuranceRate,
    AssumptionField::MaintenanceRate,
    AssumptionField::HoaAmount,
    AssumptionField::MarketRent,
    AssumptionField::ClosingCostRate,
    AssumptionField::SellingCostRate,
    AssumptionField::InvestmentTaxDrag,
    AssumptionField::MarginalTaxRate,
];

/// How far one field moves the final owner − renter gap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensitivityImpact {
    pub field: AssumptionField,
    pub base_value: f64,
    pub low_value: f64,
    pub high_value: f64,
    /// Change in the final difference when the field is bumped down.
    pub low_delta: f64,
    /// Change in the final difference when the field is bumped up.
    pub high_delta: f64,
}

impl SensitivityImpact {
    pub fn swing(&self) -> f64 {
        (self.high_delta - self.low_delta).abs()
    }
}

fn bumped(field: AssumptionField, value: f64) -> (f64, f64) {
    if field.is_rate() {
        (value - RATE_BUMP, value + RATE_BUMP)
    } else {
        (value * (1.0 - AMOUNT_BUMP), value * (1.0 + AMOUNT_BUMP))
    }
}

/// Deterministic one-at-a-time sensitivity. Each bump is applied as a caller
/// override and re-resolved, so it replaces whatever the request already set.
/// Results are sorted by largest swing first.
pub fn analyse(
    catalog: &Catalog,
    request: &AssumptionRequest,
    params: &RunParameters,
    fields: &[AssumptionField],
) -> Result<Vec<SensitivityImpact>> {
    let final_difference = |request: &AssumptionRequest| -> Result<f64> {
        let assumptions = resolve(catalog, request)?;
        Ok(YearlySimulator::new(assumptions, *params)?.run_deterministic()?.difference())
    };

    let base_assumptions = resolve(catalog, request)?;
    let base = final_difference(request)?;

    let mut impacts = Vec::with_capacity(fields.len());
    for &field in fields {
        let base_value = base_assumptions.get(field);
        let (low_value, high_value) = bumped(field, base_value);
        let low = final_difference(&request.clone().with_override(field.name(), low_value))?;
        let high = final_difference(&request.clone().with_override(field.name(), high_value))?;
        debug!(%field, low = low - base, high = high - base, "sensitivity bump");
        impacts.push(SensitivityImpact {
            field,
            base_value,
            low_value,
            high_value,
            low_delta: low - base,
            high_delta: high - base,
        });
    }

    impacts.sort_by(|a, b| b.swing().total_cmp(&a.swing()));
    Ok(impacts)
}
