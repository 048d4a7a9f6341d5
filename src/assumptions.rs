use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::{Catalog, Tilt};
use crate::error::{ConfigurationError, Result};
use crate::types::Regime;

/// The closed set of numeric assumption fields. Configuration and override
/// keys are parsed into this enum; anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssumptionField {
    InvestmentReturn,
    HomeAppreciation,
    RentGrowth,
    Inflation,
    InvestmentReturnSd,
    HomeAppreciationSd,
    RentGrowthSd,
    InflationSd,
    InvestmentReturnVol,
    HomeAppreciationVol,
    RentGrowthVol,
    InflationVol,
    PropertyTaxRate,
    InsuranceRate,
    MaintenanceRate,
    HoaAmount,
    MarketRent,
    RentersInsurance,
    ClosingCostRate,
    SellingCostRate,
    PmiRate,
    PmiLtvCutoff,
    InvestmentTaxDrag,
    MarginalTaxRate,
    StandardDeductionSingle,
    StandardDeductionMarried,
    SaltCap,
    CapitalGainsTaxRate,
    CapitalGainsExclusion,
}

impl AssumptionField {
    pub const ALL: [AssumptionField; 29] = [
        AssumptionField::InvestmentReturn,
        AssumptionField::HomeAppreciation,
        AssumptionField::RentGrowth,
        AssumptionField::Inflation,
        AssumptionField::InvestmentReturnSd,
        AssumptionField::HomeAppreciationSd,
        AssumptionField::RentGrowthSd,
        AssumptionField::InflationSd,
        AssumptionField::InvestmentReturnVol,
        AssumptionField::HomeAppreciationVol,
        AssumptionField::RentGrowthVol,
        AssumptionField::InflationVol,
        AssumptionField::PropertyTaxRate,
        AssumptionField::InsuranceRate,
        AssumptionField::MaintenanceRate,
        AssumptionField::HoaAmount,
        AssumptionField::MarketRent,
        AssumptionField::RentersInsurance,
        AssumptionField::ClosingCostRate,
        AssumptionField::SellingCostRate,
        AssumptionField::PmiRate,
        AssumptionField::PmiLtvCutoff,
        AssumptionField::InvestmentTaxDrag,
        AssumptionField::MarginalTaxRate,
        AssumptionField::StandardDeductionSingle,
        AssumptionField::StandardDeductionMarried,
        AssumptionField::SaltCap,
        AssumptionField::CapitalGainsTaxRate,
        AssumptionField::CapitalGainsExclusion,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AssumptionField::InvestmentReturn => "investment_return",
            AssumptionField::HomeAppreciation => "home_appreciation",
            AssumptionField::RentGrowth => "rent_growth",
            AssumptionField::Inflation => "inflation",
            AssumptionField::InvestmentReturnSd => "investment_return_sd",
            AssumptionField::HomeAppreciationSd => "home_appreciation_sd",
            AssumptionField::RentGrowthSd => "rent_growth_sd",
            AssumptionField::InflationSd => "inflation_sd",
            AssumptionField::InvestmentReturnVol => "investment_return_vol",
            AssumptionField::HomeAppreciationVol => "home_appreciation_vol",
            AssumptionField::RentGrowthVol => "rent_growth_vol",
            AssumptionField::InflationVol => "inflation_vol",
            AssumptionField::PropertyTaxRate => "property_tax_rate",
            AssumptionField::InsuranceRate => "insurance_rate",
            AssumptionField::MaintenanceRate => "maintenance_rate",
            AssumptionField::HoaAmount => "hoa_amount",
            AssumptionField::MarketRent => "market_rent",
            AssumptionField::RentersInsurance => "renters_insurance",
            AssumptionField::ClosingCostRate => "closing_cost_rate",
            AssumptionField::SellingCostRate => "selling_cost_rate",
            AssumptionField::PmiRate => "pmi_rate",
            AssumptionField::PmiLtvCutoff => "pmi_ltv_cutoff",
            AssumptionField::InvestmentTaxDrag => "investment_tax_drag",
            AssumptionField::MarginalTaxRate => "marginal_tax_rate",
            AssumptionField::StandardDeductionSingle => "standard_deduction_single",
            AssumptionField::StandardDeductionMarried => "standard_deduction_married",
            AssumptionField::SaltCap => "salt_cap",
            AssumptionField::CapitalGainsTaxRate => "capital_gains_tax_rate",
            AssumptionField::CapitalGainsExclusion => "capital_gains_exclusion",
        }
    }

    /// Rates and fractions, as opposed to currency amounts.
    pub fn is_rate(self) -> bool {
        !matches!(
            self,
            AssumptionField::HoaAmount
                | AssumptionField::MarketRent
                | AssumptionField::RentersInsurance
                | AssumptionField::StandardDeductionSingle
                | AssumptionField::StandardDeductionMarried
                | AssumptionField::SaltCap
                | AssumptionField::CapitalGainsExclusion
        )
    }
}

impl fmt::Display for AssumptionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AssumptionField {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssumptionField::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| ConfigurationError::UnknownField { name: s.to_string() })
    }
}

/// A fully resolved assumption set. Every field is populated; the only way
/// to obtain one is through [`resolve`] or [`Assumptions::from_values`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assumptions {
    // ── Long-run rates ──────────────────────────────────────────────────────
    pub investment_return: f64,
    pub home_appreciation: f64,
    pub rent_growth: f64,
    pub inflation: f64,
    // ── Structural (per-trial) standard deviations ──────────────────────────
    pub investment_return_sd: f64,
    pub home_appreciation_sd: f64,
    pub rent_growth_sd: f64,
    pub inflation_sd: f64,
    // ── Year-to-year path volatilities ──────────────────────────────────────
    pub investment_return_vol: f64,
    pub home_appreciation_vol: f64,
    pub rent_growth_vol: f64,
    pub inflation_vol: f64,
    // ── Owner and renter costs ──────────────────────────────────────────────
    pub property_tax_rate: f64,
    pub insurance_rate: f64,
    pub maintenance_rate: f64,
    /// Annual HOA dues in today's money; indexed by realized inflation.
    pub hoa_amount: f64,
    /// Annual region market rent for year 1.
    pub market_rent: f64,
    /// Annual renters insurance in today's money; indexed by realized inflation.
    pub renters_insurance: f64,
    pub closing_cost_rate: f64,
    pub selling_cost_rate: f64,
    pub pmi_rate: f64,
    pub pmi_ltv_cutoff: f64,
    // ── Taxes ───────────────────────────────────────────────────────────────
    pub investment_tax_drag: f64,
    pub marginal_tax_rate: f64,
    pub standard_deduction_single: f64,
    pub standard_deduction_married: f64,
    pub salt_cap: f64,
    pub capital_gains_tax_rate: f64,
    pub capital_gains_exclusion: f64,

    pub regime: Regime,
    /// Fields replaced by caller overrides, for audit display.
    pub overridden: BTreeSet<AssumptionField>,
}

impl Assumptions {
    /// Build from a complete value map. Fails on the first missing field.
    pub fn from_values(
        values: &BTreeMap<AssumptionField, f64>,
        regime: Regime,
    ) -> Result<Self, ConfigurationError> {
        let get = |field: AssumptionField| {
            values
                .get(&field)
                .copied()
                .ok_or(ConfigurationError::MissingField { field: field.name() })
        };
        Ok(Assumptions {
            investment_return: get(AssumptionField::InvestmentReturn)?,
            home_appreciation: get(AssumptionField::HomeAppreciation)?,
            rent_growth: get(AssumptionField::RentGrowth)?,
            inflation: get(AssumptionField::Inflation)?,
            investment_return_sd: get(AssumptionField::InvestmentReturnSd)?,
            home_appreciation_sd: get(AssumptionField::HomeAppreciationSd)?,
            rent_growth_sd: get(AssumptionField::RentGrowthSd)?,
            inflation_sd: get(AssumptionField::InflationSd)?,
            investment_return_vol: get(AssumptionField::InvestmentReturnVol)?,
            home_appreciation_vol: get(AssumptionField::HomeAppreciationVol)?,
            rent_growth_vol: get(AssumptionField::RentGrowthVol)?,
            inflation_vol: get(AssumptionField::InflationVol)?,
            property_tax_rate: get(AssumptionField::PropertyTaxRate)?,
            insurance_rate: get(AssumptionField::InsuranceRate)?,
            maintenance_rate: get(AssumptionField::MaintenanceRate)?,
            hoa_amount: get(AssumptionField::HoaAmount)?,
            market_rent: get(AssumptionField::MarketRent)?,
            renters_insurance: get(AssumptionField::RentersInsurance)?,
            closing_cost_rate: get(AssumptionField::ClosingCostRate)?,
            selling_cost_rate: get(AssumptionField::SellingCostRate)?,
            pmi_rate: get(AssumptionField::PmiRate)?,
            pmi_ltv_cutoff: get(AssumptionField::PmiLtvCutoff)?,
            investment_tax_drag: get(AssumptionField::InvestmentTaxDrag)?,
            marginal_tax_rate: get(AssumptionField::MarginalTaxRate)?,
            standard_deduction_single: get(AssumptionField::StandardDeductionSingle)?,
            standard_deduction_married: get(AssumptionField::StandardDeductionMarried)?,
            salt_cap: get(AssumptionField::SaltCap)?,
            capital_gains_tax_rate: get(AssumptionField::CapitalGainsTaxRate)?,
            capital_gains_exclusion: get(AssumptionField::CapitalGainsExclusion)?,
            regime,
            overridden: BTreeSet::new(),
        })
    }

    pub fn get(&self, field: AssumptionField) -> f64 {
        match field {
            AssumptionField::InvestmentReturn => self.investment_return,
            AssumptionField::HomeAppreciation => self.home_appreciation,
            AssumptionField::RentGrowth => self.rent_growth,
            AssumptionField::Inflation => self.inflation,
            AssumptionField::InvestmentReturnSd => self.investment_return_sd,
            AssumptionField::HomeAppreciationSd => self.home_appreciation_sd,
            AssumptionField::RentGrowthSd => self.rent_growth_sd,
            AssumptionField::InflationSd => self.inflation_sd,
            AssumptionField::InvestmentReturnVol => self.investment_return_vol,
            AssumptionField::HomeAppreciationVol => self.home_appreciation_vol,
            AssumptionField::RentGrowthVol => self.rent_growth_vol,
            AssumptionField::InflationVol => self.inflation_vol,
            AssumptionField::PropertyTaxRate => self.property_tax_rate,
            AssumptionField::InsuranceRate => self.insurance_rate,
            AssumptionField::MaintenanceRate => self.maintenance_rate,
            AssumptionField::HoaAmount => self.hoa_amount,
            AssumptionField::MarketRent => self.market_rent,
            AssumptionField::RentersInsurance => self.renters_insurance,
            AssumptionField::ClosingCostRate => self.closing_cost_rate,
            AssumptionField::SellingCostRate => self.selling_cost_rate,
            AssumptionField::PmiRate => self.pmi_rate,
            AssumptionField::PmiLtvCutoff => self.pmi_ltv_cutoff,
            AssumptionField::InvestmentTaxDrag => self.investment_tax_drag,
            AssumptionField::MarginalTaxRate => self.marginal_tax_rate,
            AssumptionField::StandardDeductionSingle => self.standard_deduction_single,
            AssumptionField::StandardDeductionMarried => self.standard_deduction_married,
            AssumptionField::SaltCap => self.salt_cap,
            AssumptionField::CapitalGainsTaxRate => self.capital_gains_tax_rate,
            AssumptionField::CapitalGainsExclusion => self.capital_gains_exclusion,
        }
    }

    /// All numeric fields as a map, in `AssumptionField` order.
    pub fn values(&self) -> BTreeMap<AssumptionField, f64> {
        AssumptionField::ALL.into_iter().map(|f| (f, self.get(f))).collect()
    }

    /// A copy with one field replaced. Used for what-if runs that bypass the
    /// catalog (sensitivity bumps, monotonicity checks).
    pub fn with(&self, field: AssumptionField, value: f64) -> Self {
        let mut values = self.values();
        values.insert(field, value);
        // Every field is present, so rebuilding cannot fail.
        let mut next = Assumptions::from_values(&values, self.regime)
            .unwrap_or_else(|_| self.clone());
        next.overridden = self.overridden.clone();
        next.overridden.insert(field);
        next
    }
}

/// Everything the resolver needs from the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct AssumptionRequest {
    pub scenario: String,
    pub region: String,
    /// Only explicitly-set fields are present.
    pub overrides: BTreeMap<String, f64>,
    pub regime: Regime,
}

impl AssumptionRequest {
    pub fn new(scenario: impl Into<String>, region: impl Into<String>, regime: Regime) -> Self {
        Self {
            scenario: scenario.into(),
            region: region.into(),
            overrides: BTreeMap::new(),
            regime,
        }
    }

    pub fn with_override(mut self, field: impl Into<String>, value: f64) -> Self {
        self.overrides.insert(field.into(), value);
        self
    }
}

/// Merge globals, the scenario baseline, the region's cost fields and tilts,
/// then caller overrides, into a fully populated [`Assumptions`].
///
/// Layering order: globals → scenario → region values → region tilts →
/// overrides. Regime controls are copied from the request untouched.
pub fn resolve(catalog: &Catalog, request: &AssumptionRequest) -> Result<Assumptions> {
    let scenario = catalog.scenarios.get(&request.scenario).ok_or_else(|| {
        ConfigurationError::UnknownScenario { id: request.scenario.clone() }
    })?;
    let region = catalog
        .regions
        .get(&request.region)
        .ok_or_else(|| ConfigurationError::UnknownRegion { id: request.region.clone() })?;

    let mut values: BTreeMap<AssumptionField, f64> = BTreeMap::new();
    for layer in [&catalog.globals, scenario, &region.values] {
        for (name, &value) in layer {
            values.insert(checked_field(name, value)?, value);
        }
    }

    for (name, tilt) in &region.tilts {
        let field: AssumptionField = name.parse()?;
        let base = values
            .get(&field)
            .copied()
            .ok_or(ConfigurationError::MissingField { field: field.name() })?;
        let tilted = match *tilt {
            Tilt::Delta(delta) => base + delta,
            Tilt::Factor(factor) => base * factor,
        };
        let field = checked_field(name, tilted)?;
        debug!(field = field.name(), base, tilted, "applied region tilt");
        values.insert(field, tilted);
    }

    let mut overridden = BTreeSet::new();
    for (name, &value) in &request.overrides {
        let field = checked_field(name, value)?;
        values.insert(field, value);
        overridden.insert(field);
    }

    let mut assumptions = Assumptions::from_values(&values, request.regime)?;
    assumptions.overridden = overridden;
    info!(
        scenario = %request.scenario,
        region = %request.region,
        overrides = request.overrides.len(),
        rent_basis = %request.regime.rent_basis,
        filing_status = %request.regime.filing_status,
        sell_at_end = request.regime.sell_at_end,
        "resolved assumptions"
    );
    Ok(assumptions)
}

fn checked_field(name: &str, value: f64) -> Result<AssumptionField, ConfigurationError> {
    let field: AssumptionField = name.parse()?;
    if !value.is_finite() {
        return Err(ConfigurationError::NonFiniteValue { field: name.to_string(), value });
    }
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Catalog, RegionConfig};
    use crate::error::Error;
    use crate::types::{FilingStatus, RentBasis};

    fn regime() -> Regime {
        Regime {
            rent_basis: RentBasis::Market,
            filing_status: FilingStatus::Single,
            sell_at_end: true,
        }
    }

    fn request(scenario: &str, region: &str) -> AssumptionRequest {
        AssumptionRequest::new(scenario, region, regime())
    }

    // ── Completeness ──────────────────────────────────────────────────────────

    #[test]
    fn every_canonical_pair_resolves_fully() {
        let catalog = Catalog::canonical();
        for scenario in catalog.scenarios.keys() {
            for region in catalog.regions.keys() {
                let a = resolve(&catalog, &request(scenario, region))
                    .unwrap_or_else(|e| panic!("{scenario}/{region}: {e}"));
                for field in AssumptionField::ALL {
                    assert!(a.get(field).is_finite(), "{scenario}/{region}: {field} not finite");
                }
                assert_eq!(a.regime, regime());
            }
        }
    }

    #[test]
    fn field_names_round_trip() {
        for field in AssumptionField::ALL {
            assert_eq!(field.name().parse::<AssumptionField>().unwrap(), field);
        }
    }

    // ── Layering ──────────────────────────────────────────────────────────────

    #[test]
    fn scenario_baseline_flows_through_neutral_region() {
        let catalog = Catalog::canonical();
        let a = resolve(&catalog, &request("base", "US")).unwrap();
        assert_eq!(a.investment_return, catalog.scenarios["base"]["investment_return"]);
        assert_eq!(a.home_appreciation, catalog.scenarios["base"]["home_appreciation"]);
    }

    #[test]
    fn delta_and_factor_tilts_apply_to_scenario_values() {
        let mut catalog = Catalog::canonical();
        let mut region = RegionConfig::default();
        region.tilts.insert("home_appreciation".into(), Tilt::Delta(0.01));
        region.tilts.insert("rent_growth".into(), Tilt::Factor(2.0));
        region.values.insert("property_tax_rate".into(), 0.02);
        catalog.regions.insert("Test".into(), region);

        let base = resolve(&catalog, &request("base", "US")).unwrap();
        let tilted = resolve(&catalog, &request("base", "Test")).unwrap();
        assert!((tilted.home_appreciation - (base.home_appreciation + 0.01)).abs() < 1e-12);
        assert!((tilted.rent_growth - base.rent_growth * 2.0).abs() < 1e-12);
        assert_eq!(tilted.property_tax_rate, 0.02);
    }

    #[test]
    fn overrides_replace_after_tilts() {
        let catalog = Catalog::canonical();
        let req = request("base", "US-West").with_override("home_appreciation", 0.0123);
        let a = resolve(&catalog, &req).unwrap();
        assert_eq!(a.home_appreciation, 0.0123);
        assert!(a.overridden.contains(&AssumptionField::HomeAppreciation));
        assert_eq!(a.overridden.len(), 1);
    }

    #[test]
    fn with_replaces_exactly_one_field() {
        let catalog = Catalog::canonical();
        let a = resolve(&catalog, &request("base", "US")).unwrap();
        let b = a.with(AssumptionField::MarketRent, 1.0);
        for field in AssumptionField::ALL {
            if field == AssumptionField::MarketRent {
                assert_eq!(b.get(field), 1.0);
            } else {
                assert_eq!(b.get(field), a.get(field), "{field} changed");
            }
        }
    }

    // ── Failures ──────────────────────────────────────────────────────────────

    #[test]
    fn unknown_scenario_region_and_field_fail() {
        let catalog = Catalog::canonical();
        assert_eq!(
            resolve(&catalog, &request("boom", "US")).unwrap_err(),
            Error::Configuration(ConfigurationError::UnknownScenario { id: "boom".into() })
        );
        assert_eq!(
            resolve(&catalog, &request("base", "Atlantis")).unwrap_err(),
            Error::Configuration(ConfigurationError::UnknownRegion { id: "Atlantis".into() })
        );
        let req = request("base", "US").with_override("home_price_growth", 0.1);
        assert_eq!(
            resolve(&catalog, &req).unwrap_err(),
            Error::Configuration(ConfigurationError::UnknownField {
                name: "home_price_growth".into()
            })
        );
    }

    #[test]
    fn unknown_tilt_field_fails() {
        let mut catalog = Catalog::canonical();
        let mut region = RegionConfig::default();
        region.tilts.insert("sunshine".into(), Tilt::Delta(1.0));
        catalog.regions.insert("Odd".into(), region);
        assert!(matches!(
            resolve(&catalog, &request("base", "Odd")),
            Err(Error::Configuration(ConfigurationError::UnknownField { .. }))
        ));
    }

    #[test]
    fn missing_field_is_reported() {
        let mut catalog = Catalog::canonical();
        catalog.globals.remove("salt_cap");
        assert_eq!(
            resolve(&catalog, &request("base", "US")).unwrap_err(),
            Error::Configuration(ConfigurationError::MissingField { field: "salt_cap" })
        );
    }

    #[test]
    fn non_finite_override_is_rejected() {
        let catalog = Catalog::canonical();
        let req = request("base", "US").with_override("inflation", f64::NAN);
        assert!(matches!(
            resolve(&catalog, &req),
            Err(Error::Configuration(ConfigurationError::NonFiniteValue { .. }))
        ));
    }
}
