use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, ValidationError};
use crate::mortgage::MortgageTerms;

/// Scenario baseline: field name → value. Names are validated at resolution.
pub type ScenarioConfig = BTreeMap<String, f64>;

/// How a region shifts one scenario field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tilt {
    /// Added to the scenario value.
    Delta(f64),
    /// Multiplies the scenario value.
    Factor(f64),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegionConfig {
    /// Region-specific cost fields (property tax, insurance, market rent, ...).
    pub values: BTreeMap<String, f64>,
    pub tilts: BTreeMap<String, Tilt>,
}

/// Scenario and region definitions plus global defaults for every field
/// neither of them sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Catalog {
    pub globals: BTreeMap<String, f64>,
    pub scenarios: BTreeMap<String, ScenarioConfig>,
    pub regions: BTreeMap<String, RegionConfig>,
}

impl Catalog {
    /// Parse a catalog from JSON with the same shape as [`Catalog::canonical`].
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(json)
            .map_err(|e| ConfigurationError::Malformed { reason: e.to_string() })
    }

    pub fn scenario_ids(&self) -> impl Iterator<Item = &str> {
        self.scenarios.keys().map(String::as_str)
    }

    pub fn region_ids(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }

    pub fn canonical() -> Self {
        // ── Globals ──────────────────────────────────────────────────────────
        // Annual amounts in dollars; rates as fractions. US-style defaults.
        let globals = entries(&[
            ("property_tax_rate", 0.011),
            ("insurance_rate", 0.0035),
            ("maintenance_rate", 0.01),
            ("hoa_amount", 0.0),
            ("market_rent", 2_400.0 * 12.0),
            ("renters_insurance", 180.0),
            ("closing_cost_rate", 0.03),
            ("selling_cost_rate", 0.06),
            ("pmi_rate", 0.005),
            ("pmi_ltv_cutoff", 0.80),
            ("investment_tax_drag", 0.10),
            ("marginal_tax_rate", 0.24),
            ("standard_deduction_single", 14_600.0),
            ("standard_deduction_married", 29_200.0),
            ("salt_cap", 10_000.0),
            ("capital_gains_tax_rate", 0.15),
            ("capital_gains_exclusion", 250_000.0),
        ]);

        // ── Scenarios ────────────────────────────────────────────────────────
        // Structural sds describe uncertainty about the long-run level; vols
        // are year-to-year noise. Vols are shared across scenarios.
        let vols = [
            ("investment_return_vol", 0.15),
            ("home_appreciation_vol", 0.08),
            ("rent_growth_vol", 0.05),
            ("inflation_vol", 0.015),
        ];
        let scenario = |rates: [(&'static str, f64); 8]| {
            let mut s = entries(&rates);
            s.extend(entries(&vols));
            s
        };

        let scenarios = BTreeMap::from([
            (
                "base".to_string(),
                scenario([
                    ("investment_return", 0.07),
                    ("home_appreciation", 0.035),
                    ("rent_growth", 0.03),
                    ("inflation", 0.025),
                    ("investment_return_sd", 0.02),
                    ("home_appreciation_sd", 0.02),
                    ("rent_growth_sd", 0.015),
                    ("inflation_sd", 0.01),
                ]),
            ),
            (
                "bull".to_string(),
                scenario([
                    ("investment_return", 0.09),
                    ("home_appreciation", 0.045),
                    ("rent_growth", 0.035),
                    ("inflation", 0.025),
                    ("investment_return_sd", 0.02),
                    ("home_appreciation_sd", 0.02),
                    ("rent_growth_sd", 0.015),
                    ("inflation_sd", 0.01),
                ]),
            ),
            (
                "bear".to_string(),
                scenario([
                    ("investment_return", 0.045),
                    ("home_appreciation", 0.02),
                    ("rent_growth", 0.025),
                    ("inflation", 0.02),
                    ("investment_return_sd", 0.025),
                    ("home_appreciation_sd", 0.025),
                    ("rent_growth_sd", 0.015),
                    ("inflation_sd", 0.01),
                ]),
            ),
            (
                "high_inflation".to_string(),
                scenario([
                    ("investment_return", 0.08),
                    ("home_appreciation", 0.05),
                    ("rent_growth", 0.05),
                    ("inflation", 0.05),
                    ("investment_return_sd", 0.025),
                    ("home_appreciation_sd", 0.025),
                    ("rent_growth_sd", 0.02),
                    ("inflation_sd", 0.015),
                ]),
            ),
        ]);

        // ── Regions ──────────────────────────────────────────────────────────
        // "US" is the neutral reference; others tilt growth and set local costs.
        let regions = BTreeMap::from([
            ("US".to_string(), RegionConfig::default()),
            (
                "US-West".to_string(),
                RegionConfig {
                    values: entries(&[
                        ("property_tax_rate", 0.0075),
                        ("insurance_rate", 0.003),
                        ("market_rent", 3_400.0 * 12.0),
                    ]),
                    tilts: BTreeMap::from([
                        ("home_appreciation".to_string(), Tilt::Delta(0.005)),
                        ("rent_growth".to_string(), Tilt::Delta(0.003)),
                        ("home_appreciation_sd".to_string(), Tilt::Factor(1.25)),
                    ]),
                },
            ),
            (
                "US-Midwest".to_string(),
                RegionConfig {
                    values: entries(&[
                        ("property_tax_rate", 0.0145),
                        ("insurance_rate", 0.004),
                        ("market_rent", 1_700.0 * 12.0),
                    ]),
                    tilts: BTreeMap::from([
                        ("home_appreciation".to_string(), Tilt::Factor(0.85)),
                        ("rent_growth".to_string(), Tilt::Delta(-0.004)),
                    ]),
                },
            ),
            (
                "US-Northeast".to_string(),
                RegionConfig {
                    values: entries(&[
                        ("property_tax_rate", 0.0175),
                        ("insurance_rate", 0.0032),
                        ("market_rent", 2_900.0 * 12.0),
                        ("hoa_amount", 1_200.0),
                    ]),
                    tilts: BTreeMap::from([(
                        "home_appreciation".to_string(),
                        Tilt::Delta(-0.002),
                    )]),
                },
            ),
            (
                "US-South".to_string(),
                RegionConfig {
                    values: entries(&[
                        ("property_tax_rate", 0.0095),
                        ("insurance_rate", 0.0065),
                        ("market_rent", 1_950.0 * 12.0),
                    ]),
                    tilts: BTreeMap::from([
                        ("rent_growth".to_string(), Tilt::Delta(0.002)),
                        ("home_appreciation_vol".to_string(), Tilt::Factor(1.1)),
                    ]),
                },
            ),
        ]);

        Catalog { globals, scenarios, regions }
    }
}

fn entries(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs.iter().map(|&(k, v)| (k.to_string(), v)).collect()
}

/// Run inputs that are not assumptions: the purchase and the loan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunParameters {
    pub horizon: u32,
    pub home_price: f64,
    pub down_payment: f64,
    pub mortgage_rate: f64,
    pub mortgage_term_years: u32,
}

impl RunParameters {
    /// A $500k purchase with 20% down on a 30-year fixed loan at 6%.
    pub fn canonical() -> Self {
        RunParameters {
            horizon: 30,
            home_price: 500_000.0,
            down_payment: 100_000.0,
            mortgage_rate: 0.06,
            mortgage_term_years: 30,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.horizon == 0 {
            return Err(ValidationError::NonPositiveHorizon { horizon: self.horizon });
        }
        if !(self.home_price > 0.0 && self.home_price.is_finite()) {
            return Err(ValidationError::NonPositivePrice { price: self.home_price });
        }
        if !(0.0..self.home_price).contains(&self.down_payment) {
            return Err(ValidationError::DownPaymentOutOfRange {
                down_payment: self.down_payment,
                price: self.home_price,
            });
        }
        self.mortgage().validate()
    }

    pub fn loan_amount(&self) -> f64 {
        self.home_price - self.down_payment
    }

    pub fn mortgage(&self) -> MortgageTerms {
        MortgageTerms {
            principal: self.loan_amount(),
            annual_rate: self.mortgage_rate,
            term_years: self.mortgage_term_years,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_catalog_survives_json() {
        let catalog = Catalog::canonical();
        let json = serde_json::to_string(&catalog).unwrap();
        let parsed = Catalog::from_json_str(&json).unwrap();
        assert_eq!(
            parsed.scenarios.keys().collect::<Vec<_>>(),
            catalog.scenarios.keys().collect::<Vec<_>>()
        );
        assert_eq!(
            parsed.regions["US-West"].tilts.keys().collect::<Vec<_>>(),
            catalog.regions["US-West"].tilts.keys().collect::<Vec<_>>()
        );
        for (name, value) in &catalog.globals {
            assert!((parsed.globals[name] - value).abs() < 1e-9, "{name} drifted");
        }
    }

    #[test]
    fn tilts_deserialize_by_kind() {
        let json = r#"{
            "globals": {},
            "scenarios": {"s": {"inflation": 0.02}},
            "regions": {"r": {"tilts": {"inflation": {"factor": 1.5}}}}
        }"#;
        let catalog = Catalog::from_json_str(json).unwrap();
        assert_eq!(catalog.regions["r"].tilts["inflation"], Tilt::Factor(1.5));
        assert!(catalog.regions["r"].values.is_empty());
    }

    #[test]
    fn malformed_catalog_is_a_configuration_error() {
        let err = Catalog::from_json_str(r#"{"globals": {}}"#).unwrap_err();
        assert!(matches!(err, ConfigurationError::Malformed { .. }));
    }

    #[test]
    fn run_parameters_validation() {
        assert_eq!(RunParameters::canonical().validate(), Ok(()));

        let mut p = RunParameters::canonical();
        p.horizon = 0;
        assert_eq!(p.validate(), Err(ValidationError::NonPositiveHorizon { horizon: 0 }));

        let mut p = RunParameters::canonical();
        p.down_payment = 600_000.0;
        assert!(matches!(p.validate(), Err(ValidationError::DownPaymentOutOfRange { .. })));

        let mut p = RunParameters::canonical();
        p.mortgage_term_years = 0;
        assert!(matches!(p.validate(), Err(ValidationError::NonPositiveTerm { .. })));
    }
}
