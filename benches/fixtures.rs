use rentbuy::assumptions::{AssumptionRequest, Assumptions, resolve};
use rentbuy::config::{Catalog, RunParameters};
use rentbuy::simulation::YearlySimulator;
use rentbuy::types::{FilingStatus, Regime, RentBasis};

pub struct Setup {
    pub scenario: &'static str,
    pub region: &'static str,
    pub rent_basis: RentBasis,
}

pub const BASE: Setup = Setup { scenario: "base", region: "US", rent_basis: RentBasis::Market };

pub const WEST_MATCHED: Setup = Setup {
    scenario: "bull",
    region: "US-West",
    rent_basis: RentBasis::MatchOwnerCost,
};

pub fn assumptions(setup: &Setup) -> Assumptions {
    let regime = Regime {
        rent_basis: setup.rent_basis,
        filing_status: FilingStatus::Married,
        sell_at_end: true,
    };
    resolve(&Catalog::canonical(), &AssumptionRequest::new(setup.scenario, setup.region, regime))
        .expect("canonical catalog resolves")
}

/// A canonical purchase simulated over `horizon` years.
pub fn build_simulator(setup: &Setup, horizon: u32) -> YearlySimulator {
    let params = RunParameters { horizon, ..RunParameters::canonical() };
    YearlySimulator::new(assumptions(setup), params).expect("canonical parameters are valid")
}
