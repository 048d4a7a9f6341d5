use serde::Serialize;
use tracing::debug;

use crate::assumptions::Assumptions;
use crate::config::RunParameters;
use crate::error::Result;
use crate::mortgage::MortgageSchedule;
use crate::rates::{OwnerCosts, RatePath, YearRates};
use crate::types::{FilingStatus, RentBasis, Year};

/// Loans with less than this down payment pay PMI while LTV is above the cutoff.
const PMI_DOWN_PAYMENT_THRESHOLD: f64 = 0.20;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OwnerState {
    pub mortgage_payment: f64,
    pub interest_paid: f64,
    pub principal_paid: f64,
    pub property_tax: f64,
    pub insurance: f64,
    pub maintenance: f64,
    pub hoa: f64,
    pub pmi: f64,
    pub deduction_benefit: f64,
    /// Payment + tax + insurance + maintenance + HOA + PMI − deduction benefit.
    pub cash_outflow: f64,
    pub home_value: f64,
    pub mortgage_balance: f64,
    /// Negative once costs above the housing budget exceed what the bucket
    /// holds; the owner then carries the deficit against net worth.
    pub invested_surplus: f64,
    /// Unrealized: home equity plus invested surplus.
    pub net_worth: f64,
}

impl OwnerState {
    /// Recurring costs that are not a transfer into equity.
    pub fn carrying_cost(&self) -> f64 {
        self.property_tax + self.insurance + self.maintenance + self.hoa + self.pmi
            - self.deduction_benefit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RenterState {
    pub rent_paid: f64,
    pub renters_insurance: f64,
    /// Signed flow into the portfolio this year; negative is a withdrawal.
    pub contribution: f64,
    pub portfolio_value: f64,
    pub net_worth: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearlyState {
    pub year: Year,
    pub rates: YearRates,
    pub owner: OwnerState,
    pub renter: RenterState,
}

impl YearlyState {
    pub fn difference(&self) -> f64 {
        self.owner.net_worth - self.renter.net_worth
    }
}

/// What selling at the end of the horizon realizes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SaleProceeds {
    pub sale_price: f64,
    pub selling_costs: f64,
    /// Exclusion indexed by realized inflation over the horizon.
    pub capital_gains_exclusion: f64,
    pub capital_gains_tax: f64,
    pub mortgage_payoff: f64,
    /// Sale price less selling costs and tax, before paying off the loan.
    pub net_sale: f64,
}

impl SaleProceeds {
    fn compute(
        a: &Assumptions,
        params: &RunParameters,
        home_value: f64,
        balance: f64,
        price_index: f64,
    ) -> Self {
        let selling_costs = home_value * a.selling_cost_rate;
        let closing_costs = params.home_price * a.closing_cost_rate;
        let gain = home_value - (params.home_price + closing_costs) - selling_costs;
        let capital_gains_exclusion = a.capital_gains_exclusion * price_index;
        let taxable_gain = (gain - capital_gains_exclusion).max(0.0);
        let capital_gains_tax = taxable_gain * a.capital_gains_tax_rate;
        SaleProceeds {
            sale_price: home_value,
            selling_costs,
            capital_gains_exclusion,
            capital_gains_tax,
            mortgage_payoff: balance,
            net_sale: home_value - selling_costs - capital_gains_tax,
        }
    }
}

/// The owner-versus-renter waterfall for one result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Decomposition {
    pub renter_net_worth: f64,
    /// Sale proceeds net of selling costs and tax, less the purchase price.
    pub net_home_appreciation: f64,
    pub principal_paydown: f64,
    pub mortgage_interest: f64,
    pub closing_costs: f64,
    pub carrying_costs: f64,
    /// Growth the down payment would have earned on the realized investment path.
    pub down_payment_opportunity_cost: f64,
    pub owner_net_worth: f64,
}

/// One trial's year-by-year trajectory and final figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub params: RunParameters,
    /// Owner cost levels the trajectory ran with.
    pub costs: OwnerCosts,
    pub initial_capital: f64,
    pub years: Vec<YearlyState>,
    /// Realized sale proceeds when the home is sold at the end, otherwise the
    /// final year's unrealized net worth.
    pub owner_final: f64,
    pub renter_final: f64,
    pub sale: Option<SaleProceeds>,
    /// Years in which the renter portfolio could not cover a withdrawal.
    pub renter_depleted_years: u32,
    /// Years that ended with the owner surplus bucket below zero.
    pub owner_deficit_years: u32,
}

impl SimulationResult {
    /// Owner final net worth minus renter final net worth.
    pub fn difference(&self) -> f64 {
        self.owner_final - self.renter_final
    }

    pub fn final_year(&self) -> Option<&YearlyState> {
        self.years.last()
    }

    /// First year the owner's pre-sale net worth is at least the renter's.
    pub fn breakeven_year(&self) -> Option<Year> {
        self.years.iter().find(|s| s.difference() >= 0.0).map(|s| s.year)
    }

    pub fn decomposition(&self, a: &Assumptions) -> Decomposition {
        let last = self.years.last();
        let home_value = last.map_or(self.params.home_price, |s| s.owner.home_value);
        let balance = last.map_or(self.params.loan_amount(), |s| s.owner.mortgage_balance);
        let price_index: f64 = self.years.iter().map(|s| 1.0 + s.rates.inflation).product();
        let sale = self.sale.unwrap_or_else(|| {
            SaleProceeds::compute(a, &self.params, home_value, balance, price_index)
        });

        let mut down_payment_growth = self.params.down_payment;
        for s in &self.years {
            down_payment_growth *= 1.0 + after_tax_return(a, s.rates.investment_return);
        }

        Decomposition {
            renter_net_worth: self.renter_final,
            net_home_appreciation: sale.net_sale - self.params.home_price,
            principal_paydown: self.years.iter().map(|s| s.owner.principal_paid).sum(),
            mortgage_interest: -self.years.iter().map(|s| s.owner.interest_paid).sum::<f64>(),
            closing_costs: -self.params.home_price * a.closing_cost_rate,
            carrying_costs: -self.years.iter().map(|s| s.owner.carrying_cost()).sum::<f64>(),
            down_payment_opportunity_cost: -(down_payment_growth - self.params.down_payment),
            owner_net_worth: self.owner_final,
        }
    }
}

fn after_tax_return(a: &Assumptions, gross: f64) -> f64 {
    gross * (1.0 - a.investment_tax_drag)
}

/// Approximate tax saving from itemizing mortgage interest and property tax.
/// Filing status only selects the standard deduction compared against.
fn deduction_benefit(a: &Assumptions, interest_paid: f64, property_tax: f64) -> f64 {
    let standard = match a.regime.filing_status {
        FilingStatus::Single => a.standard_deduction_single,
        FilingStatus::Married => a.standard_deduction_married,
    };
    let itemized = interest_paid + property_tax.min(a.salt_cap);
    (itemized - standard).max(0.0) * a.marginal_tax_rate
}

/// Adds `flow` to a portfolio that grew at `growth` and floors it at zero.
/// Returns the new balance and the part of a withdrawal it could not cover.
fn roll_balance(balance: f64, growth: f64, flow: f64) -> (f64, f64) {
    let next = balance * growth + flow;
    if next < 0.0 { (0.0, -next) } else { (next, 0.0) }
}

/// Deterministic owner-versus-renter engine for one assumption set and
/// purchase. The mortgage schedule is fixed at construction, so a single
/// simulator can replay many rate paths.
#[derive(Debug, Clone)]
pub struct YearlySimulator {
    assumptions: Assumptions,
    params: RunParameters,
    schedule: MortgageSchedule,
}

impl YearlySimulator {
    pub fn new(assumptions: Assumptions, params: RunParameters) -> Result<Self> {
        params.validate()?;
        let schedule = MortgageSchedule::build(params.mortgage(), params.horizon)?;
        Ok(YearlySimulator { assumptions, params, schedule })
    }

    pub fn assumptions(&self) -> &Assumptions {
        &self.assumptions
    }

    pub fn params(&self) -> &RunParameters {
        &self.params
    }

    pub fn schedule(&self) -> &MortgageSchedule {
        &self.schedule
    }

    /// Both sides start with the same capital: the buyer's down payment and
    /// closing costs, which the renter invests instead.
    pub fn initial_capital(&self) -> f64 {
        self.params.down_payment + self.params.home_price * self.assumptions.closing_cost_rate
    }

    /// Run the baseline rate path.
    pub fn run_deterministic(&self) -> Result<SimulationResult> {
        self.run(&RatePath::constant(&self.assumptions, self.params.horizon))
    }

    /// Step through every horizon year on `path` with baseline owner costs.
    pub fn run(&self, path: &RatePath) -> Result<SimulationResult> {
        self.run_with_costs(path, &OwnerCosts::baseline(&self.assumptions))
    }

    /// Step through every horizon year on `path`. `costs` replaces the
    /// maintenance rate, insurance rate and HOA dues of the assumptions.
    pub fn run_with_costs(&self, path: &RatePath, costs: &OwnerCosts) -> Result<SimulationResult> {
        path.check_horizon(self.params.horizon)?;
        let a = &self.assumptions;
        let params = &self.params;

        let loan = params.loan_amount();
        let pmi_eligible = params.down_payment < PMI_DOWN_PAYMENT_THRESHOLD * params.home_price;

        let mut home_value = params.home_price;
        let mut opening_balance = loan;
        let mut price_index = 1.0;
        let mut rent = 0.0;
        let mut benchmark = 0.0;
        let mut portfolio = self.initial_capital();
        let mut surplus_bucket = 0.0;
        let mut renter_depleted_years = 0;
        let mut owner_deficit_years = 0;
        let mut years = Vec::with_capacity(path.len());

        for (idx, rates) in path.years().iter().enumerate() {
            let year = Year::from_index(idx);
            let Some(m) = self.schedule.year(year) else {
                break;
            };

            home_value *= 1.0 + rates.home_appreciation;

            // ── Owner costs ───────────────────────────────────────────────────
            let property_tax = a.property_tax_rate * home_value;
            let insurance = costs.insurance_rate * home_value;
            let maintenance = costs.maintenance_rate * home_value;
            let hoa = costs.hoa_amount * price_index;
            let pmi = if pmi_eligible && opening_balance / home_value > a.pmi_ltv_cutoff {
                a.pmi_rate * loan
            } else {
                0.0
            };
            let deduction = deduction_benefit(a, m.interest_paid, property_tax);
            let cash_outflow =
                m.payment + property_tax + insurance + maintenance + hoa + pmi - deduction;

            // ── Rent ──────────────────────────────────────────────────────────
            rent = if idx == 0 {
                match a.regime.rent_basis {
                    RentBasis::Market => a.market_rent,
                    RentBasis::MatchMortgage => m.payment,
                    RentBasis::MatchOwnerCost => cash_outflow,
                }
            } else {
                rent * (1.0 + rates.rent_growth)
            };
            let renters_insurance = a.renters_insurance * price_index;

            // ── Investing the difference ──────────────────────────────────────
            // Both households share a housing budget fixed at the owner's
            // year-1 outflow and indexed by realized inflation. The renter
            // invests owner outflow less renter outflow plus the same surplus
            // the owner banks against the budget, so each side deploys the
            // whole budget every year.
            benchmark = if idx == 0 {
                cash_outflow
            } else {
                benchmark * (1.0 + path.years()[idx - 1].inflation)
            };
            let owner_surplus = benchmark - cash_outflow;
            let contribution = (cash_outflow - (rent + renters_insurance)) + owner_surplus;
            let growth = 1.0 + after_tax_return(a, rates.investment_return);

            let (next_portfolio, renter_shortfall) = roll_balance(portfolio, growth, contribution);
            if renter_shortfall > 0.0 {
                renter_depleted_years += 1;
                debug!(year = year.0, shortfall = renter_shortfall, "renter portfolio depleted");
            }
            portfolio = next_portfolio;

            // The owner bucket is not floored: a deficit is funded from outside
            // savings and compounds against owner net worth.
            surplus_bucket = surplus_bucket * growth + owner_surplus;
            if surplus_bucket < 0.0 {
                owner_deficit_years += 1;
                debug!(year = year.0, deficit = -surplus_bucket, "owner surplus in deficit");
            }

            years.push(YearlyState {
                year,
                rates: *rates,
                owner: OwnerState {
                    mortgage_payment: m.payment,
                    interest_paid: m.interest_paid,
                    principal_paid: m.principal_paid,
                    property_tax,
                    insurance,
                    maintenance,
                    hoa,
                    pmi,
                    deduction_benefit: deduction,
                    cash_outflow,
                    home_value,
                    mortgage_balance: m.ending_balance,
                    invested_surplus: surplus_bucket,
                    net_worth: home_value - m.ending_balance + surplus_bucket,
                },
                renter: RenterState {
                    rent_paid: rent,
                    renters_insurance,
                    contribution,
                    portfolio_value: portfolio,
                    net_worth: portfolio,
                },
            });

            opening_balance = m.ending_balance;
            price_index *= 1.0 + rates.inflation;
        }

        let last = years.last().map(|s| (s.owner, s.renter.net_worth));
        let (owner_final, renter_final, sale) = match last {
            Some((owner, renter)) if a.regime.sell_at_end => {
                let sale = SaleProceeds::compute(
                    a,
                    params,
                    owner.home_value,
                    owner.mortgage_balance,
                    price_index,
                );
                let realized = sale.net_sale - sale.mortgage_payoff + owner.invested_surplus;
                (realized, renter, Some(sale))
            }
            Some((owner, renter)) => (owner.net_worth, renter, None),
            None => (0.0, 0.0, None),
        };

        Ok(SimulationResult {
            params: *params,
            costs: *costs,
            initial_capital: self.initial_capital(),
            years,
            owner_final,
            renter_final,
            sale,
            renter_depleted_years,
            owner_deficit_years,
        })
    }
}
