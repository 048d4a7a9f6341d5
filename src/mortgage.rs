use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::Year;

/// Fixed-rate loan terms. Fixed for the whole run; refinancing is not modelled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MortgageTerms {
    pub principal: f64,
    pub annual_rate: f64,
    pub term_years: u32,
}

impl MortgageTerms {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.principal > 0.0 && self.principal.is_finite()) {
            return Err(ValidationError::NonPositivePrincipal { principal: self.principal });
        }
        if self.term_years == 0 {
            return Err(ValidationError::NonPositiveTerm { principal: self.principal });
        }
        if !(self.annual_rate >= 0.0 && self.annual_rate.is_finite()) {
            return Err(ValidationError::NegativeRate { rate: self.annual_rate });
        }
        Ok(())
    }

    /// Level annual payment. A zero rate falls back to straight-line repayment.
    pub fn annual_payment(&self) -> f64 {
        let n = self.term_years as f64;
        if self.annual_rate == 0.0 {
            self.principal / n
        } else {
            let r = self.annual_rate;
            self.principal * r / (1.0 - (1.0 + r).powf(-n))
        }
    }
}

/// One year of the amortization schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AmortizationYear {
    pub year: Year,
    pub payment: f64,
    pub interest_paid: f64,
    pub principal_paid: f64,
    pub ending_balance: f64,
}

impl AmortizationYear {
    fn paid_off(year: Year) -> Self {
        AmortizationYear {
            year,
            payment: 0.0,
            interest_paid: 0.0,
            principal_paid: 0.0,
            ending_balance: 0.0,
        }
    }
}

/// Precomputed schedule covering a whole horizon. Years past the term are
/// all zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MortgageSchedule {
    pub terms: MortgageTerms,
    pub annual_payment: f64,
    years: Vec<AmortizationYear>,
}

impl MortgageSchedule {
    /// Amortize `terms` annually over `horizon` years.
    ///
    /// The final term year pays off whatever balance remains, so the balance
    /// at `term_years` is exactly zero and principal paid sums to the loan.
    pub fn build(terms: MortgageTerms, horizon: u32) -> Result<Self, ValidationError> {
        terms.validate()?;
        let payment = terms.annual_payment();
        let mut balance = terms.principal;
        let mut years = Vec::with_capacity(horizon as usize);

        for y in 1..=horizon {
            let year = Year(y);
            if y > terms.term_years {
                years.push(AmortizationYear::paid_off(year));
                continue;
            }
            let interest_paid = balance * terms.annual_rate;
            let (principal_paid, ending_balance) = if y == terms.term_years {
                (balance, 0.0)
            } else {
                let principal_paid = payment - interest_paid;
                (principal_paid, (balance - principal_paid).max(0.0))
            };
            years.push(AmortizationYear {
                year,
                payment: interest_paid + principal_paid,
                interest_paid,
                principal_paid,
                ending_balance,
            });
            balance = ending_balance;
        }

        Ok(MortgageSchedule { terms, annual_payment: payment, years })
    }

    pub fn year(&self, year: Year) -> Option<&AmortizationYear> {
        year.index().and_then(|i| self.years.get(i))
    }

    pub fn years(&self) -> &[AmortizationYear] {
        &self.years
    }

    pub fn total_interest(&self) -> f64 {
        self.years.iter().map(|y| y.interest_paid).sum()
    }

    pub fn total_principal(&self) -> f64 {
        self.years.iter().map(|y| y.principal_paid).sum()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn terms(principal: f64, annual_rate: f64, term_years: u32) -> MortgageTerms {
        MortgageTerms { principal, annual_rate, term_years }
    }

    #[test]
    fn thirty_year_six_percent_pays_off_exactly() {
        let schedule = MortgageSchedule::build(terms(400_000.0, 0.06, 30), 30).unwrap();
        let last = schedule.year(Year(30)).unwrap();
        assert_eq!(last.ending_balance, 0.0);
        assert!(
            (schedule.total_principal() - 400_000.0).abs() <= 1.0,
            "principal paid {} != 400000",
            schedule.total_principal()
        );
        // Standard annual annuity for 400k @ 6% / 30y.
        assert!((schedule.annual_payment - 29_059.57).abs() < 0.01);
    }

    #[test]
    fn zero_rate_is_straight_line() {
        let schedule = MortgageSchedule::build(terms(300_000.0, 0.0, 15), 15).unwrap();
        assert_eq!(schedule.annual_payment, 20_000.0);
        for y in schedule.years() {
            assert_eq!(y.interest_paid, 0.0);
            assert!((y.principal_paid - 20_000.0).abs() < 1e-6);
        }
        assert_eq!(schedule.year(Year(15)).unwrap().ending_balance, 0.0);
    }

    #[test]
    fn years_beyond_term_are_zero() {
        let schedule = MortgageSchedule::build(terms(200_000.0, 0.05, 10), 25).unwrap();
        assert_eq!(schedule.years().len(), 25);
        for y in &schedule.years()[10..] {
            assert_eq!(*y, AmortizationYear::paid_off(y.year));
        }
    }

    #[test]
    fn horizon_shorter_than_term_leaves_balance() {
        let schedule = MortgageSchedule::build(terms(200_000.0, 0.05, 30), 10).unwrap();
        assert_eq!(schedule.years().len(), 10);
        assert!(schedule.year(Year(10)).unwrap().ending_balance > 0.0);
        assert!(schedule.year(Year(11)).is_none());
    }

    #[test]
    fn year_zero_is_not_in_the_schedule() {
        let schedule = MortgageSchedule::build(terms(200_000.0, 0.05, 30), 10).unwrap();
        assert!(schedule.year(Year(0)).is_none());
    }

    #[test]
    fn invalid_terms_are_rejected() {
        assert!(matches!(
            MortgageSchedule::build(terms(0.0, 0.05, 30), 30),
            Err(ValidationError::NonPositivePrincipal { .. })
        ));
        assert!(matches!(
            MortgageSchedule::build(terms(100.0, 0.05, 0), 30),
            Err(ValidationError::NonPositiveTerm { .. })
        ));
        assert!(matches!(
            MortgageSchedule::build(terms(100.0, -0.01, 30), 30),
            Err(ValidationError::NegativeRate { .. })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_principal_sums_to_loan_and_balance_ends_at_zero(
            principal in 1_000.0f64..5_000_000.0,
            rate in 0.0f64..0.15,
            term in 1u32..=40,
        ) {
            let schedule = MortgageSchedule::build(terms(principal, rate, term), term).unwrap();
            let paid = schedule.total_principal();
            prop_assert!(((paid - principal) / principal).abs() < 1e-6);
            prop_assert_eq!(schedule.year(Year(term)).unwrap().ending_balance, 0.0);
            for y in schedule.years() {
                prop_assert!(y.ending_balance >= 0.0);
                prop_assert!(y.interest_paid >= 0.0);
            }
        }

        #[test]
        fn prop_payment_is_level_through_the_term(
            principal in 10_000.0f64..1_000_000.0,
            rate in 0.001f64..0.12,
            term in 2u32..=30,
        ) {
            let schedule = MortgageSchedule::build(terms(principal, rate, term), term).unwrap();
            for y in schedule.years() {
                let rel = (y.payment - schedule.annual_payment).abs() / schedule.annual_payment;
                prop_assert!(rel < 1e-6, "year {:?} payment {} vs {}", y.year, y.payment, schedule.annual_payment);
            }
        }
    }
}
