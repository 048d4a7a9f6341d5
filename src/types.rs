use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// One-based simulated year. Year 1 is the first year after purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Year(pub u32);

impl Year {
    /// Zero-based offset into per-year sequences (rate paths, schedules).
    /// `None` for `Year(0)`, which precedes the first simulated year.
    pub fn index(self) -> Option<usize> {
        (self.0 as usize).checked_sub(1)
    }

    pub fn from_index(index: usize) -> Self {
        Year(index as u32 + 1)
    }
}

/// Monte Carlo trial index within a run, `0..N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TrialId(pub u64);

/// How the renter's year-1 rent is fixed. From year 2 rent compounds on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentBasis {
    /// Region market rent carried in the assumptions.
    Market,
    /// Equal to the owner's year-1 mortgage payment.
    MatchMortgage,
    /// Equal to the owner's full year-1 cash outflow.
    MatchOwnerCost,
}

impl RentBasis {
    pub const ALL: [RentBasis; 3] =
        [RentBasis::Market, RentBasis::MatchMortgage, RentBasis::MatchOwnerCost];

    pub fn as_str(self) -> &'static str {
        match self {
            RentBasis::Market => "market",
            RentBasis::MatchMortgage => "match_mortgage",
            RentBasis::MatchOwnerCost => "match_owner_cost",
        }
    }
}

impl fmt::Display for RentBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RentBasis {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RentBasis::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownRentBasis { value: s.to_string() })
    }
}

/// Tax filing status. Only selects the standard deduction used when
/// approximating the mortgage-interest deduction benefit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilingStatus {
    Single,
    Married,
}

impl FilingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FilingStatus::Single => "single",
            FilingStatus::Married => "married",
        }
    }
}

impl fmt::Display for FilingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilingStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(FilingStatus::Single),
            "married" => Ok(FilingStatus::Married),
            other => Err(ValidationError::UnknownFilingStatus { value: other.to_string() }),
        }
    }
}

/// Caller-supplied regime controls. Never sourced from scenario or region data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Regime {
    pub rent_basis: RentBasis,
    pub filing_status: FilingStatus,
    pub sell_at_end: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_index_round_trips() {
        assert_eq!(Year(1).index(), Some(0));
        assert_eq!(Year::from_index(29), Year(30));
        assert_eq!(Year::from_index(29).index(), Some(29));
    }

    #[test]
    fn year_zero_has_no_index() {
        assert_eq!(Year(0).index(), None);
    }

    #[test]
    fn rent_basis_parses_every_variant() {
        for basis in RentBasis::ALL {
            assert_eq!(basis.as_str().parse::<RentBasis>().unwrap(), basis);
        }
    }

    #[test]
    fn unknown_rent_basis_names_the_value() {
        let err = "mortgage_matched".parse::<RentBasis>().unwrap_err();
        assert_eq!(err, ValidationError::UnknownRentBasis { value: "mortgage_matched".into() });
    }

    #[test]
    fn filing_status_rejects_unknown() {
        assert_eq!("married".parse::<FilingStatus>().unwrap(), FilingStatus::Married);
        assert!(matches!(
            "joint".parse::<FilingStatus>(),
            Err(ValidationError::UnknownFilingStatus { .. })
        ));
    }
}
