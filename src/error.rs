/// Unknown identifiers or malformed catalog data, detected at resolution time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("unknown scenario `{id}`")]
    UnknownScenario { id: String },

    #[error("unknown region `{id}`")]
    UnknownRegion { id: String },

    #[error("unknown assumption field `{name}`")]
    UnknownField { name: String },

    #[error("assumption field `{field}` is not set by globals, scenario, region or overrides")]
    MissingField { field: &'static str },

    #[error("unknown Monte Carlo profile `{name}`")]
    UnknownProfile { name: String },

    #[error("field `{field}` has non-finite value {value}")]
    NonFiniteValue { field: String, value: f64 },

    #[error("catalog could not be parsed: {reason}")]
    Malformed { reason: String },
}

/// Out-of-domain run parameters supplied by the caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("horizon must be positive, got {horizon}")]
    NonPositiveHorizon { horizon: u32 },

    #[error("mortgage term must be positive when principal is {principal}")]
    NonPositiveTerm { principal: f64 },

    #[error("mortgage principal must be positive, got {principal}")]
    NonPositivePrincipal { principal: f64 },

    #[error("mortgage rate must be non-negative, got {rate}")]
    NegativeRate { rate: f64 },

    #[error("home price must be positive, got {price}")]
    NonPositivePrice { price: f64 },

    #[error("down payment {down_payment} must lie within [0, {price})")]
    DownPaymentOutOfRange { down_payment: f64, price: f64 },

    #[error("trial count must be positive")]
    ZeroTrials,

    #[error("unknown rent basis `{value}` (expected market, match_mortgage or match_owner_cost)")]
    UnknownRentBasis { value: String },

    #[error("unknown filing status `{value}` (expected single or married)")]
    UnknownFilingStatus { value: String },

    #[error("rate path has {actual} years, horizon is {expected}")]
    RatePathLength { expected: usize, actual: usize },

    #[error("{name} scale must be finite and non-negative, got {value}")]
    InvalidScale { name: &'static str, value: f64 },

    #[error("autocorrelation must lie within (-1, 1), got {value}")]
    InvalidAutocorrelation { value: f64 },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
