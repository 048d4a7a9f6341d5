pub mod analysis;
pub mod assumptions;
pub mod config;
pub mod error;
pub mod monte_carlo;
pub mod mortgage;
pub mod profile;
pub mod rates;
pub mod sensitivity;
pub mod simulation;
pub mod types;

pub use error::{ConfigurationError, Error, Result, ValidationError};
