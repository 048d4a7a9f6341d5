use serde::Serialize;

use crate::error::{ConfigurationError, ValidationError};

/// Preset pair of uncertainty scales. Presets are plain values; callers pick
/// one by name and may fine-tune its scales.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonteCarloProfile {
    pub name: &'static str,
    /// Multiplies each rate's structural standard deviation (Stage A).
    pub parameter_uncertainty_scale: f64,
    /// Multiplies each rate's year-to-year volatility (Stage B).
    pub path_volatility_scale: f64,
}

impl MonteCarloProfile {
    pub const BASELINE: MonteCarloProfile = MonteCarloProfile {
        name: "Baseline",
        parameter_uncertainty_scale: 1.0,
        path_volatility_scale: 1.0,
    };

    pub const CONSERVATIVE: MonteCarloProfile = MonteCarloProfile {
        name: "Conservative",
        parameter_uncertainty_scale: 0.75,
        path_volatility_scale: 0.75,
    };

    pub const VOLATILE: MonteCarloProfile = MonteCarloProfile {
        name: "Volatile",
        parameter_uncertainty_scale: 1.25,
        path_volatility_scale: 1.25,
    };

    pub const STRESS: MonteCarloProfile = MonteCarloProfile {
        name: "Stress",
        parameter_uncertainty_scale: 1.5,
        path_volatility_scale: 1.75,
    };

    pub const PRESETS: [MonteCarloProfile; 4] = [
        MonteCarloProfile::BASELINE,
        MonteCarloProfile::CONSERVATIVE,
        MonteCarloProfile::VOLATILE,
        MonteCarloProfile::STRESS,
    ];

    /// Case-insensitive preset lookup.
    pub fn named(name: &str) -> Result<Self, ConfigurationError> {
        Self::PRESETS
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ConfigurationError::UnknownProfile { name: name.to_string() })
    }

    pub fn with_parameter_scale(mut self, scale: f64) -> Result<Self, ValidationError> {
        self.parameter_uncertainty_scale = checked_scale("parameter uncertainty", scale)?;
        Ok(self)
    }

    pub fn with_path_scale(mut self, scale: f64) -> Result<Self, ValidationError> {
        self.path_volatility_scale = checked_scale("path volatility", scale)?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        checked_scale("parameter uncertainty", self.parameter_uncertainty_scale)?;
        checked_scale("path volatility", self.path_volatility_scale)?;
        Ok(())
    }
}

impl Default for MonteCarloProfile {
    fn default() -> Self {
        MonteCarloProfile::BASELINE
    }
}

fn checked_scale(name: &'static str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ValidationError::InvalidScale { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_selected_by_name() {
        assert_eq!(MonteCarloProfile::named("stress").unwrap(), MonteCarloProfile::STRESS);
        assert_eq!(MonteCarloProfile::named("Baseline").unwrap(), MonteCarloProfile::BASELINE);
        assert_eq!(
            MonteCarloProfile::named("Calm").unwrap_err(),
            ConfigurationError::UnknownProfile { name: "Calm".into() }
        );
    }

    #[test]
    fn fine_tuning_keeps_the_name() {
        let p = MonteCarloProfile::VOLATILE.with_path_scale(2.0).unwrap();
        assert_eq!(p.name, "Volatile");
        assert_eq!(p.path_volatility_scale, 2.0);
        assert_eq!(p.parameter_uncertainty_scale, 1.25);
    }

    #[test]
    fn negative_or_nan_scales_are_rejected() {
        assert!(MonteCarloProfile::BASELINE.with_parameter_scale(-0.1).is_err());
        assert!(MonteCarloProfile::BASELINE.with_path_scale(f64::NAN).is_err());
        assert!(MonteCarloProfile::BASELINE.with_path_scale(0.0).is_ok());
    }
}
