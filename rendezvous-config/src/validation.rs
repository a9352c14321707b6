// Configuration validation

use crate::{ConfigError, Result};
use std::time::Duration;

/// Implemented by settings structs that have cross-field rules
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Reusable validation rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a value is not empty
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
        Ok(())
    }

    /// Validate that a number is within range
    pub fn in_range<T: PartialOrd + std::fmt::Debug>(
        value: T,
        min: T,
        max: T,
        field: &str,
    ) -> Result<()> {
        if value < min || value > max {
            return Err(ConfigError::ValidationError(format!(
                "{} must be between {:?} and {:?}, got {:?}",
                field, min, max, value
            )));
        }
        Ok(())
    }

    /// Validate that a duration is not zero
    pub fn non_zero(value: Duration, field: &str) -> Result<()> {
        if value.is_zero() {
            return Err(ConfigError::ValidationError(format!(
                "{} must be greater than zero",
                field
            )));
        }
        Ok(())
    }

    /// Validate that `value` does not exceed `limit`
    pub fn at_most(value: Duration, limit: Duration, field: &str, limit_field: &str) -> Result<()> {
        if value > limit {
            return Err(ConfigError::ValidationError(format!(
                "{} ({:?}) must not exceed {} ({:?})",
                field, value, limit_field, limit
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_empty_validation() {
        assert!(ConfigValidator::not_empty("x-request-id", "header").is_ok());
        assert!(ConfigValidator::not_empty("  ", "header").is_err());
    }

    #[test]
    fn test_range_validation() {
        assert!(ConfigValidator::in_range(5, 1, 10, "field").is_ok());
        assert!(ConfigValidator::in_range(0, 1, 10, "field").is_err());
        assert!(ConfigValidator::in_range(11, 1, 10, "field").is_err());
    }

    #[test]
    fn test_duration_rules() {
        assert!(ConfigValidator::non_zero(Duration::from_millis(1), "interval").is_ok());
        assert!(ConfigValidator::non_zero(Duration::ZERO, "interval").is_err());

        let second = Duration::from_secs(1);
        assert!(ConfigValidator::at_most(second, second, "interval", "timeout").is_ok());
        let err = ConfigValidator::at_most(second * 2, second, "interval", "timeout").unwrap_err();
        assert!(err.to_string().contains("must not exceed timeout"));
    }
}
