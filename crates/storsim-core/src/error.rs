//! Construction-time validation errors.

use thiserror::Error;

/// An error returned when a component specification cannot describe a working component.
///
/// Estimation calls themselves are infallible: every precondition they rely on is checked here once.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum InvalidSpecError {
    /// A parameter used as a divisor or a count is zero or negative.
    #[error("{component}: {parameter} must be positive (got {value})")]
    NonPositive {
        /// Component being constructed.
        component: String,
        /// Offending parameter.
        parameter: &'static str,
        /// Supplied value.
        value: f64,
    },
    /// Parameters are individually valid but inconsistent with each other.
    #[error("{component}: {reason}")]
    Inconsistent {
        /// Component being constructed.
        component: String,
        /// Human-readable description of the inconsistency.
        reason: String,
    },
    /// A data-driven model lacks a required measurement.
    #[error("{component}: missing measurement `{key}`")]
    MissingMeasurement {
        /// Component being constructed.
        component: String,
        /// Lookup key of the absent measurement.
        key: String,
    },
}

/// Checks that `value` is strictly positive (and not NaN).
pub fn require_positive(component: &str, parameter: &'static str, value: f64) -> Result<(), InvalidSpecError> {
    if value > 0. {
        Ok(())
    } else {
        Err(InvalidSpecError::NonPositive {
            component: component.to_string(),
            parameter,
            value,
        })
    }
}
