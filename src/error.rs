//! Error types for the feature engine and its model boundary.
//!
//! The engine itself never performs I/O, so everything here is deterministic:
//! the same input always yields the same error.

use thiserror::Error;

// ---

/// A reading or serving request that must not reach the feature derivers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A required field was absent from the payload
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A concentration (or aqi) was below zero
    #[error("{field} must be non-negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    /// A concentration (or aqi) was NaN or infinite
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },

    /// City is not part of the registry
    #[error("unknown city: {0}")]
    UnknownCity(String),

    /// A calendar field supplied by the caller is out of range
    #[error("{field} out of range: {value} (expected {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
}

/// Errors raised while loading or running the prediction model.
#[derive(Error, Debug)]
pub enum ModelError {
    /// The model declares input columns that differ from the feature columns
    #[error("model columns differ from feature columns: expected {expected:?}, got {actual:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// Weight vector length differs from the declared columns
    #[error("model has {columns} columns but {weights} weights")]
    WeightCount { columns: usize, weights: usize },

    /// Feature vector passed to `predict` has the wrong length
    #[error("expected {expected} features, got {actual}")]
    InputLength { expected: usize, actual: usize },

    /// Model file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Model file is not valid JSON
    #[error("invalid model file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_validation_messages() {
        // ---
        let err = ValidationError::Negative {
            field: "pm10",
            value: -1.5,
        };
        assert_eq!(err.to_string(), "pm10 must be non-negative, got -1.5");

        let err = ValidationError::MissingField("pm2_5");
        assert!(err.to_string().contains("pm2_5"));

        let err = ValidationError::OutOfRange {
            field: "hour",
            value: 24,
            min: 0,
            max: 23,
        };
        assert_eq!(err.to_string(), "hour out of range: 24 (expected 0..=23)");
    }

    #[test]
    fn test_model_error_from_io() {
        // ---
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "model.json");
        let err: ModelError = io.into();
        assert!(err.to_string().contains("I/O error"));
        assert!(err.to_string().contains("model.json"));
    }
}
