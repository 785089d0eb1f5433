//! Prediction model boundary.
//!
//! Training happens elsewhere; this service only loads a model artifact and
//! checks that its declared inputs match [`FEATURE_COLUMNS`] exactly before
//! accepting it.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::pipeline::{FeatureVector, FEATURE_COLUMNS};

// ---

/// A model that predicts next-hour AQI from a feature vector.
pub trait AqiModel: Send + Sync {
    /// Input columns, in the order the model expects them.
    fn columns(&self) -> &[String];

    fn predict(&self, features: &FeatureVector) -> Result<f64, ModelError>;
}

/// Linear regression artifact: `intercept + Σ weight·feature`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub columns: Vec<String>,
    pub weights: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    /// Load a JSON artifact and verify its schema.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        // ---
        let data = fs::read_to_string(path.as_ref())?;
        let model: LinearModel = serde_json::from_str(&data)?;
        model.validate()?;
        Ok(model)
    }

    /// Reject models whose columns differ from the feature columns.
    pub fn validate(&self) -> Result<(), ModelError> {
        // ---
        if self.columns.iter().map(String::as_str).ne(FEATURE_COLUMNS.iter().copied()) {
            return Err(ModelError::SchemaMismatch {
                expected: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
                actual: self.columns.clone(),
            });
        }
        if self.weights.len() != self.columns.len() {
            return Err(ModelError::WeightCount {
                columns: self.columns.len(),
                weights: self.weights.len(),
            });
        }
        Ok(())
    }
}

impl AqiModel for LinearModel {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn predict(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        // ---
        let x = features.as_slice();
        if x.len() != self.weights.len() {
            return Err(ModelError::InputLength {
                expected: self.weights.len(),
                actual: x.len(),
            });
        }
        Ok(self.intercept + self.weights.iter().zip(x).map(|(w, v)| w * v).sum::<f64>())
    }
}
