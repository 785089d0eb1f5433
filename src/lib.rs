//! `aqi-healthflow`: air-quality feature derivation and health-risk scoring.
//!
//! The engine (`features`, `pipeline`) is pure and synchronous. The remaining
//! modules are the service shell around it: configuration, persistence, the
//! pollution API collector, the model boundary and the HTTP routes.

pub mod collector;
pub mod config;
pub mod error;
pub mod features;
pub mod models;
pub mod pipeline;
pub mod predictor;
pub mod routes;
pub mod sample;
pub mod schema;
pub mod store;

pub use config::Config;
pub use error::{ModelError, ValidationError};
pub use models::{City, Pollutants, PredictionRequest, RawReading, Reading};
