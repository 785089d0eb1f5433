//! Feature derivers: calendar, pollution, health risk and temporal aggregates.
//!
//! Every function in this module tree is pure. Persistence and network access
//! belong to the callers in `pipeline`, `store` and `routes`.

pub mod pollution;
pub mod risk;
pub mod temporal;
pub mod time;

pub use pollution::{PollutionFeatures, PollutionLevel};
pub use risk::{health_risk_score, RiskLevel};
pub use temporal::{CityHistory, TemporalFeatures};
pub use time::TimeFeatures;
