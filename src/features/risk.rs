//! Health-risk score and the risk label attached to predicted AQI.
//!
//! [`health_risk_score`] is the only implementation of the score; the batch
//! pipeline and the prediction endpoint both call it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::Pollutants;

// ---

/// Weighted pollutant contributions, clipped to `[0, 100]`.
///
/// Each term reaches its full weight at the pollutant's reference maximum:
/// pm2.5 150 (40), pm10 250 (30), no2 200 (15), o3 180 (10), so2 100 (5).
pub fn health_risk_score(p: &Pollutants) -> f64 {
    // ---
    let raw = (p.pm2_5 / 150.0 * 40.0)
        + (p.pm10 / 250.0 * 30.0)
        + (p.no2 / 200.0 * 15.0)
        + (p.o3 / 180.0 * 10.0)
        + (p.so2 / 100.0 * 5.0);

    raw.clamp(0.0, 100.0)
}

/// Risk label derived from a predicted AQI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    /// `<=100` Low, `(100,150]` Moderate, `(150,200]` High, `>200` Critical.
    pub fn from_predicted_aqi(aqi: f64) -> Self {
        // ---
        if aqi > 200.0 {
            RiskLevel::Critical
        } else if aqi > 150.0 {
            RiskLevel::High
        } else if aqi > 100.0 {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::High => "High",
            RiskLevel::Critical => "Critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
