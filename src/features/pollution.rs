//! Aggregate pollution features and the pm2.5 severity bucket.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::Pollutants;

// ---

/// Severity bucket assigned from pm2.5 concentration.
///
/// Variants are declared from least to most severe, so the derived ordering
/// follows severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PollutionLevel {
    Good,
    Moderate,
    #[serde(rename = "Unhealthy_Sensitive")]
    UnhealthySensitive,
    Unhealthy,
    #[serde(rename = "Very_Unhealthy")]
    VeryUnhealthy,
}

impl PollutionLevel {
    /// Lower bound (inclusive) of each bucket; the last bucket nominally ends
    /// at 1000.
    const BREAKPOINTS: [(f64, PollutionLevel); 5] = [
        (150.0, PollutionLevel::VeryUnhealthy),
        (55.0, PollutionLevel::Unhealthy),
        (35.0, PollutionLevel::UnhealthySensitive),
        (12.0, PollutionLevel::Moderate),
        (0.0, PollutionLevel::Good),
    ];

    /// Bucket a pm2.5 value using half-open `[lo, hi)` intervals.
    ///
    /// Values at or above 1000 clamp to `VeryUnhealthy`. Negative values never
    /// reach this point (rejected at ingestion) and fall into `Good`.
    pub fn from_pm2_5(pm2_5: f64) -> Self {
        // ---
        Self::BREAKPOINTS
            .iter()
            .find(|(lo, _)| pm2_5 >= *lo)
            .map(|(_, level)| *level)
            .unwrap_or(PollutionLevel::Good)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PollutionLevel::Good => "Good",
            PollutionLevel::Moderate => "Moderate",
            PollutionLevel::UnhealthySensitive => "Unhealthy_Sensitive",
            PollutionLevel::Unhealthy => "Unhealthy",
            PollutionLevel::VeryUnhealthy => "Very_Unhealthy",
        }
    }

    /// Inverse of [`PollutionLevel::label`].
    pub fn from_label(label: &str) -> Option<Self> {
        // ---
        Self::BREAKPOINTS
            .iter()
            .map(|(_, level)| *level)
            .find(|level| level.label() == label)
    }

    /// Ordinal code, 0 for `Good` through 4 for `VeryUnhealthy`.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for PollutionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Pollution-derived fields of a feature record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PollutionFeatures {
    pub total_pollution: f64,
    pub pm_ratio: f64,
    pub pollution_level: PollutionLevel,
}

impl PollutionFeatures {
    pub fn derive(p: &Pollutants) -> Self {
        // ---
        PollutionFeatures {
            total_pollution: total_pollution(p),
            pm_ratio: pm_ratio(p.pm2_5, p.pm10),
            pollution_level: PollutionLevel::from_pm2_5(p.pm2_5),
        }
    }
}

/// Sum of the five regulated pollutants (co, nh3 and no excluded).
pub fn total_pollution(p: &Pollutants) -> f64 {
    p.pm2_5 + p.pm10 + p.no2 + p.so2 + p.o3
}

/// Fine-to-coarse particulate ratio, offset by one in the denominator.
pub fn pm_ratio(pm2_5: f64, pm10: f64) -> f64 {
    pm2_5 / (pm10 + 1.0)
}
