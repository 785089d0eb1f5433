//! Feature pipeline orchestration.
//!
//! Composes the derivers in `features` in a fixed order: calendar, pollution
//! and health risk per reading, then temporal aggregates over each city's
//! ordered series. Two entry points share that composition:
//!
//! - [`batch::run_batch`] over the full historical table (exact lags)
//! - [`serving::derive_serving`] over a single request, with an explicit
//!   [`serving::LagSource`] policy for the temporal columns
//!
//! Both produce a [`FeatureVector`] whose layout is [`FEATURE_COLUMNS`].

use serde::{Deserialize, Serialize};

use crate::features::{PollutionFeatures, TemporalFeatures, TimeFeatures};
use crate::models::{City, Pollutants, Reading};

pub mod batch;
pub mod serving;

pub use batch::{run_batch, BatchOutput, FeatureTable, PruneReport, ReferenceData};
pub use serving::{derive_serving, LagSource, ServingInput, ServingRecord};

// ---

/// Model input columns, in order. A model trained on the feature table must
/// declare exactly this list.
pub const FEATURE_COLUMNS: [&str; 18] = [
    "pm2_5",
    "pm10",
    "no2",
    "so2",
    "o3",
    "co",
    "hour",
    "day_of_week",
    "month",
    "is_weekend",
    "is_rush_hour",
    "pm_ratio",
    "health_risk_score",
    "pm2_5_lag_1h",
    "pm2_5_lag_24h",
    "pm2_5_rolling_mean_24h",
    "aqi_lag_1h",
    "aqi_lag_24h",
];

/// Columns handed to drift monitoring as reference data.
pub const REFERENCE_COLUMNS: [&str; 7] = [
    "pm2_5",
    "pm10",
    "no2",
    "so2",
    "o3",
    "co",
    "health_risk_score",
];

/// Cache key under which a city's latest snapshot is stored.
pub fn snapshot_key(city: City) -> String {
    format!("aqi:latest:{}", city)
}

/// Numeric model input laid out as [`FEATURE_COLUMNS`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; FEATURE_COLUMNS.len()]);

impl FeatureVector {
    /// Build from resolved model lags, laid out as
    /// `[pm2_5_lag_1h, pm2_5_lag_24h, pm2_5_rolling_mean_24h, aqi_lag_1h, aqi_lag_24h]`.
    pub fn new(
        p: &Pollutants,
        time: &TimeFeatures,
        pollution: &PollutionFeatures,
        health_risk_score: f64,
        lags: [f64; 5],
    ) -> Self {
        // ---
        let [pm2_5_lag_1h, pm2_5_lag_24h, pm2_5_rolling, aqi_lag_1h, aqi_lag_24h] = lags;
        FeatureVector([
            p.pm2_5,
            p.pm10,
            p.no2,
            p.so2,
            p.o3,
            p.co,
            f64::from(time.hour),
            f64::from(time.day_of_week),
            f64::from(time.month),
            flag(time.is_weekend),
            flag(time.is_rush_hour),
            pollution.pm_ratio,
            health_risk_score,
            pm2_5_lag_1h,
            pm2_5_lag_24h,
            pm2_5_rolling,
            aqi_lag_1h,
            aqi_lag_24h,
        ])
    }

    /// Assemble the model input. Returns `None` if a model lag is undefined.
    pub fn assemble(
        p: &Pollutants,
        time: &TimeFeatures,
        pollution: &PollutionFeatures,
        health_risk_score: f64,
        temporal: &TemporalFeatures,
    ) -> Option<Self> {
        let lags = [
            temporal.pm2_5_lag_1h?,
            temporal.pm2_5_lag_24h?,
            temporal.pm2_5_rolling_mean_24h,
            temporal.aqi_lag_1h?,
            temporal.aqi_lag_24h?,
        ];
        Some(Self::new(p, time, pollution, health_risk_score, lags))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Value of a named column, if the name is one of [`FEATURE_COLUMNS`].
    pub fn get(&self, column: &str) -> Option<f64> {
        FEATURE_COLUMNS
            .iter()
            .position(|c| *c == column)
            .map(|i| self.0[i])
    }
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// A reading with every derived column appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    #[serde(flatten)]
    pub reading: Reading,
    #[serde(flatten)]
    pub time: TimeFeatures,
    #[serde(flatten)]
    pub pollution: PollutionFeatures,
    pub health_risk_score: f64,
    #[serde(flatten)]
    pub temporal: TemporalFeatures,
}

impl FeatureRecord {
    pub fn feature_vector(&self) -> Option<FeatureVector> {
        FeatureVector::assemble(
            &self.reading.pollutants,
            &self.time,
            &self.pollution,
            self.health_risk_score,
            &self.temporal,
        )
    }

    /// Value of a column listed in [`REFERENCE_COLUMNS`].
    pub fn reference_value(&self, column: &str) -> Option<f64> {
        // ---
        let p = &self.reading.pollutants;
        match column {
            "pm2_5" => Some(p.pm2_5),
            "pm10" => Some(p.pm10),
            "no2" => Some(p.no2),
            "so2" => Some(p.so2),
            "o3" => Some(p.o3),
            "co" => Some(p.co),
            "health_risk_score" => Some(self.health_risk_score),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::features::temporal::MetricLags;

    #[test]
    fn test_snapshot_key_pattern() {
        // ---
        assert_eq!(snapshot_key(City::Lahore), "aqi:latest:Lahore");
        assert_eq!(snapshot_key(City::Faisalabad), "aqi:latest:Faisalabad");
    }

    #[test]
    fn test_feature_columns_are_unique() {
        // ---
        let mut seen = std::collections::HashSet::new();
        for c in FEATURE_COLUMNS {
            assert!(seen.insert(c), "duplicate column {c}");
        }
    }

    #[test]
    fn test_reference_columns_resolve() {
        // ---
        let missing = MetricLags {
            lag_1: None,
            lag_24: None,
            rolling_mean_24: 0.0,
        };
        let record = FeatureRecord {
            reading: Reading {
                timestamp: chrono::Utc::now(),
                city: City::Multan,
                pollutants: Pollutants {
                    co: 7.0,
                    ..Pollutants::default()
                },
                aqi: 1.0,
            },
            time: TimeFeatures::from_parts(0, 0, 1).unwrap(),
            pollution: PollutionFeatures::derive(&Pollutants::default()),
            health_risk_score: 3.5,
            temporal: TemporalFeatures::from_metrics(missing, missing, missing),
        };

        for column in REFERENCE_COLUMNS {
            assert!(record.reference_value(column).is_some(), "{column}");
        }
        assert_eq!(record.reference_value("co"), Some(7.0));
        assert_eq!(record.reference_value("health_risk_score"), Some(3.5));
        assert_eq!(record.reference_value("hour"), None);
        assert!(record.feature_vector().is_none());
    }
}
