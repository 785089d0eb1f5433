//! Serving mode: derive a model input from one request.
//!
//! A request carries no history, so the temporal columns need a policy.
//! [`LagSource::Approximated`] substitutes the request's own values (and a
//! fixed aqi placeholder); [`LagSource::CityHistory`] computes them from the
//! city's recent readings through the same aggregator the batch path uses.
//! The policy actually applied is returned with every record so callers can
//! tell an approximate vector from an exact one.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ValidationError;
use crate::features::temporal::MetricLags;
use crate::features::{
    health_risk_score, CityHistory, PollutionFeatures, TemporalFeatures, TimeFeatures,
};
use crate::models::{concentration, City, Pollutants, PredictionRequest, Reading};

use super::FeatureVector;

/// Stand-in for aqi lags when no history is available.
pub const SERVING_AQI_PLACEHOLDER: f64 = 50.0;

// ---

/// Which policy produced a serving record's temporal columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LagSource {
    /// Request values stand in for pm lags; aqi lags use the placeholder
    Approximated,
    /// Every temporal value was computed from the city's stored history
    CityHistory,
}

impl fmt::Display for LagSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LagSource::Approximated => f.write_str("approximated"),
            LagSource::CityHistory => f.write_str("city_history"),
        }
    }
}

impl FromStr for LagSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approximated" => Ok(LagSource::Approximated),
            "city_history" => Ok(LagSource::CityHistory),
            other => Err(format!(
                "unknown lag source '{}', expected 'approximated' or 'city_history'",
                other
            )),
        }
    }
}

/// Validated prediction request.
#[derive(Debug, Clone, PartialEq)]
pub struct ServingInput {
    pub city: City,
    /// nh3 and no are not part of the request and stay at zero
    pub pollutants: Pollutants,
    pub time: TimeFeatures,
    pub observed_at: DateTime<Utc>,
}

impl ServingInput {
    /// Validate a request. `month` and `observed_at` come from the caller's
    /// clock, not from the payload.
    pub fn from_request(
        req: &PredictionRequest,
        month: u32,
        observed_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        // ---
        let city = req.city.parse::<City>()?;
        let pollutants = Pollutants {
            pm2_5: concentration("pm2_5", req.pm2_5)?,
            pm10: concentration("pm10", req.pm10)?,
            no2: concentration("no2", req.no2)?,
            so2: concentration("so2", req.so2)?,
            o3: concentration("o3", req.o3)?,
            co: concentration("co", req.co)?,
            nh3: 0.0,
            no: 0.0,
        };
        let time = TimeFeatures::from_parts(req.hour, req.day_of_week, i64::from(month))?;

        Ok(ServingInput {
            city,
            pollutants,
            time,
            observed_at,
        })
    }
}

/// Serving-mode feature record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServingRecord {
    pub city: City,
    #[serde(flatten)]
    pub pollutants: Pollutants,
    #[serde(flatten)]
    pub time: TimeFeatures,
    #[serde(flatten)]
    pub pollution: PollutionFeatures,
    pub health_risk_score: f64,
    #[serde(flatten)]
    pub temporal: TemporalFeatures,
    pub lag_source: LagSource,
    #[serde(skip)]
    pub vector: FeatureVector,
}

/// Temporal columns under [`LagSource::Approximated`].
pub fn approximate_temporal(p: &Pollutants) -> TemporalFeatures {
    // ---
    let own = |v: f64| MetricLags {
        lag_1: Some(v),
        lag_24: Some(v),
        rolling_mean_24: v,
    };
    TemporalFeatures::from_metrics(own(p.pm2_5), own(p.pm10), own(SERVING_AQI_PLACEHOLDER))
}

/// Temporal columns computed from the city's history, possibly with
/// undefined lags when the history is short. `None` when the history does not
/// apply (another city, or empty).
fn history_temporal(input: &ServingInput, history: &CityHistory) -> Option<TemporalFeatures> {
    // ---
    if history.city() != input.city {
        return None;
    }
    // aqi is not observed at request time; carry the last stored value forward
    let aqi = history.latest()?.aqi;
    let incoming = Reading {
        timestamp: input.observed_at,
        city: input.city,
        pollutants: input.pollutants,
        aqi,
    };
    Some(history.features_for(&incoming))
}

/// Fill any undefined lag from the approximation.
fn fill_from(temporal: TemporalFeatures, fallback: &TemporalFeatures) -> TemporalFeatures {
    TemporalFeatures {
        pm2_5_lag_1h: temporal.pm2_5_lag_1h.or(fallback.pm2_5_lag_1h),
        pm2_5_lag_24h: temporal.pm2_5_lag_24h.or(fallback.pm2_5_lag_24h),
        pm10_lag_1h: temporal.pm10_lag_1h.or(fallback.pm10_lag_1h),
        pm10_lag_24h: temporal.pm10_lag_24h.or(fallback.pm10_lag_24h),
        aqi_lag_1h: temporal.aqi_lag_1h.or(fallback.aqi_lag_1h),
        aqi_lag_24h: temporal.aqi_lag_24h.or(fallback.aqi_lag_24h),
        ..temporal
    }
}

/// Derive the serving record for one request.
///
/// With `history` absent, empty or of another city, the temporal columns
/// follow [`LagSource::Approximated`]. A short history still contributes the
/// values it can define; the record is then reported as approximated.
pub fn derive_serving(input: &ServingInput, history: Option<&CityHistory>) -> ServingRecord {
    // ---
    let p = &input.pollutants;
    let pollution = PollutionFeatures::derive(p);
    let score = health_risk_score(p);
    let approximation = approximate_temporal(p);

    let (temporal, lag_source) = match history.and_then(|h| history_temporal(input, h)) {
        Some(t) if t.is_complete() => (t, LagSource::CityHistory),
        Some(t) => (fill_from(t, &approximation), LagSource::Approximated),
        None => (approximation, LagSource::Approximated),
    };

    debug!(
        "Serving features for {} derived with lag source {}",
        input.city, lag_source
    );

    let lags = [
        temporal.pm2_5_lag_1h.unwrap_or(p.pm2_5),
        temporal.pm2_5_lag_24h.unwrap_or(p.pm2_5),
        temporal.pm2_5_rolling_mean_24h,
        temporal.aqi_lag_1h.unwrap_or(SERVING_AQI_PLACEHOLDER),
        temporal.aqi_lag_24h.unwrap_or(SERVING_AQI_PLACEHOLDER),
    ];
    let vector = FeatureVector::new(p, &input.time, &pollution, score, lags);

    ServingRecord {
        city: input.city,
        pollutants: *p,
        time: input.time,
        pollution,
        health_risk_score: score,
        temporal,
        lag_source,
        vector,
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{Duration, TimeZone};

    fn request(city: &str) -> PredictionRequest {
        // ---
        PredictionRequest {
            pm2_5: 80.0,
            pm10: 120.0,
            no2: 20.0,
            so2: 10.0,
            o3: 50.0,
            co: 300.0,
            city: city.to_string(),
            hour: 8,
            day_of_week: 6,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 8, 0, 0).unwrap()
    }

    fn input(city: &str) -> ServingInput {
        ServingInput::from_request(&request(city), 6, now()).unwrap()
    }

    fn history(city: City, n: usize) -> CityHistory {
        // ---
        let mut h = CityHistory::new(city);
        for i in 0..n {
            h.push(Reading {
                timestamp: now() - Duration::hours((n - i) as i64),
                city,
                pollutants: Pollutants {
                    pm2_5: i as f64,
                    pm10: 2.0 * i as f64,
                    ..Pollutants::default()
                },
                aqi: 1.0 + (i % 5) as f64,
            });
        }
        h
    }

    #[test]
    fn test_approximated_policy() {
        // ---
        let record = derive_serving(&input("Lahore"), None);

        assert_eq!(record.lag_source, LagSource::Approximated);
        assert_eq!(record.vector.get("pm2_5_lag_1h"), Some(80.0));
        assert_eq!(record.vector.get("pm2_5_lag_24h"), Some(80.0));
        assert_eq!(record.vector.get("pm2_5_rolling_mean_24h"), Some(80.0));
        assert_eq!(record.vector.get("aqi_lag_1h"), Some(SERVING_AQI_PLACEHOLDER));
        assert_eq!(record.vector.get("aqi_lag_24h"), Some(SERVING_AQI_PLACEHOLDER));
        assert_eq!(record.temporal.pm10_lag_1h, Some(120.0));
    }

    #[test]
    fn test_calendar_and_pollution_columns() {
        // ---
        let record = derive_serving(&input("Lahore"), None);

        assert_eq!(record.vector.get("hour"), Some(8.0));
        assert_eq!(record.vector.get("day_of_week"), Some(6.0));
        assert_eq!(record.vector.get("month"), Some(6.0));
        assert_eq!(record.vector.get("is_weekend"), Some(1.0));
        assert_eq!(record.vector.get("is_rush_hour"), Some(1.0));
        assert_eq!(record.vector.get("co"), Some(300.0));
        assert!((record.health_risk_score - 40.511_111).abs() < 1e-5);
        assert_eq!(record.vector.get("health_risk_score"), Some(record.health_risk_score));
        assert!((record.pollution.pm_ratio - 80.0 / 121.0).abs() < 1e-12);
    }

    #[test]
    fn test_full_history_yields_exact_lags() {
        // ---
        let h = history(City::Karachi, 24);
        let record = derive_serving(&input("Karachi"), Some(&h));

        assert_eq!(record.lag_source, LagSource::CityHistory);
        assert_eq!(record.temporal.pm2_5_lag_1h, Some(23.0));
        assert_eq!(record.temporal.pm2_5_lag_24h, Some(0.0));
        assert_eq!(record.temporal.aqi_lag_1h, Some(1.0 + (23 % 5) as f64));
        assert_eq!(record.temporal.aqi_lag_24h, Some(1.0));

        // Window: history positions 1..=23 plus the incoming 80.0
        let expected = ((1..=23).sum::<i32>() as f64 + 80.0) / 24.0;
        assert!((record.temporal.pm2_5_rolling_mean_24h - expected).abs() < 1e-9);
    }

    #[test]
    fn test_short_history_falls_back_per_value() {
        // ---
        let h = history(City::Karachi, 3);
        let record = derive_serving(&input("Karachi"), Some(&h));

        assert_eq!(record.lag_source, LagSource::Approximated);
        assert_eq!(record.temporal.pm2_5_lag_1h, Some(2.0));
        assert_eq!(record.temporal.pm2_5_lag_24h, Some(80.0));
        assert_eq!(record.temporal.aqi_lag_24h, Some(SERVING_AQI_PLACEHOLDER));
        assert_eq!(record.vector.get("pm2_5_lag_1h"), Some(2.0));
    }

    #[test]
    fn test_foreign_or_empty_history_is_ignored() {
        // ---
        let foreign = history(City::Multan, 24);
        let record = derive_serving(&input("Karachi"), Some(&foreign));
        assert_eq!(record.lag_source, LagSource::Approximated);
        assert_eq!(record.temporal.pm2_5_lag_1h, Some(80.0));

        let empty = CityHistory::new(City::Karachi);
        let record = derive_serving(&input("Karachi"), Some(&empty));
        assert_eq!(record.lag_source, LagSource::Approximated);
    }

    #[test]
    fn test_request_validation() {
        // ---
        let mut req = request("Lahore");
        req.o3 = -3.0;
        assert!(matches!(
            ServingInput::from_request(&req, 1, now()),
            Err(ValidationError::Negative { field: "o3", .. })
        ));

        let mut req = request("Lahore");
        req.hour = 25;
        assert!(matches!(
            ServingInput::from_request(&req, 1, now()),
            Err(ValidationError::OutOfRange { field: "hour", .. })
        ));

        assert!(matches!(
            ServingInput::from_request(&request("Peshawar"), 1, now()),
            Err(ValidationError::UnknownCity(_))
        ));
    }

    #[test]
    fn test_lag_source_parsing() {
        // ---
        assert_eq!("approximated".parse::<LagSource>(), Ok(LagSource::Approximated));
        assert_eq!("city_history".parse::<LagSource>(), Ok(LagSource::CityHistory));
        assert!("history".parse::<LagSource>().is_err());
        assert_eq!(LagSource::CityHistory.to_string(), "city_history");
    }
}
