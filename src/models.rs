//! Data models for the air-quality pipeline.
//!
//! `RawReading` is what arrives from the collector, the ingest endpoint or the
//! `aqi_readings` table. `Reading` is the validated form, the only shape the
//! feature derivers accept.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ---

/// Registry of monitored cities.
///
/// Declaration order is the canonical ordering used when grouping series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum City {
    Lahore,
    Karachi,
    Islamabad,
    Faisalabad,
    Multan,
}

impl City {
    pub const ALL: [City; 5] = [
        City::Lahore,
        City::Karachi,
        City::Islamabad,
        City::Faisalabad,
        City::Multan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            City::Lahore => "Lahore",
            City::Karachi => "Karachi",
            City::Islamabad => "Islamabad",
            City::Faisalabad => "Faisalabad",
            City::Multan => "Multan",
        }
    }

    /// (latitude, longitude) used when polling the pollution API.
    pub fn coordinates(&self) -> (f64, f64) {
        match self {
            City::Lahore => (31.5497, 74.3436),
            City::Karachi => (24.8607, 67.0011),
            City::Islamabad => (33.6844, 73.0479),
            City::Faisalabad => (31.4504, 73.1350),
            City::Multan => (30.1575, 71.5249),
        }
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for City {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        City::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownCity(s.to_string()))
    }
}

/// Pollutant concentrations of a single observation (µg/m³).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pollutants {
    pub pm2_5: f64,
    pub pm10: f64,
    pub no2: f64,
    pub so2: f64,
    pub o3: f64,
    pub co: f64,
    pub nh3: f64,
    pub no: f64,
}

/// Unvalidated reading as supplied by a collaborator.
///
/// Every field is optional so that a missing value surfaces as a
/// [`ValidationError::MissingField`] rather than an opaque decode failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct RawReading {
    // ---
    pub timestamp: Option<DateTime<Utc>>,
    pub city: Option<String>,
    pub aqi: Option<f64>,
    pub pm2_5: Option<f64>,
    pub pm10: Option<f64>,
    pub no2: Option<f64>,
    pub so2: Option<f64>,
    pub o3: Option<f64>,
    pub co: Option<f64>,
    pub nh3: Option<f64>,
    pub no: Option<f64>,
}

/// Payload of the prediction endpoint: a single reading without history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    // ---
    pub pm2_5: f64,
    pub pm10: f64,
    pub no2: f64,
    pub so2: f64,
    pub o3: f64,
    pub co: f64,
    pub city: String,
    pub hour: i64,
    pub day_of_week: i64,
}

/// Validated pollutant observation for one city at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub city: City,
    #[serde(flatten)]
    pub pollutants: Pollutants,
    pub aqi: f64,
}

/// Reject absent, negative, NaN and infinite concentrations.
pub(crate) fn require_concentration(
    field: &'static str,
    value: Option<f64>,
) -> Result<f64, ValidationError> {
    // ---
    let value = value.ok_or(ValidationError::MissingField(field))?;
    concentration(field, value)
}

pub(crate) fn concentration(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    // ---
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { field });
    }
    if value < 0.0 {
        return Err(ValidationError::Negative { field, value });
    }
    Ok(value)
}

impl TryFrom<RawReading> for Reading {
    type Error = ValidationError;

    fn try_from(raw: RawReading) -> Result<Self, Self::Error> {
        // ---
        let timestamp = raw
            .timestamp
            .ok_or(ValidationError::MissingField("timestamp"))?;
        let city = raw
            .city
            .as_deref()
            .ok_or(ValidationError::MissingField("city"))?
            .parse::<City>()?;

        let pollutants = Pollutants {
            pm2_5: require_concentration("pm2_5", raw.pm2_5)?,
            pm10: require_concentration("pm10", raw.pm10)?,
            no2: require_concentration("no2", raw.no2)?,
            so2: require_concentration("so2", raw.so2)?,
            o3: require_concentration("o3", raw.o3)?,
            co: require_concentration("co", raw.co)?,
            nh3: require_concentration("nh3", raw.nh3)?,
            no: require_concentration("no", raw.no)?,
        };

        Ok(Reading {
            timestamp,
            city,
            pollutants,
            aqi: require_concentration("aqi", raw.aqi)?,
        })
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    fn create_test_raw_reading(city: &str, pm2_5: f64) -> RawReading {
        // ---
        RawReading {
            timestamp: Some(Utc.with_ymd_and_hms(2025, 3, 26, 18, 0, 0).unwrap()),
            city: Some(city.to_string()),
            aqi: Some(3.0),
            pm2_5: Some(pm2_5),
            pm10: Some(120.0),
            no2: Some(20.0),
            so2: Some(10.0),
            o3: Some(50.0),
            co: Some(200.0),
            nh3: Some(5.0),
            no: Some(0.5),
        }
    }

    #[test]
    fn test_valid_reading_is_accepted() {
        // ---
        let reading = Reading::try_from(create_test_raw_reading("Lahore", 80.0)).unwrap();

        assert_eq!(reading.city, City::Lahore);
        assert_eq!(reading.pollutants.pm2_5, 80.0);
        assert_eq!(reading.pollutants.pm10, 120.0);
        assert_eq!(reading.aqi, 3.0);
    }

    #[test]
    fn test_negative_concentration_rejected() {
        // ---
        let mut raw = create_test_raw_reading("Lahore", 80.0);
        raw.so2 = Some(-0.1);

        assert_eq!(
            Reading::try_from(raw),
            Err(ValidationError::Negative {
                field: "so2",
                value: -0.1
            })
        );
    }

    #[test]
    fn test_nan_and_infinite_rejected() {
        // ---
        let mut raw = create_test_raw_reading("Karachi", f64::NAN);
        assert_eq!(
            Reading::try_from(raw.clone()),
            Err(ValidationError::NotFinite { field: "pm2_5" })
        );

        raw.pm2_5 = Some(10.0);
        raw.aqi = Some(f64::INFINITY);
        assert_eq!(
            Reading::try_from(raw),
            Err(ValidationError::NotFinite { field: "aqi" })
        );
    }

    #[test]
    fn test_missing_fields_rejected() {
        // ---
        let mut raw = create_test_raw_reading("Multan", 10.0);
        raw.pm10 = None;
        assert_eq!(
            Reading::try_from(raw),
            Err(ValidationError::MissingField("pm10"))
        );

        let mut raw = create_test_raw_reading("Multan", 10.0);
        raw.timestamp = None;
        assert_eq!(
            Reading::try_from(raw),
            Err(ValidationError::MissingField("timestamp"))
        );
    }

    #[test]
    fn test_unknown_city_rejected() {
        // ---
        let raw = create_test_raw_reading("Quetta", 10.0);
        assert_eq!(
            Reading::try_from(raw),
            Err(ValidationError::UnknownCity("Quetta".to_string()))
        );
    }

    #[test]
    fn test_city_round_trips_through_str() {
        // ---
        for city in City::ALL {
            assert_eq!(city.as_str().parse::<City>().unwrap(), city);
        }
    }

    #[test]
    fn test_zero_concentrations_are_valid() {
        // ---
        let mut raw = create_test_raw_reading("Islamabad", 0.0);
        raw.pm10 = Some(0.0);
        raw.no = Some(0.0);
        assert!(Reading::try_from(raw).is_ok());
    }
}
