//! Collector for the OpenWeather air-pollution API.
//!
//! Polls current conditions for every registry city and turns each response
//! into a validated [`Reading`]. A failing city is logged and skipped so one
//! bad response never loses the others.

use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::DateTime;
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::models::{City, RawReading, Reading};

/// Pause between cities, to stay under the API's rate limit.
const REQUEST_SPACING: Duration = Duration::from_secs(1);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---

#[derive(Debug, Deserialize)]
struct AirPollutionResponse {
    list: Vec<AirPollutionEntry>,
}

#[derive(Debug, Deserialize)]
struct AirPollutionEntry {
    dt: i64,
    main: AirPollutionMain,
    components: Components,
}

#[derive(Debug, Deserialize)]
struct AirPollutionMain {
    aqi: f64,
}

#[derive(Debug, Deserialize)]
struct Components {
    co: Option<f64>,
    no: Option<f64>,
    no2: Option<f64>,
    o3: Option<f64>,
    so2: Option<f64>,
    pm2_5: Option<f64>,
    pm10: Option<f64>,
    nh3: Option<f64>,
}

/// Convert an API response body into an unvalidated reading for `city`.
pub fn parse_response(city: City, body: &serde_json::Value) -> Result<RawReading> {
    // ---
    let response: AirPollutionResponse = serde_json::from_value(body.clone())?;
    let entry = response
        .list
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("response for {} has an empty 'list'", city))?;

    let timestamp = DateTime::from_timestamp(entry.dt, 0)
        .ok_or_else(|| anyhow!("invalid timestamp {} for {}", entry.dt, city))?;
    let c = entry.components;

    Ok(RawReading {
        timestamp: Some(timestamp),
        city: Some(city.as_str().to_string()),
        aqi: Some(entry.main.aqi),
        pm2_5: c.pm2_5,
        pm10: c.pm10,
        no2: c.no2,
        so2: c.so2,
        o3: c.o3,
        co: c.co,
        nh3: c.nh3,
        no: c.no,
    })
}

/// HTTP client for the pollution API, built once and shared.
#[derive(Debug, Clone)]
pub struct Collector {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl Collector {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        // ---
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Collector {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Fetch and validate the current reading of one city.
    pub async fn fetch_city(&self, city: City) -> Result<Reading> {
        // ---
        let (lat, lon) = city.coordinates();
        debug!("Fetching air pollution for {} ({}, {})", city, lat, lon);

        let body: serde_json::Value = self
            .client
            .get(&self.api_url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let raw = parse_response(city, &body)?;
        Ok(Reading::try_from(raw)?)
    }

    /// Fetch every registry city in turn, skipping failures.
    pub async fn collect_all(&self) -> Vec<Reading> {
        // ---
        let mut readings = Vec::with_capacity(City::ALL.len());

        for (i, city) in City::ALL.into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(REQUEST_SPACING).await;
            }
            match self.fetch_city(city).await {
                Ok(reading) => readings.push(reading),
                Err(e) => error!("Failed to collect {}: {}", city, e),
            }
        }

        info!(
            "Collected {} of {} cities",
            readings.len(),
            City::ALL.len()
        );
        readings
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    fn body() -> serde_json::Value {
        // ---
        json!({
            "coord": { "lon": 74.3436, "lat": 31.5497 },
            "list": [{
                "main": { "aqi": 4 },
                "components": {
                    "co": 1201.63, "no": 0.35, "no2": 35.99, "o3": 41.84,
                    "so2": 17.17, "pm2_5": 88.4, "pm10": 131.2, "nh3": 12.5
                },
                "dt": 1742995200
            }]
        })
    }

    #[test]
    fn test_parse_response() {
        // ---
        let raw = parse_response(City::Lahore, &body()).unwrap();
        let reading = Reading::try_from(raw).unwrap();

        assert_eq!(reading.city, City::Lahore);
        assert_eq!(reading.aqi, 4.0);
        assert_eq!(reading.pollutants.pm2_5, 88.4);
        assert_eq!(reading.pollutants.nh3, 12.5);
        assert_eq!(reading.timestamp.timestamp(), 1742995200);
    }

    #[test]
    fn test_missing_component_fails_validation() {
        // ---
        let mut body = body();
        body["list"][0]["components"]
            .as_object_mut()
            .unwrap()
            .remove("pm10");

        let raw = parse_response(City::Karachi, &body).unwrap();
        assert!(Reading::try_from(raw).is_err());
    }

    #[test]
    fn test_empty_list_is_an_error() {
        // ---
        let err = parse_response(City::Multan, &json!({ "list": [] })).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}
