//! Per-city lag and rolling-window aggregates.
//!
//! All computation here operates on a single city's series that has already
//! been ordered by timestamp. Grouping and ordering live in
//! [`order_by_city`] so that the batch pipeline and the history-backed
//! serving path share one definition.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::models::{City, Reading};

/// Short lag, in ordered positions.
pub const LAG_SHORT: usize = 1;

/// Long lag, in ordered positions.
pub const LAG_LONG: usize = 24;

/// Trailing window of the rolling mean, current point included.
pub const ROLLING_WINDOW: usize = 24;

/// Readings retained per city by [`CityHistory`].
pub const HISTORY_CAPACITY: usize = LAG_LONG;

// ---

/// Columns that receive temporal aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Pm2_5,
    Pm10,
    Aqi,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Pm2_5, Metric::Pm10, Metric::Aqi];

    pub fn value(&self, r: &Reading) -> f64 {
        match self {
            Metric::Pm2_5 => r.pollutants.pm2_5,
            Metric::Pm10 => r.pollutants.pm10,
            Metric::Aqi => r.aqi,
        }
    }
}

/// `values[i - k]`, or `None` while fewer than `k` earlier points exist.
pub fn lag(values: &[f64], k: usize) -> Vec<Option<f64>> {
    // ---
    (0..values.len())
        .map(|i| i.checked_sub(k).map(|j| values[j]))
        .collect()
}

/// Mean of `values[max(0, i + 1 - window)..=i]`.
///
/// The window shrinks near the start of the series, so every position has a
/// value, unlike [`lag`].
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    // ---
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let slice = &values[start..=i];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// Lag and rolling values of one metric at one position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricLags {
    pub lag_1: Option<f64>,
    pub lag_24: Option<f64>,
    pub rolling_mean_24: f64,
}

/// Temporal columns of a feature record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemporalFeatures {
    pub pm2_5_lag_1h: Option<f64>,
    pub pm2_5_lag_24h: Option<f64>,
    pub pm2_5_rolling_mean_24h: f64,
    pub pm10_lag_1h: Option<f64>,
    pub pm10_lag_24h: Option<f64>,
    pub pm10_rolling_mean_24h: f64,
    pub aqi_lag_1h: Option<f64>,
    pub aqi_lag_24h: Option<f64>,
    pub aqi_rolling_mean_24h: f64,
}

impl TemporalFeatures {
    pub fn from_metrics(pm2_5: MetricLags, pm10: MetricLags, aqi: MetricLags) -> Self {
        TemporalFeatures {
            pm2_5_lag_1h: pm2_5.lag_1,
            pm2_5_lag_24h: pm2_5.lag_24,
            pm2_5_rolling_mean_24h: pm2_5.rolling_mean_24,
            pm10_lag_1h: pm10.lag_1,
            pm10_lag_24h: pm10.lag_24,
            pm10_rolling_mean_24h: pm10.rolling_mean_24,
            aqi_lag_1h: aqi.lag_1,
            aqi_lag_24h: aqi.lag_24,
            aqi_rolling_mean_24h: aqi.rolling_mean_24,
        }
    }

    /// True when every lag is defined.
    pub fn is_complete(&self) -> bool {
        [
            self.pm2_5_lag_1h,
            self.pm2_5_lag_24h,
            self.pm10_lag_1h,
            self.pm10_lag_24h,
            self.aqi_lag_1h,
            self.aqi_lag_24h,
        ]
        .iter()
        .all(Option::is_some)
    }
}

/// Temporal features for every position of one city's ordered series.
pub fn series_features(series: &[&Reading]) -> Vec<TemporalFeatures> {
    // ---
    let per_metric: Vec<Vec<MetricLags>> = Metric::ALL
        .iter()
        .map(|metric| {
            let values: Vec<f64> = series.iter().map(|r| metric.value(r)).collect();
            let lag_1 = lag(&values, LAG_SHORT);
            let lag_24 = lag(&values, LAG_LONG);
            let rolling = rolling_mean(&values, ROLLING_WINDOW);

            (0..values.len())
                .map(|i| MetricLags {
                    lag_1: lag_1[i],
                    lag_24: lag_24[i],
                    rolling_mean_24: rolling[i],
                })
                .collect()
        })
        .collect();

    (0..series.len())
        .map(|i| {
            TemporalFeatures::from_metrics(per_metric[0][i], per_metric[1][i], per_metric[2][i])
        })
        .collect()
}

/// Group reading indices by city, each group stably sorted by timestamp.
///
/// Equal timestamps keep their ingestion order.
pub fn order_by_city(readings: &[Reading]) -> BTreeMap<City, Vec<usize>> {
    // ---
    let mut groups: BTreeMap<City, Vec<usize>> = BTreeMap::new();
    for (i, r) in readings.iter().enumerate() {
        groups.entry(r.city).or_default().push(i);
    }
    for indices in groups.values_mut() {
        indices.sort_by_key(|&i| readings[i].timestamp);
    }
    groups
}

/// Bounded, ordered tail of a single city's series.
///
/// Holds at most [`HISTORY_CAPACITY`] readings, oldest first.
#[derive(Debug, Clone)]
pub struct CityHistory {
    city: City,
    readings: VecDeque<Reading>,
}

impl CityHistory {
    pub fn new(city: City) -> Self {
        CityHistory {
            city,
            readings: VecDeque::with_capacity(HISTORY_CAPACITY + 1),
        }
    }

    /// Build from arbitrary readings: other cities are ignored, the rest are
    /// ordered the same way the batch pipeline orders them.
    pub fn from_readings(city: City, readings: &[Reading]) -> Self {
        // ---
        let mut history = CityHistory::new(city);
        if let Some(indices) = order_by_city(readings).get(&city) {
            for &i in indices {
                history.push(readings[i].clone());
            }
        }
        history
    }

    /// Append the newest reading, evicting the oldest beyond capacity.
    /// Readings of another city are ignored.
    pub fn push(&mut self, reading: Reading) {
        // ---
        if reading.city != self.city {
            tracing::warn!(
                "Ignoring {} reading pushed into {} history",
                reading.city,
                self.city
            );
            return;
        }
        self.readings.push_back(reading);
        while self.readings.len() > HISTORY_CAPACITY {
            self.readings.pop_front();
        }
    }

    pub fn city(&self) -> City {
        self.city
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }

    /// Temporal features of `incoming` as if it were appended to this history.
    pub fn features_for(&self, incoming: &Reading) -> TemporalFeatures {
        // ---
        let mut series: Vec<&Reading> = self.readings.iter().collect();
        series.push(incoming);
        let features = series_features(&series);
        // Non-empty: `incoming` was just pushed.
        features[features.len() - 1]
    }
}
