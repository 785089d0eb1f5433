//! Batch mode: derive the full feature table from historical readings.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::features::{health_risk_score, temporal, PollutionFeatures, TimeFeatures};
use crate::models::{City, Reading};

use super::{FeatureRecord, FeatureVector, REFERENCE_COLUMNS};

/// Shortest city series that can yield any temporal feature.
pub const MIN_SERIES_LEN: usize = 2;

// ---

/// Counts of rows removed for missing history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub input_rows: usize,
    pub kept_rows: usize,
    pub dropped_rows: usize,
    /// Rows dropped per city, including cities dropped entirely
    pub dropped_by_city: BTreeMap<City, usize>,
    /// Cities whose whole series was shorter than [`MIN_SERIES_LEN`]
    pub insufficient_history: Vec<City>,
}

/// Derived records with complete temporal features, grouped by city and
/// ordered by timestamp within each city.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureTable {
    rows: Vec<FeatureRecord>,
}

/// Result of a batch run.
#[derive(Debug, Clone)]
pub struct BatchOutput {
    pub table: FeatureTable,
    pub report: PruneReport,
}

/// Numeric reference columns for drift monitoring, column-major.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceData {
    pub rows: usize,
    pub columns: BTreeMap<String, Vec<f64>>,
}

impl FeatureTable {
    /// Wrap rows that were already derived, e.g. loaded back from storage.
    pub fn from_rows(rows: Vec<FeatureRecord>) -> Self {
        FeatureTable { rows }
    }

    pub fn rows(&self) -> &[FeatureRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows of one city, in series order.
    pub fn city_rows(&self, city: City) -> impl Iterator<Item = &FeatureRecord> {
        self.rows.iter().filter(move |r| r.reading.city == city)
    }

    /// The last record of each city present in the table.
    pub fn latest_per_city(&self) -> Vec<&FeatureRecord> {
        // ---
        let mut latest: BTreeMap<City, &FeatureRecord> = BTreeMap::new();
        for row in &self.rows {
            latest.insert(row.reading.city, row);
        }
        latest.into_values().collect()
    }

    /// Model input matrix, one vector per row.
    pub fn feature_matrix(&self) -> Vec<FeatureVector> {
        self.rows.iter().filter_map(FeatureRecord::feature_vector).collect()
    }

    /// Reference slice for drift monitoring: the most recent `limit` rows by
    /// timestamp (all rows when `None`).
    pub fn reference(&self, limit: Option<usize>) -> ReferenceData {
        // ---
        let mut ordered: Vec<&FeatureRecord> = self.rows.iter().collect();
        ordered.sort_by_key(|r| r.reading.timestamp);
        let skip = limit.map_or(0, |n| ordered.len().saturating_sub(n));
        let slice = &ordered[skip..];

        let columns = REFERENCE_COLUMNS
            .iter()
            .map(|&column| {
                let values = slice
                    .iter()
                    .filter_map(|r| r.reference_value(column))
                    .collect();
                (column.to_string(), values)
            })
            .collect();

        ReferenceData {
            rows: slice.len(),
            columns,
        }
    }
}

/// Run every deriver over the full reading table.
///
/// Per-reading stages run first; temporal aggregation runs last over each
/// city's stably ordered series. Records with an undefined lag are pruned
/// afterwards and counted in the returned [`PruneReport`].
pub fn run_batch(readings: Vec<Reading>) -> BatchOutput {
    // ---
    info!("Running batch feature pipeline over {} readings", readings.len());

    debug!("Batch stage 1: time, pollution and health-risk features");
    let per_reading: Vec<(TimeFeatures, PollutionFeatures, f64)> = readings
        .iter()
        .map(|r| {
            (
                TimeFeatures::from_timestamp(&r.timestamp),
                PollutionFeatures::derive(&r.pollutants),
                health_risk_score(&r.pollutants),
            )
        })
        .collect();

    debug!("Batch stage 2: temporal features per city");
    let mut report = PruneReport {
        input_rows: readings.len(),
        ..PruneReport::default()
    };
    let mut rows = Vec::with_capacity(readings.len());

    for (city, indices) in temporal::order_by_city(&readings) {
        // ---
        if indices.len() < MIN_SERIES_LEN {
            info!(
                "Dropping {} row(s) for {}: insufficient history",
                indices.len(),
                city
            );
            report.insufficient_history.push(city);
            report.dropped_by_city.insert(city, indices.len());
            continue;
        }

        let series: Vec<&Reading> = indices.iter().map(|&i| &readings[i]).collect();
        let lags = temporal::series_features(&series);

        let mut dropped = 0;
        for (&i, lags) in indices.iter().zip(lags) {
            if !lags.is_complete() {
                dropped += 1;
                continue;
            }
            let (time, pollution, score) = per_reading[i];
            rows.push(FeatureRecord {
                reading: readings[i].clone(),
                time,
                pollution,
                health_risk_score: score,
                temporal: lags,
            });
        }

        debug!(
            "{}: {} row(s), {} dropped for missing lags",
            city,
            indices.len(),
            dropped
        );
        if dropped > 0 {
            report.dropped_by_city.insert(city, dropped);
        }
    }

    report.kept_rows = rows.len();
    report.dropped_rows = report.input_rows - report.kept_rows;

    info!(
        "Batch pipeline complete: kept {} of {} rows, dropped {} ({} short cities)",
        report.kept_rows,
        report.input_rows,
        report.dropped_rows,
        report.insufficient_history.len()
    );

    BatchOutput {
        table: FeatureTable { rows },
        report,
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::Pollutants;
    use chrono::{Duration, TimeZone, Utc};

    fn hourly(city: City, n: usize) -> Vec<Reading> {
        // ---
        let start = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| Reading {
                timestamp: start + Duration::hours(i as i64),
                city,
                pollutants: Pollutants {
                    pm2_5: 10.0 + i as f64,
                    pm10: 20.0 + i as f64,
                    no2: 5.0,
                    so2: 2.0,
                    o3: 30.0,
                    co: 200.0,
                    nh3: 4.0,
                    no: 0.3,
                },
                aqi: 1.0 + (i % 5) as f64,
            })
            .collect()
    }

    #[test]
    fn test_rows_before_lag_24_are_pruned() {
        // ---
        let output = run_batch(hourly(City::Lahore, 30));

        assert_eq!(output.report.input_rows, 30);
        assert_eq!(output.report.kept_rows, 6);
        assert_eq!(output.report.dropped_rows, 24);
        assert_eq!(output.report.dropped_by_city[&City::Lahore], 24);
        assert!(output.report.insufficient_history.is_empty());

        let first = &output.table.rows()[0];
        assert_eq!(first.reading.pollutants.pm2_5, 34.0);
        assert_eq!(first.temporal.pm2_5_lag_1h, Some(33.0));
        assert_eq!(first.temporal.pm2_5_lag_24h, Some(10.0));
    }

    #[test]
    fn test_single_point_city_dropped_entirely() {
        // ---
        let mut readings = hourly(City::Karachi, 26);
        readings.extend(hourly(City::Multan, 1));
        let output = run_batch(readings);

        assert_eq!(output.report.insufficient_history, vec![City::Multan]);
        assert_eq!(output.report.dropped_by_city[&City::Multan], 1);
        assert_eq!(output.table.city_rows(City::Multan).count(), 0);
        assert_eq!(output.table.city_rows(City::Karachi).count(), 2);
    }

    #[test]
    fn test_empty_input() {
        // ---
        let output = run_batch(Vec::new());
        assert!(output.table.is_empty());
        assert_eq!(output.report, PruneReport::default());
    }

    #[test]
    fn test_latest_per_city() {
        // ---
        let mut readings = hourly(City::Lahore, 27);
        readings.extend(hourly(City::Islamabad, 25));
        let output = run_batch(readings);
        let latest = output.table.latest_per_city();

        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].reading.city, City::Lahore);
        assert_eq!(latest[0].reading.pollutants.pm2_5, 36.0);
        assert_eq!(latest[1].reading.city, City::Islamabad);
        assert_eq!(latest[1].reading.pollutants.pm2_5, 34.0);
    }

    #[test]
    fn test_reference_slice_takes_most_recent() {
        // ---
        let output = run_batch(hourly(City::Faisalabad, 30));
        let reference = output.table.reference(Some(2));

        assert_eq!(reference.rows, 2);
        assert_eq!(reference.columns.len(), REFERENCE_COLUMNS.len());
        assert_eq!(reference.columns["pm2_5"], vec![38.0, 39.0]);

        let all = output.table.reference(None);
        assert_eq!(all.rows, 6);
    }

    #[test]
    fn test_feature_matrix_covers_every_row() {
        // ---
        let output = run_batch(hourly(City::Lahore, 28));
        let matrix = output.table.feature_matrix();

        assert_eq!(matrix.len(), output.table.len());
        assert_eq!(matrix[0].get("pm2_5_lag_24h"), Some(10.0));
        assert_eq!(matrix[0].get("co"), Some(200.0));
    }
}
