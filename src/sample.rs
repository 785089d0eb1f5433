//! Synthetic hourly history for the registry cities.
//!
//! Lets the pipeline run end to end without a pollution API key. Each city
//! has its own base pm2.5 level and spread. Rush hours run 30% higher,
//! weekdays 20% higher and weekends 20% lower.

use chrono::{DateTime, Datelike, Duration, Utc};
use rand::Rng;
use tracing::info;

use crate::features::time::RUSH_HOURS;
use crate::models::{City, Pollutants, Reading};

/// Longest history the generator will produce in one call.
pub const MAX_SAMPLE_DAYS: u32 = 365;

/// Floor of every generated pm2.5 value.
const MIN_PM2_5: f64 = 5.0;

// ---

/// Base pm2.5 level and standard deviation of a city.
fn profile(city: City) -> (f64, f64) {
    match city {
        City::Lahore => (80.0, 30.0),
        City::Karachi => (60.0, 20.0),
        City::Islamabad => (50.0, 15.0),
        City::Faisalabad => (70.0, 25.0),
        City::Multan => (75.0, 28.0),
    }
}

/// Gaussian noise with mean zero (Box-Muller).
fn noise(rng: &mut impl Rng, std_dev: f64) -> f64 {
    // ---
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    std_dev * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// AQI index (1..=5) implied by a pm2.5 concentration.
pub fn sample_aqi(pm2_5: f64) -> f64 {
    ((pm2_5 / 30.0).floor() + 1.0).clamp(1.0, 5.0)
}

/// `days` of hourly readings for every city, ending one day before `end`.
///
/// Cities are emitted one after another, each in ascending time order.
pub fn generate_history(days: u32, end: DateTime<Utc>, rng: &mut impl Rng) -> Vec<Reading> {
    // ---
    let mut readings = Vec::with_capacity(City::ALL.len() * days as usize * 24);

    for city in City::ALL {
        let (base, spread) = profile(city);

        for day in 0..days {
            for hour in 0..24u32 {
                let timestamp = end
                    - Duration::days(i64::from(days - day))
                    - Duration::hours(i64::from(24 - hour));

                let rush_factor = if RUSH_HOURS.contains(&hour) { 1.3 } else { 1.0 };
                let weekday = timestamp.weekday().num_days_from_monday() < 5;
                let weekday_factor = if weekday { 1.2 } else { 0.8 };

                let pm2_5 =
                    (base * rush_factor * weekday_factor + noise(rng, spread)).max(MIN_PM2_5);
                let pm10 = (pm2_5 * 1.5 + noise(rng, 10.0)).max(0.0);

                readings.push(Reading {
                    timestamp,
                    city,
                    pollutants: Pollutants {
                        pm2_5,
                        pm10,
                        no2: (20.0 + noise(rng, 10.0)).max(0.0),
                        so2: (10.0 + noise(rng, 5.0)).max(0.0),
                        o3: (50.0 + noise(rng, 20.0)).max(0.0),
                        co: (200.0 + noise(rng, 50.0)).max(0.0),
                        nh3: (5.0 + noise(rng, 2.0)).max(0.0),
                        no: (0.5 + noise(rng, 0.2)).max(0.0),
                    },
                    aqi: sample_aqi(pm2_5),
                });
            }
        }
    }

    info!(
        "Generated {} sample readings ({} days, {} cities)",
        readings.len(),
        days,
        City::ALL.len()
    );
    readings
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::RawReading;
    use crate::pipeline::run_batch;
    use chrono::TimeZone;
    use rand::{rngs::StdRng, SeedableRng};

    fn end() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap()
    }

    fn mean_pm2_5(readings: &[Reading], city: City) -> f64 {
        // ---
        let values: Vec<f64> = readings
            .iter()
            .filter(|r| r.city == city)
            .map(|r| r.pollutants.pm2_5)
            .collect();
        values.iter().sum::<f64>() / values.len() as f64
    }

    #[test]
    fn test_one_reading_per_city_hour() {
        // ---
        let readings = generate_history(3, end(), &mut StdRng::seed_from_u64(7));
        assert_eq!(readings.len(), City::ALL.len() * 3 * 24);

        for city in City::ALL {
            let series: Vec<&Reading> = readings.iter().filter(|r| r.city == city).collect();
            assert_eq!(series.len(), 72);
            assert_eq!(series[0].timestamp, end() - Duration::days(3) - Duration::hours(24));
            for pair in series.windows(2) {
                assert_eq!(pair[1].timestamp - pair[0].timestamp, Duration::hours(1));
            }
        }
    }

    #[test]
    fn test_values_pass_validation() {
        // ---
        let readings = generate_history(7, end(), &mut StdRng::seed_from_u64(11));

        for r in &readings {
            let p = &r.pollutants;
            assert!(p.pm2_5 >= MIN_PM2_5);
            assert!((1.0..=5.0).contains(&r.aqi));
            assert_eq!(r.aqi, sample_aqi(p.pm2_5));

            let raw = RawReading {
                timestamp: Some(r.timestamp),
                city: Some(r.city.to_string()),
                aqi: Some(r.aqi),
                pm2_5: Some(p.pm2_5),
                pm10: Some(p.pm10),
                no2: Some(p.no2),
                so2: Some(p.so2),
                o3: Some(p.o3),
                co: Some(p.co),
                nh3: Some(p.nh3),
                no: Some(p.no),
            };
            assert_eq!(Reading::try_from(raw).as_ref(), Ok(r));
        }
    }

    #[test]
    fn test_city_profiles_differ() {
        // ---
        let readings = generate_history(30, end(), &mut StdRng::seed_from_u64(3));
        assert!(mean_pm2_5(&readings, City::Lahore) > mean_pm2_5(&readings, City::Islamabad));
    }

    #[test]
    fn test_same_seed_same_history() {
        // ---
        let a = generate_history(2, end(), &mut StdRng::seed_from_u64(42));
        let b = generate_history(2, end(), &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_sample_aqi_bands() {
        // ---
        assert_eq!(sample_aqi(5.0), 1.0);
        assert_eq!(sample_aqi(29.9), 1.0);
        assert_eq!(sample_aqi(30.0), 2.0);
        assert_eq!(sample_aqi(119.0), 4.0);
        assert_eq!(sample_aqi(500.0), 5.0);
    }

    #[test]
    fn test_two_days_feed_the_batch_pipeline() {
        // ---
        let output = run_batch(generate_history(2, end(), &mut StdRng::seed_from_u64(1)));

        assert_eq!(output.report.input_rows, 5 * 48);
        assert_eq!(output.report.kept_rows, 5 * 24);
        assert!(output.report.insufficient_history.is_empty());
    }
}
