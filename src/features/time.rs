//! Calendar features derived from a reading's timestamp.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Hours of day treated as rush hour.
pub const RUSH_HOURS: [u32; 6] = [7, 8, 9, 17, 18, 19];

// ---

/// Calendar fields appended to every derived record.
///
/// `day_of_week` counts from Monday (0) to Sunday (6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeFeatures {
    pub hour: u32,
    pub day_of_week: u32,
    pub month: u32,
    pub is_weekend: bool,
    pub is_rush_hour: bool,
}

impl TimeFeatures {
    /// Derive all calendar fields from a UTC instant.
    pub fn from_timestamp(ts: &DateTime<Utc>) -> Self {
        // ---
        Self::assemble(ts.hour(), ts.weekday().num_days_from_monday(), ts.month())
    }

    /// Build from caller-supplied calendar parts, as the prediction endpoint
    /// receives them.
    pub fn from_parts(hour: i64, day_of_week: i64, month: i64) -> Result<Self, ValidationError> {
        // ---
        let hour = in_range("hour", hour, 0, 23)?;
        let day_of_week = in_range("day_of_week", day_of_week, 0, 6)?;
        let month = in_range("month", month, 1, 12)?;
        Ok(Self::assemble(hour, day_of_week, month))
    }

    fn assemble(hour: u32, day_of_week: u32, month: u32) -> Self {
        TimeFeatures {
            hour,
            day_of_week,
            month,
            is_weekend: day_of_week >= 5,
            is_rush_hour: RUSH_HOURS.contains(&hour),
        }
    }
}

fn in_range(field: &'static str, value: i64, min: i64, max: i64) -> Result<u32, ValidationError> {
    // ---
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(value as u32)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_calendar_fields() {
        // ---
        // 2025-03-26 is a Wednesday
        let ts = Utc.with_ymd_and_hms(2025, 3, 26, 18, 45, 0).unwrap();
        let t = TimeFeatures::from_timestamp(&ts);

        assert_eq!(t.hour, 18);
        assert_eq!(t.day_of_week, 2);
        assert_eq!(t.month, 3);
        assert!(!t.is_weekend);
        assert!(t.is_rush_hour);
    }

    #[test]
    fn test_weekend_numbering() {
        // ---
        let saturday = Utc.with_ymd_and_hms(2025, 3, 29, 12, 0, 0).unwrap();
        let sunday = Utc.with_ymd_and_hms(2025, 3, 30, 12, 0, 0).unwrap();
        let monday = Utc.with_ymd_and_hms(2025, 3, 31, 12, 0, 0).unwrap();

        assert_eq!(TimeFeatures::from_timestamp(&saturday).day_of_week, 5);
        assert!(TimeFeatures::from_timestamp(&saturday).is_weekend);
        assert_eq!(TimeFeatures::from_timestamp(&sunday).day_of_week, 6);
        assert!(TimeFeatures::from_timestamp(&sunday).is_weekend);
        assert_eq!(TimeFeatures::from_timestamp(&monday).day_of_week, 0);
        assert!(!TimeFeatures::from_timestamp(&monday).is_weekend);
    }

    #[test]
    fn test_rush_hours() {
        // ---
        for hour in 0..24 {
            let ts = Utc.with_ymd_and_hms(2025, 1, 6, hour, 0, 0).unwrap();
            let expected = matches!(hour, 7 | 8 | 9 | 17 | 18 | 19);
            assert_eq!(TimeFeatures::from_timestamp(&ts).is_rush_hour, expected, "hour {hour}");
        }
    }

    #[test]
    fn test_from_parts_matches_timestamp() {
        // ---
        let ts = Utc.with_ymd_and_hms(2025, 11, 8, 7, 30, 0).unwrap();
        let from_ts = TimeFeatures::from_timestamp(&ts);
        let from_parts = TimeFeatures::from_parts(7, 5, 11).unwrap();
        assert_eq!(from_ts, from_parts);
    }

    #[test]
    fn test_from_parts_rejects_out_of_range() {
        // ---
        assert!(TimeFeatures::from_parts(24, 0, 1).is_err());
        assert!(TimeFeatures::from_parts(-1, 0, 1).is_err());
        assert!(TimeFeatures::from_parts(0, 7, 1).is_err());
        assert!(TimeFeatures::from_parts(0, 0, 0).is_err());
        assert!(TimeFeatures::from_parts(0, 0, 13).is_err());
    }
}
