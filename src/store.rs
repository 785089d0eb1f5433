//! PostgreSQL persistence for readings, the feature table and snapshots.
//!
//! Everything here is I/O around the pure engine: rows are validated back
//! into [`Reading`]s on load, and the feature table is written exactly as the
//! batch pipeline produced it.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::features::temporal::HISTORY_CAPACITY;
use crate::features::{
    CityHistory, PollutionFeatures, PollutionLevel, TemporalFeatures, TimeFeatures,
};
use crate::models::{City, RawReading, Reading};
use crate::pipeline::{snapshot_key, FeatureRecord, FeatureTable};

const READING_COLUMNS: &str = "timestamp, city, aqi, pm2_5, pm10, no2, so2, o3, co, nh3, no";

// ---

/// Insert validated readings in one transaction.
pub async fn insert_readings(pool: &PgPool, readings: &[Reading]) -> Result<usize> {
    // ---
    let mut tx = pool.begin().await?;

    for r in readings {
        let p = &r.pollutants;
        sqlx::query(
            r#"
            INSERT INTO aqi_readings (
                timestamp, city, aqi, pm2_5, pm10, no2, so2, o3, co, nh3, no
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(r.timestamp)
        .bind(r.city.as_str())
        .bind(r.aqi)
        .bind(p.pm2_5)
        .bind(p.pm10)
        .bind(p.no2)
        .bind(p.so2)
        .bind(p.o3)
        .bind(p.co)
        .bind(p.nh3)
        .bind(p.no)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    debug!("Inserted {} readings", readings.len());
    Ok(readings.len())
}

/// Validate stored rows, logging and skipping the ones that fail.
fn validate_rows(rows: Vec<RawReading>) -> Vec<Reading> {
    // ---
    let total = rows.len();
    let readings: Vec<Reading> = rows
        .into_iter()
        .filter_map(|raw| match Reading::try_from(raw) {
            Ok(r) => Some(r),
            Err(e) => {
                warn!("Skipping stored reading: {}", e);
                None
            }
        })
        .collect();

    if readings.len() < total {
        warn!("Rejected {} of {} stored readings", total - readings.len(), total);
    }
    readings
}

/// Load every stored reading in ingestion order.
pub async fn load_readings(pool: &PgPool) -> Result<Vec<Reading>> {
    // ---
    let sql = format!("SELECT {} FROM aqi_readings ORDER BY id", READING_COLUMNS);
    let rows: Vec<RawReading> = sqlx::query_as(&sql).fetch_all(pool).await?;
    Ok(validate_rows(rows))
}

/// Most recent readings of one city, bounded to the history capacity.
pub async fn load_city_history(pool: &PgPool, city: City) -> Result<CityHistory> {
    // ---
    let sql = format!(
        "SELECT {} FROM aqi_readings WHERE city = $1 ORDER BY timestamp DESC, id DESC LIMIT $2",
        READING_COLUMNS
    );
    let mut rows: Vec<RawReading> = sqlx::query_as(&sql)
        .bind(city.as_str())
        .bind(HISTORY_CAPACITY as i64)
        .fetch_all(pool)
        .await?;
    rows.reverse();

    let readings = validate_rows(rows);
    debug!("Loaded {} history readings for {}", readings.len(), city);
    Ok(CityHistory::from_readings(city, &readings))
}

/// One row of `aqi_features`, column for column.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
struct FeatureRow {
    row_index: i64,
    timestamp: DateTime<Utc>,
    city: String,
    aqi: f64,
    pm2_5: f64,
    pm10: f64,
    no2: f64,
    so2: f64,
    o3: f64,
    co: f64,
    nh3: f64,
    no: f64,
    hour: i32,
    day_of_week: i32,
    month: i32,
    is_weekend: bool,
    is_rush_hour: bool,
    total_pollution: f64,
    pm_ratio: f64,
    pollution_level: String,
    health_risk_score: f64,
    pm2_5_lag_1h: f64,
    pm2_5_lag_24h: f64,
    pm2_5_rolling_mean_24h: f64,
    pm10_lag_1h: f64,
    pm10_lag_24h: f64,
    pm10_rolling_mean_24h: f64,
    aqi_lag_1h: f64,
    aqi_lag_24h: f64,
    aqi_rolling_mean_24h: f64,
}

const FEATURE_ROW_COLUMNS: &str = "row_index, timestamp, city, aqi, \
    pm2_5, pm10, no2, so2, o3, co, nh3, no, \
    hour, day_of_week, month, is_weekend, is_rush_hour, \
    total_pollution, pm_ratio, pollution_level, health_risk_score, \
    pm2_5_lag_1h, pm2_5_lag_24h, pm2_5_rolling_mean_24h, \
    pm10_lag_1h, pm10_lag_24h, pm10_rolling_mean_24h, \
    aqi_lag_1h, aqi_lag_24h, aqi_rolling_mean_24h";

impl FeatureRow {
    /// Flatten a record for storage. Only complete records are stored.
    fn from_record(row_index: usize, record: &FeatureRecord) -> Result<Self> {
        // ---
        let r = &record.reading;
        let p = &r.pollutants;
        let t = &record.temporal;
        let lag = |name: &str, value: Option<f64>| {
            value.ok_or_else(|| anyhow!("feature row {} has no {}", row_index, name))
        };

        Ok(FeatureRow {
            row_index: i64::try_from(row_index)?,
            timestamp: r.timestamp,
            city: r.city.as_str().to_string(),
            aqi: r.aqi,
            pm2_5: p.pm2_5,
            pm10: p.pm10,
            no2: p.no2,
            so2: p.so2,
            o3: p.o3,
            co: p.co,
            nh3: p.nh3,
            no: p.no,
            hour: i32::try_from(record.time.hour)?,
            day_of_week: i32::try_from(record.time.day_of_week)?,
            month: i32::try_from(record.time.month)?,
            is_weekend: record.time.is_weekend,
            is_rush_hour: record.time.is_rush_hour,
            total_pollution: record.pollution.total_pollution,
            pm_ratio: record.pollution.pm_ratio,
            pollution_level: record.pollution.pollution_level.label().to_string(),
            health_risk_score: record.health_risk_score,
            pm2_5_lag_1h: lag("pm2_5_lag_1h", t.pm2_5_lag_1h)?,
            pm2_5_lag_24h: lag("pm2_5_lag_24h", t.pm2_5_lag_24h)?,
            pm2_5_rolling_mean_24h: t.pm2_5_rolling_mean_24h,
            pm10_lag_1h: lag("pm10_lag_1h", t.pm10_lag_1h)?,
            pm10_lag_24h: lag("pm10_lag_24h", t.pm10_lag_24h)?,
            pm10_rolling_mean_24h: t.pm10_rolling_mean_24h,
            aqi_lag_1h: lag("aqi_lag_1h", t.aqi_lag_1h)?,
            aqi_lag_24h: lag("aqi_lag_24h", t.aqi_lag_24h)?,
            aqi_rolling_mean_24h: t.aqi_rolling_mean_24h,
        })
    }

    /// Rebuild the record, re-validating the reading and calendar fields.
    fn into_record(self) -> Result<FeatureRecord> {
        // ---
        let reading = Reading::try_from(RawReading {
            timestamp: Some(self.timestamp),
            city: Some(self.city),
            aqi: Some(self.aqi),
            pm2_5: Some(self.pm2_5),
            pm10: Some(self.pm10),
            no2: Some(self.no2),
            so2: Some(self.so2),
            o3: Some(self.o3),
            co: Some(self.co),
            nh3: Some(self.nh3),
            no: Some(self.no),
        })?;
        let time = TimeFeatures::from_parts(
            i64::from(self.hour),
            i64::from(self.day_of_week),
            i64::from(self.month),
        )?;
        let pollution_level =
            PollutionLevel::from_label(&self.pollution_level).ok_or_else(|| {
                anyhow!(
                    "feature row {} has unknown pollution level '{}'",
                    self.row_index,
                    self.pollution_level
                )
            })?;

        Ok(FeatureRecord {
            reading,
            time,
            pollution: PollutionFeatures {
                total_pollution: self.total_pollution,
                pm_ratio: self.pm_ratio,
                pollution_level,
            },
            health_risk_score: self.health_risk_score,
            temporal: TemporalFeatures {
                pm2_5_lag_1h: Some(self.pm2_5_lag_1h),
                pm2_5_lag_24h: Some(self.pm2_5_lag_24h),
                pm2_5_rolling_mean_24h: self.pm2_5_rolling_mean_24h,
                pm10_lag_1h: Some(self.pm10_lag_1h),
                pm10_lag_24h: Some(self.pm10_lag_24h),
                pm10_rolling_mean_24h: self.pm10_rolling_mean_24h,
                aqi_lag_1h: Some(self.aqi_lag_1h),
                aqi_lag_24h: Some(self.aqi_lag_24h),
                aqi_rolling_mean_24h: self.aqi_rolling_mean_24h,
            },
        })
    }
}

/// Replace the persisted feature table with `table`.
pub async fn replace_feature_table(pool: &PgPool, table: &FeatureTable) -> Result<()> {
    // ---
    let rows = table
        .rows()
        .iter()
        .enumerate()
        .map(|(i, record)| FeatureRow::from_record(i, record))
        .collect::<Result<Vec<_>>>()?;

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM aqi_features")
        .execute(&mut *tx)
        .await?;

    for row in &rows {
        insert_feature_row(&mut tx, row).await?;
    }

    tx.commit().await?;
    info!("Feature table saved: {} rows", rows.len());
    Ok(())
}

async fn insert_feature_row(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    row: &FeatureRow,
) -> Result<()> {
    // ---
    let sql = format!(
        r#"
        INSERT INTO aqi_features ({}) VALUES (
            $1, $2, $3, $4,
            $5, $6, $7, $8, $9, $10, $11, $12,
            $13, $14, $15, $16, $17,
            $18, $19, $20, $21,
            $22, $23, $24,
            $25, $26, $27,
            $28, $29, $30
        )
        "#,
        FEATURE_ROW_COLUMNS
    );

    sqlx::query(&sql)
        .bind(row.row_index)
        .bind(row.timestamp)
        .bind(&row.city)
        .bind(row.aqi)
        .bind(row.pm2_5)
        .bind(row.pm10)
        .bind(row.no2)
        .bind(row.so2)
        .bind(row.o3)
        .bind(row.co)
        .bind(row.nh3)
        .bind(row.no)
        .bind(row.hour)
        .bind(row.day_of_week)
        .bind(row.month)
        .bind(row.is_weekend)
        .bind(row.is_rush_hour)
        .bind(row.total_pollution)
        .bind(row.pm_ratio)
        .bind(&row.pollution_level)
        .bind(row.health_risk_score)
        .bind(row.pm2_5_lag_1h)
        .bind(row.pm2_5_lag_24h)
        .bind(row.pm2_5_rolling_mean_24h)
        .bind(row.pm10_lag_1h)
        .bind(row.pm10_lag_24h)
        .bind(row.pm10_rolling_mean_24h)
        .bind(row.aqi_lag_1h)
        .bind(row.aqi_lag_24h)
        .bind(row.aqi_rolling_mean_24h)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Load the persisted feature table, as the last pipeline run wrote it.
///
/// With a `limit`, only the most recent `limit` rows by timestamp are read.
/// Rows keep their stored order either way.
pub async fn load_feature_table(pool: &PgPool, limit: Option<usize>) -> Result<FeatureTable> {
    // ---
    let limit = limit.map(i64::try_from).transpose()?;
    let sql = format!(
        r#"
        SELECT * FROM (
            SELECT {} FROM aqi_features
            ORDER BY timestamp DESC, row_index DESC
            LIMIT $1
        ) recent
        ORDER BY row_index
        "#,
        FEATURE_ROW_COLUMNS
    );
    let rows: Vec<FeatureRow> = sqlx::query_as(&sql).bind(limit).fetch_all(pool).await?;

    let records = rows
        .into_iter()
        .map(FeatureRow::into_record)
        .collect::<Result<Vec<_>>>()?;
    debug!("Loaded {} feature rows", records.len());
    Ok(FeatureTable::from_rows(records))
}

/// Expiry instant of a snapshot written at `now`.
fn snapshot_expiry(now: DateTime<Utc>, ttl_secs: u64) -> Result<DateTime<Utc>> {
    // ---
    let ttl = i64::try_from(ttl_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| anyhow!("snapshot TTL of {}s is out of range", ttl_secs))?;
    now.checked_add_signed(ttl)
        .ok_or_else(|| anyhow!("snapshot TTL of {}s overflows the clock", ttl_secs))
}

/// Upsert one snapshot per record under `aqi:latest:<city>`.
pub async fn write_snapshots(
    pool: &PgPool,
    latest: &[&FeatureRecord],
    ttl_secs: u64,
) -> Result<usize> {
    // ---
    let expires_at = snapshot_expiry(Utc::now(), ttl_secs)?;
    let mut tx = pool.begin().await?;

    for record in latest {
        let payload = serde_json::to_string(record)?;
        sqlx::query(
            r#"
            INSERT INTO aqi_latest (cache_key, city, payload, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (cache_key) DO UPDATE SET
                city = EXCLUDED.city,
                payload = EXCLUDED.payload,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(snapshot_key(record.reading.city))
        .bind(record.reading.city.as_str())
        .bind(payload)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!("Latest features cached for {} cities", latest.len());
    Ok(latest.len())
}

/// Snapshot of a city, or `None` when absent or expired.
pub async fn fetch_snapshot(pool: &PgPool, city: City) -> Result<Option<serde_json::Value>> {
    // ---
    let payload: Option<String> = sqlx::query_scalar(
        "SELECT payload FROM aqi_latest WHERE cache_key = $1 AND expires_at > now()",
    )
    .bind(snapshot_key(city))
    .fetch_optional(pool)
    .await?;

    payload
        .map(|p| serde_json::from_str(&p))
        .transpose()
        .map_err(Into::into)
}

/// Cheap connectivity check used by the health endpoint.
pub async fn ping(pool: &PgPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}
