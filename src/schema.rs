//! Database schema management for `aqi-healthflow`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates `aqi_readings` for raw observations, `aqi_features` for the
/// feature table and `aqi_latest` for per-city snapshots with expiry. Safe to
/// call on every startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Raw readings as delivered by the collector or the ingest endpoint
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS aqi_readings (
            id          BIGSERIAL PRIMARY KEY,
            timestamp   TIMESTAMPTZ      NOT NULL,
            city        TEXT             NOT NULL,
            aqi         DOUBLE PRECISION NOT NULL,
            pm2_5       DOUBLE PRECISION NOT NULL,
            pm10        DOUBLE PRECISION NOT NULL,
            no2         DOUBLE PRECISION NOT NULL,
            so2         DOUBLE PRECISION NOT NULL,
            o3          DOUBLE PRECISION NOT NULL,
            co          DOUBLE PRECISION NOT NULL,
            nh3         DOUBLE PRECISION NOT NULL,
            no          DOUBLE PRECISION NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Feature table, replaced on every batch run
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS aqi_features (
            row_index               BIGINT           PRIMARY KEY,
            timestamp               TIMESTAMPTZ      NOT NULL,
            city                    TEXT             NOT NULL,
            aqi                     DOUBLE PRECISION NOT NULL,
            pm2_5                   DOUBLE PRECISION NOT NULL,
            pm10                    DOUBLE PRECISION NOT NULL,
            no2                     DOUBLE PRECISION NOT NULL,
            so2                     DOUBLE PRECISION NOT NULL,
            o3                      DOUBLE PRECISION NOT NULL,
            co                      DOUBLE PRECISION NOT NULL,
            nh3                     DOUBLE PRECISION NOT NULL,
            no                      DOUBLE PRECISION NOT NULL,
            hour                    INTEGER          NOT NULL,
            day_of_week             INTEGER          NOT NULL,
            month                   INTEGER          NOT NULL,
            is_weekend              BOOLEAN          NOT NULL,
            is_rush_hour            BOOLEAN          NOT NULL,
            total_pollution         DOUBLE PRECISION NOT NULL,
            pm_ratio                DOUBLE PRECISION NOT NULL,
            pollution_level         TEXT             NOT NULL,
            health_risk_score       DOUBLE PRECISION NOT NULL,
            pm2_5_lag_1h            DOUBLE PRECISION NOT NULL,
            pm2_5_lag_24h           DOUBLE PRECISION NOT NULL,
            pm2_5_rolling_mean_24h  DOUBLE PRECISION NOT NULL,
            pm10_lag_1h             DOUBLE PRECISION NOT NULL,
            pm10_lag_24h            DOUBLE PRECISION NOT NULL,
            pm10_rolling_mean_24h   DOUBLE PRECISION NOT NULL,
            aqi_lag_1h              DOUBLE PRECISION NOT NULL,
            aqi_lag_24h             DOUBLE PRECISION NOT NULL,
            aqi_rolling_mean_24h    DOUBLE PRECISION NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Tables created before row_index was widened
    sqlx::query("ALTER TABLE aqi_features ALTER COLUMN row_index TYPE BIGINT")
        .execute(&mut *tx)
        .await?;

    // Latest snapshot per city, keyed `aqi:latest:<city>`
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS aqi_latest (
            cache_key   TEXT        PRIMARY KEY,
            city        TEXT        NOT NULL,
            payload     TEXT        NOT NULL,
            expires_at  TIMESTAMPTZ NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Basic indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_aqi_readings_city_timestamp
            ON aqi_readings (city, timestamp);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
