//! Schema creation.
//!
//! Applies the version 1 chart schema: `meta`, `charts`, and `features`
//! with their spatial, range, and array indexes. Every statement is
//! idempotent, so `--init-schema` can run against an initialized database.

use anyhow::{Context, Result};
use sqlx::PgPool;

/// Schema version recorded in `meta`.
pub const SCHEMA_VERSION: &str = "1";

/// Advisory lock key serializing concurrent `run_migrations` calls.
const MIGRATION_LOCK: i64 = 0x5357_494e_4745_5354;

const CREATE_META: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    key   VARCHAR UNIQUE NOT NULL,
    value VARCHAR NULL
);
"#;

const CREATE_CHARTS: &str = r#"
CREATE TABLE IF NOT EXISTS charts (
    id         BIGSERIAL PRIMARY KEY,
    name       VARCHAR UNIQUE           NOT NULL,
    scale      INTEGER                  NOT NULL,
    file_name  VARCHAR                  NOT NULL,
    updated    VARCHAR                  NOT NULL,
    issued     VARCHAR                  NOT NULL,
    zoom       INTEGER                  NOT NULL,
    covr       GEOMETRY(GEOMETRY, 4326) NOT NULL,
    dsid_props JSONB                    NOT NULL,
    chart_txt  JSONB                    NOT NULL
);
CREATE INDEX IF NOT EXISTS charts_gist ON charts USING GIST (covr);
"#;

const CREATE_FEATURES: &str = r#"
CREATE TABLE IF NOT EXISTS features (
    id        BIGSERIAL PRIMARY KEY,
    layer     VARCHAR                       NOT NULL,
    geom      GEOMETRY(GEOMETRY, 4326)      NOT NULL,
    props     JSONB                         NOT NULL,
    chart_id  BIGINT REFERENCES charts (id) NOT NULL,
    lnam_refs VARCHAR[]                     NULL,
    z_range   INT4RANGE                     NOT NULL
);
CREATE INDEX IF NOT EXISTS features_gist ON features USING GIST (geom);
CREATE INDEX IF NOT EXISTS features_chart_idx ON features (chart_id);
CREATE INDEX IF NOT EXISTS features_layer_idx ON features (layer);
CREATE INDEX IF NOT EXISTS features_zoom_idx ON features USING GIST (z_range);
CREATE INDEX IF NOT EXISTS features_lnam_idx ON features USING GIN (lnam_refs);
"#;

/// Create the PostGIS extension and the chart schema.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(MIGRATION_LOCK)
        .execute(&mut *tx)
        .await?;

    sqlx::raw_sql("CREATE EXTENSION IF NOT EXISTS postgis")
        .execute(&mut *tx)
        .await
        .context("Failed to create postgis extension")?;
    sqlx::raw_sql(CREATE_META)
        .execute(&mut *tx)
        .await
        .context("Failed to create meta table")?;

    sqlx::query(
        "INSERT INTO meta (key, value) VALUES ('version', $1) ON CONFLICT (key) DO NOTHING",
    )
    .bind(SCHEMA_VERSION)
    .execute(&mut *tx)
    .await?;

    sqlx::raw_sql(CREATE_CHARTS)
        .execute(&mut *tx)
        .await
        .context("Failed to create charts table")?;
    sqlx::raw_sql(CREATE_FEATURES)
        .execute(&mut *tx)
        .await
        .context("Failed to create features table")?;

    tx.commit().await?;
    Ok(())
}

/// The recorded schema version, if the schema has been initialized.
pub async fn schema_version(pool: &PgPool) -> Result<Option<String>> {
    let exists: bool = sqlx::query_scalar("SELECT to_regclass('meta') IS NOT NULL")
        .fetch_one(pool)
        .await?;
    if !exists {
        return Ok(None);
    }

    let version: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM meta WHERE key = 'version'")
            .fetch_optional(pool)
            .await?;
    Ok(version.flatten())
}
