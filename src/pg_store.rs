//! PostGIS-backed [`ChartStore`] implementation.
//!
//! Maps each [`ChartStore`] operation to one transaction against the
//! `charts` / `features` schema created by [`crate::migrate`].
//!
//! # Column encoding
//!
//! | Field | Column | Encoding |
//! |-------|--------|----------|
//! | geometry / coverage | `GEOMETRY(GEOMETRY, 4326)` | `ST_GeomFromGeoJSON`, empty collection when absent |
//! | properties, DSID, chart text | `JSONB` | `sqlx::types::Json` |
//! | `lnam_refs` | `VARCHAR[]` | `NULL` when empty |
//! | `(min_z, max_z)` | `INT4RANGE` | `int4range(min_z, max_z)`, inclusive-exclusive |

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;

use s57_ingest_core::models::{Chart, Feature};
use s57_ingest_core::store::ChartStore;

const INSERT_CHART: &str = r#"
INSERT INTO charts (name, scale, file_name, updated, issued, zoom, covr, dsid_props, chart_txt)
VALUES ($1, $2, $3, $4, $5, $6,
        ST_SetSRID(COALESCE(ST_GeomFromGeoJSON($7::text), 'GEOMETRYCOLLECTION EMPTY'::geometry), 4326),
        $8, $9)
RETURNING id
"#;

const INSERT_FEATURE: &str = r#"
INSERT INTO features (layer, geom, props, chart_id, lnam_refs, z_range)
VALUES ($1,
        ST_SetSRID(COALESCE(ST_GeomFromGeoJSON($2::text), 'GEOMETRYCOLLECTION EMPTY'::geometry), 4326),
        $3, $4, $5::varchar[], int4range($6, $7))
"#;

/// PostGIS implementation of the [`ChartStore`] trait.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ChartStore for PgStore {
    async fn chart_exists(&self, name: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM charts WHERE name = $1)")
                .bind(name)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn insert_chart(&self, chart: &Chart) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(INSERT_CHART)
            .bind(&chart.name)
            .bind(chart.scale)
            .bind(&chart.file_name)
            .bind(&chart.updated)
            .bind(&chart.issued)
            .bind(chart.zoom)
            .bind(chart.coverage.as_deref())
            .bind(Json(&chart.dsid_properties))
            .bind(Json(&chart.chart_text))
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("insert chart {}", chart.name))?;

        Ok(id)
    }

    async fn delete_chart(&self, name: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let chart_id: Option<i64> = sqlx::query_scalar("SELECT id FROM charts WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(chart_id) = chart_id else {
            tx.commit().await?;
            return Ok(());
        };

        // Features first: chart_id is a foreign key.
        sqlx::query("DELETE FROM features WHERE chart_id = $1")
            .bind(chart_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM charts WHERE id = $1")
            .bind(chart_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn insert_features(&self, chart_id: i64, features: &[Feature]) -> Result<()> {
        if features.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for feature in features {
            let lnam_refs = (!feature.lnam_refs.is_empty()).then_some(&feature.lnam_refs);
            sqlx::query(INSERT_FEATURE)
                .bind(&feature.layer)
                .bind(feature.geometry.as_deref())
                .bind(Json(&feature.properties))
                .bind(chart_id)
                .bind(lnam_refs)
                .bind(feature.min_z)
                .bind(feature.max_z)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("insert {} feature for chart {chart_id}", feature.layer))?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn chart_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM charts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn feature_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM features")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
