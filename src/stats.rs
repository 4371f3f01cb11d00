//! Store statistics for `--stats`.
//!
//! Gives a quick view of what is loaded: schema version, chart and feature
//! totals, and the busiest layers.

use anyhow::{bail, Result};
use sqlx::{PgPool, Row};

use s57_ingest_core::store::ChartStore;

use crate::migrate;
use crate::pg_store::PgStore;

/// Layers shown in the per-layer breakdown.
const TOP_LAYERS: i64 = 15;

/// Snapshot of the chart store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub schema_version: String,
    pub charts: i64,
    pub features: i64,
    /// `(layer, feature count)`, busiest first.
    pub layers: Vec<(String, i64)>,
}

/// Query the store for a [`StoreStats`] snapshot.
pub async fn collect(pool: &PgPool) -> Result<StoreStats> {
    let Some(schema_version) = migrate::schema_version(pool).await? else {
        bail!("Database schema is not initialized; run with --init-schema");
    };

    let store = PgStore::new(pool.clone());
    let charts = store.chart_count().await?;
    let features = store.feature_count().await?;

    let rows = sqlx::query(
        r#"
        SELECT layer, COUNT(*) AS feature_count
        FROM features
        GROUP BY layer
        ORDER BY feature_count DESC, layer
        LIMIT $1
        "#,
    )
    .bind(TOP_LAYERS)
    .fetch_all(pool)
    .await?;

    let layers = rows
        .iter()
        .map(|row| (row.get("layer"), row.get("feature_count")))
        .collect();

    Ok(StoreStats {
        schema_version,
        charts,
        features,
        layers,
    })
}

/// Render the `--stats` report.
pub fn render(stats: &StoreStats) -> String {
    let mut out = String::new();
    out.push_str("Chart Store Stats\n");
    out.push_str("=================\n\n");
    out.push_str(&format!("  Schema:    v{}\n", stats.schema_version));
    out.push_str(&format!("  Charts:    {}\n", stats.charts));
    out.push_str(&format!("  Features:  {}\n", stats.features));

    if !stats.layers.is_empty() {
        out.push_str("\n  By layer:\n");
        out.push_str(&format!("  {:<12} {:>10}\n", "LAYER", "FEATURES"));
        out.push_str(&format!("  {}\n", "-".repeat(23)));
        for (layer, count) in &stats.layers {
            out.push_str(&format!("  {:<12} {:>10}\n", layer, count));
        }
    }

    out
}
