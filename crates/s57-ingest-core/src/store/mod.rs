//! Storage abstraction for charts and features.
//!
//! The [`ChartStore`] trait is the persistence gateway used by the ingest
//! orchestrator. The PostGIS implementation lives in the `s57-ingest` crate;
//! [`memory::InMemoryStore`] backs tests and dry runs.
//!
//! Every operation is its own transaction. Nothing spans two calls, so a
//! chart whose feature batches fail midway keeps the batches that already
//! committed.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chart, Feature};

/// Persistence gateway for ingested charts.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`chart_exists`](ChartStore::chart_exists) | Check for a chart by name |
/// | [`insert_chart`](ChartStore::insert_chart) | Insert a chart row, returning its id |
/// | [`delete_chart`](ChartStore::delete_chart) | Delete a chart and all its features |
/// | [`insert_features`](ChartStore::insert_features) | Insert one batch of features |
/// | [`chart_count`](ChartStore::chart_count) | Number of stored charts |
/// | [`feature_count`](ChartStore::feature_count) | Number of stored features |
#[async_trait]
pub trait ChartStore: Send + Sync {
    async fn chart_exists(&self, name: &str) -> Result<bool>;

    /// Insert a chart and return its id.
    ///
    /// Does not check for an existing chart of the same name; callers
    /// delete first.
    async fn insert_chart(&self, chart: &Chart) -> Result<i64>;

    /// Delete the named chart and its features.
    ///
    /// Deleting a chart that does not exist succeeds.
    async fn delete_chart(&self, name: &str) -> Result<()>;

    /// Insert a batch of features for `chart_id`, atomically.
    async fn insert_features(&self, chart_id: i64, features: &[Feature]) -> Result<()>;

    async fn chart_count(&self) -> Result<i64>;

    async fn feature_count(&self) -> Result<i64>;
}
