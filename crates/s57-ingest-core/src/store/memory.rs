//! In-memory [`ChartStore`] implementation for tests and dry runs.
//!
//! Uses `Vec`s behind `std::sync::RwLock`. Mirrors the PostGIS schema's
//! constraints: chart names are unique and features must reference an
//! existing chart.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::models::{Chart, Feature};

use super::ChartStore;

struct StoredChart {
    id: i64,
    chart: Chart,
}

struct StoredFeature {
    chart_id: i64,
    feature: Feature,
}

/// In-memory store for tests and dry runs.
pub struct InMemoryStore {
    charts: RwLock<Vec<StoredChart>>,
    features: RwLock<Vec<StoredFeature>>,
    next_id: AtomicI64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            charts: RwLock::new(Vec::new()),
            features: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// The stored chart named `name`.
    pub fn chart(&self, name: &str) -> Option<Chart> {
        let charts = self.charts.read().ok()?;
        charts
            .iter()
            .find(|sc| sc.chart.name == name)
            .map(|sc| sc.chart.clone())
    }

    /// Features of the chart named `name`, in insertion order.
    pub fn features_of(&self, name: &str) -> Vec<Feature> {
        let Some(id) = self.id_of(name) else {
            return Vec::new();
        };
        self.features
            .read()
            .map(|features| {
                features
                    .iter()
                    .filter(|sf| sf.chart_id == id)
                    .map(|sf| sf.feature.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn id_of(&self, name: &str) -> Option<i64> {
        let charts = self.charts.read().ok()?;
        charts.iter().find(|sc| sc.chart.name == name).map(|sc| sc.id)
    }

    fn read_charts(&self) -> Result<RwLockReadGuard<'_, Vec<StoredChart>>> {
        self.charts.read().map_err(|_| anyhow!("chart table lock poisoned"))
    }

    fn write_charts(&self) -> Result<RwLockWriteGuard<'_, Vec<StoredChart>>> {
        self.charts.write().map_err(|_| anyhow!("chart table lock poisoned"))
    }

    fn read_features(&self) -> Result<RwLockReadGuard<'_, Vec<StoredFeature>>> {
        self.features.read().map_err(|_| anyhow!("feature table lock poisoned"))
    }

    fn write_features(&self) -> Result<RwLockWriteGuard<'_, Vec<StoredFeature>>> {
        self.features.write().map_err(|_| anyhow!("feature table lock poisoned"))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChartStore for InMemoryStore {
    async fn chart_exists(&self, name: &str) -> Result<bool> {
        Ok(self.read_charts()?.iter().any(|sc| sc.chart.name == name))
    }

    async fn insert_chart(&self, chart: &Chart) -> Result<i64> {
        let mut charts = self.write_charts()?;
        if charts.iter().any(|sc| sc.chart.name == chart.name) {
            bail!("duplicate chart name: {}", chart.name);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        charts.push(StoredChart {
            id,
            chart: chart.clone(),
        });
        Ok(id)
    }

    async fn delete_chart(&self, name: &str) -> Result<()> {
        let mut charts = self.write_charts()?;
        let Some(id) = charts.iter().find(|sc| sc.chart.name == name).map(|sc| sc.id) else {
            return Ok(());
        };
        self.write_features()?.retain(|sf| sf.chart_id != id);
        charts.retain(|sc| sc.id != id);
        Ok(())
    }

    async fn insert_features(&self, chart_id: i64, features: &[Feature]) -> Result<()> {
        if features.is_empty() {
            return Ok(());
        }
        if !self.read_charts()?.iter().any(|sc| sc.id == chart_id) {
            bail!("chart id {chart_id} does not exist");
        }
        let mut stored = self.write_features()?;
        stored.extend(features.iter().map(|f| StoredFeature {
            chart_id,
            feature: f.clone(),
        }));
        Ok(())
    }

    async fn chart_count(&self) -> Result<i64> {
        Ok(self.read_charts()?.len() as i64)
    }

    async fn feature_count(&self) -> Result<i64> {
        Ok(self.read_features()?.len() as i64)
    }
}
