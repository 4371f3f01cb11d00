//! Chart reader boundary.
//!
//! The S-57 format itself is decoded elsewhere (GDAL/OGR in the `s57-ingest`
//! crate). Extraction only needs the narrow view defined here: layer names,
//! and per layer a sequence of [`RawFeature`]s whose geometry is already
//! GeoJSON in EPSG:4326.
//!
//! [`MemoryReader`] and [`MemoryOpener`] provide an in-process reader for
//! tests and fixtures.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{anyhow, Result};

use crate::models::Properties;

/// Dataset identification layer.
pub const DSID_LAYER: &str = "DSID";
/// Coverage layer holding the chart's extent polygon.
pub const COVERAGE_LAYER: &str = "M_COVR";
/// Soundings layer; its point Z coordinate is the depth in meters.
pub const SOUNDING_LAYER: &str = "SOUNDG";

/// Structural layers that are never stored as features.
pub const EXCLUDED_LAYERS: [&str; 5] = [
    DSID_LAYER,
    "IsolatedNode",
    "ConnectedNode",
    "Edge",
    "Face",
];

/// Returns `true` if `layer` is a structural layer that is never materialized.
pub fn is_excluded_layer(layer: &str) -> bool {
    EXCLUDED_LAYERS.contains(&layer)
}

/// A feature as produced by the reader, before extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFeature {
    /// Set, non-null, non-empty attribute values rendered as strings.
    pub fields: Properties,
    /// GeoJSON geometry, already reprojected to EPSG:4326.
    pub geometry: Option<String>,
    /// `LNAM_REFS` string list, empty when the field is unset.
    pub lnam_refs: Vec<String>,
}

impl RawFeature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute. Empty values are dropped, as a reader would.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.fields.insert(key.into(), value);
        }
        self
    }

    pub fn geometry(mut self, geojson: impl Into<String>) -> Self {
        self.geometry = Some(geojson.into());
        self
    }

    pub fn lnam_refs<I, S>(mut self, refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lnam_refs = refs.into_iter().map(Into::into).collect();
        self
    }
}

/// An opened chart file.
pub trait ChartReader {
    /// Path the reader was opened from.
    fn path(&self) -> &Path;

    /// Layer names in the reader's enumeration order.
    fn layer_names(&self) -> Vec<String>;

    /// Every feature of `layer` in source order. Unknown layers yield nothing.
    fn layer_features(&self, layer: &str) -> Vec<RawFeature>;
}

/// Opens chart files. Shared by every in-flight file of an ingest run.
pub trait ChartOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn ChartReader>>;
}

/// A fully materialized chart held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryReader {
    path: PathBuf,
    layers: Vec<(String, Vec<RawFeature>)>,
}

impl MemoryReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            layers: Vec::new(),
        }
    }

    /// Append a layer. Layers enumerate in insertion order.
    pub fn with_layer(mut self, name: impl Into<String>, features: Vec<RawFeature>) -> Self {
        self.layers.push((name.into(), features));
        self
    }
}

impl ChartReader for MemoryReader {
    fn path(&self) -> &Path {
        &self.path
    }

    fn layer_names(&self) -> Vec<String> {
        self.layers.iter().map(|(name, _)| name.clone()).collect()
    }

    fn layer_features(&self, layer: &str) -> Vec<RawFeature> {
        self.layers
            .iter()
            .find(|(name, _)| name == layer)
            .map(|(_, features)| features.clone())
            .unwrap_or_default()
    }
}

/// Opener over a set of registered [`MemoryReader`]s keyed by path.
///
/// Paths that were never registered fail to open.
#[derive(Default)]
pub struct MemoryOpener {
    charts: RwLock<HashMap<PathBuf, MemoryReader>>,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the chart served for its path.
    pub fn insert(&self, reader: MemoryReader) {
        let mut charts = self.charts.write().unwrap_or_else(|e| e.into_inner());
        charts.insert(reader.path.clone(), reader);
    }
}

impl ChartOpener for MemoryOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn ChartReader>> {
        let charts = self.charts.read().unwrap_or_else(|e| e.into_inner());
        charts
            .get(path)
            .cloned()
            .map(|reader| Box::new(reader) as Box<dyn ChartReader>)
            .ok_or_else(|| anyhow!("no chart registered for {}", path.display()))
    }
}
