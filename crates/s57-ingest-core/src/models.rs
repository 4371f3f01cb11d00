//! Core data models for s57-ingest.
//!
//! [`Chart`] and [`Feature`] are the records written to the store.
//! [`ProcessingResult`] and [`Statistics`] are ephemeral run accounting and
//! are never persisted.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::zoom::ONE_TO_ONE_ZOOM;

/// String attributes of a chart, feature, or metadata record.
///
/// Ordered so the serialized JSON document is deterministic.
pub type Properties = BTreeMap<String, String>;

/// One ingested source file: dataset identification plus spatial coverage.
///
/// `name` is the natural key. Re-ingesting a file with the same name replaces
/// the stored chart and every feature that belongs to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chart {
    /// `DSID.DSNM`, or the file stem when absent.
    pub name: String,
    /// Compilation scale denominator (`DSID.DSPM_CSCL`), 0 if unknown.
    pub scale: i32,
    /// Base name of the source file.
    pub file_name: String,
    /// `DSID.UADT`, verbatim.
    pub updated: String,
    /// `DSID.ISDT`, verbatim.
    pub issued: String,
    /// Zoom level derived from `scale`, 0 if `scale` is 0.
    pub zoom: i32,
    /// GeoJSON of the `M_COVR` geometry.
    pub coverage: Option<String>,
    /// All `DSID` fields.
    pub dsid_properties: Properties,
    /// All `M_COVR` fields.
    pub chart_text: Properties,
}

/// One spatial record belonging to a chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feature {
    pub layer: String,
    /// GeoJSON in EPSG:4326. `None` for attribute-only features.
    pub geometry: Option<String>,
    pub properties: Properties,
    pub min_z: i32,
    pub max_z: i32,
    /// Foreign feature identifiers (`LNAM_REFS`), in source order.
    pub lnam_refs: Vec<String>,
}

impl Feature {
    /// A feature visible at every zoom level, with no attributes.
    pub fn new(layer: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            geometry: None,
            properties: Properties::new(),
            min_z: 0,
            max_z: ONE_TO_ONE_ZOOM,
            lnam_refs: Vec::new(),
        }
    }
}

/// Outcome of ingesting a single file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingResult {
    pub success: bool,
    pub file_name: String,
    pub chart_name: String,
    pub feature_count: usize,
    pub error_message: String,
}

impl ProcessingResult {
    /// A not-yet-successful result for `file_name`.
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Self::default()
        }
    }

    /// Mark the result failed with `message`.
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = message.into();
        self
    }
}

/// Running totals for one ingest run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub total_files: usize,
    pub success_count: usize,
    pub fail_count: usize,
    pub total_features: usize,
}

impl Statistics {
    /// Fold one file's result into the totals.
    ///
    /// Only successful files contribute to `total_features`.
    pub fn record(&mut self, result: &ProcessingResult) {
        self.total_files += 1;
        if result.success {
            self.success_count += 1;
            self.total_features += result.feature_count;
        } else {
            self.fail_count += 1;
        }
    }

    pub fn has_failures(&self) -> bool {
        self.fail_count > 0
    }
}
