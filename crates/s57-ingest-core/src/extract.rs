//! Record extraction from an opened chart.
//!
//! Adapts a [`ChartReader`] into one [`Chart`] and a sequence of
//! [`Feature`]s. Extraction never fails: missing metadata falls back to
//! defaults and malformed numeric attributes read as `0`.
//!
//! # Metadata mapping
//!
//! | Chart field | Source |
//! |-------------|--------|
//! | `name` | `DSID.DSNM`, else the file stem |
//! | `scale` | `DSID.DSPM_CSCL` |
//! | `updated` / `issued` | `DSID.UADT` / `DSID.ISDT` |
//! | `coverage` | geometry of the first `M_COVR` feature |
//! | `dsid_properties` | all `DSID` fields |
//! | `chart_text` | all `M_COVR` fields |

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::models::{Chart, Feature, Properties};
use crate::reader::{
    is_excluded_layer, ChartReader, RawFeature, COVERAGE_LAYER, DSID_LAYER, SOUNDING_LAYER,
};
use crate::zoom::{calculate_z_range, find_zoom};

/// Synthetic depth property injected into soundings.
pub const METERS_PROPERTY: &str = "METERS";

/// Parse an integer attribute, yielding `0` when it is not a valid integer.
pub fn parse_int(value: &str) -> i32 {
    value.trim().parse().unwrap_or(0)
}

fn int_field(fields: &Properties, key: &str) -> i32 {
    fields.get(key).map(|v| parse_int(v)).unwrap_or(0)
}

fn first_feature(reader: &dyn ChartReader, layer: &str) -> Option<RawFeature> {
    reader.layer_features(layer).into_iter().next()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Build the [`Chart`] record from the `DSID` and `M_COVR` layers.
pub fn extract_chart(reader: &dyn ChartReader) -> Chart {
    let path = reader.path();
    let dsid_properties = first_feature(reader, DSID_LAYER)
        .map(|f| f.fields)
        .unwrap_or_default();
    let (coverage, chart_text) = match first_feature(reader, COVERAGE_LAYER) {
        Some(covr) => (covr.geometry, covr.fields),
        None => (None, Properties::new()),
    };

    let name = match dsid_properties.get("DSNM") {
        Some(name) => name.clone(),
        None => {
            debug!(path = %path.display(), "no DSID.DSNM, naming chart after file");
            file_stem(path)
        }
    };
    let scale = int_field(&dsid_properties, "DSPM_CSCL");
    let zoom = if scale > 0 { find_zoom(scale) } else { 0 };

    Chart {
        name,
        scale,
        file_name: file_name(path),
        updated: dsid_properties.get("UADT").cloned().unwrap_or_default(),
        issued: dsid_properties.get("ISDT").cloned().unwrap_or_default(),
        zoom,
        coverage,
        dsid_properties,
        chart_text,
    }
}

/// Extract every feature of `layer`, in source order.
///
/// Excluded layers yield nothing.
pub fn extract_features(reader: &dyn ChartReader, layer: &str) -> Vec<Feature> {
    if is_excluded_layer(layer) {
        return Vec::new();
    }

    reader
        .layer_features(layer)
        .into_iter()
        .map(|raw| to_feature(layer, raw))
        .collect()
}

/// Extract the features of every non-excluded layer, in layer enumeration
/// order.
pub fn extract_all_features(reader: &dyn ChartReader) -> Vec<Feature> {
    reader
        .layer_names()
        .iter()
        .filter(|layer| !is_excluded_layer(layer))
        .flat_map(|layer| extract_features(reader, layer))
        .collect()
}

fn to_feature(layer: &str, raw: RawFeature) -> Feature {
    let RawFeature {
        mut fields,
        geometry,
        lnam_refs,
    } = raw;

    if layer == SOUNDING_LAYER {
        if let Some(depth) = geometry.as_deref().and_then(point_depth) {
            fields.insert(METERS_PROPERTY.to_string(), format!("{depth:.1}"));
        }
    }

    let (min_z, max_z) =
        calculate_z_range(int_field(&fields, "SCAMIN"), int_field(&fields, "SCAMAX"));

    Feature {
        layer: layer.to_string(),
        geometry,
        properties: fields,
        min_z,
        max_z,
        lnam_refs,
    }
}

/// Third coordinate of a GeoJSON `Point`, if it has one.
fn point_depth(geojson: &str) -> Option<f64> {
    let geometry: Value = serde_json::from_str(geojson).ok()?;
    if geometry.get("type")?.as_str()? != "Point" {
        return None;
    }
    geometry.get("coordinates")?.as_array()?.get(2)?.as_f64()
}
