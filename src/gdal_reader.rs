//! S-57 decoding through GDAL/OGR.
//!
//! Built only with the `gdal` feature, which needs a system libgdal with the
//! S57 driver. The driver is configured once per process through the
//! `OGR_S57_OPTIONS` config option before the first open.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gdal::spatial_ref::{AxisMappingStrategy, SpatialRef};
use gdal::vector::{FieldValue, Geometry, LayerAccess};
use gdal::{Dataset, DatasetOptions, GdalOpenFlags};
use tracing::debug;

use s57_ingest_core::reader::{ChartOpener, ChartReader, RawFeature};

const LNAM_REFS_FIELD: &str = "LNAM_REFS";

/// Opens chart files with the OGR S57 driver.
pub struct GdalOpener;

impl GdalOpener {
    /// Configure the S57 driver with `s57_options`
    /// (e.g. [`crate::config::DEFAULT_S57_OPTIONS`]).
    pub fn new(s57_options: &str) -> Result<Self> {
        gdal::config::set_config_option("OGR_S57_OPTIONS", s57_options)
            .context("Failed to set OGR_S57_OPTIONS")?;
        debug!(options = s57_options, "configured OGR S57 driver");
        Ok(Self)
    }
}

impl ChartOpener for GdalOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn ChartReader>> {
        let options = DatasetOptions {
            open_flags: GdalOpenFlags::GDAL_OF_VECTOR | GdalOpenFlags::GDAL_OF_READONLY,
            ..Default::default()
        };
        let dataset = Dataset::open_ex(path, options)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let mut wgs84 = SpatialRef::from_epsg(4326)?;
        wgs84.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);

        Ok(Box::new(GdalReader {
            path: path.to_path_buf(),
            dataset,
            wgs84,
        }))
    }
}

/// One open S-57 dataset.
pub struct GdalReader {
    path: PathBuf,
    dataset: Dataset,
    wgs84: SpatialRef,
}

impl GdalReader {
    fn to_raw(&self, feature: &gdal::vector::Feature<'_>) -> RawFeature {
        let mut raw = RawFeature::new();

        for (name, value) in feature.fields() {
            let Some(value) = value else { continue };
            if name == LNAM_REFS_FIELD {
                if let FieldValue::StringListValue(refs) = &value {
                    raw = raw.lnam_refs(refs.iter().cloned());
                }
            }
            if let Some(text) = field_text(value) {
                raw = raw.field(name, text);
            }
        }

        if let Some(geometry) = feature.geometry() {
            match self.geojson(geometry) {
                Ok(json) => raw = raw.geometry(json),
                Err(err) => debug!(path = %self.path.display(), error = %err, "dropping geometry"),
            }
        }

        raw
    }

    /// GeoJSON in EPSG:4326, reprojecting when the source differs.
    fn geojson(&self, geometry: &Geometry) -> Result<String> {
        let needs_transform = geometry
            .spatial_ref()
            .is_some_and(|srs| srs.auth_code().map_or(true, |code| code != 4326));

        if needs_transform {
            let reprojected = geometry.transform_to(&self.wgs84)?;
            return Ok(reprojected.json()?);
        }
        Ok(geometry.json()?)
    }
}

impl ChartReader for GdalReader {
    fn path(&self) -> &Path {
        &self.path
    }

    fn layer_names(&self) -> Vec<String> {
        self.dataset.layers().map(|layer| layer.name()).collect()
    }

    fn layer_features(&self, layer: &str) -> Vec<RawFeature> {
        let Ok(mut layer) = self.dataset.layer_by_name(layer) else {
            return Vec::new();
        };
        layer.reset_feature_reading();
        layer
            .features()
            .map(|feature| self.to_raw(&feature))
            .collect()
    }
}

/// OGR's string rendering of a field value. Lists use the `(count:a,b)`
/// form.
fn field_text(value: FieldValue) -> Option<String> {
    fn list<T: ToString>(items: &[T]) -> String {
        let joined: Vec<String> = items.iter().map(ToString::to_string).collect();
        format!("({}:{})", items.len(), joined.join(","))
    }

    match value {
        FieldValue::StringListValue(items) => Some(list(&items)),
        FieldValue::IntegerListValue(items) => Some(list(&items)),
        FieldValue::Integer64ListValue(items) => Some(list(&items)),
        FieldValue::RealListValue(items) => Some(list(&items)),
        other => other.into_string(),
    }
}
