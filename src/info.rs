//! Read-only inspection: `--list` and `--info`.
//!
//! Neither touches the database. `--list` prints what an ingest run would
//! process; `--info` prints the chart record and layer set one file would
//! produce.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use s57_ingest_core::extract::{extract_chart, extract_features};
use s57_ingest_core::reader::{is_excluded_layer, ChartOpener, ChartReader};

/// Render the `--list` output for discovered files.
pub fn render_list(files: &[PathBuf]) -> String {
    let mut out = format!("Found {} S-57 files:\n", files.len());
    for file in files {
        out.push_str(&format!("  {}\n", file.display()));
    }
    out
}

/// Render the `--info` output for an open chart.
///
/// Layers are listed in reader order; excluded layers are marked and their
/// feature counts omitted since they are never ingested.
pub fn render_info(reader: &dyn ChartReader) -> String {
    let chart = extract_chart(reader);

    let mut out = String::new();
    out.push_str("Chart Information:\n");
    out.push_str(&format!("  Name:     {}\n", chart.name));
    out.push_str(&format!("  Scale:    1:{}\n", chart.scale));
    out.push_str(&format!("  File:     {}\n", chart.file_name));
    out.push_str(&format!("  Updated:  {}\n", chart.updated));
    out.push_str(&format!("  Issued:   {}\n", chart.issued));
    out.push_str(&format!("  Zoom:     {}\n", chart.zoom));

    out.push_str("\nLayers:\n");
    for layer in reader.layer_names() {
        if is_excluded_layer(&layer) {
            out.push_str(&format!("  - {layer} (skipped)\n"));
        } else {
            let count = extract_features(reader, &layer).len();
            out.push_str(&format!("  - {layer} ({count})\n"));
        }
    }

    let dsid = serde_json::to_string_pretty(&chart.dsid_properties).unwrap_or_default();
    out.push_str(&format!("\nDSID Properties:\n{dsid}\n"));
    out.push_str(&format!(
        "\nCoverage:\n{}\n",
        chart.coverage.as_deref().unwrap_or("(none)")
    ));
    out
}

/// Open `path` and render its `--info` output.
pub fn chart_info(opener: &dyn ChartOpener, path: &Path) -> Result<String> {
    let reader = opener
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(render_info(reader.as_ref()))
}
