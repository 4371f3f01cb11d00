//! Ingestion pipeline orchestration.
//!
//! Coordinates a run: discover chart files → open and extract → replace any
//! existing chart of the same name → insert the chart → insert its features
//! in batches. Every per-file failure is captured in that file's
//! [`ProcessingResult`]; a run always processes every discovered file.
//!
//! # Replace semantics
//!
//! A chart that already exists (same `DSID.DSNM`) is deleted with all its
//! features before the new version is inserted, so a re-ingest reflects the
//! latest source file, including removed features.
//!
//! # Partial ingests
//!
//! Each feature batch commits on its own. When a batch fails, the remaining
//! batches are skipped and the file is reported failed, but the chart row and
//! the batches committed before it stay in the store. Re-ingesting the file
//! replaces the partial chart.
//!
//! # Concurrency
//!
//! Up to `workers` files are in flight at once. Files that resolve to the
//! same chart name never overlap in the store: each waits for the previous
//! file with that name to finish, so the later file in input order always
//! replaces the earlier one. Results are consumed in input order by a single
//! loop that owns the run [`Statistics`], so progress and results are
//! reported in the order [`find_files`] returned the paths.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use futures_util::stream::{self, StreamExt};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use s57_ingest_core::extract::{extract_all_features, extract_chart};
use s57_ingest_core::models::{Chart, Feature, ProcessingResult, Statistics};
use s57_ingest_core::reader::ChartOpener;
use s57_ingest_core::store::ChartStore;

use crate::config::Config;
use crate::discover::find_files;
use crate::progress::{IngestProgressEvent, IngestProgressReporter, NoProgress};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a single file failed. The `Display` text is the file's
/// `error_message`.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("Failed to open file")]
    Open(#[source] BoxError),
    #[error("Failed to delete existing chart")]
    ReplaceExisting(#[source] BoxError),
    #[error("Failed to insert chart")]
    InsertChart(#[source] BoxError),
    #[error("Failed to insert features")]
    InsertFeatures {
        /// Features committed by earlier batches.
        committed: usize,
        #[source]
        source: BoxError,
    },
}

/// Tuning for an ingest run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    /// Files in flight at once.
    pub workers: usize,
    /// Features per `insert_features` call.
    pub batch_size: usize,
    /// Chart file extension, without the dot.
    pub extension: String,
    /// Open and extract only; never touch the store.
    pub dry_run: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            batch_size: 1000,
            extension: "000".to_string(),
            dry_run: false,
        }
    }
}

impl From<&Config> for IngestOptions {
    fn from(config: &Config) -> Self {
        Self {
            workers: config.ingest.workers,
            batch_size: config.ingest.batch_size,
            extension: config.extension().to_string(),
            dry_run: false,
        }
    }
}

/// Batch processor for chart files.
pub struct ChartIngest<'a> {
    store: &'a dyn ChartStore,
    opener: &'a dyn ChartOpener,
    options: IngestOptions,
    progress: Box<dyn IngestProgressReporter + 'a>,
    stats: Statistics,
}

impl<'a> ChartIngest<'a> {
    pub fn new(store: &'a dyn ChartStore, opener: &'a dyn ChartOpener) -> Self {
        Self {
            store,
            opener,
            options: IngestOptions::default(),
            progress: Box::new(NoProgress),
            stats: Statistics::default(),
        }
    }

    pub fn with_options(mut self, options: IngestOptions) -> Self {
        self.options = options;
        self
    }

    /// Receive an event after every finished file.
    pub fn with_progress(mut self, progress: Box<dyn IngestProgressReporter + 'a>) -> Self {
        self.progress = progress;
        self
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    /// Chart files at `path`, sorted. See [`find_files`].
    pub fn find_files(&self, path: &Path, recursive: bool) -> Vec<PathBuf> {
        find_files(path, recursive, &self.options.extension)
    }

    /// Ingest one file. Never fails; errors are captured in the result.
    ///
    /// Does not touch the run statistics.
    pub async fn process_file(&self, path: &Path) -> ProcessingResult {
        let (result, extracted) = open_file(self.opener, path);
        store_file(self.store, &self.options, result, extracted, None).await
    }

    /// Ingest `files` in order, resetting and accumulating the run
    /// statistics and reporting progress after each file.
    pub async fn process_files(&mut self, files: &[PathBuf]) -> Vec<ProcessingResult> {
        let store = self.store;
        let opener = self.opener;
        let options = &self.options;
        let total = files.len() as u64;

        let mut stats = Statistics::default();
        let mut results = Vec::with_capacity(files.len());

        // Chart name -> completion of the last file queued with that name.
        let mut last_by_name: HashMap<String, oneshot::Receiver<()>> = HashMap::new();

        let mut in_flight = stream::iter(files)
            .map(move |path| {
                let (result, extracted) = open_file(opener, path);
                let (done, finished) = oneshot::channel::<()>();
                let after = match &extracted {
                    Ok((chart, _)) => last_by_name.insert(chart.name.clone(), finished),
                    Err(_) => None,
                };
                async move {
                    let result = store_file(store, options, result, extracted, after).await;
                    drop(done);
                    result
                }
            })
            .buffered(options.workers.max(1));

        while let Some(result) = in_flight.next().await {
            stats.record(&result);
            self.progress.report(IngestProgressEvent::Ingesting {
                n: stats.total_files as u64,
                total,
                file_name: result.file_name.clone(),
                success: result.success,
            });
            results.push(result);
        }

        self.stats = stats;
        results
    }

    /// [`find_files`](Self::find_files) followed by
    /// [`process_files`](Self::process_files).
    pub async fn process_directory(
        &mut self,
        path: &Path,
        recursive: bool,
    ) -> Vec<ProcessingResult> {
        self.progress.report(IngestProgressEvent::Discovering {
            path: path.display().to_string(),
        });
        let files = self.find_files(path, recursive);
        info!(path = %path.display(), count = files.len(), "found chart files");
        self.process_files(&files).await
    }

    /// Totals of the last [`process_files`](Self::process_files) run.
    pub fn statistics(&self) -> Statistics {
        self.stats
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

type Extracted = Result<(Chart, Vec<Feature>), FileError>;

/// Open and extract `path`. The result carries the chart name and feature
/// count when extraction succeeded.
fn open_file(opener: &dyn ChartOpener, path: &Path) -> (ProcessingResult, Extracted) {
    let mut result = ProcessingResult::new(file_name(path));
    let extracted = extract(opener, path);
    if let Ok((chart, features)) = &extracted {
        result.chart_name = chart.name.clone();
        result.feature_count = features.len();
    }
    (result, extracted)
}

/// Run the store phase for an extracted file, first waiting on `after` when
/// an earlier file with the same chart name is still in flight.
async fn store_file(
    store: &dyn ChartStore,
    options: &IngestOptions,
    mut result: ProcessingResult,
    extracted: Extracted,
    after: Option<oneshot::Receiver<()>>,
) -> ProcessingResult {
    let outcome = match extracted {
        Ok((chart, features)) => {
            if let Some(previous) = after {
                // The sender is dropped, never sent on; either way the earlier
                // file is done.
                let _ = previous.await;
            }
            store_chart(store, options, &chart, &features).await
        }
        Err(err) => Err(err),
    };

    match outcome {
        Ok(()) => result.success = true,
        Err(err) => {
            warn!(file = %result.file_name, error = %describe(&err), "chart ingest failed");
            result = result.fail(err.to_string());
        }
    }

    result
}

/// The error followed by its source chain, `: `-separated.
fn describe(err: &FileError) -> String {
    let mut out = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = std::error::Error::source(cause);
    }
    out
}

async fn store_chart(
    store: &dyn ChartStore,
    options: &IngestOptions,
    chart: &Chart,
    features: &[Feature],
) -> Result<(), FileError> {
    if options.dry_run {
        debug!(chart = %chart.name, features = features.len(), "dry run, store untouched");
        return Ok(());
    }

    replace_existing(store, &chart.name).await?;

    let chart_id = store
        .insert_chart(chart)
        .await
        .map_err(|e| FileError::InsertChart(e.into()))?;

    let committed = insert_batches(store, chart_id, features, options.batch_size)
        .await
        .map_err(|err| {
            if let FileError::InsertFeatures { committed, .. } = &err {
                warn!(
                    chart = %chart.name,
                    committed,
                    total = features.len(),
                    "feature batch failed; chart keeps a partial feature set"
                );
            }
            err
        })?;

    debug!(chart = %chart.name, chart_id, features = committed, "chart ingested");
    Ok(())
}

fn extract(opener: &dyn ChartOpener, path: &Path) -> Result<(Chart, Vec<Feature>), FileError> {
    let reader = opener
        .open(path)
        .map_err(|e| FileError::Open(e.into()))?;

    let chart = extract_chart(reader.as_ref());
    info!(chart = %chart.name, scale = chart.scale, "processing chart");
    let features = extract_all_features(reader.as_ref());
    debug!(chart = %chart.name, features = features.len(), "extracted features");

    Ok((chart, features))
}

async fn replace_existing(store: &dyn ChartStore, name: &str) -> Result<(), FileError> {
    let exists = store
        .chart_exists(name)
        .await
        .map_err(|e| FileError::ReplaceExisting(e.into()))?;

    if exists {
        info!(chart = %name, "replacing existing chart");
        store
            .delete_chart(name)
            .await
            .map_err(|e| FileError::ReplaceExisting(e.into()))?;
    }

    Ok(())
}

/// Insert `features` in batches of `batch_size`, stopping at the first
/// failing batch. Returns the number of features inserted.
async fn insert_batches(
    store: &dyn ChartStore,
    chart_id: i64,
    features: &[Feature],
    batch_size: usize,
) -> Result<usize, FileError> {
    let mut committed = 0;
    for batch in features.chunks(batch_size.max(1)) {
        store
            .insert_features(chart_id, batch)
            .await
            .map_err(|e| FileError::InsertFeatures {
                committed,
                source: e.into(),
            })?;
        committed += batch.len();
    }
    Ok(committed)
}

/// Render the end-of-run summary: totals, then each failed file.
pub fn render_summary(stats: &Statistics, results: &[ProcessingResult]) -> String {
    let mut out = String::new();
    out.push_str("Processing Complete:\n");
    out.push_str(&format!("  Files processed: {}\n", stats.total_files));
    out.push_str(&format!("  Successful:      {}\n", stats.success_count));
    out.push_str(&format!("  Failed:          {}\n", stats.fail_count));
    out.push_str(&format!("  Total features:  {}\n", stats.total_features));

    if stats.has_failures() {
        out.push_str("\nFailed files:\n");
        for result in results.iter().filter(|r| !r.success) {
            out.push_str(&format!("  {}: {}\n", result.file_name, result.error_message));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_error_messages() {
        let cause = || -> BoxError { "connection reset".into() };
        assert_eq!(FileError::Open(cause()).to_string(), "Failed to open file");
        assert_eq!(
            FileError::ReplaceExisting(cause()).to_string(),
            "Failed to delete existing chart"
        );
        assert_eq!(FileError::InsertChart(cause()).to_string(), "Failed to insert chart");
        assert_eq!(
            FileError::InsertFeatures {
                committed: 1000,
                source: cause()
            }
            .to_string(),
            "Failed to insert features"
        );
    }

    #[test]
    fn describe_includes_the_cause() {
        let err = FileError::InsertFeatures {
            committed: 0,
            source: "connection reset".into(),
        };
        assert_eq!(describe(&err), "Failed to insert features: connection reset");

        let nested: BoxError = Box::new(FileError::Open("no such file".into()));
        assert_eq!(
            describe(&FileError::InsertChart(nested)),
            "Failed to insert chart: Failed to open file: no such file"
        );
    }

    #[test]
    fn options_from_config() {
        let mut config = Config::default();
        config.ingest.extension = ".000".to_string();
        config.ingest.batch_size = 500;
        let options = IngestOptions::from(&config);
        assert_eq!(options.extension, "000");
        assert_eq!(options.batch_size, 500);
        assert_eq!(options.workers, 4);
        assert!(!options.dry_run);
    }

    #[test]
    fn summary_lists_failures() {
        let mut ok = ProcessingResult::new("A.000");
        ok.success = true;
        ok.feature_count = 10;
        let failed = ProcessingResult::new("B.000").fail("Failed to open file");
        let mut stats = Statistics::default();
        stats.record(&ok);
        stats.record(&failed);

        let summary = render_summary(&stats, &[ok, failed]);
        assert!(summary.contains("Files processed: 2"));
        assert!(summary.contains("Total features:  10"));
        assert!(summary.contains("Failed files:\n  B.000: Failed to open file"));
        assert!(!summary.contains("A.000"));
    }

    #[test]
    fn summary_without_failures_has_no_failure_section() {
        let summary = render_summary(&Statistics::default(), &[]);
        assert!(!summary.contains("Failed files"));
    }
}
