//! End-to-end ingest runs against in-memory readers and stores.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tempfile::TempDir;

use s57_ingest::ingest::{ChartIngest, IngestOptions};
use s57_ingest_core::models::{Chart, Feature};
use s57_ingest_core::reader::{MemoryOpener, MemoryReader, RawFeature};
use s57_ingest_core::store::memory::InMemoryStore;
use s57_ingest_core::store::ChartStore;

/// Store wrapper that records batch sizes and fails on request.
#[derive(Default)]
struct ScriptedStore {
    inner: InMemoryStore,
    batches: Mutex<Vec<usize>>,
    fail_exists: bool,
    fail_insert_chart: bool,
    /// 1-based index of the `insert_features` call to fail.
    fail_batch: Option<usize>,
}

impl ScriptedStore {
    fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChartStore for ScriptedStore {
    async fn chart_exists(&self, name: &str) -> Result<bool> {
        if self.fail_exists {
            bail!("connection reset");
        }
        self.inner.chart_exists(name).await
    }

    async fn insert_chart(&self, chart: &Chart) -> Result<i64> {
        if self.fail_insert_chart {
            bail!("value too long for type character varying");
        }
        self.inner.insert_chart(chart).await
    }

    async fn delete_chart(&self, name: &str) -> Result<()> {
        self.inner.delete_chart(name).await
    }

    async fn insert_features(&self, chart_id: i64, features: &[Feature]) -> Result<()> {
        let call = {
            let mut batches = self.batches.lock().unwrap();
            batches.push(features.len());
            batches.len()
        };
        if self.fail_batch == Some(call) {
            bail!("invalid GeoJSON representation");
        }
        self.inner.insert_features(chart_id, features).await
    }

    async fn chart_count(&self) -> Result<i64> {
        self.inner.chart_count().await
    }

    async fn feature_count(&self) -> Result<i64> {
        self.inner.feature_count().await
    }
}

/// Store wrapper that yields to the scheduler before every call, so
/// concurrent files interleave their store operations.
struct YieldingStore {
    inner: InMemoryStore,
}

#[async_trait]
impl ChartStore for YieldingStore {
    async fn chart_exists(&self, name: &str) -> Result<bool> {
        tokio::task::yield_now().await;
        self.inner.chart_exists(name).await
    }

    async fn insert_chart(&self, chart: &Chart) -> Result<i64> {
        tokio::task::yield_now().await;
        self.inner.insert_chart(chart).await
    }

    async fn delete_chart(&self, name: &str) -> Result<()> {
        tokio::task::yield_now().await;
        self.inner.delete_chart(name).await
    }

    async fn insert_features(&self, chart_id: i64, features: &[Feature]) -> Result<()> {
        tokio::task::yield_now().await;
        self.inner.insert_features(chart_id, features).await
    }

    async fn chart_count(&self) -> Result<i64> {
        self.inner.chart_count().await
    }

    async fn feature_count(&self) -> Result<i64> {
        self.inner.feature_count().await
    }
}

fn dsid(name: &str) -> RawFeature {
    RawFeature::new()
        .field("DSNM", name)
        .field("DSPM_CSCL", "22000")
        .field("ISDT", "20230115")
        .field("UADT", "20240301")
}

fn soundings(count: usize) -> Vec<RawFeature> {
    (0..count)
        .map(|i| {
            RawFeature::new().geometry(format!(
                r#"{{"type":"Point","coordinates":[-122.4,37.8,{}.5]}}"#,
                i % 40
            ))
        })
        .collect()
}

/// Chart files on disk plus matching in-memory readers.
struct Fixture {
    tmp: TempDir,
    opener: MemoryOpener,
}

impl Fixture {
    fn new() -> Self {
        Self {
            tmp: TempDir::new().unwrap(),
            opener: MemoryOpener::new(),
        }
    }

    /// Create `<name>.000` with `DSID.DSNM = name` and `features` soundings.
    fn chart(&self, name: &str, features: usize) -> PathBuf {
        self.chart_in("", name, features)
    }

    /// Like [`Fixture::chart`], under the subdirectory `dir`.
    fn chart_in(&self, dir: &str, name: &str, features: usize) -> PathBuf {
        let dir = self.tmp.path().join(dir);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("{name}.000"));
        fs::write(&path, b"").unwrap();
        self.opener.insert(
            MemoryReader::new(&path)
                .with_layer("DSID", vec![dsid(name)])
                .with_layer("SOUNDG", soundings(features)),
        );
        path
    }

    /// A file on disk that the opener cannot read.
    fn corrupt(&self, file_name: &str) -> PathBuf {
        let path = self.tmp.path().join(file_name);
        fs::write(&path, b"not an ISO 8211 file").unwrap();
        path
    }

    fn root(&self) -> &Path {
        self.tmp.path()
    }
}

fn options(workers: usize) -> IngestOptions {
    IngestOptions {
        workers,
        ..IngestOptions::default()
    }
}

#[tokio::test]
async fn test_directory_ingest_populates_store() {
    let fx = Fixture::new();
    fx.chart("US5CA12M", 12);
    fx.chart("US4CA11M", 30);
    let store = InMemoryStore::new();

    let mut ingest = ChartIngest::new(&store, &fx.opener).with_options(options(4));
    let results = ingest.process_directory(fx.root(), false).await;

    let names: Vec<&str> = results.iter().map(|r| r.file_name.as_str()).collect();
    assert_eq!(names, vec!["US4CA11M.000", "US5CA12M.000"]);
    assert!(results.iter().all(|r| r.success));
    assert_eq!(results[0].chart_name, "US4CA11M");
    assert_eq!(results[0].feature_count, 30);

    let stats = ingest.statistics();
    assert_eq!(stats.total_files, 2);
    assert_eq!(stats.success_count, 2);
    assert_eq!(stats.fail_count, 0);
    assert_eq!(stats.total_features, 42);

    assert_eq!(store.chart_count().await.unwrap(), 2);
    assert_eq!(store.feature_count().await.unwrap(), 42);

    let chart = store.chart("US5CA12M").unwrap();
    assert_eq!(chart.scale, 22000);
    assert_eq!(chart.zoom, 13);
    assert_eq!(chart.issued, "20230115");
    assert_eq!(chart.updated, "20240301");
    assert_eq!(chart.file_name, "US5CA12M.000");
}

#[tokio::test]
async fn test_soundings_carry_depth() {
    let fx = Fixture::new();
    fx.chart("US5CA12M", 3);
    let store = InMemoryStore::new();

    let mut ingest = ChartIngest::new(&store, &fx.opener);
    ingest.process_directory(fx.root(), false).await;

    let depths: Vec<String> = store
        .features_of("US5CA12M")
        .iter()
        .map(|f| f.properties["METERS"].clone())
        .collect();
    assert_eq!(depths, vec!["0.5", "1.5", "2.5"]);
}

#[tokio::test]
async fn test_reingest_replaces_chart() {
    let fx = Fixture::new();
    let path = fx.chart("US5CA12M", 50);
    let store = InMemoryStore::new();

    let mut ingest = ChartIngest::new(&store, &fx.opener);
    ingest.process_files(&[path.clone()]).await;
    assert_eq!(store.feature_count().await.unwrap(), 50);

    // Newer edition with fewer soundings under the same DSNM.
    fx.chart("US5CA12M", 20);
    let results = ingest.process_files(&[path]).await;

    assert!(results[0].success);
    assert_eq!(store.chart_count().await.unwrap(), 1);
    assert_eq!(store.feature_count().await.unwrap(), 20);
    assert_eq!(store.features_of("US5CA12M").len(), 20);
}

#[tokio::test]
async fn test_same_chart_name_later_file_wins() {
    let fx = Fixture::new();
    fx.chart_in("a", "US5CA12M", 3);
    fx.chart_in("b", "US5CA12M", 5);
    fx.chart("US4CA11M", 2);
    let store = YieldingStore {
        inner: InMemoryStore::new(),
    };

    let mut ingest = ChartIngest::new(&store, &fx.opener).with_options(options(4));
    let results = ingest.process_directory(fx.root(), true).await;

    assert_eq!(results.len(), 3);
    assert!(
        results.iter().all(|r| r.success),
        "{:?}",
        results
            .iter()
            .map(|r| (r.file_name.as_str(), r.error_message.as_str()))
            .collect::<Vec<_>>()
    );
    assert_eq!(store.chart_count().await.unwrap(), 2);
    assert_eq!(store.feature_count().await.unwrap(), 7);
    assert_eq!(store.inner.features_of("US5CA12M").len(), 5);
}

#[tokio::test]
async fn test_unreadable_file_does_not_stop_run() {
    let fx = Fixture::new();
    fx.chart("AAA00001", 5);
    fx.corrupt("BBB00002.000");
    fx.chart("CCC00003", 7);
    let store = InMemoryStore::new();

    let mut ingest = ChartIngest::new(&store, &fx.opener).with_options(options(2));
    let results = ingest.process_directory(fx.root(), false).await;

    assert_eq!(results.len(), 3);
    assert!(results[0].success);
    assert!(!results[1].success);
    assert_eq!(results[1].file_name, "BBB00002.000");
    assert_eq!(results[1].error_message, "Failed to open file");
    assert!(results[2].success);

    let stats = ingest.statistics();
    assert_eq!(stats.success_count, 2);
    assert_eq!(stats.fail_count, 1);
    assert_eq!(stats.total_features, 12);
    assert!(stats.has_failures());
}

#[tokio::test]
async fn test_features_inserted_in_batches() {
    let fx = Fixture::new();
    let path = fx.chart("US5CA12M", 2500);
    let store = ScriptedStore::default();

    let mut ingest = ChartIngest::new(&store, &fx.opener);
    let results = ingest.process_files(&[path]).await;

    assert!(results[0].success);
    assert_eq!(store.batch_sizes(), vec![1000, 1000, 500]);
    assert_eq!(store.feature_count().await.unwrap(), 2500);
}

#[tokio::test]
async fn test_configured_batch_size() {
    let fx = Fixture::new();
    let path = fx.chart("US5CA12M", 25);
    let store = ScriptedStore::default();

    let mut ingest = ChartIngest::new(&store, &fx.opener).with_options(IngestOptions {
        batch_size: 10,
        ..IngestOptions::default()
    });
    ingest.process_files(&[path]).await;

    assert_eq!(store.batch_sizes(), vec![10, 10, 5]);
}

#[tokio::test]
async fn test_failed_batch_keeps_committed_features() {
    let fx = Fixture::new();
    let path = fx.chart("US5CA12M", 2500);
    let store = ScriptedStore {
        fail_batch: Some(2),
        ..Default::default()
    };

    let mut ingest = ChartIngest::new(&store, &fx.opener);
    let results = ingest.process_files(&[path]).await;

    assert!(!results[0].success);
    assert_eq!(results[0].error_message, "Failed to insert features");
    // Later batches are skipped.
    assert_eq!(store.batch_sizes(), vec![1000, 1000]);
    // The chart and the first batch stay.
    assert_eq!(store.chart_count().await.unwrap(), 1);
    assert_eq!(store.feature_count().await.unwrap(), 1000);

    let stats = ingest.statistics();
    assert_eq!(stats.fail_count, 1);
    assert_eq!(stats.total_features, 0);
}

#[tokio::test]
async fn test_chart_insert_failure() {
    let fx = Fixture::new();
    let path = fx.chart("US5CA12M", 10);
    let store = ScriptedStore {
        fail_insert_chart: true,
        ..Default::default()
    };

    let mut ingest = ChartIngest::new(&store, &fx.opener);
    let results = ingest.process_files(&[path]).await;

    assert_eq!(results[0].error_message, "Failed to insert chart");
    assert_eq!(results[0].chart_name, "US5CA12M");
    assert!(store.batch_sizes().is_empty());
    assert_eq!(store.feature_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_existence_check_failure() {
    let fx = Fixture::new();
    let path = fx.chart("US5CA12M", 10);
    let store = ScriptedStore {
        fail_exists: true,
        ..Default::default()
    };

    let mut ingest = ChartIngest::new(&store, &fx.opener);
    let results = ingest.process_files(&[path]).await;

    assert_eq!(results[0].error_message, "Failed to delete existing chart");
    assert_eq!(store.chart_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_progress_follows_input_order() {
    let fx = Fixture::new();
    let mut files = Vec::new();
    for i in 0..8 {
        files.push(fx.chart(&format!("US5CA{i:02}M"), i * 3));
    }
    let store = InMemoryStore::new();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let reporter = move |n: u64, total: u64, file: &str| {
        sink.lock().unwrap().push((n, total, file.to_string()));
    };

    let mut ingest = ChartIngest::new(&store, &fx.opener)
        .with_options(options(4))
        .with_progress(Box::new(reporter));
    ingest.process_files(&files).await;

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 8);
    for (i, (n, total, file)) in events.iter().enumerate() {
        assert_eq!(*n, i as u64 + 1);
        assert_eq!(*total, 8);
        assert_eq!(file, &format!("US5CA{i:02}M.000"));
    }
}

#[tokio::test]
async fn test_statistics_reset_per_run() {
    let fx = Fixture::new();
    let a = fx.chart("AAA00001", 4);
    let b = fx.chart("BBB00002", 6);
    let store = InMemoryStore::new();

    let mut ingest = ChartIngest::new(&store, &fx.opener);
    ingest.process_files(&[a, b.clone()]).await;
    assert_eq!(ingest.statistics().total_files, 2);

    ingest.process_files(&[b]).await;
    let stats = ingest.statistics();
    assert_eq!(stats.total_files, 1);
    assert_eq!(stats.total_features, 6);
}

#[tokio::test]
async fn test_process_file_leaves_statistics_alone() {
    let fx = Fixture::new();
    let path = fx.chart("US5CA12M", 4);
    let store = InMemoryStore::new();

    let ingest = ChartIngest::new(&store, &fx.opener);
    let result = ingest.process_file(&path).await;

    assert!(result.success);
    assert_eq!(result.feature_count, 4);
    assert_eq!(ingest.statistics().total_files, 0);
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let fx = Fixture::new();
    fx.chart("US5CA12M", 15);
    let store = ScriptedStore::default();

    let mut ingest = ChartIngest::new(&store, &fx.opener).with_options(IngestOptions {
        dry_run: true,
        ..IngestOptions::default()
    });
    let results = ingest.process_directory(fx.root(), false).await;

    assert!(results[0].success);
    assert_eq!(results[0].feature_count, 15);
    assert_eq!(ingest.statistics().total_features, 15);
    assert!(store.batch_sizes().is_empty());
    assert_eq!(store.chart_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_empty_directory() {
    let fx = Fixture::new();
    let store = InMemoryStore::new();

    let mut ingest = ChartIngest::new(&store, &fx.opener);
    let results = ingest.process_directory(fx.root(), true).await;

    assert!(results.is_empty());
    assert_eq!(ingest.statistics().total_files, 0);
    assert!(!ingest.statistics().has_failures());
}
