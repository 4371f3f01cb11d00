//! # s57ingest
//!
//! Loads S-57 electronic navigational charts into a PostGIS database.
//!
//! ## Usage
//!
//! ```bash
//! s57ingest <input> [options]
//! ```
//!
//! `<input>` is a single `.000` base cell or a directory of them.
//!
//! ## Examples
//!
//! ```bash
//! # Create the schema, then load a directory tree with 8 workers
//! s57ingest --init-schema -d postgresql://localhost/njord
//! s57ingest /charts/ENC_ROOT -r -w 8
//!
//! # See what would be ingested
//! s57ingest /charts/ENC_ROOT -r --list
//! s57ingest /charts/ENC_ROOT -r --dry-run
//!
//! # Inspect one chart
//! s57ingest /charts/US5CA12M/US5CA12M.000 --info
//!
//! # Store totals
//! s57ingest --stats
//! ```
//!
//! Exits with status 1 when any file fails to ingest.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use s57_ingest::config::{self, Config};
use s57_ingest::discover::find_files;
use s57_ingest::ingest::{render_summary, ChartIngest, IngestOptions};
use s57_ingest::pg_store::PgStore;
use s57_ingest::progress::ProgressMode;
use s57_ingest::{db, info as chart_info, migrate, stats};
use s57_ingest_core::reader::ChartOpener;
use s57_ingest_core::store::memory::InMemoryStore;
use s57_ingest_core::store::ChartStore;

/// s57ingest: batch S-57 chart ingestion into PostGIS.
#[derive(Parser)]
#[command(
    name = "s57ingest",
    version,
    about = "Ingest S-57 nautical charts (.000) into PostGIS"
)]
struct Cli {
    /// S-57 file (.000) or directory of charts.
    input: Option<PathBuf>,

    /// PostgreSQL connection string.
    ///
    /// Overrides `[db].url`. Defaults to `postgresql://localhost/njord`.
    #[arg(short = 'd', long, env = "DATABASE_URL")]
    database: Option<String>,

    /// Create the PostGIS schema before ingesting (or alone, without input).
    #[arg(long)]
    init_schema: bool,

    /// Files processed concurrently.
    #[arg(short, long)]
    workers: Option<usize>,

    /// Descend into subdirectories.
    #[arg(short, long)]
    recursive: bool,

    /// Log each chart as it is processed.
    #[arg(short, long)]
    verbose: bool,

    /// List the chart files that would be ingested, then exit.
    #[arg(long)]
    list: bool,

    /// Show chart metadata and layers for a single file, then exit.
    #[arg(long)]
    info: bool,

    /// Print chart and feature counts from the database.
    #[arg(long)]
    stats: bool,

    /// Open and extract every chart without writing to the database.
    #[arg(long)]
    dry_run: bool,

    /// Progress output on stderr. Defaults to `human` on a terminal.
    #[arg(long, value_enum)]
    progress: Option<ProgressMode>,

    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cfg = resolve_config(&cli)?;

    if cli.list {
        let input = require_input(&cli, "No input path specified")?;
        let files = find_files(input, cfg.ingest.recursive, cfg.extension());
        print!("{}", chart_info::render_list(&files));
        return Ok(());
    }

    if cli.info {
        let input = require_input(&cli, "No input file specified")?;
        let opener = chart_opener(&cfg)?;
        print!("{}", chart_info::chart_info(opener.as_ref(), input)?);
        return Ok(());
    }

    if cli.input.is_none() && !cli.init_schema && !cli.stats {
        bail!("No input specified. See --help for usage.");
    }

    if let Some(input) = &cli.input {
        if !input.exists() {
            bail!("Input path does not exist: {}", input.display());
        }
    }

    if cli.dry_run {
        if let Some(input) = &cli.input {
            let store = InMemoryStore::new();
            let failed = ingest(&cli, &cfg, &store, input, true).await?;
            if failed {
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    info!(url = %db::redact(&cfg.db.url), "connecting to database");
    let pool = db::connect(&cfg).await?;

    if cli.init_schema {
        println!("Initializing database schema...");
        migrate::run_migrations(&pool).await?;
        println!("Schema initialized successfully.");
    }

    let mut failed = false;
    if let Some(input) = &cli.input {
        let store = PgStore::new(pool.clone());
        failed = ingest(&cli, &cfg, &store, input, false).await?;
    }

    if cli.stats {
        let snapshot = stats::collect(&pool).await?;
        println!();
        print!("{}", stats::render(&snapshot));
    }

    pool.close().await;

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Run the ingest pipeline over `input`. Returns whether any file failed.
async fn ingest(
    cli: &Cli,
    cfg: &Config,
    store: &dyn ChartStore,
    input: &Path,
    dry_run: bool,
) -> Result<bool> {
    let opener = chart_opener(cfg)?;
    let progress = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    let options = IngestOptions {
        dry_run,
        ..IngestOptions::from(cfg)
    };
    let mut pipeline = ChartIngest::new(store, opener.as_ref())
        .with_options(options)
        .with_progress(progress);

    let results = if input.is_file() {
        pipeline.process_files(&[input.to_path_buf()]).await
    } else {
        pipeline
            .process_directory(input, cfg.ingest.recursive)
            .await
    };

    let stats = pipeline.statistics();
    println!();
    if dry_run {
        println!("Dry run: no changes written.");
    }
    print!("{}", render_summary(&stats, &results));

    Ok(stats.has_failures())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Config file (or defaults) with command-line overrides applied.
fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };

    if let Some(url) = &cli.database {
        cfg.db.url = url.clone();
    }
    if let Some(workers) = cli.workers {
        cfg.ingest.workers = workers;
    }
    if cli.recursive {
        cfg.ingest.recursive = true;
    }

    cfg.validate()?;
    Ok(cfg)
}

fn require_input<'a>(cli: &'a Cli, message: &str) -> Result<&'a Path> {
    match &cli.input {
        Some(input) => Ok(input.as_path()),
        None => bail!("{message}"),
    }
}

#[cfg(feature = "gdal")]
fn chart_opener(cfg: &Config) -> Result<Box<dyn ChartOpener>> {
    let opener = s57_ingest::gdal_reader::GdalOpener::new(&cfg.reader.s57_options)?;
    Ok(Box::new(opener))
}

#[cfg(not(feature = "gdal"))]
fn chart_opener(_cfg: &Config) -> Result<Box<dyn ChartOpener>> {
    bail!("s57ingest was built without S-57 support; rebuild with `--features gdal`")
}
