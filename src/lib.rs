//! # s57-ingest
//!
//! Batch ingestion of S-57 electronic navigational charts into PostGIS.
//!
//! Each `.000` base cell becomes one row in `charts` plus one row per
//! feature in `features`, tagged with the zoom range at which it should be
//! drawn. Re-ingesting a chart replaces it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌───────────┐   ┌────────────┐
//! │ discover │──▶│ ChartOpener │──▶│  extract  │──▶│ ChartStore │
//! │  *.000   │   │  (GDAL/OGR) │   │  z-range  │   │  (PostGIS) │
//! └──────────┘   └─────────────┘   └───────────┘   └────────────┘
//!                   ChartIngest: up to N files in flight
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! s57ingest --init-schema -d postgresql://localhost/njord
//! s57ingest /charts/ENC_ROOT -r -w 8
//! s57ingest /charts/ENC_ROOT -r --list
//! s57ingest /charts/US5CA12M.000 --info
//! s57ingest --stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection pool |
//! | [`migrate`] | Schema creation |
//! | [`pg_store`] | PostGIS `ChartStore` |
//! | [`discover`] | Chart file discovery |
//! | [`ingest`] | Ingestion pipeline |
//! | [`progress`] | Progress reporting |
//! | [`info`] | `--list` / `--info` output |
//! | [`stats`] | `--stats` output |
//! | `gdal_reader` | OGR-backed chart reader (feature `gdal`) |
//!
//! Models, zoom mapping, extraction, and the store trait live in
//! [`s57_ingest_core`].

pub mod config;
pub mod db;
pub mod discover;
#[cfg(feature = "gdal")]
pub mod gdal_reader;
pub mod info;
pub mod ingest;
pub mod migrate;
pub mod pg_store;
pub mod progress;
pub mod stats;
