//! # s57-ingest core
//!
//! Runtime-agnostic logic for s57-ingest: chart and feature models, zoom
//! mapping, the chart reader boundary, record extraction, and the store
//! abstraction.
//!
//! This crate contains no tokio, sqlx, GDAL, or filesystem I/O. Concrete
//! readers and the PostGIS store live in the `s57-ingest` crate.

pub mod extract;
pub mod models;
pub mod reader;
pub mod store;
pub mod zoom;
