//! PostgreSQL connection management.
//!
//! The pool holds at least one connection per ingest worker, so every file
//! in flight runs its statements on its own connection.

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::Config;

/// Create a connection pool to the configured database.
///
/// # Errors
///
/// Returns an error if the database cannot be reached within the acquire
/// timeout.
pub async fn connect(config: &Config) -> Result<PgPool> {
    let max_connections = u32::try_from(config.ingest.workers.max(1)).unwrap_or(u32::MAX);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.db.url)
        .await
        .with_context(|| format!("Failed to connect to database: {}", redact(&config.db.url)))?;

    Ok(pool)
}

/// Strip the password from a connection URL for display.
pub fn redact(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((userinfo, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match userinfo.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
        None => url.to_string(),
    }
}
