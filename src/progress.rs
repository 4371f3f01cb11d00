//! Ingest progress reporting.
//!
//! Reports observable progress during a run so users see which file is being
//! ingested and how many remain. Progress is emitted on **stderr** so stdout
//! stays parseable for scripts.

use std::io::Write;

/// A single progress event for an ingest run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestProgressEvent {
    /// Walking the input path. Total unknown.
    Discovering { path: String },
    /// `n` of `total` files finished; `file_name` is the one that just did.
    Ingesting {
        n: u64,
        total: u64,
        file_name: String,
        success: bool,
    },
}

/// Reports ingest progress. Called once per finished file, whatever its
/// outcome.
pub trait IngestProgressReporter: Send + Sync {
    fn report(&self, event: IngestProgressEvent);
}

/// Human-friendly progress on stderr: "ingest  1,234 / 5,000 files  US5CA12M.000".
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        let line = match &event {
            IngestProgressEvent::Discovering { path } => {
                format!("ingest {}  discovering...\n", path)
            }
            IngestProgressEvent::Ingesting {
                n,
                total,
                file_name,
                success,
            } => {
                format!(
                    "ingest  {} / {} files  {}{}\n",
                    format_number(*n),
                    format_number(*total),
                    file_name,
                    if *success { "" } else { "  FAILED" }
                )
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent) {
        let obj = match &event {
            IngestProgressEvent::Discovering { path } => serde_json::json!({
                "event": "progress",
                "phase": "discovering",
                "path": path
            }),
            IngestProgressEvent::Ingesting {
                n,
                total,
                file_name,
                success,
            } => serde_json::json!({
                "event": "progress",
                "phase": "ingesting",
                "n": n,
                "total": total,
                "file": file_name,
                "success": success
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

/// Any `Fn(n, total, file_name)` closure receives the per-file events.
impl<F> IngestProgressReporter for F
where
    F: Fn(u64, u64, &str) + Send + Sync,
{
    fn report(&self, event: IngestProgressEvent) {
        if let IngestProgressEvent::Ingesting {
            n,
            total,
            file_name,
            ..
        } = event
        {
            self(n, total, &file_name);
        }
    }
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
