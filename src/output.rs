//! CLI output formatting for the `resize` and `batch` commands.
//!
//! Every URL is shown by its 1-based position and the URL itself; what
//! happened to it follows on indented context lines:
//!
//! ## Resize
//!
//! ```text
//! 001 https://example.com/me.jpg
//!     Saved: avatars/avatar_1.png (183 ms)
//! 002 https://example.com/missing.jpg
//!     Failed: Request to https://example.com/missing.jpg failed: HTTP status 404 Not Found
//!
//! Saved 1, failed 1
//! ```
//!
//! ## Batch
//!
//! ```text
//! 001 https://example.com/me.jpg
//!     Job: 5b0c9f3e-... COMPLETED
//!     Saved: avatars/avatar_1.png (211 ms)
//! 002 ftp://example.com/x.png
//!     Job: 0d4e1a77-... FAILED
//!     Error: Invalid image URL 'ftp://example.com/x.png': unsupported scheme 'ftp'
//!
//! Saved 1, failed 1
//! Workers drained
//! ```
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::jobs::{JobId, JobStatus, ShutdownOutcome};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `183 ms` below one second, `1.52 s` above.
pub fn format_elapsed(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    if millis < 1000 {
        format!("{millis} ms")
    } else {
        format!("{:.2} s", elapsed.as_secs_f64())
    }
}

fn saved_line(path: &Path, elapsed: Option<Duration>) -> String {
    match elapsed {
        Some(d) => format!("{}Saved: {} ({})", indent(1), path.display(), format_elapsed(d)),
        None => format!("{}Saved: {}", indent(1), path.display()),
    }
}

/// `Saved N, failed M`.
pub fn format_summary(saved: usize, failed: usize) -> String {
    format!("Saved {saved}, failed {failed}")
}

// ============================================================================
// Resize (direct mode)
// ============================================================================

/// What happened to one URL in direct mode.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectOutcome {
    Saved { path: PathBuf, elapsed: Duration },
    Failed { error: String },
}

pub fn format_direct_result(index: usize, url: &str, outcome: &DirectOutcome) -> Vec<String> {
    let detail = match outcome {
        DirectOutcome::Saved { path, elapsed } => saved_line(path, Some(*elapsed)),
        DirectOutcome::Failed { error } => format!("{}Failed: {}", indent(1), error),
    };
    vec![format!("{} {}", format_index(index), url), detail]
}

pub fn print_direct_result(index: usize, url: &str, outcome: &DirectOutcome) {
    for line in format_direct_result(index, url, outcome) {
        println!("{}", line);
    }
}

// ============================================================================
// Batch (job mode)
// ============================================================================

/// One submitted URL and where it ended up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchEntry {
    pub index: usize,
    pub url: String,
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_to: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_ms: Option<u64>,
}

impl BatchEntry {
    pub fn is_saved(&self) -> bool {
        self.saved_to.is_some()
    }
}

pub fn format_batch_entry(entry: &BatchEntry) -> Vec<String> {
    let mut lines = vec![
        format!("{} {}", format_index(entry.index), entry.url),
        format!("{}Job: {} {}", indent(1), entry.job_id, entry.status),
    ];
    if let Some(path) = &entry.saved_to {
        let elapsed = entry.processing_ms.map(Duration::from_millis);
        lines.push(saved_line(path, elapsed));
    }
    if let Some(error) = &entry.error {
        lines.push(format!("{}Error: {}", indent(1), error));
    }
    lines
}

/// Entries, a blank line, then the saved/failed summary.
pub fn format_batch_report(entries: &[BatchEntry]) -> Vec<String> {
    let mut lines: Vec<String> = entries.iter().flat_map(format_batch_entry).collect();
    let saved = entries.iter().filter(|e| e.is_saved()).count();
    lines.push(String::new());
    lines.push(format_summary(saved, entries.len() - saved));
    lines
}

pub fn print_batch_report(entries: &[BatchEntry]) {
    for line in format_batch_report(entries) {
        println!("{}", line);
    }
}

/// The report as a pretty-printed JSON array.
pub fn batch_report_json(entries: &[BatchEntry]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(entries)
}

pub fn format_shutdown(outcome: ShutdownOutcome) -> String {
    match outcome {
        ShutdownOutcome::Drained => "Workers drained".to_string(),
        ShutdownOutcome::Forced {
            aborted_workers,
            abandoned_jobs,
        } => format!(
            "Shutdown timed out: aborted {aborted_workers} workers, {abandoned_jobs} jobs abandoned"
        ),
    }
}
