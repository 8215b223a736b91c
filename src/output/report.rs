//! End-of-run output
//!
//! This module handles:
//! - Creating the per-run output directory
//! - Formatting the final summary
//! - Writing `broken.txt`
//! - Naming and writing saved response bodies

use crate::crawler::CrawlReport;
use crate::output::{OutputError, OutputResult, ResultStore};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the broken URL listing inside the output directory
pub const BROKEN_FILE_NAME: &str = "broken.txt";

/// Separator between the sanitized URL and the attempt id of a saved body
const SAVED_BODY_SEPARATOR: &str = "_____";

/// Longest sanitized URL used in a saved body file name
const MAX_FILE_STEM: usize = 200;

/// Creates `<destination>/<unix timestamp>` and returns its path
///
/// # Arguments
///
/// * `destination` - Base directory, created if missing
/// * `timestamp` - Seconds since the epoch naming the run directory
///
/// # Returns
///
/// * `Ok(PathBuf)` - The created directory
/// * `Err(OutputError)` - The directory could not be created
pub fn prepare_output_directory(destination: &Path, timestamp: i64) -> OutputResult<PathBuf> {
    let dir = destination.join(timestamp.to_string());
    fs::create_dir_all(&dir).map_err(|e| {
        OutputError::Write(format!(
            "cannot create output directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    tracing::debug!("Output directory: {}", dir.display());
    Ok(dir)
}

/// Formats the broken ledger as `<reason>: <url>` lines
pub fn format_broken_urls(results: &ResultStore) -> String {
    results
        .get_broken_urls()
        .iter()
        .map(|(url, reason)| format!("{}: {}", reason, url))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Writes `broken.txt` into `dir`
///
/// Nothing is written when no URL is broken.
///
/// # Returns
///
/// * `Ok(Some(path))` - The file that was written
/// * `Ok(None)` - There was nothing to write
/// * `Err(OutputError)` - Writing failed
pub fn write_broken_urls(results: &ResultStore, dir: &Path) -> OutputResult<Option<PathBuf>> {
    if results.get_broken_urls().is_empty() {
        return Ok(None);
    }

    let path = dir.join(BROKEN_FILE_NAME);
    let mut content = format_broken_urls(results);
    content.push('\n');
    fs::write(&path, content)?;

    tracing::info!(
        "Wrote {} broken URLs to {}",
        results.get_broken_urls().len(),
        path.display()
    );
    Ok(Some(path))
}

/// Replaces every character that is unsafe in a file name
pub fn sanitize_filename(url: &str) -> String {
    url.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_FILE_STEM)
        .collect()
}

/// Path of the saved body for one attempt
pub fn saved_body_path(dir: &Path, url: &str, attempt_id: u64) -> PathBuf {
    dir.join(format!(
        "{}{}{}",
        sanitize_filename(url),
        SAVED_BODY_SEPARATOR,
        attempt_id
    ))
}

/// Formats a byte count with a binary unit
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

/// Formats the end-of-run summary printed by the binary
pub fn format_summary(report: &CrawlReport) -> String {
    let results = &report.results;
    let duration = report.finished_at - report.started_at;
    let seconds = duration.num_milliseconds() as f64 / 1000.0;

    let mut out = String::new();
    out.push_str("=== Sitemap Sweep Summary ===\n\n");
    out.push_str(&format!("Target:       {}\n", report.target));
    out.push_str(&format!("Started:      {}\n", report.started_at.to_rfc3339()));
    out.push_str(&format!("Finished:     {}\n", report.finished_at.to_rfc3339()));
    out.push_str(&format!("Duration:     {:.2}s\n", seconds));
    out.push_str(&format!("Concurrency:  {}\n", report.concurrency));
    out.push_str(&format!("Requests:     {}\n", results.count_finished_urls()));
    out.push_str(&format!(
        "Data:         {}\n",
        format_bytes(results.get_total_data())
    ));
    out.push_str(&format!("Broken:       {}\n", results.get_broken_urls().len()));
    out.push_str(&format!(
        "Redirected:   {}\n",
        results.get_redirected_urls().len()
    ));
    if let Some(dir) = &report.output_dir {
        out.push_str(&format!("Output:       {}\n", dir.display()));
    }

    if !results.get_status_codes().is_empty() {
        out.push_str("\nResponses:\n");
        for (key, count) in results.get_status_codes() {
            out.push_str(&format!("  {:<24} {}\n", key.to_string(), count));
        }
    }

    out
}
