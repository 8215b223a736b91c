//! Append-only aggregation of crawl results
//!
//! The store is owned by the coordinator and only mutated between suspension
//! points of its event loop, so it needs no locking.

use crate::state::BrokenReason;
use reqwest::header::HeaderMap;
use std::collections::BTreeMap;
use std::fmt;

/// Bucket of the status tally
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TallyKey {
    /// HTTP status code of a response
    Status(u16),

    /// Sentinel for outcomes without a status code, e.g. `timeout`
    Label(String),

    /// Observed value of a tracked response header, shown as `X-Cache (HIT)`
    Header { name: String, value: String },
}

impl fmt::Display for TallyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "{}", code),
            Self::Label(label) => write!(f, "{}", label),
            Self::Header { name, value } => write!(f, "{} ({})", name, value),
        }
    }
}

/// Results of a crawl run
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    /// Occurrences per tally bucket
    status_codes: BTreeMap<TallyKey, u64>,

    /// URL -> reason of its latest broken attempt
    broken_urls: BTreeMap<String, BrokenReason>,

    /// Origin URL -> redirect target
    redirected_urls: BTreeMap<String, String>,

    /// Response body bytes received
    total_data: u64,

    /// Finished attempts
    finished: u64,

    /// Response header names whose values are tallied
    additional_headers: Vec<String>,
}

impl ResultStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that tallies the given response headers
    pub fn with_additional_headers(headers: Vec<String>) -> Self {
        Self {
            additional_headers: headers,
            ..Self::default()
        }
    }

    /// Bumps the tally for an HTTP status code
    pub fn add_status_code(&mut self, code: u16) {
        self.bump(TallyKey::Status(code));
    }

    /// Bumps the tally for a sentinel label such as `timeout`
    pub fn add_status_label(&mut self, label: impl Into<String>) {
        self.bump(TallyKey::Label(label.into()));
    }

    /// Records a broken URL; a later call for the same URL replaces the reason
    pub fn add_broken_url(&mut self, url: impl Into<String>, reason: BrokenReason) {
        self.broken_urls.insert(url.into(), reason);
    }

    /// Records a followed redirect
    pub fn add_redirected_url(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.redirected_urls.insert(from.into(), to.into());
    }

    /// Adds received body bytes
    pub fn add_processed_data(&mut self, bytes: u64) {
        self.total_data = self.total_data.saturating_add(bytes);
    }

    /// Marks one attempt as finished; URLs need not be unique
    pub fn done(&mut self, url: &str) {
        self.finished += 1;
        tracing::trace!(url, finished = self.finished, "attempt finished");
    }

    /// Folds the configured response headers into the tally
    ///
    /// Header names match case-insensitively; every value of a repeated header
    /// gets its own bump. Values that are not visible ASCII are shown lossily.
    pub fn count_additional_headers(&mut self, headers: &HeaderMap) {
        let mut observed = Vec::new();
        for name in &self.additional_headers {
            for value in headers.get_all(name.as_str()) {
                observed.push(TallyKey::Header {
                    name: name.clone(),
                    value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
                });
            }
        }

        for key in observed {
            self.bump(key);
        }
    }

    /// Number of finished attempts
    pub fn count_finished_urls(&self) -> u64 {
        self.finished
    }

    /// Status tally, ordered by key
    pub fn get_status_codes(&self) -> &BTreeMap<TallyKey, u64> {
        &self.status_codes
    }

    /// Broken URL ledger
    pub fn get_broken_urls(&self) -> &BTreeMap<String, BrokenReason> {
        &self.broken_urls
    }

    /// Redirect ledger
    pub fn get_redirected_urls(&self) -> &BTreeMap<String, String> {
        &self.redirected_urls
    }

    /// Total body bytes received
    pub fn get_total_data(&self) -> u64 {
        self.total_data
    }

    /// Tracked response header names
    pub fn additional_headers(&self) -> &[String] {
        &self.additional_headers
    }

    /// Sum of every bucket that is not a header observation
    ///
    /// Equals [`count_finished_urls`](Self::count_finished_urls) once a run completes.
    pub fn count_outcomes(&self) -> u64 {
        self.status_codes
            .iter()
            .filter(|(key, _)| !matches!(key, TallyKey::Header { .. }))
            .map(|(_, count)| count)
            .sum()
    }

    /// Looks up a tally bucket by its display label, e.g. `"404"` or `"X-Cache (HIT)"`
    pub fn tally_for(&self, label: &str) -> u64 {
        self.status_codes
            .iter()
            .find(|(key, _)| key.to_string() == label)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    fn bump(&mut self, key: TallyKey) {
        *self.status_codes.entry(key).or_insert(0) += 1;
    }
}
