//! Live statistics rendering
//!
//! The coordinator calls [`Presenter::render_statistics`] once per UI tick.
//! Presenters write straight to stdout and never fail the crawl.

use crate::config::PresenterKind;
use crate::output::ResultStore;
use std::io::Write;
use std::time::Instant;

/// Renders a snapshot of the crawl statistics
pub trait Presenter {
    /// Called once per tick with the current results and the number of URLs seen so far
    fn render_statistics(&mut self, results: &ResultStore, total_urls: usize);

    /// Called once after the last tick
    fn finish(&mut self) {}
}

/// Creates the presenter selected in the configuration
pub fn create_presenter(kind: PresenterKind, concurrency: usize) -> Box<dyn Presenter + Send> {
    match kind {
        PresenterKind::Echo => Box::new(EchoPresenter::new(concurrency)),
        PresenterKind::Table => Box::new(TablePresenter::new(concurrency)),
        PresenterKind::Quiet => Box::new(QuietPresenter),
    }
}

/// Progress counters derived from a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// URLs not yet dispatched
    pub queued: u64,
    /// URLs currently being requested
    pub running: u64,
    /// Finished attempts
    pub done: u64,
    /// URLs observed but not finished
    pub remaining: u64,
}

impl Progress {
    /// Computes progress from the finished count and the number of observed URLs
    pub fn from_snapshot(results: &ResultStore, total_urls: usize, concurrency: usize) -> Self {
        let done = results.count_finished_urls();
        let remaining = (total_urls as u64).saturating_sub(done);
        let running = remaining.min(concurrency as u64);

        Self {
            queued: remaining - running,
            running,
            done,
            remaining,
        }
    }
}

/// Formats the tally as `200: 12, 404: 1`
pub fn format_tally(results: &ResultStore) -> String {
    results
        .get_status_codes()
        .iter()
        .map(|(key, count)| format!("{}: {}", key, count))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Single line refreshed in place
pub struct EchoPresenter {
    started: Instant,
    concurrency: usize,
}

impl EchoPresenter {
    pub fn new(concurrency: usize) -> Self {
        Self {
            started: Instant::now(),
            concurrency,
        }
    }

    fn format_line(&self, results: &ResultStore, total_urls: usize) -> String {
        let progress = Progress::from_snapshot(results, total_urls, self.concurrency);
        format!(
            "[{:>8.1}s] Queued: {} | Running: {}/{} | Done: {} | Remaining: {} | {}",
            self.started.elapsed().as_secs_f64(),
            progress.queued,
            progress.running,
            self.concurrency,
            progress.done,
            progress.remaining,
            format_tally(results)
        )
    }
}

impl Presenter for EchoPresenter {
    fn render_statistics(&mut self, results: &ResultStore, total_urls: usize) {
        let line = self.format_line(results, total_urls);
        let mut stdout = std::io::stdout().lock();
        // Trailing spaces wipe leftovers of a longer previous line
        let _ = write!(stdout, "\r{:<120}", line);
        let _ = stdout.flush();
    }

    fn finish(&mut self) {
        println!();
    }
}

/// Header row followed by one row per tick
///
/// The header is printed again whenever a new tally bucket appears.
pub struct TablePresenter {
    started: Instant,
    concurrency: usize,
    columns: Vec<String>,
}

impl TablePresenter {
    pub fn new(concurrency: usize) -> Self {
        Self {
            started: Instant::now(),
            concurrency,
            columns: Vec::new(),
        }
    }

    fn header(&self) -> String {
        let mut header = format!(
            "{:>9} {:>8} {:>8} {:>8} {:>10}",
            "elapsed", "queued", "running", "done", "remaining"
        );
        for column in &self.columns {
            header.push_str(&format!(" {:>10}", column));
        }
        header
    }

    fn row(&self, results: &ResultStore, total_urls: usize) -> String {
        let progress = Progress::from_snapshot(results, total_urls, self.concurrency);
        let mut row = format!(
            "{:>8.1}s {:>8} {:>8} {:>8} {:>10}",
            self.started.elapsed().as_secs_f64(),
            progress.queued,
            progress.running,
            progress.done,
            progress.remaining
        );
        for column in &self.columns {
            row.push_str(&format!(" {:>10}", results.tally_for(column)));
        }
        row
    }

    /// Updates the column set, returns true when it changed
    fn refresh_columns(&mut self, results: &ResultStore) -> bool {
        let columns: Vec<String> = results
            .get_status_codes()
            .keys()
            .map(ToString::to_string)
            .collect();

        if columns == self.columns && !self.columns.is_empty() {
            return false;
        }
        self.columns = columns;
        true
    }
}

impl Presenter for TablePresenter {
    fn render_statistics(&mut self, results: &ResultStore, total_urls: usize) {
        if self.refresh_columns(results) {
            println!("{}", self.header());
        }
        println!("{}", self.row(results, total_urls));
    }
}

/// Renders nothing
pub struct QuietPresenter;

impl Presenter for QuietPresenter {
    fn render_statistics(&mut self, _results: &ResultStore, _total_urls: usize) {}
}
