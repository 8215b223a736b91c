//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the event loop that coordinates a run:
//! - Feeding URLs from the sitemap source into the scheduler
//! - Dispatching requests while slots are free
//! - Classifying completed requests and recording them
//! - Rendering statistics and detecting completion on every UI tick
//!
//! Everything runs on one task. Requests are futures polled through a
//! `FuturesUnordered`, so the result store and the scheduler are only touched
//! between suspension points and need no locking.

use crate::config::{validate, Config, OutputMode};
use crate::crawler::scheduler::{Attempt, Scheduler};
use crate::crawler::{build_http_client, fetch_url, FailureKind, FetchResult};
use crate::output::{
    create_presenter, prepare_output_directory, saved_body_path, Presenter, ResultStore,
};
use crate::sitemap::{DiscoveredUrl, SitemapSource, SourceHandle, SourceInput, UrlOrigin};
use crate::state::{
    is_redirect_code, is_success_code, BrokenReason, Outcome, FAILURE_LABEL, INVALID_URL_LABEL,
    TIMEOUT_LABEL,
};
use crate::url::resolve_location;
use crate::{Result, SweepError};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use rand::Rng;
use reqwest::{Client, Method};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use url::Url;

/// Everything known about a finished run
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// Aggregated outcomes
    pub results: ResultStore,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run finished
    pub finished_at: DateTime<Utc>,

    /// The target as configured
    pub target: String,

    /// Configured concurrency
    pub concurrency: usize,

    /// Per-run output directory, when one was created
    pub output_dir: Option<PathBuf>,
}

/// A request that has run to completion
#[derive(Debug)]
struct Completion {
    id: u64,
    discovered: DiscoveredUrl,
    result: FetchResult,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    client: Client,
    scheduler: Scheduler,
    results: ResultStore,
    presenter: Box<dyn Presenter + Send>,
    output_dir: Option<PathBuf>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// Creates the per-run output directory when `broken` output or save
    /// mode is enabled.
    ///
    /// # Arguments
    ///
    /// * `config` - A validated configuration
    /// * `presenter` - Receives a statistics snapshot on every UI tick
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(SweepError)` - The HTTP client or the output directory could not be created
    pub fn new(config: Config, presenter: Box<dyn Presenter + Send>) -> Result<Self> {
        let client = build_http_client(&config.request)?;

        let output_dir = if config.output.needs_directory() {
            let dir = prepare_output_directory(
                Path::new(&config.output.destination),
                Utc::now().timestamp(),
            )?;
            Some(dir)
        } else {
            None
        };

        let scheduler = Scheduler::new(config.request.concurrency, config.request.dispatch_order);
        let results =
            ResultStore::with_additional_headers(config.request.count_response_headers.clone());

        Ok(Self {
            config: Arc::new(config),
            client,
            scheduler,
            results,
            presenter,
            output_dir,
        })
    }

    /// Directory created for this run, if any
    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    /// Runs the crawl until every discovered URL has finished
    ///
    /// The loop waits on three event sources:
    /// 1. A request completing
    /// 2. The sitemap source emitting a URL
    /// 3. The UI timer, which renders statistics and checks for completion
    ///
    /// After each event, queued URLs are dispatched until all slots are taken.
    /// The run is complete once the source is initialized and the number of
    /// finished attempts equals the number of URLs ever emitted.
    pub async fn run(mut self) -> Result<CrawlReport> {
        let started_at = Utc::now();
        let target = self.config.target.file.clone();
        tracing::info!(
            "Starting crawl of {} with concurrency {} ({} requests)",
            target,
            self.scheduler.concurrency(),
            self.config.request.request_type
        );

        let input = match SourceInput::from_location(&target) {
            Ok(input) => input,
            Err(e) => {
                let error = SweepError::SourceUnavailable {
                    location: target.clone(),
                    reason: e.to_string(),
                };
                tracing::error!(severity = "critical", "{}", error);
                return Ok(self.into_report(started_at));
            }
        };

        let (source, mut rx) =
            SitemapSource::new(input, self.client.clone(), self.config.target.target_type);
        let handle = source.handle();
        let source_task = tokio::spawn(source.run());

        let mut in_flight: FuturesUnordered<BoxFuture<'static, Completion>> =
            FuturesUnordered::new();
        let mut ticker = tokio::time::interval(self.config.output.timer_ui_duration());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut receiving = true;
        let mut resume_dispatch_at: Option<Instant> = None;

        loop {
            tokio::select! {
                Some(completion) = in_flight.next(), if !in_flight.is_empty() => {
                    self.handle_completion(completion, &handle);
                }
                discovered = rx.recv(), if receiving => match discovered {
                    Some(discovered) => {
                        self.scheduler.add_to_frontier(discovered);
                    }
                    None => receiving = false,
                },
                _ = ticker.tick() => {
                    let total = handle.emitted_count();
                    self.presenter.render_statistics(&self.results, total);
                    tracing::trace!(
                        queued = self.scheduler.frontier_size(),
                        running = self.scheduler.in_flight(),
                        "{} of {} URLs finished",
                        self.results.count_finished_urls(),
                        total
                    );

                    if handle.is_initialized()
                        && self.scheduler.is_idle()
                        && self.results.count_finished_urls() >= total as u64
                    {
                        break;
                    }
                }
                _ = sleep_until_some(resume_dispatch_at), if resume_dispatch_at.is_some() => {
                    resume_dispatch_at = None;
                }
            }

            // A pending spawn delay holds back dispatching without blocking
            // completions or the ticker.
            if resume_dispatch_at.is_some_and(|at| at > Instant::now()) {
                continue;
            }
            resume_dispatch_at = None;

            while let Some(attempt) = self.scheduler.try_dispatch() {
                in_flight.push(self.dispatch(attempt));
                if let Some(delay) = self.spawn_delay() {
                    resume_dispatch_at = Some(Instant::now() + delay);
                    break;
                }
            }
        }

        self.presenter.finish();

        match source_task.await {
            Ok(emitted) => tracing::debug!("Sitemap source emitted {} URLs", emitted),
            Err(e) => tracing::warn!("Sitemap source task failed: {}", e),
        }

        let report = self.into_report(started_at);
        tracing::info!(
            "Crawl completed: {} requests, {} broken, {} redirected in {}s",
            report.results.count_finished_urls(),
            report.results.get_broken_urls().len(),
            report.results.get_redirected_urls().len(),
            (report.finished_at - report.started_at).num_seconds()
        );
        Ok(report)
    }

    /// Builds the request future for one attempt
    fn dispatch(&self, attempt: Attempt) -> BoxFuture<'static, Completion> {
        let Attempt { id, discovered } = attempt;
        let save_to = self.save_path(&discovered.url, id);
        tracing::debug!(attempt = id, "Dispatching {}", discovered.url);

        run_attempt(
            self.client.clone(),
            self.config.request.request_type.as_method(),
            id,
            discovered,
            self.config.request.timeout,
            save_to,
        )
        .boxed()
    }

    /// Picks a random pause between the configured spawn delays
    ///
    /// Returns `None` when no delay is configured.
    fn spawn_delay(&self) -> Option<Duration> {
        let (min, max) = (
            self.config.request.spawn_delay_min,
            self.config.request.spawn_delay_max,
        );
        if max == 0 {
            return None;
        }

        let micros = rand::rng().random_range(min.min(max)..=max);
        Some(Duration::from_micros(micros))
    }

    fn save_path(&self, url: &Url, attempt_id: u64) -> Option<PathBuf> {
        match (&self.output_dir, self.config.output.mode) {
            (Some(dir), OutputMode::Save) => {
                Some(saved_body_path(dir, url.as_str(), attempt_id))
            }
            _ => None,
        }
    }

    /// Records a finished request and reacts to its outcome
    ///
    /// Every completion marks exactly one attempt as finished. New work
    /// (redirect targets, respawns) is emitted before that, so the emitted
    /// count never drops to the finished count while work remains.
    fn handle_completion(&mut self, completion: Completion, handle: &SourceHandle) {
        let Completion {
            id,
            discovered,
            result,
        } = completion;
        let url = discovered.url.as_str();

        self.record_response(&result);

        let outcome = classify(
            &discovered.url,
            discovered.origin.hops(),
            &result,
            self.config.request.follow_redirects,
            self.config.request.max_redirect_hops,
        );
        let state = outcome.attempt_state();
        tracing::debug!(attempt = id, %state, "{} finished: {:?}", url, outcome);

        match &outcome {
            Outcome::Success { .. } => {
                if self.should_respawn() {
                    tracing::debug!("Respawning {}", url);
                    handle.add_url(url, UrlOrigin::Respawn);
                }
            }
            Outcome::Redirect { location, .. } => {
                self.results.add_redirected_url(url, location.as_str());
                handle.add_url(
                    location.as_str(),
                    UrlOrigin::Redirect {
                        hops: discovered.origin.hops() + 1,
                    },
                );
            }
            Outcome::Broken { reason, .. } => {
                if *reason == BrokenReason::RedirectLimit {
                    tracing::warn!("Redirect chain limit reached at {}", url);
                } else {
                    tracing::warn!(reason = %reason, "Broken URL {}", url);
                }
                self.results.add_broken_url(url, reason.clone());
            }
            Outcome::Skipped { reason } => {
                tracing::warn!("Skipped {}: {}", url, reason);
                self.results.add_broken_url(url, BrokenReason::InvalidUrl);
            }
        }

        self.results.done(url);
        self.scheduler.complete(id, state);
    }

    /// Folds status, headers and size of any result into the tally
    fn record_response(&mut self, result: &FetchResult) {
        match result {
            FetchResult::Response {
                status_code,
                headers,
                bytes,
                ..
            } => {
                self.results.add_status_code(*status_code);
                self.results.count_additional_headers(headers);
                self.results.add_processed_data(*bytes);
            }
            FetchResult::Failed { kind, .. } => match kind {
                FailureKind::Status(code) => self.results.add_status_code(*code),
                FailureKind::Timeout => self.results.add_status_label(TIMEOUT_LABEL),
                FailureKind::Transport => self.results.add_status_label(FAILURE_LABEL),
                FailureKind::InvalidRequest => self.results.add_status_label(INVALID_URL_LABEL),
            },
        }
    }

    fn should_respawn(&self) -> bool {
        let percent = self.config.request.bonus_respawn;
        percent > 0 && rand::rng().random_range(0..100u8) < percent
    }

    fn into_report(self, started_at: DateTime<Utc>) -> CrawlReport {
        CrawlReport {
            results: self.results,
            started_at,
            finished_at: Utc::now(),
            target: self.config.target.file.clone(),
            concurrency: self.scheduler.concurrency(),
            output_dir: self.output_dir,
        }
    }
}

/// Resolves at `at`, or never when there is nothing to wait for
async fn sleep_until_some(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Runs one request under the configured timeout
async fn run_attempt(
    client: Client,
    method: Method,
    id: u64,
    discovered: DiscoveredUrl,
    timeout_secs: f64,
    save_to: Option<PathBuf>,
) -> Completion {
    let timeout = Duration::from_secs_f64(timeout_secs);
    let request = fetch_url(&client, method, &discovered.url, save_to.as_deref());

    let result = match tokio::time::timeout(timeout, request).await {
        Ok(result) => result,
        Err(_) => FetchResult::timed_out(timeout_secs),
    };

    Completion {
        id,
        discovered,
        result,
    }
}

/// Decides the outcome of a finished request
///
/// # Arguments
///
/// * `url` - The requested URL, used to resolve relative `Location` values
/// * `hops` - Redirects already followed to reach `url`
/// * `result` - What the fetcher returned
/// * `follow_redirects` - Whether redirect codes are followed
/// * `max_hops` - Optional redirect chain limit
pub fn classify(
    url: &Url,
    hops: u32,
    result: &FetchResult,
    follow_redirects: bool,
    max_hops: Option<u32>,
) -> Outcome {
    match result {
        FetchResult::Response {
            status_code,
            location,
            bytes,
            ..
        } => {
            let status_code = *status_code;

            if is_success_code(status_code) {
                return Outcome::Success {
                    status_code,
                    bytes: *bytes,
                };
            }

            if follow_redirects && is_redirect_code(status_code) {
                let target = location
                    .as_deref()
                    .and_then(|location| resolve_location(url, location).ok());

                return match target {
                    Some(_) if max_hops.is_some_and(|max| hops >= max) => Outcome::Broken {
                        status_code: Some(status_code),
                        reason: BrokenReason::RedirectLimit,
                    },
                    Some(location) => Outcome::Redirect {
                        status_code,
                        location,
                    },
                    None => Outcome::Broken {
                        status_code: Some(status_code),
                        reason: BrokenReason::Status(status_code),
                    },
                };
            }

            Outcome::Broken {
                status_code: Some(status_code),
                reason: BrokenReason::Status(status_code),
            }
        }
        FetchResult::Failed { kind, message } => match kind {
            FailureKind::Timeout => Outcome::Broken {
                status_code: None,
                reason: BrokenReason::Timeout,
            },
            FailureKind::Status(code) => Outcome::Broken {
                status_code: Some(*code),
                reason: BrokenReason::Status(*code),
            },
            FailureKind::Transport => Outcome::Broken {
                status_code: None,
                reason: BrokenReason::Failure,
            },
            FailureKind::InvalidRequest => Outcome::Skipped {
                reason: message.clone(),
            },
        },
    }
}

/// Runs the main crawl operation
///
/// This function orchestrates the entire crawl process:
///
/// 1. Build the HTTP client and the output directory
/// 2. Start the sitemap source
/// 3. Dispatch, classify and record until every URL has finished
/// 4. Return the report
///
/// # Arguments
///
/// * `config` - The run configuration, validated before anything starts
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl completed
/// * `Err(SweepError)` - The configuration is invalid or the run could not be started
///
/// # Example
///
/// ```no_run
/// use sitemap_sweep::config::load_validated_config;
/// use sitemap_sweep::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_validated_config(Path::new("config.toml"))?;
/// let report = run_crawl(config).await?;
/// println!("{} requests", report.results.count_finished_urls());
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config) -> Result<CrawlReport> {
    validate(&config)?;
    let presenter = create_presenter(config.output.presenter, config.request.concurrency);
    Coordinator::new(config, presenter)?.run().await
}
