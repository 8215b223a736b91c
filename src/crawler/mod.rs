//! Crawler module for request dispatch and outcome classification
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching and error classification
//! - Frontier queueing and concurrency admission
//! - Overall crawl coordination and termination

mod coordinator;
mod fetcher;
mod scheduler;

pub use coordinator::{classify, run_crawl, Coordinator, CrawlReport};
pub use fetcher::{build_http_client, classify_error, fetch_url, FailureKind, FetchResult};
pub use scheduler::Scheduler;
