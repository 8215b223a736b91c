//! SitemapSource: turns a target into a live stream of URLs
//!
//! The source buffers its input, classifies it, and pushes every valid
//! location into an unbounded channel. Index children are fetched one after
//! another. The [`SourceHandle`] exposes the running emission count and the
//! `initialized` flag the coordinator needs for termination, and lets the
//! coordinator inject redirect targets and respawns into the same channel.

use crate::config::TargetType;
use crate::sitemap::document::{parse_document, parse_text, parse_xml, SitemapDocument};
use crate::sitemap::input::{SourceBase, SourceInput};
use crate::sitemap::{DiscoveredUrl, UrlOrigin};
use crate::url::validate_url;
use crate::SweepError;
use futures::future::{BoxFuture, FutureExt};
use reqwest::Client;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Deepest sitemap index nesting that is still followed
pub const MAX_INDEX_DEPTH: usize = 4;

/// Shared emission side of a [`SitemapSource`]
#[derive(Debug, Clone)]
pub struct SourceHandle {
    tx: mpsc::UnboundedSender<DiscoveredUrl>,
    emitted: Arc<AtomicUsize>,
    initialized: Arc<AtomicBool>,
}

impl SourceHandle {
    fn new(tx: mpsc::UnboundedSender<DiscoveredUrl>) -> Self {
        Self {
            tx,
            emitted: Arc::new(AtomicUsize::new(0)),
            initialized: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Validates and emits a URL candidate
    ///
    /// Invalid candidates are logged and dropped without being counted.
    /// Returns true when the URL was emitted.
    pub fn add_url(&self, candidate: &str, origin: UrlOrigin) -> bool {
        let url = match validate_url(candidate) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Dropping invalid URL candidate {:?}: {}", candidate, e);
                return false;
            }
        };

        // Counted before it becomes visible to the receiver
        self.emitted.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(DiscoveredUrl { url, origin }).is_err() {
            self.emitted.fetch_sub(1, Ordering::SeqCst);
            tracing::debug!("URL receiver closed, dropping {}", candidate);
            return false;
        }
        true
    }

    /// Every URL emitted so far, including redirect targets and respawns
    pub fn emitted_count(&self) -> usize {
        self.emitted.load(Ordering::SeqCst)
    }

    /// True once the target and all of its children have been processed
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::SeqCst);
    }
}

/// Discovers URLs from a sitemap, sitemap index or URL list
pub struct SitemapSource {
    input: SourceInput,
    client: Client,
    target_type: TargetType,
    handle: SourceHandle,
}

impl SitemapSource {
    /// Creates a source and the receiving end of its URL channel
    ///
    /// # Arguments
    ///
    /// * `input` - Where the target is read from
    /// * `client` - HTTP client used for remote targets and children
    /// * `target_type` - `Txt` skips the XML attempt
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sitemap_sweep::config::TargetType;
    /// use sitemap_sweep::sitemap::{SitemapSource, SourceInput};
    ///
    /// # async fn example() {
    /// let input = SourceInput::from_location("sitemap.xml").unwrap();
    /// let (source, mut rx) = SitemapSource::new(input, reqwest::Client::new(), TargetType::Xml);
    /// let handle = source.handle();
    /// tokio::spawn(source.run());
    ///
    /// while let Some(discovered) = rx.recv().await {
    ///     println!("{}", discovered.url);
    /// }
    /// assert!(handle.is_initialized());
    /// # }
    /// ```
    pub fn new(
        input: SourceInput,
        client: Client,
        target_type: TargetType,
    ) -> (Self, mpsc::UnboundedReceiver<DiscoveredUrl>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = Self {
            input,
            client,
            target_type,
            handle: SourceHandle::new(tx),
        };
        (source, rx)
    }

    /// Returns a handle sharing this source's channel and counters
    pub fn handle(&self) -> SourceHandle {
        self.handle.clone()
    }

    /// Reads the target to the end and emits every URL it yields
    ///
    /// The source is marked initialized when this returns, on success and on
    /// failure alike. An unavailable target is logged as critical and yields
    /// zero URLs.
    ///
    /// # Returns
    ///
    /// The number of URLs emitted from the target and its children
    pub async fn run(self) -> usize {
        let Self {
            input,
            client,
            target_type,
            handle,
        } = self;

        let location = input.to_string();
        let base = input.base();
        tracing::info!("Reading target {}", location);

        let emitted = match input.read_all(&client).await {
            Ok(bytes) => emit_target(&client, &handle, base, &bytes, target_type).await,
            Err(e) => {
                let error = SweepError::SourceUnavailable {
                    location,
                    reason: e.to_string(),
                };
                tracing::error!(severity = "critical", "{}", error);
                0
            }
        };

        handle.mark_initialized();
        tracing::info!("Sitemap source initialized, {} URLs discovered", emitted);
        emitted
    }
}

async fn emit_target(
    client: &Client,
    handle: &SourceHandle,
    base: SourceBase,
    bytes: &[u8],
    target_type: TargetType,
) -> usize {
    let document = match target_type {
        TargetType::Txt => SitemapDocument::Text(parse_text(bytes)),
        TargetType::Xml => parse_document(bytes),
    };
    tracing::debug!("Target classified as {}", document.kind());

    match document {
        SitemapDocument::Index(children) => expand_index(client, handle, base, children, 1).await,
        SitemapDocument::UrlSet(locations) | SitemapDocument::Text(locations) => {
            emit_all(handle, &locations)
        }
        SitemapDocument::Other { root } => {
            tracing::info!("Root element <{}> is not a sitemap, no URLs discovered", root);
            0
        }
    }
}

/// Fetches every child of an index in order and emits its URLs
fn expand_index<'a>(
    client: &'a Client,
    handle: &'a SourceHandle,
    base: SourceBase,
    children: Vec<String>,
    depth: usize,
) -> BoxFuture<'a, usize> {
    async move {
        let mut emitted = 0;

        for child in children {
            let input = match base.resolve(&child) {
                Ok(input) => input,
                Err(e) => {
                    tracing::warn!("Skipping child sitemap {}: {}", child, e);
                    continue;
                }
            };
            let child_base = input.base();

            let bytes = match input.read_all(client).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!("Skipping child sitemap {}: {}", child, e);
                    continue;
                }
            };

            match parse_xml(&bytes) {
                Ok(SitemapDocument::UrlSet(locations)) => {
                    let count = emit_all(handle, &locations);
                    tracing::debug!("Child sitemap {} yielded {} URLs", child, count);
                    emitted += count;
                }
                Ok(SitemapDocument::Index(grandchildren)) => {
                    if depth >= MAX_INDEX_DEPTH {
                        tracing::warn!(
                            "Skipping sitemap index {}: nested deeper than {}",
                            child,
                            MAX_INDEX_DEPTH
                        );
                        continue;
                    }
                    emitted +=
                        expand_index(client, handle, child_base, grandchildren, depth + 1).await;
                }
                Ok(other) => {
                    tracing::warn!("Skipping child sitemap {}: found {}", child, other.kind());
                }
                Err(e) => {
                    tracing::warn!("Skipping malformed child sitemap {}: {}", child, e);
                }
            }
        }

        emitted
    }
    .boxed()
}

fn emit_all(handle: &SourceHandle, locations: &[String]) -> usize {
    locations
        .iter()
        .filter(|location| handle.add_url(location, UrlOrigin::Sitemap))
        .count()
}
