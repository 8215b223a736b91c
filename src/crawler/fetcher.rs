//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the shared HTTP client with the configured request headers
//! - Issuing one GET or HEAD request per attempt
//! - Optionally saving response bodies
//! - Error classification
//!
//! Redirects are never followed by the client; the coordinator decides what
//! to do with a redirect response.

use crate::config::RequestConfig;
use crate::{ConfigError, SweepError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, LOCATION};
use reqwest::{redirect::Policy, Client, Method};
use std::path::Path;
use url::Url;

/// Why a request produced no usable response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The request did not finish in time
    Timeout,

    /// Upstream error carrying an HTTP status code
    Status(u16),

    /// Connection, TLS or body error
    Transport,

    /// No request could be built for the URL
    InvalidRequest,
}

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// A response was received, whatever its status
    Response {
        /// HTTP status code
        status_code: u16,
        /// Response headers
        headers: HeaderMap,
        /// Raw `Location` header value, if any
        location: Option<String>,
        /// Body bytes received; always 0 for HEAD
        bytes: u64,
    },

    /// No response
    Failed {
        /// Classification of the failure
        kind: FailureKind,
        /// Error description
        message: String,
    },
}

impl FetchResult {
    /// Builds the result recorded when a request exceeds its timeout
    pub fn timed_out(timeout_secs: f64) -> Self {
        Self::Failed {
            kind: FailureKind::Timeout,
            message: format!("no response within {}s", timeout_secs),
        }
    }
}

/// Builds the HTTP client shared by every request of a run
///
/// # Arguments
///
/// * `config` - The request configuration; its headers become default headers
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(SweepError)` - A header was invalid or the client could not be built
///
/// # Example
///
/// ```no_run
/// use sitemap_sweep::config::RequestConfig;
/// use sitemap_sweep::crawler::build_http_client;
///
/// let client = build_http_client(&RequestConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &RequestConfig) -> Result<Client, SweepError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            ConfigError::Validation(format!("invalid header name '{}': {}", name, e))
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| {
            ConfigError::Validation(format!("invalid value for header '{}': {}", name, e))
        })?;
        headers.insert(header_name, header_value);
    }

    let client = Client::builder()
        .default_headers(headers)
        .redirect(Policy::none()) // Handle redirects manually
        .pool_max_idle_per_host(config.concurrency)
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

/// Issues a single request
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `method` - GET or HEAD
/// * `url` - The URL to request
/// * `save_to` - Where to write the body of a GET response, if anywhere
///
/// # Returns
///
/// A FetchResult holding the response metadata or the classified failure
pub async fn fetch_url(
    client: &Client,
    method: Method,
    url: &Url,
    save_to: Option<&Path>,
) -> FetchResult {
    let response = match client.request(method.clone(), url.clone()).send().await {
        Ok(response) => response,
        Err(e) => return classify_error(&e),
    };

    let status_code = response.status().as_u16();
    let headers = response.headers().clone();
    let location = headers
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let bytes = if method == Method::HEAD {
        0
    } else {
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return classify_error(&e),
        };

        if let Some(path) = save_to {
            if let Err(e) = tokio::fs::write(path, &body).await {
                tracing::warn!("Failed to save body of {} to {}: {}", url, path.display(), e);
            }
        }
        body.len() as u64
    };

    FetchResult::Response {
        status_code,
        headers,
        location,
        bytes,
    }
}

/// Maps a reqwest error onto a failure kind
pub fn classify_error(e: &reqwest::Error) -> FetchResult {
    let kind = if e.is_timeout() {
        FailureKind::Timeout
    } else if let Some(status) = e.status() {
        FailureKind::Status(status.as_u16())
    } else if e.is_builder() {
        FailureKind::InvalidRequest
    } else {
        FailureKind::Transport
    };

    FetchResult::Failed {
        kind,
        message: e.to_string(),
    }
}
