//! Opening sitemap byte streams
//!
//! Targets and child sitemaps can be filesystem paths, `file://` URLs or
//! `http(s)://` URLs. Remote bodies are streamed through the crawl's HTTP
//! client and buffered until end-of-stream.

use crate::sitemap::SitemapError;
use crate::url::resolve_location;
use futures::TryStreamExt;
use reqwest::header::LOCATION;
use reqwest::Client;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::io::StreamReader;
use url::Url;

/// Upper bound for fetching one remote sitemap, redirects included
pub const SOURCE_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Redirects followed while fetching a remote sitemap
pub const MAX_SOURCE_REDIRECTS: usize = 5;

/// A readable sitemap source
pub enum SourceInput {
    /// Local file
    File(PathBuf),

    /// Remote document fetched with GET
    Remote(Url),

    /// Arbitrary byte stream, e.g. an in-memory buffer
    Reader {
        name: String,
        reader: Box<dyn AsyncRead + Send + Sync + Unpin>,
    },
}

/// Where relative child locations are resolved from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceBase {
    Remote(Url),
    Directory(PathBuf),
    None,
}

impl SourceInput {
    /// Interprets a target location
    ///
    /// `http(s)://` becomes [`SourceInput::Remote`], `file://` and anything
    /// without a scheme become [`SourceInput::File`].
    pub fn from_location(location: &str) -> Result<Self, SitemapError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(SitemapError::Fetch {
                location: String::new(),
                reason: "empty location".to_string(),
            });
        }

        match Url::parse(location) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(Self::Remote(url)),
            Ok(url) if url.scheme() == "file" => {
                url.to_file_path()
                    .map(Self::File)
                    .map_err(|_| SitemapError::Fetch {
                        location: location.to_string(),
                        reason: "invalid file URL".to_string(),
                    })
            }
            Ok(url) if location.contains("://") => Err(SitemapError::Fetch {
                location: location.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            }),
            _ => Ok(Self::File(PathBuf::from(location))),
        }
    }

    /// Wraps an already open byte stream
    pub fn from_reader(
        name: impl Into<String>,
        reader: impl AsyncRead + Send + Sync + Unpin + 'static,
    ) -> Self {
        Self::Reader {
            name: name.into(),
            reader: Box::new(reader),
        }
    }

    /// Base used to resolve relative child locations
    pub fn base(&self) -> SourceBase {
        match self {
            Self::Remote(url) => SourceBase::Remote(url.clone()),
            Self::File(path) => path
                .parent()
                .map(|dir| SourceBase::Directory(dir.to_path_buf()))
                .unwrap_or(SourceBase::None),
            Self::Reader { .. } => SourceBase::None,
        }
    }

    /// Reads the whole source into memory
    pub async fn read_all(self, client: &Client) -> Result<Vec<u8>, SitemapError> {
        match self {
            Self::File(path) => tokio::fs::read(&path)
                .await
                .map_err(|e| SitemapError::Fetch {
                    location: path.display().to_string(),
                    reason: e.to_string(),
                }),
            Self::Remote(url) => {
                let location = url.to_string();
                tokio::time::timeout(SOURCE_FETCH_TIMEOUT, fetch_remote(client, url))
                    .await
                    .map_err(|_| SitemapError::Fetch {
                        location,
                        reason: format!("timed out after {}s", SOURCE_FETCH_TIMEOUT.as_secs()),
                    })?
            }
            Self::Reader { name, mut reader } => {
                let mut buf = Vec::new();
                reader
                    .read_to_end(&mut buf)
                    .await
                    .map_err(|e| SitemapError::Fetch {
                        location: name,
                        reason: e.to_string(),
                    })?;
                Ok(buf)
            }
        }
    }
}

impl SourceBase {
    /// Turns a child `<loc>` into a readable input
    pub fn resolve(&self, location: &str) -> Result<SourceInput, SitemapError> {
        let location = location.trim();
        if location.contains("://") {
            return SourceInput::from_location(location);
        }

        match self {
            Self::Remote(base) => base
                .join(location)
                .map(SourceInput::Remote)
                .map_err(|e| SitemapError::Fetch {
                    location: location.to_string(),
                    reason: e.to_string(),
                }),
            Self::Directory(dir) if Path::new(location).is_relative() => {
                Ok(SourceInput::File(dir.join(location)))
            }
            _ => SourceInput::from_location(location),
        }
    }
}

impl fmt::Display for SourceInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => write!(f, "{}", url),
            Self::Reader { name, .. } => write!(f, "{}", name),
        }
    }
}

impl fmt::Debug for SourceInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Remote(url) => f.debug_tuple("Remote").field(&url.as_str()).finish(),
            Self::Reader { name, .. } => f.debug_struct("Reader").field("name", name).finish(),
        }
    }
}

/// GETs a remote sitemap, following a few redirects by hand
async fn fetch_remote(client: &Client, url: Url) -> Result<Vec<u8>, SitemapError> {
    let mut current = url;

    for _ in 0..=MAX_SOURCE_REDIRECTS {
        let response = client
            .get(current.clone())
            .send()
            .await
            .map_err(|e| SitemapError::Fetch {
                location: current.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.is_redirection() {
            let next = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|location| resolve_location(&current, location).ok())
                .ok_or_else(|| SitemapError::Fetch {
                    location: current.to_string(),
                    reason: format!("HTTP {} without usable Location", status.as_u16()),
                })?;

            tracing::debug!("Sitemap {} redirected to {}", current, next);
            current = next;
            continue;
        }

        if !status.is_success() {
            return Err(SitemapError::Fetch {
                location: current.to_string(),
                reason: format!("HTTP {}", status.as_u16()),
            });
        }

        let stream = response.bytes_stream().map_err(io::Error::other);
        let reader = StreamReader::new(stream);
        tokio::pin!(reader);

        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .map_err(|e| SitemapError::Fetch {
                location: current.to_string(),
                reason: e.to_string(),
            })?;
        return Ok(buf);
    }

    Err(SitemapError::Fetch {
        location: current.to_string(),
        reason: format!("more than {} redirects", MAX_SOURCE_REDIRECTS),
    })
}
