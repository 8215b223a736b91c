//! Sitemap discovery
//!
//! # Components
//!
//! - `document`: classifies a buffered target and extracts `<loc>` values
//! - `input`: opens local and remote byte streams
//! - `source`: [`SitemapSource`] and its shared [`SourceHandle`]

pub mod document;
pub mod input;
mod source;

pub use document::{parse_document, SitemapDocument};
pub use input::{SourceBase, SourceInput};
pub use source::{SitemapSource, SourceHandle, MAX_INDEX_DEPTH};

use thiserror::Error;
use url::Url;

/// Errors raised while reading or parsing a sitemap
#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("Failed to read {location}: {reason}")]
    Fetch { location: String, reason: String },

    #[error("Malformed XML: {0}")]
    Xml(String),

    #[error("Document ended inside an open element")]
    Unbalanced,

    #[error("Document has no root element")]
    NoRootElement,
}

/// How a URL entered the crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlOrigin {
    /// Listed in the target or one of its children
    Sitemap,

    /// `Location` of a followed redirect; `hops` counts the redirects so far
    Redirect { hops: u32 },

    /// Bonus respawn of a successful URL
    Respawn,
}

impl UrlOrigin {
    /// Redirects already followed to reach this URL
    pub fn hops(&self) -> u32 {
        match self {
            Self::Redirect { hops } => *hops,
            Self::Sitemap | Self::Respawn => 0,
        }
    }
}

/// A URL emitted by the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredUrl {
    pub url: Url,
    pub origin: UrlOrigin,
}
