//! Sitemap document classification and `<loc>` extraction
//!
//! A buffered target is either a sitemaps.org XML document (a `urlset` or a
//! `sitemapindex`) or a plain list with one URL per line. Extraction never
//! validates URLs; that happens when candidates are emitted.

use crate::sitemap::SitemapError;
use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

/// Namespace of the sitemaps.org protocol
pub const SITEMAP_NAMESPACE: &[u8] = b"http://www.sitemaps.org/schemas/sitemap/0.9";

/// What a buffered target turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// `<sitemapindex>`; the locations point to child sitemaps
    Index(Vec<String>),

    /// `<urlset>`; the locations are page URLs
    UrlSet(Vec<String>),

    /// Well-formed XML with an unknown root element
    Other { root: String },

    /// Not XML; every non-blank trimmed line
    Text(Vec<String>),
}

impl SitemapDocument {
    /// Short name used in log output
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Index(_) => "sitemap index",
            Self::UrlSet(_) => "sitemap",
            Self::Other { .. } => "unknown xml",
            Self::Text(_) => "text list",
        }
    }
}

/// Classifies a buffered target, falling back to plain text when it is not XML
pub fn parse_document(bytes: &[u8]) -> SitemapDocument {
    match parse_xml(bytes) {
        Ok(document) => document,
        Err(e) => {
            tracing::debug!("Target is not a sitemap document ({}), reading as text", e);
            SitemapDocument::Text(parse_text(bytes))
        }
    }
}

/// UTF-8 byte order mark written by some editors
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Returns every non-blank line, trimmed, in order
///
/// A leading UTF-8 byte order mark is dropped.
pub fn parse_text(bytes: &[u8]) -> Vec<String> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Parses a sitemaps.org document
///
/// `loc` elements count when they are unprefixed or bound to the sitemap
/// namespace, so `image:loc` and friends are skipped.
///
/// # Errors
///
/// * `SitemapError::Xml` - The reader rejected the document
/// * `SitemapError::NoRootElement` - The input ended without any element
/// * `SitemapError::Unbalanced` - The input ended inside an open element
pub fn parse_xml(bytes: &[u8]) -> Result<SitemapDocument, SitemapError> {
    let mut reader = NsReader::from_reader(bytes);

    let mut root: Option<String> = None;
    let mut depth = 0usize;
    let mut in_loc = false;
    let mut text = String::new();
    let mut locations = Vec::new();

    loop {
        let (namespace, event) = reader
            .read_resolved_event()
            .map_err(|e| SitemapError::Xml(e.to_string()))?;

        match event {
            Event::Start(ref e) => {
                if depth == 0 && root.is_some() {
                    return Err(SitemapError::Xml("multiple root elements".to_string()));
                }
                let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if root.is_none() {
                    root = Some(local.clone());
                }
                depth += 1;

                if local == "loc" && is_sitemap_namespace(&namespace) {
                    in_loc = true;
                    text.clear();
                }
            }
            Event::Empty(ref e) => {
                if depth == 0 {
                    if root.is_some() {
                        return Err(SitemapError::Xml("multiple root elements".to_string()));
                    }
                    root = Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                }
            }
            Event::Text(ref e) => {
                if in_loc {
                    let unescaped = e.unescape().map_err(|e| SitemapError::Xml(e.to_string()))?;
                    text.push_str(&unescaped);
                } else if depth == 0 {
                    let raw = String::from_utf8_lossy(e);
                    if !raw.trim().is_empty() {
                        return Err(SitemapError::Xml("text outside of root element".to_string()));
                    }
                }
            }
            Event::CData(ref e) => {
                if in_loc {
                    text.push_str(&String::from_utf8_lossy(e));
                }
            }
            Event::End(ref e) => {
                depth = depth.saturating_sub(1);
                if in_loc && e.local_name().as_ref() == b"loc" {
                    in_loc = false;
                    let location = text.trim();
                    if !location.is_empty() {
                        locations.push(location.to_string());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth > 0 {
        return Err(SitemapError::Unbalanced);
    }

    let root = root.ok_or(SitemapError::NoRootElement)?;
    let document = match root.as_str() {
        "sitemapindex" => SitemapDocument::Index(locations),
        "urlset" | "sitemap" => SitemapDocument::UrlSet(locations),
        _ => SitemapDocument::Other { root },
    };
    Ok(document)
}

fn is_sitemap_namespace(namespace: &ResolveResult) -> bool {
    match namespace {
        ResolveResult::Unbound => true,
        ResolveResult::Bound(ns) => ns.as_ref() == SITEMAP_NAMESPACE,
        ResolveResult::Unknown(_) => false,
    }
}
