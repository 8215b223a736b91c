//! URL handling module for Sitemap-Sweep
//!
//! URLs are opaque to the crawler: they are never normalized or deduplicated.
//! This module only decides whether a candidate is requestable and resolves
//! redirect targets.

mod validate;

pub use validate::{resolve_location, validate_url};
