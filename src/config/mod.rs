//! Configuration module for Sitemap-Sweep
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every value has a default, so a configuration file is optional; command line
//! flags are applied on top before [`validate`] runs.
//!
//! # Example
//!
//! ```no_run
//! use sitemap_sweep::config::{load_config, validate};
//! use std::path::Path;
//!
//! let mut config = load_config(Path::new("sweep.toml")).unwrap();
//! config.target.file = "https://example.com/sitemap.xml".to_string();
//! validate(&config).unwrap();
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, DispatchOrder, OutputConfig, OutputMode, PresenterKind, RequestConfig, RequestType,
    TargetConfig, TargetType, DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT, DEFAULT_TIMER_UI,
    DEFAULT_USER_AGENT, MAX_INTERVAL_SECS, MIN_TIMEOUT, USER_AGENT_HEADER,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, load_validated_config};
pub use validation::validate;
