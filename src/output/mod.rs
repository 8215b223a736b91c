//! Output module for crawl results
//!
//! This module handles:
//! - Aggregating outcomes in the [`ResultStore`]
//! - Rendering live statistics through a [`Presenter`]
//! - Writing the final summary and `broken.txt`

mod presenter;
pub mod report;
mod store;

pub use presenter::{
    create_presenter, format_tally, EchoPresenter, Presenter, Progress, QuietPresenter,
    TablePresenter,
};
pub use report::{
    format_summary, prepare_output_directory, saved_body_path, write_broken_urls,
    BROKEN_FILE_NAME,
};
pub use store::{ResultStore, TallyKey};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
