//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `AttemptState`: lifecycle of a single request attempt (queued, in flight, terminal)
//! - `Outcome`: classified result of a finished attempt
//! - `BrokenReason`: why an attempt counts as broken

mod attempt_state;
mod outcome;

// Re-export main types
pub use attempt_state::AttemptState;
pub use outcome::{
    is_redirect_code, is_success_code, BrokenReason, Outcome, FAILURE_LABEL, INVALID_URL_LABEL,
    REDIRECT_LIMIT_LABEL, REDIRECT_STATUS_CODES, TIMEOUT_LABEL,
};
