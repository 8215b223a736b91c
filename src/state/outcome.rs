//! Terminal outcomes of request attempts
//!
//! Every completed attempt is classified into exactly one [`Outcome`]; the
//! coordinator turns that outcome into ResultStore updates and, for redirects
//! and respawns, into new work.

use crate::state::AttemptState;
use std::fmt;
use url::Url;

/// Sentinel recorded when a request exceeded its timeout
pub const TIMEOUT_LABEL: &str = "timeout";

/// Sentinel recorded for transport failures without further detail
pub const FAILURE_LABEL: &str = "failure";

/// Sentinel recorded when a redirect chain exceeded the configured hop limit
pub const REDIRECT_LIMIT_LABEL: &str = "redirect-limit";

/// Sentinel recorded when no request could be built for a URL
pub const INVALID_URL_LABEL: &str = "invalid-url";

/// Why an attempt counts as broken
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BrokenReason {
    /// Non-2xx response, or a redirect that was not followed
    Status(u16),

    /// No response within the configured timeout
    Timeout,

    /// Connection, TLS, body or other transport failure
    Failure,

    /// Redirect chain longer than `max-redirect-hops`
    RedirectLimit,

    /// The HTTP client rejected the URL
    InvalidUrl,
}

impl BrokenReason {
    /// Label written to the broken ledger and `broken.txt`
    pub fn label(&self) -> String {
        match self {
            Self::Status(code) => code.to_string(),
            Self::Timeout => TIMEOUT_LABEL.to_string(),
            Self::Failure => FAILURE_LABEL.to_string(),
            Self::RedirectLimit => REDIRECT_LIMIT_LABEL.to_string(),
            Self::InvalidUrl => INVALID_URL_LABEL.to_string(),
        }
    }
}

impl fmt::Display for BrokenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Classified result of one request attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// 2xx response
    Success { status_code: u16, bytes: u64 },

    /// Followed redirect; `location` is queued as a new attempt
    Redirect { status_code: u16, location: Url },

    /// Any failure, see [`BrokenReason`]
    Broken {
        status_code: Option<u16>,
        reason: BrokenReason,
    },

    /// The URL could not be turned into a request
    Skipped { reason: String },
}

impl Outcome {
    /// Terminal state reached by an attempt with this outcome
    pub fn attempt_state(&self) -> AttemptState {
        match self {
            Self::Success { .. } => AttemptState::Succeeded,
            Self::Redirect { .. } => AttemptState::Redirected,
            Self::Broken { .. } | Self::Skipped { .. } => AttemptState::Broken,
        }
    }

    /// Returns the broken reason for outcomes that land in the broken ledger
    pub fn broken_reason(&self) -> Option<BrokenReason> {
        match self {
            Self::Broken { reason, .. } => Some(reason.clone()),
            Self::Skipped { .. } => Some(BrokenReason::InvalidUrl),
            Self::Success { .. } | Self::Redirect { .. } => None,
        }
    }
}

/// HTTP redirect codes the crawler intercepts itself
pub const REDIRECT_STATUS_CODES: [u16; 5] = [301, 302, 303, 307, 308];

/// Returns true for 301, 302, 303, 307 and 308
pub fn is_redirect_code(status_code: u16) -> bool {
    REDIRECT_STATUS_CODES.contains(&status_code)
}

/// Returns true for any 2xx code
pub fn is_success_code(status_code: u16) -> bool {
    status_code / 100 == 2
}
