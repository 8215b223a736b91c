/// Attempt state definitions for tracking crawl progress
///
/// State is tracked per request attempt, not per logical URL: the same URL may
/// be attempted several times through redirects or bonus respawns.
use std::fmt;

/// Represents the current state of a single request attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttemptState {
    // ===== Active States =====
    /// URL is waiting for a free slot
    Queued,

    /// Request has been dispatched and is awaiting classification
    InFlight,

    // ===== Terminal States =====
    /// A 2xx response was received
    Succeeded,

    /// Any other terminal outcome (error status, timeout, transport failure)
    Broken,

    /// A followed redirect; the target was queued as a new attempt
    Redirected,
}

impl AttemptState {
    /// Returns true if this is a terminal state (the attempt has been counted as finished)
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Returns true if this attempt still occupies the queue or a slot
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::InFlight)
    }

    /// Checks whether moving from `self` to `next` is a legal transition
    ///
    /// Queued → InFlight → {Succeeded | Broken | Redirected}; nothing leaves a
    /// terminal state.
    pub fn can_transition_to(&self, next: AttemptState) -> bool {
        match (self, next) {
            (Self::Queued, Self::InFlight) => true,
            (Self::InFlight, next) => next.is_terminal(),
            _ => false,
        }
    }

    /// Short lowercase name used in log output
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InFlight => "in_flight",
            Self::Succeeded => "succeeded",
            Self::Broken => "broken",
            Self::Redirected => "redirected",
        }
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
