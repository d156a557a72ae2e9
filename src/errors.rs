//! Harness Error Hierarchy
//!
//! Defines the error types surfaced to test scenarios, categorized by
//! lifecycle phase: cohort construction, view queries, polling and teardown.

use std::fmt;
use std::time::Duration;

use crate::ClientId;
use crate::MemberId;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, HarnessError>;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// A client was requested while no live member exists in the cohort.
    /// Never retried by the harness, surfaced immediately.
    #[error("no running member available to serve a new client")]
    RuntimeUnavailable,

    /// An operation was attempted on a handle after its termination.
    #[error("{handle} is terminated")]
    HandleTerminated { handle: HandleRef },

    /// Terminal poller failure, wrapping the last assertion error observed
    /// before the deadline expired.
    #[error("condition did not hold within {waited:?}: {last}")]
    TimeoutExceeded { waited: Duration, last: AssertFailure },

    /// One or more handles failed to terminate inside `terminate_all`.
    /// Every handle was still attempted.
    #[error("teardown failed for {} handle(s)", failures.len())]
    PartialTeardown { failures: Vec<TeardownFailure> },

    /// Harness configuration validation failures
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Configuration source loading failures
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    /// Unrecoverable runtime adapter failures
    #[error("Fatal error: {0}")]
    Fatal(String),
}

/// Identifies which handle an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleRef {
    Member(MemberId),
    Client(ClientId),
    /// The factory itself. A factory is single-use: creation calls after
    /// `terminate_all` are rejected with this reference.
    Factory,
}

impl fmt::Display for HandleRef {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            HandleRef::Member(id) => write!(f, "{}", id),
            HandleRef::Client(id) => write!(f, "{}", id),
            HandleRef::Factory => write!(f, "factory"),
        }
    }
}

/// A single handle that could not be released during teardown.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{handle}: {reason}")]
pub struct TeardownFailure {
    pub handle: HandleRef,
    pub reason: String,
}

/// Transient failure raised by a user assertion inside a poll iteration.
///
/// Recovered locally by the poller (it retries) and only escalated as
/// [`HarnessError::TimeoutExceeded`] once the deadline is reached.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct AssertFailure {
    pub message: String,
}

impl AssertFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for AssertFailure {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for AssertFailure {
    fn from(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl From<HarnessError> for AssertFailure {
    fn from(e: HarnessError) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}
