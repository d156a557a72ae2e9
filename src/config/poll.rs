use std::time::Duration;

use serde::Deserialize;

use crate::HarnessError;
use crate::Result;

/// Retry policy for the eventual-consistency poller.
///
/// The poller re-runs the assertion, sleeping `base_delay_ms` between
/// attempts and doubling the delay up to `max_delay_ms`, until the assertion
/// holds or `timeout_ms` has elapsed. With the default `max_delay_ms` the
/// backoff stays light; setting it equal to `base_delay_ms` yields a fixed
/// interval.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct PollPolicy {
    /// Total wait budget (unit: milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Initial delay between attempts (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff cap (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl PollPolicy {
    /// Same backoff shape, different total budget. Convenient for scenarios
    /// that bound convergence tighter than the default.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout_ms: timeout.as_millis() as u64,
            ..Default::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(HarnessError::InvalidConfig(
                "poll.timeout_ms must be greater than 0".into(),
            ));
        }
        if self.base_delay_ms == 0 {
            return Err(HarnessError::InvalidConfig(
                "poll.base_delay_ms must be greater than 0".into(),
            ));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(HarnessError::InvalidConfig(format!(
                "poll.max_delay_ms ({}) must be >= poll.base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            )));
        }
        Ok(())
    }
}

/// Convergence behavior of the simulated runtime.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct SimPolicy {
    /// How long membership and connection changes take to become visible in
    /// other handles' views (unit: milliseconds)
    #[serde(default = "default_propagation_delay_ms")]
    pub propagation_delay_ms: u64,

    /// Seed for gateway selection. Unset means entropy-seeded.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SimPolicy {
    fn default() -> Self {
        Self {
            propagation_delay_ms: default_propagation_delay_ms(),
            seed: None,
        }
    }
}

impl SimPolicy {
    pub fn propagation_delay(&self) -> Duration {
        Duration::from_millis(self.propagation_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        Ok(())
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}
fn default_base_delay_ms() -> u64 {
    100
}
fn default_max_delay_ms() -> u64 {
    1_000
}
fn default_propagation_delay_ms() -> u64 {
    50
}
