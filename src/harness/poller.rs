//! Eventual-consistency poller: re-evaluates a caller-supplied assertion
//! against live runtime state until it holds or a deadline expires.
//!
//! The poller is the only blocking construct in the harness. It blocks the
//! calling task for bounded, retriable waits and never spawns workers; the
//! only cancellation path is deadline expiry.

use std::future::Future;

use tokio::time::sleep;
use tokio::time::Instant;
use tracing::debug;
use tracing::warn;

use crate::AssertFailure;
use crate::HarnessError;
use crate::PollPolicy;
use crate::Result;

/// Runs `assertion` until it returns `Ok(())` or `policy.timeout()` elapses.
///
/// The closure is re-invoked on every iteration so each retry re-reads live
/// state; nothing is cached across attempts. Assertions may have observable
/// side effects (e.g. touching a client to force connection establishment)
/// and the poller tolerates that.
///
/// # Behavior
/// 1. Evaluate the assertion; on success return immediately, without
///    sleeping.
/// 2. On failure, if the deadline has passed, return
///    [`HarnessError::TimeoutExceeded`] wrapping the last failure.
/// 3. Otherwise sleep the current delay, double it up to
///    `policy.max_delay()`, and retry.
///
/// Returns no later than `timeout + max_delay` after invocation.
pub async fn wait_until<F, Fut>(
    policy: &PollPolicy,
    mut assertion: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<(), AssertFailure>>,
{
    let timeout = policy.timeout();
    let mut delay = policy.base_delay();
    let started = Instant::now();
    let mut attempt: u32 = 1;

    loop {
        match assertion().await {
            Ok(()) => {
                debug!(attempt, waited = ?started.elapsed(), "condition held");
                return Ok(());
            }
            Err(failure) => {
                let waited = started.elapsed();
                if waited >= timeout {
                    warn!(attempt, ?waited, %failure, "condition never held within the deadline");
                    return Err(HarnessError::TimeoutExceeded { waited, last: failure });
                }
                debug!(attempt, %failure, retry_in = ?delay, "assertion failed, retrying");
                sleep(delay).await;
                delay = std::cmp::min(delay * 2, policy.max_delay());
            }
        }
        attempt += 1;
    }
}

/// [`wait_until`] with the default [`PollPolicy`].
pub async fn wait_until_default<F, Fut>(assertion: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<(), AssertFailure>>,
{
    wait_until(&PollPolicy::default(), assertion).await
}

/// Assertion helper: fails with `msg` when `cond` is false.
pub fn require(
    cond: bool,
    msg: impl Into<String>,
) -> std::result::Result<(), AssertFailure> {
    if cond {
        Ok(())
    } else {
        Err(AssertFailure::new(msg))
    }
}

/// Assertion helper for the common equality probe, with a readable message.
pub fn require_eq<T>(
    expected: T,
    actual: T,
    what: &str,
) -> std::result::Result<(), AssertFailure>
where
    T: PartialEq + std::fmt::Debug,
{
    if expected == actual {
        Ok(())
    } else {
        Err(AssertFailure::new(format!(
            "{what}: expected {expected:?}, got {actual:?}"
        )))
    }
}
