//! In-process test harness for distributed cluster membership and client
//! routing behavior.
//!
//! The harness drives an external "cluster runtime" (the actual membership
//! protocol, gossip and client transport are black boxes behind the
//! [`ClusterRuntime`] trait) and verifies eventually-consistent state with a
//! bounded retry poller:
//!
//! - [`ClusterFactory`] starts a cohort of members and clients sharing one
//!   logical cluster and guarantees clean teardown.
//! - [`wait_until`] re-evaluates a caller-supplied assertion until it holds
//!   or a deadline expires, absorbing the runtime's convergence lag.
//! - [`SimulatedCluster`] is a runtime with deliberate propagation delay,
//!   used to exercise the harness itself.

mod config;
mod errors;
mod harness;
mod runtime;
mod sim;

pub use config::*;
pub use errors::*;
pub use harness::*;
pub use runtime::*;
pub use sim::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
