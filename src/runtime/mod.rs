//! Contract required from the cluster runtime under test.
//!
//! The harness never implements a membership protocol itself; it drives an
//! external runtime through this narrow lifecycle trait. Creation calls are
//! synchronous and return once a handle exists, while convergence (membership
//! propagation, connection registration) happens asynchronously inside the
//! runtime, outside the harness's control.

mod cluster_runtime;

pub use cluster_runtime::*;
