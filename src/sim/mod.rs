//! Simulated in-process cluster runtime with deliberate convergence lag.

mod simulated_cluster;

pub use simulated_cluster::*;

#[cfg(test)]
mod simulated_cluster_test;
