use serde::Deserialize;
use serde::Serialize;

use crate::HarnessError;
use crate::Result;

/// Configuration of one simulated cluster node. All fields default;
/// `createMember`-style calls with an empty config use them as-is.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MemberConfig {
    /// Human-readable label used in teardown logs. Generated when absent.
    #[serde(default)]
    pub name: Option<String>,

    /// Logical cluster the node belongs to. All members created through one
    /// factory share it.
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,
}

impl Default for MemberConfig {
    fn default() -> Self {
        Self {
            name: None,
            cluster_name: default_cluster_name(),
        }
    }
}

impl MemberConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.cluster_name.is_empty() {
            return Err(HarnessError::InvalidConfig(
                "cluster_name cannot be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration of one simulated client connection.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ClientConfig {
    #[serde(default)]
    pub name: Option<String>,

    /// How the client distributes operations across discovered members.
    #[serde(default)]
    pub routing: RoutingMode,
}

impl ClientConfig {
    pub fn with_routing(routing: RoutingMode) -> Self {
        Self {
            name: None,
            routing,
        }
    }
}

/// Operation dispatch strategy of a client.
///
/// Routing mode only affects which member(s) report a client in their
/// connection view, never the client's own membership visibility: once
/// converged a client sees the full cluster in both modes.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingMode {
    /// The client learns the full member topology and may route requests to
    /// any member directly. One member stays responsible for the client at a
    /// time, so the cohort-wide connection count still equals the client
    /// count once converged.
    #[default]
    FullAwareness,

    /// The client routes all traffic through one arbitrarily-chosen member
    /// and is invisible to the other members' connection views.
    SingleGateway,
}

impl RoutingMode {
    pub fn is_single_gateway(&self) -> bool {
        matches!(self, RoutingMode::SingleGateway)
    }
}

fn default_cluster_name() -> String {
    "dev".to_string()
}
