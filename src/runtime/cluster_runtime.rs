use std::collections::BTreeSet;
use std::fmt;

#[cfg(test)]
use mockall::automock;

use crate::ClientConfig;
use crate::MemberConfig;
use crate::Result;

/// Identity of one simulated cluster node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "member-{}", self.0)
    }
}

/// Identity of one simulated client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Lifecycle and introspection contract of the cluster runtime under test.
///
/// All methods are synchronous from the caller's perspective. The views are
/// snapshots and may be stale between members (convergence lag); callers
/// compensate with [`wait_until`](crate::wait_until) rather than expecting
/// immediate agreement.
///
/// # Errors
/// - `start_client` fails with [`RuntimeUnavailable`] when no live member
///   exists yet.
/// - View queries and `touch` fail with [`HandleTerminated`] once the handle
///   has been terminated.
/// - `terminate_member` / `terminate_client` are idempotent.
///
/// [`RuntimeUnavailable`]: crate::HarnessError::RuntimeUnavailable
/// [`HandleTerminated`]: crate::HarnessError::HandleTerminated
#[cfg_attr(test, automock)]
pub trait ClusterRuntime: Send + Sync {
    /// Starts a new node in the logical cluster.
    fn start_member(
        &self,
        config: &MemberConfig,
    ) -> Result<MemberId>;

    /// Starts a client against the current member set. The routing mode in
    /// `config` decides which member(s) report the client as connected.
    fn start_client(
        &self,
        config: &ClientConfig,
    ) -> Result<ClientId>;

    /// Snapshot of the member ids `member` currently believes are in the
    /// cluster.
    fn cluster_view(
        &self,
        member: MemberId,
    ) -> Result<BTreeSet<MemberId>>;

    /// Snapshot of the clients currently routing through `member`.
    fn connection_view(
        &self,
        member: MemberId,
    ) -> Result<BTreeSet<ClientId>>;

    /// Snapshot of the member ids `client` currently believes are in the
    /// cluster. Reflects full membership once converged, in both routing
    /// modes: routing is about operation dispatch, not membership
    /// visibility.
    fn client_cluster_view(
        &self,
        client: ClientId,
    ) -> Result<BTreeSet<MemberId>>;

    /// Probes the cluster through `client`, forcing lazy connection
    /// establishment. Side-effecting on purpose.
    fn touch(
        &self,
        client: ClientId,
    ) -> Result<()>;

    fn terminate_member(
        &self,
        member: MemberId,
    ) -> Result<()>;

    fn terminate_client(
        &self,
        client: ClientId,
    ) -> Result<()>;
}
