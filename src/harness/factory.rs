//! Instance factory: constructs and tracks a cohort of members and clients
//! sharing one logical cluster, and guarantees clean teardown.
//!
//! ## Key Responsibilities
//! - Starts members and clients through the [`ClusterRuntime`] adapter
//! - Tracks handles in creation order for deterministic teardown
//! - Aggregates per-handle teardown failures instead of stopping early
//!
//! Concurrent scenarios must each own their factory; the cohort is only ever
//! mutated by the single thread driving a scenario, so no locking is needed
//! here.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::ClientConfig;
use crate::ClientId;
use crate::ClusterRuntime;
use crate::HandleRef;
use crate::HarnessError;
use crate::MemberConfig;
use crate::MemberId;
use crate::Result;
use crate::RoutingMode;
use crate::TeardownFailure;

/// One simulated cluster node, owned by the factory that created it.
///
/// Handles are cheap to clone; all clones refer to the same node. View
/// queries fail with [`HarnessError::HandleTerminated`] once the node has
/// been torn down.
#[derive(Clone)]
pub struct MemberHandle {
    id: MemberId,
    runtime: Arc<dyn ClusterRuntime>,
}

impl MemberHandle {
    pub fn id(&self) -> MemberId {
        self.id
    }

    /// Snapshot of the member ids this node currently believes are in the
    /// cluster. May lag behind other members' views.
    pub fn cluster_view(&self) -> Result<BTreeSet<MemberId>> {
        self.runtime.cluster_view(self.id)
    }

    /// Snapshot of the clients currently routing through this node.
    pub fn connection_view(&self) -> Result<BTreeSet<ClientId>> {
        self.runtime.connection_view(self.id)
    }
}

impl fmt::Debug for MemberHandle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("MemberHandle").field("id", &self.id).finish()
    }
}

/// One simulated client connection, owned by the factory that created it.
#[derive(Clone)]
pub struct ClientHandle {
    id: ClientId,
    routing: RoutingMode,
    runtime: Arc<dyn ClusterRuntime>,
}

impl ClientHandle {
    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn routing(&self) -> RoutingMode {
        self.routing
    }

    /// Probes the cluster through this client, forcing lazy connection
    /// establishment. Assertions passed to the poller may call this on every
    /// iteration; the side effect is intentional.
    pub fn touch(&self) -> Result<()> {
        self.runtime.touch(self.id)
    }

    /// Snapshot of the member ids this client currently believes are in the
    /// cluster. Converges to full membership in both routing modes.
    pub fn cluster_view(&self) -> Result<BTreeSet<MemberId>> {
        self.runtime.client_cluster_view(self.id)
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("id", &self.id)
            .field("routing", &self.routing)
            .finish()
    }
}

/// Creates and tracks member and client handles produced against the same
/// logical in-process cluster, and provides bulk teardown.
///
/// The factory is single-use: after [`terminate_all`](Self::terminate_all)
/// every creation call is rejected with
/// [`HarnessError::HandleTerminated`] referring to the factory itself. Start
/// a fresh factory for a fresh cohort.
pub struct ClusterFactory {
    runtime: Arc<dyn ClusterRuntime>,
    members: Vec<MemberHandle>,
    clients: Vec<ClientHandle>,
    terminated: bool,
}

impl ClusterFactory {
    pub fn new(runtime: Arc<dyn ClusterRuntime>) -> Self {
        Self {
            runtime,
            members: Vec::new(),
            clients: Vec::new(),
            terminated: false,
        }
    }

    /// Starts a new node with default config. The node becomes visible in
    /// other members' cluster views asynchronously.
    pub fn create_member(&mut self) -> Result<MemberHandle> {
        self.create_member_with(MemberConfig::default())
    }

    pub fn create_member_with(
        &mut self,
        config: MemberConfig,
    ) -> Result<MemberHandle> {
        self.ensure_usable()?;
        config.validate()?;

        let id = self.runtime.start_member(&config)?;
        debug!(%id, cluster = %config.cluster_name, name = config.name.as_deref(), "started member");

        let handle = MemberHandle {
            id,
            runtime: Arc::clone(&self.runtime),
        };
        self.members.push(handle.clone());
        Ok(handle)
    }

    /// Starts a client against the cohort's current member set, with default
    /// (full-awareness) routing.
    ///
    /// # Errors
    /// Returns [`HarnessError::RuntimeUnavailable`] when no member was
    /// created yet. This is never retried by the harness.
    pub fn create_client(&mut self) -> Result<ClientHandle> {
        self.create_client_with(ClientConfig::default())
    }

    pub fn create_client_with(
        &mut self,
        config: ClientConfig,
    ) -> Result<ClientHandle> {
        self.ensure_usable()?;

        if self.members.is_empty() {
            return Err(HarnessError::RuntimeUnavailable);
        }

        let routing = config.routing;
        let id = self.runtime.start_client(&config)?;
        debug!(%id, ?routing, "started client");

        let handle = ClientHandle {
            id,
            routing,
            runtime: Arc::clone(&self.runtime),
        };
        self.clients.push(handle.clone());
        Ok(handle)
    }

    /// Tracked members, in creation order.
    pub fn members(&self) -> &[MemberHandle] {
        &self.members
    }

    /// Tracked clients, in creation order.
    pub fn clients(&self) -> &[ClientHandle] {
        &self.clients
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Stops every tracked handle, clients first, each in reverse-creation
    /// order. Idempotent: a second call is a no-op returning `Ok(())`.
    ///
    /// Every handle is attempted even when some terminations fail; the
    /// failures are aggregated into
    /// [`HarnessError::PartialTeardown`] after the full pass.
    pub fn terminate_all(&mut self) -> Result<()> {
        if self.terminated {
            debug!("terminate_all called again, nothing to do");
            return Ok(());
        }
        self.terminated = true;

        let mut failures = Vec::new();

        for client in self.clients.iter().rev() {
            if let Err(e) = self.runtime.terminate_client(client.id) {
                warn!(id = %client.id, error = %e, "failed to terminate client");
                failures.push(TeardownFailure {
                    handle: HandleRef::Client(client.id),
                    reason: e.to_string(),
                });
            } else {
                debug!(id = %client.id, "terminated client");
            }
        }

        for member in self.members.iter().rev() {
            if let Err(e) = self.runtime.terminate_member(member.id) {
                warn!(id = %member.id, error = %e, "failed to terminate member");
                failures.push(TeardownFailure {
                    handle: HandleRef::Member(member.id),
                    reason: e.to_string(),
                });
            } else {
                debug!(id = %member.id, "terminated member");
            }
        }

        info!(
            members = self.members.len(),
            clients = self.clients.len(),
            failed = failures.len(),
            "cohort teardown finished"
        );
        self.members.clear();
        self.clients.clear();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(HarnessError::PartialTeardown { failures })
        }
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.terminated {
            return Err(HarnessError::HandleTerminated {
                handle: HandleRef::Factory,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for ClusterFactory {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ClusterFactory")
            .field("members", &self.members.len())
            .field("clients", &self.clients.len())
            .field("terminated", &self.terminated)
            .finish()
    }
}
