//! A [`ClusterRuntime`] whose convergence is deliberately lazy.
//!
//! ## Key Responsibilities
//! - Membership changes become visible in other members' cluster views only
//!   after a configurable propagation delay (self-visibility is immediate)
//! - Clients establish their connection lazily on first `touch`; the
//!   registration appears in the gateway's connection view one propagation
//!   delay later
//! - Termination is idempotent; queries on terminated handles fail
//!
//! Time is measured with [`tokio::time::Instant`], so paused-time tests
//! (`#[tokio::test(start_paused = true)]`) drive convergence
//! deterministically with `tokio::time::advance`.

use std::cmp;
use std::collections::BTreeSet;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tokio::time::Instant;
use tracing::debug;

use crate::ClientConfig;
use crate::ClientId;
use crate::ClusterRuntime;
use crate::HandleRef;
use crate::HarnessError;
use crate::MemberConfig;
use crate::MemberId;
use crate::Result;
use crate::RoutingMode;
use crate::SimPolicy;

#[derive(Debug)]
struct MemberRecord {
    name: Option<String>,
    joined_at: Instant,
    live: bool,
}

#[derive(Debug, Clone, Copy)]
struct Connection {
    gateway: MemberId,
    registered_at: Instant,
}

#[derive(Debug)]
struct ClientRecord {
    routing: RoutingMode,
    started_at: Instant,
    live: bool,
    connection: Option<Connection>,
}

/// In-process cluster runtime with configurable convergence lag.
///
/// All members started on one instance form one logical cluster. The
/// instance is shareable across handles and assertion closures.
pub struct SimulatedCluster {
    policy: SimPolicy,
    next_member_id: AtomicU64,
    next_client_id: AtomicU64,
    members: DashMap<MemberId, MemberRecord>,
    clients: DashMap<ClientId, ClientRecord>,
    // StdRng so scenarios can seed gateway selection for reproducibility.
    rng: Mutex<StdRng>,
}

impl SimulatedCluster {
    pub fn new(policy: SimPolicy) -> Self {
        let rng = match policy.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            policy,
            next_member_id: AtomicU64::new(1),
            next_client_id: AtomicU64::new(1),
            members: DashMap::new(),
            clients: DashMap::new(),
            rng: Mutex::new(rng),
        }
    }

    fn live_members(&self) -> Vec<MemberId> {
        self.members
            .iter()
            .filter(|entry| entry.value().live)
            .map(|entry| *entry.key())
            .collect()
    }

    fn pick_gateway(&self) -> Option<MemberId> {
        let candidates = self.live_members();
        let mut rng = self.rng.lock();
        candidates.choose(&mut *rng).copied()
    }

    fn member_is_live(
        &self,
        member: MemberId,
    ) -> bool {
        self.members.get(&member).map(|r| r.live).unwrap_or(false)
    }
}

impl Default for SimulatedCluster {
    fn default() -> Self {
        Self::new(SimPolicy::default())
    }
}

impl ClusterRuntime for SimulatedCluster {
    fn start_member(
        &self,
        config: &MemberConfig,
    ) -> Result<MemberId> {
        let id = MemberId(self.next_member_id.fetch_add(1, Ordering::SeqCst));
        self.members.insert(
            id,
            MemberRecord {
                name: config.name.clone(),
                joined_at: Instant::now(),
                live: true,
            },
        );
        debug!(%id, "member joined the simulated cluster");
        Ok(id)
    }

    fn start_client(
        &self,
        config: &ClientConfig,
    ) -> Result<ClientId> {
        if self.live_members().is_empty() {
            return Err(HarnessError::RuntimeUnavailable);
        }

        let id = ClientId(self.next_client_id.fetch_add(1, Ordering::SeqCst));
        self.clients.insert(
            id,
            ClientRecord {
                routing: config.routing,
                started_at: Instant::now(),
                live: true,
                // Established lazily on first touch.
                connection: None,
            },
        );
        debug!(%id, routing = ?config.routing, "client started against the simulated cluster");
        Ok(id)
    }

    fn cluster_view(
        &self,
        member: MemberId,
    ) -> Result<BTreeSet<MemberId>> {
        let observer_joined_at = {
            let record = self.members.get(&member).ok_or(HarnessError::HandleTerminated {
                handle: HandleRef::Member(member),
            })?;
            if !record.live {
                return Err(HarnessError::HandleTerminated {
                    handle: HandleRef::Member(member),
                });
            }
            record.joined_at
        };

        let now = Instant::now();
        let delay = self.policy.propagation_delay();
        let mut view = BTreeSet::new();
        for entry in self.members.iter() {
            if !entry.value().live {
                continue;
            }
            let peer = *entry.key();
            if peer == member {
                view.insert(peer);
                continue;
            }
            // A pair of members sees each other once gossip had one
            // propagation delay since the younger of the two joined.
            let visible_at = cmp::max(observer_joined_at, entry.value().joined_at) + delay;
            if now >= visible_at {
                view.insert(peer);
            }
        }
        Ok(view)
    }

    fn connection_view(
        &self,
        member: MemberId,
    ) -> Result<BTreeSet<ClientId>> {
        if !self.member_is_live(member) {
            return Err(HarnessError::HandleTerminated {
                handle: HandleRef::Member(member),
            });
        }

        let now = Instant::now();
        let delay = self.policy.propagation_delay();
        let mut view = BTreeSet::new();
        for entry in self.clients.iter() {
            if !entry.value().live {
                continue;
            }
            if let Some(conn) = entry.value().connection {
                if conn.gateway == member && now >= conn.registered_at + delay {
                    view.insert(*entry.key());
                }
            }
        }
        Ok(view)
    }

    fn client_cluster_view(
        &self,
        client: ClientId,
    ) -> Result<BTreeSet<MemberId>> {
        let client_started_at = {
            let record = self.clients.get(&client).ok_or(HarnessError::HandleTerminated {
                handle: HandleRef::Client(client),
            })?;
            if !record.live {
                return Err(HarnessError::HandleTerminated {
                    handle: HandleRef::Client(client),
                });
            }
            record.started_at
        };

        let now = Instant::now();
        let delay = self.policy.propagation_delay();
        let mut view = BTreeSet::new();
        for entry in self.members.iter() {
            if !entry.value().live {
                continue;
            }
            // Discovery lags one propagation delay behind whichever of the
            // pair appeared last, independent of routing mode.
            let visible_at = cmp::max(client_started_at, entry.value().joined_at) + delay;
            if now >= visible_at {
                view.insert(*entry.key());
            }
        }
        Ok(view)
    }

    fn touch(
        &self,
        client: ClientId,
    ) -> Result<()> {
        let mut record = self.clients.get_mut(&client).ok_or(HarnessError::HandleTerminated {
            handle: HandleRef::Client(client),
        })?;
        if !record.live {
            return Err(HarnessError::HandleTerminated {
                handle: HandleRef::Client(client),
            });
        }

        match record.connection {
            Some(conn) if self.member_is_live(conn.gateway) => Ok(()),
            Some(conn) if record.routing.is_single_gateway() => {
                // Single-gateway clients are pinned for life: losing the
                // gateway leaves them without a route.
                record.connection = None;
                debug!(%client, gateway = %conn.gateway, "single-gateway client lost its gateway");
                Err(HarnessError::RuntimeUnavailable)
            }
            _ => {
                let gateway = self.pick_gateway().ok_or(HarnessError::RuntimeUnavailable)?;
                record.connection = Some(Connection {
                    gateway,
                    registered_at: Instant::now(),
                });
                debug!(%client, %gateway, "client connection established");
                Ok(())
            }
        }
    }

    fn terminate_member(
        &self,
        member: MemberId,
    ) -> Result<()> {
        if let Some(mut record) = self.members.get_mut(&member) {
            if record.live {
                record.live = false;
                debug!(%member, name = record.name.as_deref(), "member terminated");
            }
        }
        Ok(())
    }

    fn terminate_client(
        &self,
        client: ClientId,
    ) -> Result<()> {
        if let Some(mut record) = self.clients.get_mut(&client) {
            if record.live {
                record.live = false;
                record.connection = None;
                debug!(%client, "client terminated");
            }
        }
        Ok(())
    }
}
