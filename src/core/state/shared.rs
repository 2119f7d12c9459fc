// src/core/state/shared.rs

//! The top-level, `Arc`-shared replica state: the State Container behind its
//! single lock, the outbound peer table, election/sync status, and the
//! shutdown signal. One instance of `ChatState` is built at startup and
//! cloned (as an `Arc`) into every task the replica spawns.

use crate::core::peer::PeerHandle;
use crate::core::persistence::DurableStore;
use crate::core::state::container::StateContainer;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, Mutex, RwLock};

/// Shared, `Arc`-wrapped state for one replica process.
pub struct ChatState {
    pub replica_id: usize,
    /// This replica's own advertised client-facing `"host:port"`.
    pub client_addr: String,
    /// This replica's own advertised peer-facing `"host:port"`, the endpoint
    /// used in the Cartesian candidate set and in election comparisons.
    pub peer_addr: String,
    /// Every other replica's peer endpoint this process knows how to dial,
    /// computed once at startup from the CLI's host/port configuration.
    pub candidate_endpoints: Vec<String>,
    pub container: Mutex<StateContainer>,
    pub store: DurableStore,
    /// Outbound-dialed peer links only (§4.F); never populated from an
    /// inbound accept.
    pub outbound_peers: DashMap<String, PeerHandle>,
    pub leader: RwLock<Option<String>>,
    pub synced: AtomicBool,
    pub shutdown_tx: broadcast::Sender<()>,
}

impl ChatState {
    pub fn new(
        replica_id: usize,
        client_addr: String,
        peer_addr: String,
        candidate_endpoints: Vec<String>,
        container: StateContainer,
        store: DurableStore,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        // A replica with no peers configured has nothing to sync from, so it
        // starts synced trivially (DESIGN.md, Open Question 3).
        let starts_synced = candidate_endpoints.is_empty();
        Self {
            replica_id,
            client_addr,
            peer_addr,
            candidate_endpoints,
            container: Mutex::new(container),
            store,
            outbound_peers: DashMap::new(),
            leader: RwLock::new(None),
            synced: AtomicBool::new(starts_synced),
            shutdown_tx,
        }
    }

    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }

    pub fn mark_synced(&self) {
        self.synced.store(true, Ordering::SeqCst);
    }

    pub fn mark_unsynced(&self) {
        self.synced.store(false, Ordering::SeqCst);
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Persists the current in-memory state to the Durable Store. Called
    /// after every mutating operation, holding the same container lock that
    /// guards the mutation (§4.B's dispatch→mutate→persist critical section).
    pub async fn persist(&self, container: &StateContainer) -> Result<(), crate::core::errors::ChatError> {
        self.store
            .save(&container.users, &container.messages, &container.settings)
            .await
    }
}
