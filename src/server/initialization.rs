// src/server/initialization.rs

//! Builds one replica's `ChatState`: derives its client/peer addresses and
//! candidate peer set from the process-wide `Config`, loads its three
//! durable shards, and binds its client-facing listener.

use super::context::ReplicaContext;
use crate::config::Config;
use crate::core::peer::compute_candidate_endpoints;
use crate::core::persistence::DurableStore;
use crate::core::state::{ChatState, StateContainer};
use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

/// Initializes replica `replica_id`'s state and binds its client listener.
/// Does not yet start any background task — that is `spawner`'s job.
pub async fn setup(config: &Config, replica_id: usize) -> Result<ReplicaContext> {
    let client_addr = config.client_addr(replica_id);
    let peer_addr = config.peer_addr(replica_id);

    let candidate_endpoints = compute_candidate_endpoints(
        &config.internal_other_servers,
        config.internal_other_ports,
        config.internal_max_ports,
        &peer_addr,
    );

    let store = DurableStore::new(config.data_dir.clone(), replica_id);
    let (users, messages, settings) = store
        .load(&peer_addr)
        .await
        .with_context(|| format!("loading durable state for replica {replica_id}"))?;
    let container = StateContainer::new(users, messages, settings);

    let listener = TcpListener::bind(&client_addr)
        .await
        .with_context(|| format!("binding client listener on {client_addr}"))?;

    info!(
        replica_id,
        %client_addr,
        %peer_addr,
        candidates = candidate_endpoints.len(),
        "replica initialized"
    );

    let state = ChatState::new(
        replica_id,
        client_addr,
        peer_addr,
        candidate_endpoints,
        container,
        store,
    );

    Ok(ReplicaContext {
        state: std::sync::Arc::new(state),
        listener,
    })
}
