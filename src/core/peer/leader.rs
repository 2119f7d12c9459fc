// src/core/peer/leader.rs

//! The Leader Elector (§4.G): purely deterministic on currently-reachable
//! membership, no voting messages exchanged.

use crate::core::state::ChatState;
use std::sync::Arc;
use tracing::info;

/// Re-derives `S = {selfEndpoint} ∪ {connected outbound peer endpoints}` and
/// keeps `leader` valid iff it still equals `min(S)`. A change of leader
/// marks this replica unsynced, unless the new leader is itself.
pub async fn elect(state: &Arc<ChatState>) {
    let mut members: Vec<String> = state
        .outbound_peers
        .iter()
        .map(|entry| entry.key().clone())
        .collect();
    members.push(state.peer_addr.clone());
    members.sort();
    let min = members.into_iter().next().expect("self is always a member");

    let mut leader = state.leader.write().await;
    if leader.as_deref() != Some(min.as_str()) {
        info!(new_leader = %min, previous = ?*leader, "leader election result changed");
        *leader = Some(min.clone());
        drop(leader);

        if min == state.peer_addr {
            state.mark_synced();
        } else {
            state.mark_unsynced();
        }
    }
}

/// The current leader, if any (there is always one once `elect` has run at
/// least once).
pub async fn current(state: &Arc<ChatState>) -> Option<String> {
    state.leader.read().await.clone()
}
