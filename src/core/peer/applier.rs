// src/core/peer/applier.rs

//! The Replication Applier & State Transfer (§4.I): idempotent application
//! of inbound update records, and snapshot request/reply for unsynced
//! replicas.

use crate::core::model::{Message, Messages, Settings, UpdateKind, User};
use crate::core::protocol::Envelope;
use crate::core::state::ChatState;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Deserialize)]
struct DistributeUpdate {
    update_id: String,
    command: UpdateKind,
    data: Value,
}

/// Applies one inbound `distribute_update` record. Ignores it outright if
/// `update_id` has already been processed by this replica.
pub async fn apply_update(state: &Arc<ChatState>, envelope_data: Value) {
    let update: DistributeUpdate = match serde_json::from_value(envelope_data) {
        Ok(u) => u,
        Err(e) => {
            warn!(error = %e, "malformed distribute_update, dropping");
            return;
        }
    };

    let mut container = state.container.lock().await;
    if container.processed_updates.contains(&update.update_id) {
        debug!(update_id = %update.update_id, "update already processed, ignoring");
        return;
    }

    match apply_kind(&mut container, update.command, update.data) {
        Ok(()) => {}
        Err(e) => {
            warn!(error = %e, kind = ?update.command, "failed to apply replicated update, skipping");
            return;
        }
    }

    container.processed_updates.insert(update.update_id);
    if let Err(e) = state.persist(&container).await {
        warn!(error = %e, "failed to persist after applying replicated update");
    }
}

fn apply_kind(
    container: &mut crate::core::state::StateContainer,
    kind: UpdateKind,
    payload: Value,
) -> Result<(), serde_json::Error> {
    match kind {
        UpdateKind::CreateAccount => {
            #[derive(Deserialize)]
            struct P {
                username: String,
                password_hash: String,
            }
            let p: P = serde_json::from_value(payload)?;
            container.apply_create_account(&p.username, &p.password_hash);
        }
        UpdateKind::Login => {
            #[derive(Deserialize)]
            struct P {
                username: String,
            }
            let p: P = serde_json::from_value(payload)?;
            container.apply_login(&p.username);
        }
        UpdateKind::Logout => {
            #[derive(Deserialize)]
            struct P {
                username: String,
            }
            let p: P = serde_json::from_value(payload)?;
            container.apply_logout(&p.username);
        }
        UpdateKind::DeleteAccount => {
            #[derive(Deserialize)]
            struct P {
                username: String,
            }
            let p: P = serde_json::from_value(payload)?;
            container.apply_delete_account(&p.username);
        }
        UpdateKind::SendMessage => {
            let message: Message = serde_json::from_value(payload)?;
            container.apply_send_message(message);
        }
        UpdateKind::DeleteMessages => {
            #[derive(Deserialize)]
            struct P {
                username: String,
                ids: Vec<u64>,
            }
            let p: P = serde_json::from_value(payload)?;
            let ids: HashSet<u64> = p.ids.into_iter().collect();
            container.apply_delete_messages(&p.username, &ids);
        }
    }
    Ok(())
}

fn split_host_port(addr: &str) -> Option<(&str, &str)> {
    addr.rsplit_once(':')
}

/// While unsynced, asks the current leader for a full snapshot. A no-op if
/// there is no leader, the leader is unreachable, or the leader is self.
pub async fn request_snapshot(state: &Arc<ChatState>) {
    let Some(leader) = crate::core::peer::leader::current(state).await else {
        return;
    };
    if leader == state.peer_addr {
        return;
    }
    let Some(handle) = state.outbound_peers.get(&leader) else {
        debug!(leader = %leader, "leader not yet dialed, deferring snapshot request");
        return;
    };
    let Some((host, port)) = split_host_port(&state.peer_addr) else {
        return;
    };
    let request = Envelope::new(
        "get_database",
        serde_json::json!({ "host": host, "port": port }),
    )
    .into_value();
    handle.send(request);
}

/// Serves a `get_database` request by searching this replica's own outbound
/// table for an entry matching the requestor's declared endpoint, and
/// replying on that link — never on the inbound socket the request arrived
/// on, matching the full-mesh duplicate-dial topology.
pub async fn handle_get_database(state: &Arc<ChatState>, data: Value) {
    #[derive(Deserialize)]
    struct Request {
        host: String,
        port: Value,
    }
    let request: Request = match serde_json::from_value(data) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "malformed get_database request");
            return;
        }
    };
    let requestor = format!("{}:{}", request.host, request.port.to_string().trim_matches('"'));

    let Some(handle) = state.outbound_peers.get(&requestor) else {
        debug!(requestor = %requestor, "no outbound link to requestor yet, cannot reply");
        return;
    };

    let container = state.container.lock().await;
    let snapshot = Envelope::new(
        "set_database",
        serde_json::json!({
            "users": container.users,
            "messages": container.messages,
            "settings": container.settings,
        }),
    )
    .into_value();
    drop(container);

    handle.send(snapshot);
}

/// Wholesale-replaces this replica's shards from a `set_database` snapshot,
/// persists, and marks the replica synced.
pub async fn handle_set_database(state: &Arc<ChatState>, data: Value) {
    #[derive(Deserialize)]
    struct Snapshot {
        users: HashMap<String, User>,
        messages: Messages,
        settings: Settings,
    }
    let snapshot: Snapshot = match serde_json::from_value(data) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "malformed set_database snapshot, ignoring");
            return;
        }
    };

    let mut container = state.container.lock().await;
    container.users = snapshot.users;
    container.messages = snapshot.messages;
    container.settings = snapshot.settings;

    if let Err(e) = state.persist(&container).await {
        warn!(error = %e, "failed to persist received snapshot");
    }
    drop(container);
    state.mark_synced();
}
