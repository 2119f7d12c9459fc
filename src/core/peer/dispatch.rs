// src/core/peer/dispatch.rs

//! The Replication Dispatcher (§4.H): hands a locally-originated
//! `UpdateRecord` to every currently connected outbound peer, fire-and-forget.

use crate::core::model::UpdateRecord;
use crate::core::protocol::Envelope;
use crate::core::state::ChatState;
use std::sync::Arc;
use tracing::debug;

/// Wraps an `UpdateRecord` as `{version:0, command:"distribute_update",
/// data:{update_id, command:kind, data:payload}}`.
pub fn envelope_for(record: &UpdateRecord) -> serde_json::Value {
    Envelope::new(
        "distribute_update",
        serde_json::json!({
            "update_id": record.update_id,
            "command": record.kind,
            "data": record.payload,
        }),
    )
    .into_value()
}

/// Broadcasts `record` to every outbound peer. Delivery failures are logged
/// and the dead link is reaped immediately; there is no retry queue, since
/// divergent peers recover via state transfer (§4.I).
pub fn broadcast_update(state: &Arc<ChatState>, record: &UpdateRecord) {
    let envelope = envelope_for(record);
    let dead: Vec<String> = state
        .outbound_peers
        .iter()
        .filter_map(|entry| {
            if entry.value().send(envelope.clone()) {
                None
            } else {
                Some(entry.key().clone())
            }
        })
        .collect();

    for endpoint in dead {
        debug!(peer = %endpoint, "dropping dead outbound link during broadcast");
        state.outbound_peers.remove(&endpoint);
    }
}
