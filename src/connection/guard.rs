// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard performing the implicit logout
//! (§4.C) when a client connection closes for any reason: read error,
//! client close, or shutdown.

use crate::core::model::{UpdateKind, UpdateRecord};
use crate::core::peer::dispatch::broadcast_update;
use crate::core::state::ChatState;
use std::sync::Arc;
use tracing::{debug, warn};

/// An RAII guard to ensure the implicit-logout side effect always runs when
/// a connection handler's scope is exited, however it exits.
pub struct ConnectionGuard {
    state: Arc<ChatState>,
    live_addr: String,
}

impl ConnectionGuard {
    pub fn new(state: Arc<ChatState>, live_addr: String) -> Self {
        Self { state, live_addr }
    }
}

impl Drop for ConnectionGuard {
    /// `Drop` cannot itself be `async`; the cleanup is spawned as a detached
    /// task, mirroring how the rest of the replica performs every
    /// state-container mutation from within a `tokio` task.
    fn drop(&mut self) {
        let state = self.state.clone();
        let live_addr = self.live_addr.clone();
        tokio::spawn(async move {
            let mut container = state.container.lock().await;
            let Some(username) = container.logout_by_live_addr(&live_addr) else {
                return;
            };
            if let Err(e) = state.persist(&container).await {
                warn!(error = %e, "failed to persist implicit logout");
            }
            drop(container);

            debug!(username = %username, addr = %live_addr, "implicit logout on disconnect");
            let record = UpdateRecord::new(
                UpdateKind::Logout,
                serde_json::json!({ "username": username }),
            );
            broadcast_update(&state, &record);
        });
    }
}
