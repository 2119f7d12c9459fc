// src/server/context.rs

use crate::core::state::ChatState;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Holds everything one replica's setup phase produces and its run loop
/// needs: the shared state and the already-bound client listener.
pub struct ReplicaContext {
    pub state: Arc<ChatState>,
    pub listener: TcpListener,
}
