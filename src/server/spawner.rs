// src/server/spawner.rs

//! Spawns one replica's long-running background tasks: the inbound peer
//! listener and the peer link manager. Both are handed back as
//! `JoinHandle`s so the caller can monitor them alongside the client accept
//! loop and unwind cleanly if either dies unexpectedly.

use super::context::ReplicaContext;
use crate::core::peer;
use anyhow::{Context, Result};
use tokio::task::JoinHandle;

/// The background tasks backing one running replica.
pub struct ReplicaTasks {
    pub peer_listener: JoinHandle<()>,
    pub link_manager: JoinHandle<()>,
}

/// Spawns the peer listener and link manager for `ctx`'s replica.
pub async fn spawn_all(ctx: &ReplicaContext) -> Result<ReplicaTasks> {
    let peer_listener = peer::inbound::spawn_peer_listener(ctx.state.clone())
        .await
        .context("binding peer listener")?;
    let link_manager = peer::spawn_link_manager(ctx.state.clone());

    Ok(ReplicaTasks {
        peer_listener,
        link_manager,
    })
}
