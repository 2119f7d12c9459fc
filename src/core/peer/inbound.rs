// src/core/peer/inbound.rs

//! Accepts inbound peer connections. These are read-only dispatch targets —
//! they are never added to the outbound peer table and never participate in
//! election membership or heartbeat; they exist solely so another replica's
//! outbound dial has something to talk to.

use crate::core::protocol::{ChatFrameCodec, Envelope};
use crate::core::state::ChatState;
use futures::StreamExt;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

pub async fn spawn_peer_listener(state: Arc<ChatState>) -> std::io::Result<tokio::task::JoinHandle<()>> {
    let listener = TcpListener::bind(&state.peer_addr).await?;
    info!(addr = %state.peer_addr, "peer listener bound");

    let mut shutdown = state.subscribe_shutdown();
    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, remote)) => {
                            debug!(%remote, "accepted inbound peer connection");
                            tokio::spawn(handle_inbound(state.clone(), stream));
                        }
                        Err(e) => {
                            warn!(error = %e, "failed to accept inbound peer connection");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("peer listener shutting down");
                    break;
                }
            }
        }
    }))
}

async fn handle_inbound(state: Arc<ChatState>, stream: tokio::net::TcpStream) {
    let mut framed = Framed::new(stream, ChatFrameCodec);
    while let Some(frame) = framed.next().await {
        let value = match frame {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "inbound peer connection closed or malformed");
                break;
            }
        };

        let envelope: Envelope = match serde_json::from_value(value) {
            Ok(e) => e,
            Err(e) => {
                debug!(error = %e, "malformed peer envelope, ignoring record");
                continue;
            }
        };

        match envelope.command.as_str() {
            "ping" => {}
            "distribute_update" => {
                crate::core::peer::applier::apply_update(&state, envelope.data).await
            }
            "get_database" => {
                crate::core::peer::applier::handle_get_database(&state, envelope.data).await
            }
            "set_database" => {
                crate::core::peer::applier::handle_set_database(&state, envelope.data).await
            }
            "internal_update" => {
                debug!("ignoring internal_update announcement; election is deterministic only");
            }
            other => {
                debug!(command = %other, "unrecognized peer command, ignoring");
            }
        }
    }
}
