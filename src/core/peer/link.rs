// src/core/peer/link.rs

//! The Peer Link Manager (§4.F): computes the candidate peer set, dials
//! unconnected candidates on a ~1s tick, and heartbeats existing outbound
//! links. Outbound sockets are write-only from this replica's point of
//! view — liveness is judged purely by write failure, never by reading a
//! reply, matching the source coordinator's own asymmetric topology.

use crate::core::protocol::{ChatFrameCodec, Envelope};
use crate::core::state::ChatState;
use futures::SinkExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// A write-only handle to one outbound peer link. Dropping the receiving
/// task (on write failure) is what causes the corresponding table entry to
/// be reaped; sends through a dead channel simply fail and the caller
/// removes the entry immediately.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    tx: mpsc::UnboundedSender<Value>,
}

impl PeerHandle {
    pub fn send(&self, value: Value) -> bool {
        self.tx.send(value).is_ok()
    }
}

/// The Cartesian product of `hosts` and the port range `[start, start+max)`,
/// rendered as `"host:port"`, excluding `self_endpoint`.
pub fn compute_candidate_endpoints(
    hosts: &[String],
    start_port: u16,
    max_ports: u16,
    self_endpoint: &str,
) -> Vec<String> {
    let mut endpoints = Vec::new();
    for host in hosts {
        for offset in 0..max_ports {
            let endpoint = format!("{host}:{}", start_port + offset);
            if endpoint != self_endpoint {
                endpoints.push(endpoint);
            }
        }
    }
    endpoints
}

/// Spawns the tick loop driving outbound dial/ping, leader re-election, and
/// state-transfer requests. Runs until the shutdown signal fires.
pub fn spawn_link_manager(state: Arc<ChatState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut shutdown = state.subscribe_shutdown();
        let mut tick = tokio::time::interval(TICK_INTERVAL);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    run_tick(&state).await;
                }
                _ = shutdown.recv() => {
                    info!("peer link manager shutting down");
                    break;
                }
            }
        }
    })
}

async fn run_tick(state: &Arc<ChatState>) {
    for candidate in state.candidate_endpoints.clone() {
        if let Some(handle) = state.outbound_peers.get(&candidate) {
            let ping = Envelope::new("ping", Value::Null).into_value();
            let alive = handle.send(ping);
            drop(handle);
            if !alive {
                state.outbound_peers.remove(&candidate);
            }
        } else {
            dial(state, &candidate).await;
        }
    }

    crate::core::peer::leader::elect(state).await;
    if !state.is_synced() {
        crate::core::peer::applier::request_snapshot(state).await;
    }
}

async fn dial(state: &Arc<ChatState>, candidate: &str) {
    match TcpStream::connect(candidate).await {
        Ok(stream) => {
            debug!(peer = %candidate, "dialed peer");
            let framed = Framed::new(stream, ChatFrameCodec);
            let (tx, rx) = mpsc::unbounded_channel::<Value>();
            state
                .outbound_peers
                .insert(candidate.to_string(), PeerHandle { tx });
            tokio::spawn(run_writer(framed, rx, state.clone(), candidate.to_string()));
        }
        Err(e) => {
            debug!(peer = %candidate, error = %e, "peer unreachable, will retry next tick");
        }
    }
}

/// Owns the outbound socket's sink half for one peer link. Writes every
/// queued record until one fails, then removes itself from the peer table —
/// this is the entire liveness mechanism for outbound links.
async fn run_writer(
    mut framed: Framed<TcpStream, ChatFrameCodec>,
    mut rx: mpsc::UnboundedReceiver<Value>,
    state: Arc<ChatState>,
    endpoint: String,
) {
    while let Some(value) = rx.recv().await {
        if let Err(e) = framed.send(value).await {
            warn!(peer = %endpoint, error = %e, "peer write failed, reaping link");
            break;
        }
    }
    state.outbound_peers.remove(&endpoint);
}
