// src/connection/handler.rs

//! Drives one client connection: decodes framed records, dispatches them
//! through the Request Engine, writes replies, and concurrently drains any
//! live-delivery queue the connection subscribes to.

use crate::connection::{ConnectionGuard, SessionState};
use crate::core::handler::{dispatch, Outcome};
use crate::core::protocol::{ChatFrameCodec, Envelope};
use crate::core::state::ChatState;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

pub struct ConnectionHandler {
    framed: Framed<TcpStream, ChatFrameCodec>,
    state: Arc<ChatState>,
    addr: SocketAddr,
    live_addr: String,
    session: SessionState,
    live_rx: Option<mpsc::Receiver<Value>>,
    shutdown: broadcast::Receiver<()>,
    // Held only for its `Drop` side effect (implicit logout).
    _guard: ConnectionGuard,
}

impl ConnectionHandler {
    pub fn new(stream: TcpStream, addr: SocketAddr, state: Arc<ChatState>) -> Self {
        let live_addr = addr.to_string();
        let shutdown = state.subscribe_shutdown();
        let guard = ConnectionGuard::new(state.clone(), live_addr.clone());
        Self {
            framed: Framed::new(stream, ChatFrameCodec),
            state,
            addr,
            live_addr,
            session: SessionState::new(),
            live_rx: None,
            shutdown,
            _guard: guard,
        }
    }

    pub async fn run(&mut self) {
        debug!(addr = %self.addr, "connection handler started");

        loop {
            tokio::select! {
                frame = self.framed.next() => {
                    match frame {
                        Some(Ok(value)) => {
                            if !self.handle_frame(value).await {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            warn!(addr = %self.addr, error = %e, "connection read error, closing");
                            break;
                        }
                        None => {
                            debug!(addr = %self.addr, "connection closed by peer");
                            break;
                        }
                    }
                }
                Some(live) = Self::recv_live(&mut self.live_rx) => {
                    if self.framed.send(live).await.is_err() {
                        break;
                    }
                }
                _ = self.shutdown.recv() => {
                    info!(addr = %self.addr, "connection closing for shutdown");
                    break;
                }
            }
        }

        debug!(
            addr = %self.addr,
            user = ?self.session.bound_username,
            "connection handler exiting"
        );
    }

    async fn recv_live(rx: &mut Option<mpsc::Receiver<Value>>) -> Option<Value> {
        match rx {
            Some(receiver) => receiver.recv().await,
            None => std::future::pending::<Option<Value>>().await,
        }
    }

    /// Handles one decoded frame. Returns `false` if the connection should
    /// close (the reply failed to send, or the socket is otherwise dead).
    async fn handle_frame(&mut self, value: Value) -> bool {
        let envelope: Envelope = match serde_json::from_value(value) {
            Ok(e) => e,
            Err(e) => {
                let error = Envelope::error(format!("malformed request: {e}"));
                return self.framed.send(error).await.is_ok();
            }
        };

        if let Some(username) = bound_username(&envelope) {
            self.session.bound_username = Some(username);
        }

        match dispatch(&self.state, &self.live_addr, envelope).await {
            Outcome::Reply(value) => self.framed.send(value).await.is_ok(),
            Outcome::Subscribed { reply, rx } => {
                self.live_rx = Some(rx);
                self.framed.send(reply).await.is_ok()
            }
        }
    }
}

/// Best-effort extraction of the username a `create`/`login` record is
/// binding to this connection, purely for `SessionState` bookkeeping; the
/// authoritative binding lives in the State Container's `liveAddr` field.
fn bound_username(envelope: &Envelope) -> Option<String> {
    if !matches!(envelope.command.as_str(), "create" | "login") {
        return None;
    }
    envelope
        .data
        .get("username")
        .and_then(Value::as_str)
        .map(str::to_string)
}
