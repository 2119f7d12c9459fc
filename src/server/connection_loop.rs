// src/server/connection_loop.rs

//! One replica's main loop: accepts client connections, spawns a
//! `ConnectionHandler` for each, and watches the replica's background tasks
//! so an unexpected failure there also ends the loop. Exits on the shared
//! shutdown signal (broadcast by `server::run` on Ctrl+C), draining client
//! tasks and performing one final persist before returning.

use super::context::ReplicaContext;
use super::spawner::ReplicaTasks;
use crate::connection::ConnectionHandler;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

pub async fn run(ctx: ReplicaContext, tasks: ReplicaTasks) {
    let ReplicaContext { state, listener } = ctx;
    let ReplicaTasks {
        mut peer_listener,
        mut link_manager,
    } = tasks;

    let mut shutdown = state.subscribe_shutdown();
    let mut client_tasks = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = shutdown.recv() => {
                info!(replica_id = state.replica_id, "shutdown signal received");
                break;
            }

            res = &mut peer_listener => {
                match res {
                    Ok(()) => info!(replica_id = state.replica_id, "peer listener exited"),
                    Err(e) => error!(replica_id = state.replica_id, error = %e, "peer listener panicked"),
                }
                break;
            }

            res = &mut link_manager => {
                match res {
                    Ok(()) => info!(replica_id = state.replica_id, "link manager exited"),
                    Err(e) => error!(replica_id = state.replica_id, error = %e, "link manager panicked"),
                }
                break;
            }

            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        info!(replica_id = state.replica_id, %addr, "accepted client connection");
                        let state = state.clone();
                        client_tasks.spawn(async move {
                            ConnectionHandler::new(stream, addr, state).run().await;
                        });
                    }
                    Err(e) => {
                        warn!(replica_id = state.replica_id, error = %e, "failed to accept client connection");
                    }
                }
            }

            Some(res) = client_tasks.join_next(), if !client_tasks.is_empty() => {
                if let Err(e) = res {
                    if e.is_panic() {
                        error!(replica_id = state.replica_id, error = ?e, "client handler panicked");
                    }
                }
            }
        }
    }

    info!(replica_id = state.replica_id, "draining client connections");
    client_tasks.shutdown().await;

    let container = state.container.lock().await;
    if let Err(e) = state.persist(&container).await {
        error!(replica_id = state.replica_id, error = %e, "final persist on shutdown failed");
    }
    drop(container);

    info!(replica_id = state.replica_id, "replica shut down");
}
