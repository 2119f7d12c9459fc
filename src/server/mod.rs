// src/server/mod.rs

//! Top-level orchestration: launches `config.num_servers` replicas, each as
//! an independent in-process task with its own `ChatState`, client listener,
//! and background tasks, then waits for a single Ctrl+C to broadcast
//! shutdown to all of them and waits for every replica to wind down.

mod connection_loop;
mod context;
mod initialization;
mod spawner;

use crate::config::Config;
use anyhow::Result;
use tokio::task::JoinSet;
use tracing::info;

pub async fn run(config: Config) -> Result<()> {
    let mut replicas = JoinSet::new();
    let mut shutdown_senders = Vec::with_capacity(config.num_servers);

    for replica_id in 0..config.num_servers {
        let ctx = initialization::setup(&config, replica_id).await?;
        let tasks = spawner::spawn_all(&ctx).await?;
        shutdown_senders.push(ctx.state.shutdown_tx.clone());

        replicas.spawn(async move {
            connection_loop::run(ctx, tasks).await;
        });
    }

    info!(num_servers = config.num_servers, "all replicas started");

    tokio::signal::ctrl_c().await?;
    info!("ctrl-c received, shutting down all replicas");
    for tx in &shutdown_senders {
        let _ = tx.send(());
    }

    while replicas.join_next().await.is_some() {}
    info!("all replicas shut down");

    Ok(())
}
