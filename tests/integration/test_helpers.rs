// tests/integration/test_helpers.rs

//! Test helpers: spins up a real multi-replica deployment on loopback with
//! its own temp-directory durable store, and a thin client over the same
//! `ChatFrameCodec` framing real clients use.

use futures::{SinkExt, StreamExt};
use relaylink::config::Config;
use relaylink::core::protocol::ChatFrameCodec;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

static NEXT_PORT_BASE: AtomicU16 = AtomicU16::new(58000);

/// Reserves a disjoint block of `width` ports so concurrently-running test
/// functions never race each other for the same loopback port.
fn reserve_port_base(width: u16) -> u16 {
    NEXT_PORT_BASE.fetch_add(width, Ordering::SeqCst)
}

/// A running deployment of `num_servers` replicas, torn down when dropped.
pub struct Deployment {
    config: Config,
    handle: JoinHandle<anyhow::Result<()>>,
    _dir: tempfile::TempDir,
}

impl Deployment {
    /// Launches `num_servers` replicas on `127.0.0.1` and waits until every
    /// one of them is accepting client connections and synced (so callers
    /// never race the startup leader-election/state-transfer window).
    pub async fn spawn(num_servers: usize) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = reserve_port_base(num_servers as u16 * 2 + 4);
        let internal_base = base + num_servers as u16 + 2;

        let config = Config {
            num_servers,
            start_server_port: base,
            start_internal_port: internal_base,
            host: "127.0.0.1".to_string(),
            internal_other_servers: vec!["127.0.0.1".to_string()],
            internal_other_ports: internal_base,
            internal_max_ports: num_servers as u16,
            data_dir: dir.path().to_string_lossy().into_owned(),
        };

        let run_config = config.clone();
        let handle = tokio::spawn(async move { relaylink::server::run(run_config).await });

        for id in 0..num_servers {
            wait_for_port(&config.client_addr(id)).await;
        }

        let deployment = Self {
            config,
            handle,
            _dir: dir,
        };

        // A replica with peers configured starts unsynced and rejects every
        // non-exempt command until its first heartbeat tick elects a leader
        // and (for non-leaders) completes state transfer (§4.D, §4.I). Wait
        // that out here so every test can issue commands immediately after
        // `spawn` returns instead of re-deriving this wait per scenario.
        for id in 0..num_servers {
            eventually(Duration::from_secs(10), || async {
                let mut client = deployment.connect(id).await;
                let reply = client.send("search", json!({ "pattern": "*" })).await;
                (reply["command"] == "user_list").then_some(())
            })
            .await;
        }

        deployment
    }

    pub fn client_addr(&self, replica_id: usize) -> String {
        self.config.client_addr(replica_id)
    }

    pub async fn connect(&self, replica_id: usize) -> Client {
        Client::connect(&self.client_addr(replica_id)).await
    }
}

impl Drop for Deployment {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn wait_for_port(addr: &str) {
    for _ in 0..200 {
        if TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("timed out waiting for {addr} to start accepting connections");
}

/// A minimal client over the same `ChatFrameCodec` framing real clients
/// speak: send one envelope, read back exactly one reply.
pub struct Client {
    framed: Framed<TcpStream, ChatFrameCodec>,
}

impl Client {
    pub async fn connect(addr: &str) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        Self {
            framed: Framed::new(stream, ChatFrameCodec),
        }
    }

    pub async fn send(&mut self, command: &str, data: Value) -> Value {
        let envelope = json!({ "version": 0, "command": command, "data": data });
        self.framed.send(envelope).await.expect("send");
        self.framed
            .next()
            .await
            .expect("connection closed before a reply arrived")
            .expect("malformed reply")
    }

    /// Waits for the next pushed record without sending anything — how a
    /// `subscribe`d connection observes a `live_message`.
    pub async fn recv_within(&mut self, timeout: Duration) -> Option<Value> {
        tokio::time::timeout(timeout, self.framed.next())
            .await
            .ok()
            .flatten()
            .map(|r| r.expect("malformed push"))
    }
}

/// Retries `attempt` until it returns `Some`, or panics once `timeout`
/// elapses. Used to wait out eventual-consistency replication delay instead
/// of a single fixed sleep.
pub async fn eventually<F, Fut, T>(timeout: Duration, mut attempt: F) -> T
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Option<T>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(value) = attempt().await {
            return value;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition did not become true within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
