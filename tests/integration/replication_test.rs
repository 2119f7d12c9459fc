// tests/integration/replication_test.rs

//! Two-replica scenarios: every mutation originated on one replica must
//! eventually become visible on the other through the Peer Link Manager's
//! dial/heartbeat/broadcast path, with no client ever talking to more than
//! one replica at a time.

use super::test_helpers::{eventually, Deployment};
use serde_json::json;
use std::time::Duration;

const REPLICATION_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn account_created_on_one_replica_logs_in_on_the_other() {
    let deployment = Deployment::spawn(2).await;

    let mut creator = deployment.connect(0).await;
    creator
        .send(
            "create",
            json!({ "username": "alice", "password": "hunter2" }),
        )
        .await;

    eventually(REPLICATION_TIMEOUT, || async {
        let mut client = deployment.connect(1).await;
        let reply = client
            .send(
                "login",
                json!({ "username": "alice", "password": "hunter2" }),
            )
            .await;
        (reply["command"] == "login").then_some(())
    })
    .await;
}

#[tokio::test]
async fn message_sent_on_one_replica_is_undelivered_on_the_other() {
    let deployment = Deployment::spawn(2).await;

    let mut alice = deployment.connect(0).await;
    alice
        .send("create", json!({ "username": "alice", "password": "pw" }))
        .await;
    let mut bob = deployment.connect(0).await;
    bob.send("create", json!({ "username": "bob", "password": "pw" }))
        .await;

    // Wait for both accounts to replicate to replica 1 before sending, so
    // the send itself doesn't race the account's own replication.
    eventually(REPLICATION_TIMEOUT, || async {
        let mut client = deployment.connect(1).await;
        let reply = client
            .send("search", json!({ "pattern": "*" }))
            .await;
        let users = reply["data"]["users"].as_array()?;
        (users.len() == 2).then_some(())
    })
    .await;

    alice
        .send(
            "send_msg",
            json!({ "sender": "alice", "receiver": "bob", "content": "cross-replica hello" }),
        )
        .await;

    let messages = eventually(REPLICATION_TIMEOUT, || async {
        let mut client = deployment.connect(1).await;
        let reply = client
            .send("get_undelivered", json!({ "username": "bob", "num": 10 }))
            .await;
        if reply["command"] != "messages" {
            return None;
        }
        reply["data"]["messages"].as_array().cloned()
    })
    .await;

    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["content"], "cross-replica hello");
}

#[tokio::test]
async fn account_deletion_replicates_and_purges_peer_messages() {
    let deployment = Deployment::spawn(2).await;

    let mut alice = deployment.connect(0).await;
    alice
        .send("create", json!({ "username": "alice", "password": "pw" }))
        .await;
    let mut bob = deployment.connect(0).await;
    bob.send("create", json!({ "username": "bob", "password": "pw" }))
        .await;
    alice
        .send(
            "send_msg",
            json!({ "sender": "alice", "receiver": "bob", "content": "hi" }),
        )
        .await;

    // `get_delivered` is non-mutating, so it can confirm the message has
    // replicated to replica 1 without disturbing `bob`'s unread queue.
    eventually(REPLICATION_TIMEOUT, || async {
        let mut client = deployment.connect(1).await;
        let reply = client
            .send("get_delivered", json!({ "username": "bob", "num": 10 }))
            .await;
        (reply["command"] == "messages").then_some(())
    })
    .await;

    alice
        .send("delete_acct", json!({ "username": "alice" }))
        .await;

    eventually(REPLICATION_TIMEOUT, || async {
        let mut client = deployment.connect(1).await;
        let reply = client
            .send("get_delivered", json!({ "username": "bob", "num": 10 }))
            .await;
        (reply["command"] == "error").then_some(())
    })
    .await;
}
