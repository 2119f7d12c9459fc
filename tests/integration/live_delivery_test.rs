// tests/integration/live_delivery_test.rs

//! A message sent to a `subscribe`d recipient is pushed onto that
//! connection immediately, without the recipient ever calling
//! `get_undelivered`.

use super::test_helpers::Deployment;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn subscribed_recipient_gets_live_push() {
    let deployment = Deployment::spawn(1).await;

    let mut alice = deployment.connect(0).await;
    alice
        .send("create", json!({ "username": "alice", "password": "pw" }))
        .await;

    let mut bob = deployment.connect(0).await;
    bob.send("create", json!({ "username": "bob", "password": "pw" }))
        .await;

    let reply = bob.send("subscribe", json!({ "username": "bob" })).await;
    assert_eq!(reply["command"], "refresh_home");
    assert_eq!(reply["data"]["pending"], 0);

    alice
        .send(
            "send_msg",
            json!({ "sender": "alice", "receiver": "bob", "content": "live hello" }),
        )
        .await;

    let push = bob
        .recv_within(Duration::from_secs(2))
        .await
        .expect("expected a live_message push");
    assert_eq!(push["command"], "live_message");
    assert_eq!(push["data"]["content"], "live hello");
    assert_eq!(push["data"]["sender"], "alice");

    let reply = bob
        .send("get_undelivered", json!({ "username": "bob", "num": 10 }))
        .await;
    assert_eq!(reply["command"], "error", "a live-delivered message must not also land in unread");
}

#[tokio::test]
async fn unsubscribe_falls_back_to_unread_queue() {
    let deployment = Deployment::spawn(1).await;

    let mut alice = deployment.connect(0).await;
    alice
        .send("create", json!({ "username": "alice", "password": "pw" }))
        .await;

    let mut bob = deployment.connect(0).await;
    bob.send("create", json!({ "username": "bob", "password": "pw" }))
        .await;
    bob.send("subscribe", json!({ "username": "bob" })).await;
    bob.send("unsubscribe", json!({ "username": "bob" })).await;

    alice
        .send(
            "send_msg",
            json!({ "sender": "alice", "receiver": "bob", "content": "queued" }),
        )
        .await;

    let reply = bob
        .send("get_undelivered", json!({ "username": "bob", "num": 10 }))
        .await;
    assert_eq!(reply["command"], "messages");
    let messages = reply["data"]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["content"], "queued");
}
