// tests/integration/basic_test.rs

//! Single-replica scenarios: a deployment with no peers configured starts
//! synced immediately, so these exercise the Request Engine end to end
//! without waiting on any replication.

use super::test_helpers::Deployment;
use serde_json::json;

#[tokio::test]
async fn create_then_duplicate_create_is_rejected() {
    let deployment = Deployment::spawn(1).await;
    let mut client = deployment.connect(0).await;

    let reply = client
        .send(
            "create",
            json!({ "username": "alice", "password": "hunter2" }),
        )
        .await;
    assert_eq!(reply["command"], "login");
    assert_eq!(reply["data"]["undeliv_messages"], 0);

    let mut other = deployment.connect(0).await;
    let reply = other
        .send(
            "create",
            json!({ "username": "alice", "password": "different" }),
        )
        .await;
    assert_eq!(reply["command"], "error");
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let deployment = Deployment::spawn(1).await;
    let mut client = deployment.connect(0).await;
    client
        .send("create", json!({ "username": "bob", "password": "correct" }))
        .await;

    let mut other = deployment.connect(0).await;
    let reply = other
        .send("login", json!({ "username": "bob", "password": "wrong" }))
        .await;
    assert_eq!(reply["command"], "error");
}

#[tokio::test]
async fn send_then_drain_undelivered() {
    let deployment = Deployment::spawn(1).await;
    let mut alice = deployment.connect(0).await;
    alice
        .send(
            "create",
            json!({ "username": "alice", "password": "pw1" }),
        )
        .await;

    let mut bob = deployment.connect(0).await;
    bob.send("create", json!({ "username": "bob", "password": "pw2" }))
        .await;

    let reply = alice
        .send(
            "send_msg",
            json!({ "sender": "alice", "receiver": "bob", "content": "hello bob" }),
        )
        .await;
    assert_eq!(reply["command"], "refresh_home");
    assert_eq!(reply["data"]["pending"], 0);

    let reply = bob
        .send(
            "get_undelivered",
            json!({ "username": "bob", "num": 10 }),
        )
        .await;
    assert_eq!(reply["command"], "messages");
    let messages = reply["data"]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["content"], "hello bob");
    assert_eq!(messages[0]["sender"], "alice");

    let reply = bob
        .send("get_undelivered", json!({ "username": "bob", "num": 10 }))
        .await;
    assert_eq!(reply["command"], "error");
}

#[tokio::test]
async fn search_matches_glob_pattern() {
    let deployment = Deployment::spawn(1).await;
    let mut client = deployment.connect(0).await;
    for name in ["alice", "alicia", "bob"] {
        client
            .send("create", json!({ "username": name, "password": "pw" }))
            .await;
        let mut fresh = deployment.connect(0).await;
        std::mem::swap(&mut client, &mut fresh);
    }

    let reply = client.send("search", json!({ "pattern": "ali*" })).await;
    assert_eq!(reply["command"], "user_list");
    let mut users: Vec<String> = reply["data"]["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    users.sort();
    assert_eq!(users, vec!["alice", "alicia"]);
}

#[tokio::test]
async fn delete_account_purges_messages() {
    let deployment = Deployment::spawn(1).await;
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

    let reply = alice
        .send("delete_acct", json!({ "username": "alice" }))
        .await;
    assert_eq!(reply["command"], "logout");

    let reply = bob
        .send("get_undelivered", json!({ "username": "bob", "num": 10 }))
        .await;
    assert_eq!(reply["command"], "error");
}
