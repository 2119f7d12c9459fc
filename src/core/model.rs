// src/core/model.rs

//! The data model shared by the State Container, the Durable Store, and the
//! wire protocol: users, messages, conversation keys, replica settings, and
//! the update records that flow through replication.

use serde::{Deserialize, Serialize};

/// One registered account. `password_hash` is a lowercase hex-encoded
/// SHA-256 digest; `live_addr` is the `"host:port"` of the connection
/// currently bound to this user, or `None` while logged out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub password_hash: String,
    #[serde(default)]
    pub logged_in: bool,
    #[serde(default)]
    pub live_addr: Option<String>,
    #[serde(default)]
    pub unread: Vec<Message>,
}

impl User {
    pub fn new(username: String, password_hash: String) -> Self {
        Self {
            username,
            password_hash,
            logged_in: false,
            live_addr: None,
            unread: Vec::new(),
        }
    }
}

/// One chat message. `id` is minted from the originating replica's
/// `Settings::counter` and is only locally unique; `timestamp` is an
/// ISO-8601 string produced at origination time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: u64,
    pub sender: String,
    pub receiver: String,
    pub content: String,
    pub timestamp: String,
}

/// The canonical unordered pair of two usernames: lexicographically smaller
/// first. Used to test conversation membership; messages themselves are not
/// stored per-key on disk (see `Messages` below) but this is how a
/// conversation is identified and filtered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationKey(pub String, pub String);

impl ConversationKey {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            ConversationKey(a.to_string(), b.to_string())
        } else {
            ConversationKey(b.to_string(), a.to_string())
        }
    }

    pub fn contains(&self, username: &str) -> bool {
        self.0 == username || self.1 == username
    }
}

impl Message {
    /// The conversation key this message belongs to.
    pub fn conversation_key(&self) -> ConversationKey {
        ConversationKey::new(&self.sender, &self.receiver)
    }
}

/// The `messages` shard: the flat conversation log of every message that has
/// ever been delivered into a conversation view. Per-recipient pending
/// messages (`unread`) are *not* stored here — they live on `User.unread`
/// instead (see DESIGN.md's note on this deviation from §6's literal
/// `{"undelivered": [...], "delivered": [...]}` shape). Per-conversation
/// views are computed by filtering `delivered` on demand rather than stored
/// redundantly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Messages {
    #[serde(default)]
    pub delivered: Vec<Message>,
}

/// The `settings` shard: the replica-local monotonic id counter and the
/// replica's own advertised endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub counter: u64,
    pub self_endpoint: String,
}

impl Settings {
    /// Mints the next message id. Strictly increasing within this replica.
    pub fn next_id(&mut self) -> u64 {
        self.counter += 1;
        self.counter
    }
}

/// The kind of mutation an `UpdateRecord` carries. Mirrors the client
/// commands that mutate replicated state; notably `get_undelivered` has no
/// corresponding kind (see DESIGN.md, Open Question 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    CreateAccount,
    Login,
    Logout,
    DeleteAccount,
    SendMessage,
    DeleteMessages,
}

/// A tagged, uniquely-identified description of one state mutation,
/// suitable for idempotent replay on peers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRecord {
    pub update_id: String,
    pub kind: UpdateKind,
    pub payload: serde_json::Value,
}

impl UpdateRecord {
    pub fn new(kind: UpdateKind, payload: serde_json::Value) -> Self {
        Self {
            update_id: uuid::Uuid::new_v4().to_string(),
            kind,
            payload,
        }
    }
}
