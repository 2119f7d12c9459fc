// src/core/state/container.rs

//! The State Container (§4.B): the in-memory authoritative view of users,
//! messages, and settings, plus the transient per-replica subscription map
//! and the idempotency guard for replicated updates. Every mutator here
//! enforces the invariants of §3 and returns a semantic error (§7) rather
//! than panicking.

use crate::core::errors::ChatError;
use crate::core::model::{ConversationKey, Message, Messages, Settings, User};
use crate::core::protocol::wire::Envelope;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use wildmatch::WildMatch;

/// Capacity of a live-delivery subscriber queue. If it ever fills, the
/// sender falls back to the recipient's `unread` queue (§4.E).
const SUBSCRIBER_QUEUE_CAPACITY: usize = 64;

pub type SubscriberTx = mpsc::Sender<Value>;

/// The single source of truth for in-memory reads, shared (behind one lock,
/// see `state::shared::ChatState`) between the Request Engine and the
/// Replication Applier.
#[derive(Debug)]
pub struct StateContainer {
    pub users: HashMap<String, User>,
    pub messages: Messages,
    pub settings: Settings,
    pub active_subscriptions: HashMap<String, SubscriberTx>,
    pub processed_updates: HashSet<String>,
}

impl StateContainer {
    pub fn new(users: HashMap<String, User>, messages: Messages, settings: Settings) -> Self {
        Self {
            users,
            messages,
            settings,
            active_subscriptions: HashMap::new(),
            processed_updates: HashSet::new(),
        }
    }

    /// Number of `unread` messages addressed to `username`.
    pub fn pending(&self, username: &str) -> usize {
        self.users
            .get(username)
            .map(|u| u.unread.len())
            .unwrap_or(0)
    }

    fn normalize(field: &str) -> String {
        field.trim().to_string()
    }

    fn validate_username(username: &str) -> Result<(), ChatError> {
        if username.is_empty() || !username.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ChatError::UsernameNotAlphanumeric);
        }
        Ok(())
    }

    // --- create_account ---

    pub fn create_account(
        &mut self,
        username: &str,
        password: &str,
        live_addr: &str,
    ) -> Result<(), ChatError> {
        let username = Self::normalize(username);
        let password = Self::normalize(password);
        Self::validate_username(&username)?;
        if self.users.contains_key(&username) {
            return Err(ChatError::UsernameTaken);
        }
        if password.is_empty() {
            return Err(ChatError::PasswordEmpty);
        }

        let mut user = User::new(username.clone(), hash_password(&password));
        user.logged_in = true;
        user.live_addr = Some(live_addr.to_string());
        self.users.insert(username, user);
        Ok(())
    }

    /// Idempotent replay: a no-op if the user already exists.
    pub fn apply_create_account(&mut self, username: &str, password_hash: &str) {
        if self.users.contains_key(username) {
            return;
        }
        self.users
            .insert(username.to_string(), User::new(username.to_string(), password_hash.to_string()));
    }

    // --- login / logout ---

    pub fn login(
        &mut self,
        username: &str,
        password: &str,
        live_addr: &str,
    ) -> Result<usize, ChatError> {
        let username = Self::normalize(username);
        let password = Self::normalize(password);
        let user = self
            .users
            .get_mut(&username)
            .ok_or(ChatError::UsernameNotFound)?;
        if user.logged_in {
            return Err(ChatError::AlreadyLoggedIn);
        }
        if user.password_hash != hash_password(&password) {
            return Err(ChatError::IncorrectPassword);
        }
        user.logged_in = true;
        user.live_addr = Some(live_addr.to_string());
        Ok(user.unread.len())
    }

    pub fn apply_login(&mut self, username: &str) {
        if let Some(user) = self.users.get_mut(username) {
            user.logged_in = true;
            user.live_addr.get_or_insert_with(|| "replicated".to_string());
        }
    }

    pub fn logout(&mut self, username: &str) -> Result<(), ChatError> {
        let user = self
            .users
            .get_mut(username)
            .ok_or(ChatError::UsernameNotFound)?;
        user.logged_in = false;
        user.live_addr = None;
        self.active_subscriptions.remove(username);
        Ok(())
    }

    pub fn apply_logout(&mut self, username: &str) {
        if let Some(user) = self.users.get_mut(username) {
            user.logged_in = false;
            user.live_addr = None;
        }
        self.active_subscriptions.remove(username);
    }

    /// Implicit logout for whichever user currently has `live_addr` bound to
    /// the just-closed connection (§4.C). Returns that username, if any, so
    /// the caller can originate a `logout` `UpdateRecord`.
    pub fn logout_by_live_addr(&mut self, live_addr: &str) -> Option<String> {
        let username = self
            .users
            .values()
            .find(|u| u.live_addr.as_deref() == Some(live_addr))
            .map(|u| u.username.clone())?;
        self.apply_logout(&username);
        Some(username)
    }

    // --- search ---

    pub fn search(&self, pattern: &str) -> Vec<String> {
        let matcher = WildMatch::new(pattern);
        let mut matches: Vec<String> = self
            .users
            .keys()
            .filter(|u| matcher.matches(u))
            .cloned()
            .collect();
        matches.sort();
        matches
    }

    // --- delete_account ---

    pub fn delete_account(&mut self, username: &str) -> Result<(), ChatError> {
        if !self.users.contains_key(username) {
            return Err(ChatError::AccountNotFound);
        }
        self.purge_user(username);
        Ok(())
    }

    pub fn apply_delete_account(&mut self, username: &str) {
        self.purge_user(username);
    }

    fn purge_user(&mut self, username: &str) {
        self.users.remove(username);
        self.active_subscriptions.remove(username);
        self.messages
            .delivered
            .retain(|m| m.sender != username && m.receiver != username);
    }

    // --- send_message ---

    /// Originates a new message on this replica: mints an id from the local
    /// counter, then applies it exactly as a replicated apply would.
    pub fn send_message_local(
        &mut self,
        sender: &str,
        receiver: &str,
        content: &str,
        timestamp: String,
    ) -> Result<Message, ChatError> {
        if !self.users.contains_key(receiver) {
            return Err(ChatError::ReceiverNotFound);
        }
        let id = self.settings.next_id();
        let message = Message {
            id,
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            content: content.to_string(),
            timestamp,
        };
        self.apply_send_message(message.clone());
        Ok(message)
    }

    /// Idempotent replay: refuses a duplicate message id. Delivers to the
    /// recipient's live subscription queue if one is installed, falling back
    /// to `unread` if the recipient isn't subscribed or the push fails.
    pub fn apply_send_message(&mut self, message: Message) {
        let already_seen = self.messages.delivered.iter().any(|m| m.id == message.id);
        if already_seen {
            return;
        }

        self.messages.delivered.push(message.clone());

        let delivered_live = if let Some(tx) = self.active_subscriptions.get(&message.receiver) {
            let live_record = Envelope::new(
                "live_message",
                serde_json::json!({
                    "id": message.id,
                    "sender": message.sender,
                    "receiver": message.receiver,
                    "content": message.content,
                    "timestamp": message.timestamp,
                }),
            )
            .into_value();
            tx.try_send(live_record).is_ok()
        } else {
            false
        };

        if !delivered_live {
            if let Some(user) = self.users.get_mut(&message.receiver) {
                user.unread.push(message);
            }
        }
    }

    // --- get_undelivered ---

    pub fn get_undelivered(&mut self, username: &str, num: usize) -> Result<Vec<Message>, ChatError> {
        let user = self
            .users
            .get_mut(username)
            .ok_or(ChatError::UsernameNotFound)?;
        if user.unread.is_empty() {
            return Err(ChatError::NoUndeliveredMessages);
        }
        let take = num.min(user.unread.len());
        let drained: Vec<Message> = user.unread.drain(0..take).collect();
        Ok(drained)
    }

    // --- get_delivered ---

    pub fn get_delivered(&self, username: &str, num: usize) -> Result<Vec<Message>, ChatError> {
        if !self.users.contains_key(username) {
            return Err(ChatError::UsernameNotFound);
        }
        let mut matching: Vec<Message> = self
            .messages
            .delivered
            .iter()
            .filter(|m| m.conversation_key().contains(username))
            .cloned()
            .collect();
        if matching.is_empty() {
            return Err(ChatError::NoDeliveredMessages);
        }
        if matching.len() > num {
            matching = matching.split_off(matching.len() - num);
        }
        Ok(matching)
    }

    // --- refresh_home ---

    pub fn refresh_home(&self, username: &str) -> Result<usize, ChatError> {
        if !self.users.contains_key(username) {
            return Err(ChatError::UsernameNotFound);
        }
        Ok(self.pending(username))
    }

    // --- delete_msg ---

    pub fn delete_msg(&mut self, username: &str, ids: &HashSet<u64>) -> Result<usize, ChatError> {
        if !self.users.contains_key(username) {
            return Err(ChatError::UsernameNotFound);
        }
        self.apply_delete_messages(username, ids);
        Ok(self.pending(username))
    }

    /// Idempotent, order-independent set-minus over the delivered
    /// conversation view. Unknown ids are tolerated silently.
    pub fn apply_delete_messages(&mut self, username: &str, ids: &HashSet<u64>) {
        self.messages
            .delivered
            .retain(|m| !(ids.contains(&m.id) && m.receiver == username));
    }

    // --- subscribe / unsubscribe ---

    /// Installs a bounded live-delivery queue for `username`, returning its
    /// receiver for the connection task to drain. Per §4.E these are purely
    /// per-replica transient state and are never replicated.
    pub fn subscribe(&mut self, username: &str) -> mpsc::Receiver<Value> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        self.active_subscriptions.insert(username.to_string(), tx);
        rx
    }

    pub fn unsubscribe(&mut self, username: &str) {
        self.active_subscriptions.remove(username);
    }
}

/// The credential hashing function assumed fixed and one-way per §1.
pub fn hash_password(password: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}
