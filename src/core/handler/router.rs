// src/core/handler/router.rs

//! The Request Engine (§4.D): dispatches one decoded client `Envelope`
//! against the State Container, persists, replicates, and produces the
//! reply record.

use crate::core::errors::ChatError;
use crate::core::model::{UpdateKind, UpdateRecord};
use crate::core::peer::dispatch::broadcast_update;
use crate::core::protocol::{Envelope, PROTOCOL_VERSION};
use crate::core::state::ChatState;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// The outcome of dispatching one client record: either a plain reply, or a
/// reply plus a freshly installed live-delivery receiver the connection
/// task must start draining.
pub enum Outcome {
    Reply(Value),
    Subscribed {
        reply: Value,
        rx: mpsc::Receiver<Value>,
    },
}

fn default_num() -> usize {
    usize::MAX
}

#[derive(Deserialize)]
struct CreatePayload {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct UsernamePayload {
    username: String,
}

#[derive(Deserialize)]
struct SearchPayload {
    pattern: String,
}

#[derive(Deserialize)]
struct SendMsgPayload {
    sender: String,
    receiver: String,
    content: String,
}

#[derive(Deserialize)]
struct NumPayload {
    username: String,
    #[serde(default = "default_num")]
    num: usize,
}

#[derive(Deserialize)]
struct DeleteMsgPayload {
    username: String,
    ids: Vec<u64>,
}

fn bad_request(e: serde_json::Error) -> ChatError {
    ChatError::MalformedRequest(e.to_string())
}

fn reply(command: &str, data: Value) -> Value {
    Envelope::new(command, data).into_value()
}

fn error_reply(error: &ChatError) -> Value {
    Envelope::error(error.to_string())
}

/// Dispatches one decoded client record. `live_addr` is the `"host:port"` of
/// the originating connection, bound onto a user on `create`/`login`.
pub async fn dispatch(state: &Arc<ChatState>, live_addr: &str, envelope: Envelope) -> Outcome {
    if envelope.version != PROTOCOL_VERSION {
        return Outcome::Reply(error_reply(&ChatError::UnsupportedVersion));
    }

    let synced_exempt = matches!(envelope.command.as_str(), "subscribe" | "unsubscribe");
    if !state.is_synced() && !synced_exempt {
        return Outcome::Reply(Envelope::error("not yet synchronized"));
    }

    match dispatch_inner(state, live_addr, &envelope.command, envelope.data).await {
        Ok(outcome) => outcome,
        Err(e) => Outcome::Reply(error_reply(&e)),
    }
}

async fn dispatch_inner(
    state: &Arc<ChatState>,
    live_addr: &str,
    command: &str,
    data: Value,
) -> Result<Outcome, ChatError> {
    match command {
        "create" => {
            let p: CreatePayload = serde_json::from_value(data).map_err(bad_request)?;
            let mut container = state.container.lock().await;
            container.create_account(&p.username, &p.password, live_addr)?;
            let password_hash = container.users[&p.username].password_hash.clone();
            state.persist(&container).await?;
            drop(container);

            let record = UpdateRecord::new(
                UpdateKind::CreateAccount,
                serde_json::json!({ "username": p.username, "password_hash": password_hash }),
            );
            broadcast_update(state, &record);

            Ok(Outcome::Reply(reply(
                "login",
                serde_json::json!({ "undeliv_messages": 0 }),
            )))
        }

        "login" => {
            let p: CreatePayload = serde_json::from_value(data).map_err(bad_request)?;
            let mut container = state.container.lock().await;
            let pending = container.login(&p.username, &p.password, live_addr)?;
            state.persist(&container).await?;
            drop(container);

            let record = UpdateRecord::new(
                UpdateKind::Login,
                serde_json::json!({ "username": p.username }),
            );
            broadcast_update(state, &record);

            Ok(Outcome::Reply(reply(
                "login",
                serde_json::json!({ "undeliv_messages": pending }),
            )))
        }

        "logout" => {
            let p: UsernamePayload = serde_json::from_value(data).map_err(bad_request)?;
            let mut container = state.container.lock().await;
            container.logout(&p.username)?;
            state.persist(&container).await?;
            drop(container);

            let record = UpdateRecord::new(
                UpdateKind::Logout,
                serde_json::json!({ "username": p.username }),
            );
            broadcast_update(state, &record);

            Ok(Outcome::Reply(reply("logout", Value::Null)))
        }

        "search" => {
            let p: SearchPayload = serde_json::from_value(data).map_err(bad_request)?;
            let container = state.container.lock().await;
            let matches = container.search(&p.pattern);
            drop(container);
            Ok(Outcome::Reply(reply(
                "user_list",
                serde_json::json!({ "users": matches }),
            )))
        }

        "delete_acct" => {
            let p: UsernamePayload = serde_json::from_value(data).map_err(bad_request)?;
            let mut container = state.container.lock().await;
            container.delete_account(&p.username)?;
            state.persist(&container).await?;
            drop(container);

            let record = UpdateRecord::new(
                UpdateKind::DeleteAccount,
                serde_json::json!({ "username": p.username }),
            );
            broadcast_update(state, &record);

            Ok(Outcome::Reply(reply("logout", Value::Null)))
        }

        "send_msg" => {
            let p: SendMsgPayload = serde_json::from_value(data).map_err(bad_request)?;
            let timestamp = chrono::Utc::now().to_rfc3339();
            let mut container = state.container.lock().await;
            let message =
                container.send_message_local(&p.sender, &p.receiver, &p.content, timestamp)?;
            state.persist(&container).await?;
            let sender_pending = container.pending(&p.sender);
            drop(container);

            let record = UpdateRecord::new(
                UpdateKind::SendMessage,
                serde_json::to_value(&message).expect("Message always serializes"),
            );
            broadcast_update(state, &record);

            Ok(Outcome::Reply(reply(
                "refresh_home",
                serde_json::json!({ "pending": sender_pending }),
            )))
        }

        "get_undelivered" => {
            let p: NumPayload = serde_json::from_value(data).map_err(bad_request)?;
            let mut container = state.container.lock().await;
            let messages = container.get_undelivered(&p.username, p.num)?;
            state.persist(&container).await?;
            drop(container);
            Ok(Outcome::Reply(reply(
                "messages",
                serde_json::json!({ "messages": messages }),
            )))
        }

        "get_delivered" => {
            let p: NumPayload = serde_json::from_value(data).map_err(bad_request)?;
            let container = state.container.lock().await;
            let messages = container.get_delivered(&p.username, p.num)?;
            drop(container);
            Ok(Outcome::Reply(reply(
                "messages",
                serde_json::json!({ "messages": messages }),
            )))
        }

        "refresh_home" => {
            let p: UsernamePayload = serde_json::from_value(data).map_err(bad_request)?;
            let container = state.container.lock().await;
            let pending = container.refresh_home(&p.username)?;
            drop(container);
            Ok(Outcome::Reply(reply(
                "refresh_home",
                serde_json::json!({ "pending": pending }),
            )))
        }

        "delete_msg" => {
            let p: DeleteMsgPayload = serde_json::from_value(data).map_err(bad_request)?;
            let ids: HashSet<u64> = p.ids.iter().copied().collect();
            let mut container = state.container.lock().await;
            let pending = container.delete_msg(&p.username, &ids)?;
            state.persist(&container).await?;
            drop(container);

            let record = UpdateRecord::new(
                UpdateKind::DeleteMessages,
                serde_json::json!({ "username": p.username, "ids": p.ids }),
            );
            broadcast_update(state, &record);

            Ok(Outcome::Reply(reply(
                "refresh_home",
                serde_json::json!({ "pending": pending }),
            )))
        }

        "subscribe" => {
            let p: UsernamePayload = serde_json::from_value(data).map_err(bad_request)?;
            let mut container = state.container.lock().await;
            let pending = container.refresh_home(&p.username)?;
            let rx = container.subscribe(&p.username);
            drop(container);
            debug!(username = %p.username, "subscription installed");

            Ok(Outcome::Subscribed {
                reply: reply("refresh_home", serde_json::json!({ "pending": pending })),
                rx,
            })
        }

        "unsubscribe" => {
            let p: UsernamePayload = serde_json::from_value(data).map_err(bad_request)?;
            let mut container = state.container.lock().await;
            container.unsubscribe(&p.username);
            let pending = container.refresh_home(&p.username)?;
            drop(container);

            Ok(Outcome::Reply(reply(
                "refresh_home",
                serde_json::json!({ "pending": pending }),
            )))
        }

        other => Err(ChatError::UnknownCommand(other.to_string())),
    }
}
