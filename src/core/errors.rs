// src/core/errors.rs

//! Defines the primary error type for the entire application.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the server.
/// Using `thiserror` allows for clean error definitions and automatic `From` trait implementations.
///
/// The semantic variants render their `Display` text verbatim onto the client
/// wire protocol as an `error` record's `data.message` field; transport and
/// internal variants are logged and never shown to a client directly.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("username must be alphanumeric")]
    UsernameNotAlphanumeric,

    #[error("username already exists")]
    UsernameTaken,

    #[error("password cannot be empty")]
    PasswordEmpty,

    #[error("username does not exist")]
    UsernameNotFound,

    #[error("user already logged in")]
    AlreadyLoggedIn,

    #[error("incorrect password")]
    IncorrectPassword,

    #[error("account does not exist")]
    AccountNotFound,

    #[error("receiver does not exist")]
    ReceiverNotFound,

    #[error("no undelivered messages")]
    NoUndeliveredMessages,

    #[error("no delivered messages")]
    NoDeliveredMessages,

    #[error("unsupported protocol version")]
    UnsupportedVersion,

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("JSON error: {0}")]
    Serde(Arc<serde_json::Error>),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ChatError {
    /// Whether this error is one of the user-visible semantic errors in §7,
    /// as opposed to a transport/internal failure that should never reach a
    /// client in structured form.
    pub fn is_semantic(&self) -> bool {
        !matches!(
            self,
            ChatError::Io(_) | ChatError::Serde(_) | ChatError::Internal(_)
        )
    }
}

// Manual implementation of Clone because `std::io::Error` and `serde_json::Error`
// are not cloneable. We wrap them in an `Arc` to allow for cheap, shared cloning,
// mirroring the teacher's own error type.
impl Clone for ChatError {
    fn clone(&self) -> Self {
        match self {
            ChatError::UsernameNotAlphanumeric => ChatError::UsernameNotAlphanumeric,
            ChatError::UsernameTaken => ChatError::UsernameTaken,
            ChatError::PasswordEmpty => ChatError::PasswordEmpty,
            ChatError::UsernameNotFound => ChatError::UsernameNotFound,
            ChatError::AlreadyLoggedIn => ChatError::AlreadyLoggedIn,
            ChatError::IncorrectPassword => ChatError::IncorrectPassword,
            ChatError::AccountNotFound => ChatError::AccountNotFound,
            ChatError::ReceiverNotFound => ChatError::ReceiverNotFound,
            ChatError::NoUndeliveredMessages => ChatError::NoUndeliveredMessages,
            ChatError::NoDeliveredMessages => ChatError::NoDeliveredMessages,
            ChatError::UnsupportedVersion => ChatError::UnsupportedVersion,
            ChatError::UnknownCommand(s) => ChatError::UnknownCommand(s.clone()),
            ChatError::MalformedRequest(s) => ChatError::MalformedRequest(s.clone()),
            ChatError::Io(e) => ChatError::Io(Arc::clone(e)),
            ChatError::Serde(e) => ChatError::Serde(Arc::clone(e)),
            ChatError::Internal(s) => ChatError::Internal(s.clone()),
        }
    }
}

impl PartialEq for ChatError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ChatError::UnknownCommand(a), ChatError::UnknownCommand(b)) => a == b,
            (ChatError::MalformedRequest(a), ChatError::MalformedRequest(b)) => a == b,
            (ChatError::Io(a), ChatError::Io(b)) => a.to_string() == b.to_string(),
            (ChatError::Serde(a), ChatError::Serde(b)) => a.to_string() == b.to_string(),
            (ChatError::Internal(a), ChatError::Internal(b)) => a == b,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

impl From<std::io::Error> for ChatError {
    fn from(e: std::io::Error) -> Self {
        ChatError::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(e: serde_json::Error) -> Self {
        ChatError::Serde(Arc::new(e))
    }
}
