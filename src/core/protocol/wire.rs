// src/core/protocol/wire.rs

//! The envelope shape shared by the client and peer wire protocols:
//! `{"version":0, "command":<string>, "data":<object>}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The only protocol version this crate speaks. Any other value on an
/// incoming envelope is rejected with `ChatError::UnsupportedVersion`.
pub const PROTOCOL_VERSION: u8 = 0;

/// One decoded wire record, common to both the client and peer protocols.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u8,
    pub command: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(command: impl Into<String>, data: Value) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            command: command.into(),
            data,
        }
    }

    pub fn into_value(self) -> Value {
        serde_json::json!({
            "version": self.version,
            "command": self.command,
            "data": self.data,
        })
    }

    pub fn error(message: impl Into<String>) -> Value {
        Envelope::new("error", serde_json::json!({ "message": message.into() })).into_value()
    }
}
