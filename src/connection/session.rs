// src/connection/session.rs

//! Defines the state associated with a single client connection.

/// The subset of a connection's state that outlives individual requests.
/// Kept deliberately thin: the authoritative binding between a user and a
/// connection lives in the State Container via `liveAddr`, not here — this
/// is a best-effort copy of the username a `create`/`login` bound, kept
/// only so the connection's own log lines can name who it belonged to.
#[derive(Debug, Default)]
pub struct SessionState {
    pub bound_username: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }
}
