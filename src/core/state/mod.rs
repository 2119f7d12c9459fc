// src/core/state/mod.rs

//! The State Container (§4.B) and the `Arc`-shared replica state that wraps
//! it alongside the outbound peer table, election status, and shutdown
//! signal.

pub mod container;
pub mod shared;

pub use container::{hash_password, StateContainer, SubscriberTx};
pub use shared::ChatState;
