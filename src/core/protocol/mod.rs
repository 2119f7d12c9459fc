// src/core/protocol/mod.rs

pub mod frame;
pub mod wire;

pub use frame::ChatFrameCodec;
pub use wire::{Envelope, PROTOCOL_VERSION};
