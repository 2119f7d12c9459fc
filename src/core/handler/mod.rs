// src/core/handler/mod.rs

//! The Request Engine (§4.D): dispatches a decoded client `Envelope`
//! against the State Container and produces its reply.

pub mod router;

pub use router::{dispatch, Outcome};
