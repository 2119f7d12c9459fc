// src/core/peer/mod.rs

//! The inter-replica coordinator (§4.F–§4.J): outbound peer dialing and
//! heartbeat, deterministic leader election, update replication, and
//! state-transfer snapshot sync.

pub mod applier;
pub mod dispatch;
pub mod inbound;
pub mod leader;
pub mod link;

pub use link::{compute_candidate_endpoints, spawn_link_manager, PeerHandle};
