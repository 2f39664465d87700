// crates/hpcjudge-discovery/src/lib.rs
// ============================================================================
// Module: HPC Judge Discovery Library
// Description: Gossip-style service-discovery mesh: in-memory registry,
// peer-to-peer mutation fanout, tag-indexed query, and a long-lived
// register channel.
// Purpose: Let judgers and the utility CLI locate bridges (and bridges
// locate judgers) by type and tag, with eventual cross-peer consistency.
// Dependencies: axum, reqwest, hpcjudge-core, tokio
// ============================================================================

//! ## Overview
//! A discovery node owns one [`registry::Registry`] (services + peers,
//! each behind its own reader/writer lock) and exposes it over the HTTP/WS
//! surface in [`server`]. [`client::Client`] is the read side other
//! services use to query or list; [`client::RegisterSession`] is the
//! write side a service uses to hold its own registration open for the
//! lifetime of its process.
//!
//! Security posture: every entry point checks an access key in constant
//! time; see [`sink::OperationalSink`] for how rejected/failed peer calls
//! are surfaced without aborting propagation.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod client;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod sink;

pub use client::Client;
pub use error::DiscoveryError;
pub use registry::Registry;
