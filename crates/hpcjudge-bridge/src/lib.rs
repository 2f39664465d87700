// crates/hpcjudge-bridge/src/lib.rs
// ============================================================================
// Module: HPC Judge Bridge Library
// Description: Per-compute-node privileged agent: partition-qualified
// fetch/upload/remove/calculate-path, and user-context command execution.
// Purpose: Expose the bridge's five operations behind the signed transport
// contract, with path confinement (P3) structurally enforced on every
// partition-qualified argument.
// Dependencies: hpcjudge-core, hpcjudge-transport, libc, reqwest, tokio
// ============================================================================

//! ## Overview
//! [`usercontext`] resolves a unix username to the uid/gid/home directory
//! the spawned command runs under. [`protocol`] defines the five request
//!/response shapes. [`operations`] implements them against a
//! [`hpcjudge_core::PartitionTable`]. [`server`] wires them to the signed
//! HTTP surface; [`client`] is the orchestrator- and CLI-facing caller.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod client;
pub mod error;
pub mod objectstore;
pub mod operations;
pub mod protocol;
pub mod server;
pub mod usercontext;

pub use error::BridgeError;
pub use operations::Bridge;
