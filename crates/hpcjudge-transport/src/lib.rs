// crates/hpcjudge-transport/src/lib.rs
// ============================================================================
// Module: HPC Judge Signed Transport Contract
// Description: Symmetric-key HMAC-authenticated request/response between
// judger and bridge.
// Purpose: Give every bridge call a reusable sign/verify contract instead
// of each caller rolling its own HMAC header logic.
// Dependencies: hmac, sha2, subtle, reqwest, hpcjudge-core, hpcjudge-discovery
// ============================================================================

//! ## Overview
//! The client serialises the request body as JSON, computes HMAC-SHA256
//! over the exact byte stream (after trimming leading/trailing
//! ` \r\n\t`, matching the reference implementation's `SignMessage`
//! exactly — this is wire-format-relevant behaviour, not incidental),
//! and sends the body plus the hex-encoded MAC in an `X-Signature` header.
//! [`verify_signature`] recomputes and compares in constant time (P7).

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod client;
pub mod error;
pub mod sign;

pub use client::DiscoveryBackedClient;
pub use client::MultiAddressClient;
pub use client::SignedClient;
pub use error::TransportError;
pub use sign::sign_message;
pub use sign::verify_signature;
