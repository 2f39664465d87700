// crates/hpcjudge-transport/src/client.rs
// ============================================================================
// Module: HPC Judge Signed Transport Client
// Description: Single-address, multi-address, and discovery-backed signed
// HTTP clients.
// Purpose: Give the orchestrator and utility CLI one call shape
// (`post_signed`) regardless of how the target address is chosen.
// Dependencies: reqwest, serde, hpcjudge-discovery
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use hpcjudge_core::QueryParameters;
use hpcjudge_discovery::Client as DiscoveryClient;
use rand::seq::SliceRandom as _;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::TransportError;
use crate::sign::sign_message;

// ============================================================================
// SECTION: Single-Address Client
// ============================================================================

/// A signed client bound to one fixed address.
pub struct SignedClient {
    base_address: String,
    secret: Vec<u8>,
    http: reqwest::Client,
}

impl SignedClient {
    /// Builds a client targeting `base_address`, signing with `secret`.
    #[must_use]
    pub fn new(base_address: String, secret: Vec<u8>) -> Self {
        Self { base_address, secret, http: reqwest::Client::new() }
    }

    /// Serialises `body`, signs it, and POSTs it to `path` under the
    /// client's base address, deserialising the response as `R`.
    ///
    /// # Errors
    /// Returns [`TransportError::Http`] on transport failure or
    /// [`TransportError::Decode`] if the response body does not parse.
    pub async fn post_signed<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R, TransportError> {
        post_signed_to(&self.http, &self.base_address, path, &self.secret, body).await
    }
}

async fn post_signed_to<B: Serialize, R: DeserializeOwned>(
    http: &reqwest::Client,
    base_address: &str,
    path: &str,
    secret: &[u8],
    body: &B,
) -> Result<R, TransportError> {
    let payload = serde_json::to_vec(body)?;
    let signature = sign_message(secret, &payload)?;
    let url = format!("{base_address}{path}");
    let response = http
        .post(&url)
        .header("X-Signature", signature)
        .header("Content-Type", "application/json")
        .body(payload)
        .send()
        .await?;
    let decoded = response.json::<R>().await?;
    Ok(decoded)
}

// ============================================================================
// SECTION: Multi-Address Client
// ============================================================================

/// A signed client that tries a fixed candidate list in random order,
/// returning the first address that answers successfully.
pub struct MultiAddressClient {
    addresses: Vec<String>,
    secret: Vec<u8>,
    http: reqwest::Client,
}

impl MultiAddressClient {
    /// Builds a client over `addresses`, signing with `secret`.
    #[must_use]
    pub fn new(addresses: Vec<String>, secret: Vec<u8>) -> Self {
        Self { addresses, secret, http: reqwest::Client::new() }
    }

    /// Serialises `body`, signs it, and POSTs it to `path` against the
    /// first candidate address that answers.
    ///
    /// # Errors
    /// Returns [`TransportError::NoAddressConfigured`] if the candidate
    /// list is empty, or [`TransportError::AllAddressesFailed`] if every
    /// candidate failed.
    pub async fn post_signed<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R, TransportError> {
        if self.addresses.is_empty() {
            return Err(TransportError::NoAddressConfigured);
        }
        let mut addresses = self.addresses.clone();
        addresses.shuffle(&mut rand::thread_rng());
        let mut last_error = String::new();
        for address in addresses {
            match post_signed_to(&self.http, &address, path, &self.secret, body).await {
                Ok(decoded) => return Ok(decoded),
                Err(err) => last_error = err.to_string(),
            }
        }
        Err(TransportError::AllAddressesFailed(last_error))
    }
}

// ============================================================================
// SECTION: Discovery-Backed Client
// ============================================================================

/// A signed client that resolves one bridge address per call via the
/// discovery mesh, rather than a fixed candidate list.
pub struct DiscoveryBackedClient {
    discovery: DiscoveryClient,
    query: QueryParameters,
    secret: Vec<u8>,
    http: reqwest::Client,
}

impl DiscoveryBackedClient {
    /// Builds a client that resolves a target via `discovery` using
    /// `query` on every call.
    #[must_use]
    pub fn new(discovery: DiscoveryClient, query: QueryParameters, secret: Vec<u8>) -> Self {
        Self { discovery, query, secret, http: reqwest::Client::new() }
    }

    /// Resolves a target address via discovery, then serialises, signs,
    /// and POSTs `body` to `path`.
    ///
    /// # Errors
    /// Returns [`TransportError::Discovery`] if no matching service is
    /// found, or the usual transport/decode errors otherwise.
    pub async fn post_signed<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R, TransportError> {
        let service = self.discovery.query_one(&self.query).await?;
        post_signed_to(&self.http, &service.address, path, &self.secret, body).await
    }
}
