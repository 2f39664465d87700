// crates/hpcjudge-discovery/src/registry.rs
// ============================================================================
// Module: HPC Judge Discovery Registry
// Description: In-memory service table, peer table, matching algorithm,
// idempotent-inform normalisation, and peer mutation fanout.
// Purpose: Own the single source of truth for "what is registered here"
// and "who else should hear about it".
// Dependencies: tokio, rand, reqwest, hpcjudge-core
// ============================================================================

//! ## Overview
//! [`Registry`] is the node-local authority the HTTP/WS surface in
//! [`crate::server`] sits on top of. Service and peer tables are each
//! behind their own `RwLock`; peer RPCs release the service lock before
//! doing network I/O, matching the concurrency model in spec §5.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::RwLock;

use hpcjudge_core::QueryParameters;
use hpcjudge_core::Service;
use hpcjudge_core::ServiceId;
use rand::Rng as _;

use crate::error::DiscoveryError;
use crate::protocol::PeerOperation;
use crate::protocol::PeerResponse;
use crate::sink::EventKind;
use crate::sink::NoopSink;
use crate::sink::OperationalEvent;
use crate::sink::OperationalSink;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// The node-local service and peer tables.
pub struct Registry {
    services: RwLock<Vec<Service>>,
    by_type: RwLock<BTreeMap<String, Vec<ServiceId>>>,
    peers: RwLock<Vec<String>>,
    access_key: String,
    sink: Arc<dyn OperationalSink>,
    http: reqwest::Client,
}

impl Registry {
    /// Builds an empty registry with no peers.
    #[must_use]
    pub fn new(access_key: String) -> Self {
        Self::with_sink(access_key, Arc::new(NoopSink))
    }

    /// Builds an empty registry reporting through `sink`.
    #[must_use]
    pub fn with_sink(access_key: String, sink: Arc<dyn OperationalSink>) -> Self {
        Self {
            services: RwLock::new(Vec::new()),
            by_type: RwLock::new(BTreeMap::new()),
            peers: RwLock::new(Vec::new()),
            access_key,
            sink,
            http: reqwest::Client::new(),
        }
    }

    /// Returns the operational sink this registry reports through.
    #[must_use]
    pub fn sink(&self) -> &Arc<dyn OperationalSink> {
        &self.sink
    }

    /// Checks a caller-supplied access key in constant time. An empty
    /// configured key disables the check entirely, matching the reference
    /// behaviour.
    #[must_use]
    pub fn check_access_key(&self, supplied: &str) -> bool {
        if self.access_key.is_empty() {
            return true;
        }
        constant_time_eq_str(&self.access_key, supplied)
    }

    // ------------------------------------------------------------------
    // SECTION: Matching
    // ------------------------------------------------------------------

    /// Returns every service matching `params`.
    #[must_use]
    pub fn list(&self, params: &QueryParameters) -> Vec<Service> {
        let services = self.services.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let haystack: Vec<&Service> = if let Some(kind) = params.kind.as_deref() {
            services.iter().filter(|svc| svc.kind == kind).collect()
        } else {
            services.iter().collect()
        };
        let mut filtered: Vec<&Service> = haystack
            .into_iter()
            .filter(|svc| svc.matches_tags(&params.tags, &params.exclude_tags))
            .collect();
        if let Some(id) = params.id {
            filtered.retain(|svc| svc.id == id);
        }
        if let Some(address) = params.address.as_deref() {
            filtered.retain(|svc| svc.address == address);
        }
        filtered.into_iter().cloned().collect()
    }

    /// Returns one service matching `params`, chosen uniformly at random.
    ///
    /// # Errors
    /// Returns [`DiscoveryError::NoServiceAvailable`] if the candidate set
    /// is empty.
    pub fn query_one(&self, params: &QueryParameters) -> Result<Service, DiscoveryError> {
        let candidates = self.list(params);
        if candidates.is_empty() {
            return Err(DiscoveryError::NoServiceAvailable);
        }
        let index = rand::thread_rng().gen_range(0..candidates.len());
        Ok(candidates[index].clone())
    }

    // ------------------------------------------------------------------
    // SECTION: Mutation
    // ------------------------------------------------------------------

    /// Normalises an inbound `inform`: if the service carries an id the
    /// caller does not get to choose one, so an informed record's `id` is
    /// always overwritten by this step. Looks up any existing entry with
    /// the same (address, kind); if found, adopts its id (idempotent
    /// re-registration); otherwise mints a fresh one.
    #[must_use]
    pub fn normalize(&self, mut service: Service) -> Service {
        let services = self.services.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(existing) = services
            .iter()
            .find(|svc| svc.address == service.address && svc.kind == service.kind)
        {
            service.id = existing.id;
        } else {
            service.id = ServiceId::new_random();
        }
        service
    }

    /// Adds `service` to the local tables.
    ///
    /// # Errors
    /// Returns [`DiscoveryError::ServiceAlreadyExists`] if the id is
    /// already registered.
    pub fn add_local(&self, service: Service) -> Result<(), DiscoveryError> {
        let mut services = self.services.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if services.iter().any(|svc| svc.id == service.id) {
            return Err(DiscoveryError::ServiceAlreadyExists);
        }
        let mut by_type = self.by_type.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        by_type.entry(service.kind.clone()).or_default().push(service.id);
        services.push(service);
        Ok(())
    }

    /// Removes the service with id `id` from the local tables.
    ///
    /// # Errors
    /// Returns [`DiscoveryError::ServiceDoesNotExist`] if no such service
    /// is registered.
    pub fn delete_local(&self, id: ServiceId) -> Result<(), DiscoveryError> {
        let mut services = self.services.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let position = services
            .iter()
            .position(|svc| svc.id == id)
            .ok_or(DiscoveryError::ServiceDoesNotExist)?;
        let removed = services.remove(position);
        let mut by_type = self.by_type.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(ids) = by_type.get_mut(&removed.kind) {
            ids.retain(|existing| *existing != id);
        }
        Ok(())
    }

    /// Adds `service` locally, then fans the mutation out to every known
    /// peer concurrently. Peer failures are reported through the
    /// operational sink and never surfaced to the caller.
    ///
    /// # Errors
    /// Returns [`DiscoveryError::ServiceAlreadyExists`] if the id is
    /// already registered locally.
    pub async fn add(self: &Arc<Self>, service: Service) -> Result<(), DiscoveryError> {
        self.add_local(service.clone())?;
        self.fanout(PeerOperation::AddService { service }).await;
        Ok(())
    }

    /// Deletes the service with id `id` locally, then fans the mutation
    /// out to every known peer concurrently.
    ///
    /// # Errors
    /// Returns [`DiscoveryError::ServiceDoesNotExist`] if no such service
    /// is registered locally.
    pub async fn delete(self: &Arc<Self>, id: ServiceId) -> Result<(), DiscoveryError> {
        self.delete_local(id)?;
        self.fanout(PeerOperation::DeleteService { id }).await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // SECTION: Peers
    // ------------------------------------------------------------------

    /// Registers `peer` in the local peer table if not already present.
    pub fn add_peer(&self, peer: String) {
        let mut peers = self.peers.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if !peers.contains(&peer) {
            peers.push(peer);
        }
    }

    /// Removes `peer` from the local peer table.
    pub fn remove_peer(&self, peer: &str) {
        let mut peers = self.peers.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        peers.retain(|existing| existing != peer);
    }

    /// Returns the current peer list.
    #[must_use]
    pub fn peers(&self) -> Vec<String> {
        self.peers.read().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// Sends `operation` to every configured peer concurrently, one task
    /// per peer. Each peer applies the mutation without re-propagating
    /// (the `/peer` handler never re-broadcasts), so this never cycles.
    /// Failures are logged via the operational sink; they do not affect
    /// the return value because propagation is explicitly best-effort.
    async fn fanout(self: &Arc<Self>, operation: PeerOperation) {
        let peers = self.peers();
        let mut tasks = Vec::with_capacity(peers.len());
        for peer in peers {
            let this = Arc::clone(self);
            let op = operation.clone();
            tasks.push(tokio::spawn(async move { this.send_peer_request(&peer, &op).await }));
        }
        for task in tasks {
            let _ = task.await;
        }
    }

    async fn send_peer_request(&self, peer: &str, operation: &PeerOperation) -> Result<PeerResponse, DiscoveryError> {
        let url = format!("{peer}/peer");
        let result = self
            .http
            .post(&url)
            .header("X-Access-Key", &self.access_key)
            .json(operation)
            .send()
            .await;
        match result {
            Ok(response) => response.json::<PeerResponse>().await.map_err(DiscoveryError::from),
            Err(err) => {
                self.sink.record(OperationalEvent {
                    kind: EventKind::PeerRequestFailed,
                    detail: format!("{peer}: {err}"),
                });
                Err(DiscoveryError::PeerRequestFailed(err.to_string()))
            }
        }
    }

    /// Applies an inbound peer operation locally, never re-propagating.
    ///
    /// # Errors
    /// Propagates [`DiscoveryError`] for add/delete conflicts; `ListServices`
    /// and `ListPeers` never fail.
    pub fn apply_peer_operation(&self, operation: PeerOperation) -> Result<PeerResponse, DiscoveryError> {
        match operation {
            PeerOperation::AddService { service } => match self.add_local(service) {
                Ok(()) => Ok(PeerResponse { success: true, error: None, services: None, peers: None }),
                Err(err) => Ok(PeerResponse { success: false, error: Some(err.to_string()), services: None, peers: None }),
            },
            PeerOperation::DeleteService { id } => match self.delete_local(id) {
                Ok(()) => Ok(PeerResponse { success: true, error: None, services: None, peers: None }),
                Err(err) => Ok(PeerResponse { success: false, error: Some(err.to_string()), services: None, peers: None }),
            },
            PeerOperation::ListServices => {
                let services = self.list(&QueryParameters::default());
                Ok(PeerResponse { success: true, error: None, services: Some(services), peers: None })
            }
            PeerOperation::ListPeers => {
                Ok(PeerResponse { success: true, error: None, services: None, peers: Some(self.peers()) })
            }
            PeerOperation::Noop => Ok(PeerResponse { success: true, error: None, services: None, peers: None }),
        }
    }

    /// Bootstraps from configured peer addresses: adds each to the local
    /// peer table, then, for each in turn, fetches its peer list and its
    /// service list, stopping after the first peer that answers
    /// successfully (peers are assumed equivalent). Entries learned this
    /// way are inserted without re-propagating.
    ///
    /// # Errors
    /// Never returns an error: a peer that cannot be reached is logged
    /// and the next configured peer is tried.
    pub async fn bootstrap(self: &Arc<Self>, configured_peers: &[String]) -> Result<(), DiscoveryError> {
        for peer in configured_peers {
            self.add_peer(peer.clone());
        }
        for peer in configured_peers {
            let peers_response = self.send_peer_request(peer, &PeerOperation::ListPeers).await;
            let services_response = self.send_peer_request(peer, &PeerOperation::ListServices).await;
            if let (Ok(peers_response), Ok(services_response)) = (peers_response, services_response) {
                for other in peers_response.peers.unwrap_or_default() {
                    self.add_peer(other);
                }
                for service in services_response.services.unwrap_or_default() {
                    let _ = self.add_local(service);
                }
                self.sink.record(OperationalEvent {
                    kind: EventKind::BootstrapSucceeded,
                    detail: peer.clone(),
                });
                return Ok(());
            }
        }
        Ok(())
    }
}

/// Constant-time string comparison used for the access-key check.
#[must_use]
pub fn constant_time_eq_str(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq as _;
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests use expect on deterministic fixtures.")]

    use std::collections::BTreeSet;

    use super::*;

    fn svc(address: &str, kind: &str, tags: &[&str]) -> Service {
        Service {
            id: ServiceId::new_random(),
            address: address.to_string(),
            kind: kind.to_string(),
            tags: tags.iter().map(|tag| (*tag).to_string()).collect(),
        }
    }

    #[test]
    fn add_then_delete_rejects_duplicate_and_missing() {
        let registry = Registry::new(String::new());
        let service = svc("http://b1", "hpc-bridge", &["gpu"]);
        registry.add_local(service.clone()).expect("first add succeeds");
        let err = registry.add_local(service.clone()).expect_err("second add rejected");
        assert!(matches!(err, DiscoveryError::ServiceAlreadyExists));
        registry.delete_local(service.id).expect("delete succeeds");
        let err = registry.delete_local(service.id).expect_err("double delete rejected");
        assert!(matches!(err, DiscoveryError::ServiceDoesNotExist));
    }

    #[test]
    fn normalize_is_idempotent_on_address_and_kind() {
        let registry = Registry::new(String::new());
        let first = registry.normalize(svc("http://b1", "hpc-bridge", &[]));
        registry.add_local(first.clone()).expect("add");
        let second = registry.normalize(Service {
            id: ServiceId::new_random(),
            address: "http://b1".to_string(),
            kind: "hpc-bridge".to_string(),
            tags: BTreeSet::new(),
        });
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn query_matches_required_and_excludes_tags() {
        let registry = Registry::new(String::new());
        let matching = svc("http://b1", "hpc-bridge", &["gpu", "fast"]);
        let excluded = svc("http://b2", "hpc-bridge", &["gpu", "slow"]);
        registry.add_local(matching.clone()).expect("add");
        registry.add_local(excluded).expect("add");
        let params = QueryParameters {
            kind: Some("hpc-bridge".to_string()),
            tags: ["gpu"].into_iter().map(str::to_string).collect(),
            exclude_tags: ["slow"].into_iter().map(str::to_string).collect(),
            ..QueryParameters::default()
        };
        let found = registry.query_one(&params).expect("one match");
        assert_eq!(found.id, matching.id);
    }

    #[test]
    fn query_one_fails_on_empty_candidate_set() {
        let registry = Registry::new(String::new());
        let params = QueryParameters { kind: Some("hpc-bridge".to_string()), ..QueryParameters::default() };
        let err = registry.query_one(&params).expect_err("must fail");
        assert!(matches!(err, DiscoveryError::NoServiceAvailable));
    }

    #[test]
    fn access_key_check_allows_empty_configured_key() {
        let registry = Registry::new(String::new());
        assert!(registry.check_access_key("anything"));
    }

    #[test]
    fn access_key_check_rejects_mismatch() {
        let registry = Registry::new("secret".to_string());
        assert!(registry.check_access_key("secret"));
        assert!(!registry.check_access_key("wrong"));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(usize),
        Delete(usize),
    }

    use proptest::strategy::Strategy as _;

    proptest::proptest! {
        /// P1: after any sequence of add/delete operations applied to a
        /// single node, no two registered services share an id.
        #[test]
        fn no_two_services_share_an_id_after_any_op_sequence(
            ops in proptest::collection::vec(
                (proptest::bool::ANY, 0usize..6),
                1..40,
            ).prop_map(|raw| raw.into_iter().map(|(is_add, index)| if is_add { Op::Add(index) } else { Op::Delete(index) }).collect::<Vec<_>>()),
        ) {
            let registry = Registry::new(String::new());
            let pool: Vec<Service> = (0..6).map(|i| svc(&format!("http://svc{i}"), "hpc-bridge", &[])).collect();

            for op in ops {
                match op {
                    Op::Add(index) => {
                        let _ = registry.add_local(pool[index].clone());
                    }
                    Op::Delete(index) => {
                        let _ = registry.delete_local(pool[index].id);
                    }
                }
                let services = registry.services.read().unwrap_or_else(std::sync::PoisonError::into_inner);
                let mut ids: Vec<ServiceId> = services.iter().map(|svc| svc.id).collect();
                let before = ids.len();
                ids.sort_unstable();
                ids.dedup();
                proptest::prop_assert_eq!(ids.len(), before);
            }
        }
    }
}
