// crates/hpcjudge-bridge/src/bin/bridged.rs
// ============================================================================
// Module: HPC Judge Bridge Node Binary
// Description: Loads bridge configuration, registers with the discovery
// mesh, and serves the signed HTTP surface.
// Purpose: Entry point for `hpcjudge-bridged`.
// Dependencies: hpcjudge-bridge, hpcjudge-config, hpcjudge-discovery, tokio
// ============================================================================

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use hpcjudge_bridge::objectstore::ObjectStore;
use hpcjudge_bridge::operations::Bridge;
use hpcjudge_bridge::server;
use hpcjudge_core::PartitionTable;
use hpcjudge_core::Service;
use hpcjudge_core::ServiceId;
use hpcjudge_core::constants::DISCOVERY_REGISTER_KEEPALIVE_SECS;
use hpcjudge_core::constants::HPC_BRIDGE_DISCOVERY_TYPE;
use hpcjudge_discovery::client::RegisterSession;

fn main() -> ExitCode {
    let Some(config_path) = std::env::args().nth(1) else {
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "usage: hpcjudge-bridged <config.yaml>");
        return ExitCode::FAILURE;
    };
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };
    runtime.block_on(run(&config_path))
}

async fn run(config_path: &str) -> ExitCode {
    let config = match hpcjudge_config::load_bridge_config(std::path::Path::new(config_path)) {
        Ok(config) => config,
        Err(err) => {
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "failed to load config: {err}");
            return ExitCode::FAILURE;
        }
    };

    let roots: BTreeMap<String, PathBuf> = config.storage_path.iter().map(|(name, root)| (name.clone(), PathBuf::from(root))).collect();
    let partitions = PartitionTable::new(roots);
    let bridge = Arc::new(Bridge::new(partitions));

    let object_store = match ObjectStore::new(&config.object_store).await {
        Ok(store) => Arc::new(store),
        Err(err) => {
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "failed to connect object store: {err}");
            return ExitCode::FAILURE;
        }
    };

    let id = config.uuid.map(ServiceId::from_uuid).unwrap_or_else(ServiceId::new_random);
    let service = Service {
        id,
        address: config.external_address.clone(),
        kind: HPC_BRIDGE_DISCOVERY_TYPE.to_string(),
        tags: config.tags.iter().cloned().collect(),
    };
    let keepalive = std::time::Duration::from_secs(DISCOVERY_REGISTER_KEEPALIVE_SECS);
    let _registration = match config.discovery.address.first() {
        Some(address) => match RegisterSession::connect(address, &config.discovery.access_key, service, keepalive).await {
            Ok(session) => Some(session),
            Err(err) => {
                let mut stderr = std::io::stderr();
                let _ = writeln!(stderr, "discovery unreachable at startup (continuing unregistered): {err}");
                None
            }
        },
        None => None,
    };

    let state = server::BridgeState { bridge, object_store, secret: Arc::new(config.secret_key.into_bytes()) };
    let app = server::router(state);
    let listener = match tokio::net::TcpListener::bind(&config.listen).await {
        Ok(listener) => listener,
        Err(err) => {
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "failed to bind {}: {err}", config.listen);
            return ExitCode::FAILURE;
        }
    };
    match axum::serve(listener, app).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "server exited: {err}");
            ExitCode::FAILURE
        }
    }
}
