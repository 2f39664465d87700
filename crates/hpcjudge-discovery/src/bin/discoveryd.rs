// crates/hpcjudge-discovery/src/bin/discoveryd.rs
// ============================================================================
// Module: HPC Judge Discovery Node Binary
// Description: Loads a discovery node configuration, bootstraps from any
// configured peers, and serves the HTTP/WS surface.
// Purpose: Entry point for `hpcjudge-discoveryd`.
// Dependencies: hpcjudge-discovery, hpcjudge-config, tokio
// ============================================================================

use std::io::Write as _;
use std::process::ExitCode;
use std::sync::Arc;

use hpcjudge_discovery::registry::Registry;
use hpcjudge_discovery::server;
use hpcjudge_discovery::sink::StderrSink;

fn main() -> ExitCode {
    let Some(config_path) = std::env::args().nth(1) else {
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "usage: hpcjudge-discoveryd <config.yaml>");
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
    let config = match hpcjudge_config::load_discovery_config(std::path::Path::new(config_path)) {
        Ok(config) => config,
        Err(err) => {
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "failed to load config: {err}");
            return ExitCode::FAILURE;
        }
    };
    let registry = Arc::new(Registry::with_sink(config.access_key, Arc::new(StderrSink)));
    if let Err(err) = registry.bootstrap(&config.peers).await {
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "bootstrap failed: {err}");
    }
    let app = server::router(registry);
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
