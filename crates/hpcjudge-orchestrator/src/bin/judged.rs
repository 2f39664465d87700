// crates/hpcjudge-orchestrator/src/bin/judged.rs
// ============================================================================
// Module: HPC Judge Orchestrator Binary
// Description: Loads orchestrator configuration, registers with the
// discovery mesh, and runs the queue consumer alongside the three
// object-store event watchers until shutdown.
// Purpose: Entry point for `hpcjudge-judged`.
// Dependencies: hpcjudge-orchestrator, hpcjudge-config, hpcjudge-discovery,
// tokio
// ============================================================================

use std::io::Write as _;
use std::process::ExitCode;
use std::sync::Arc;

use hpcjudge_core::Service;
use hpcjudge_core::ServiceId;
use hpcjudge_core::constants::DISCOVERY_REGISTER_KEEPALIVE_SECS;
use hpcjudge_core::constants::HPC_JUDGE_DISCOVERY_TYPE;
use hpcjudge_discovery::Client as DiscoveryClient;
use hpcjudge_discovery::client::RegisterSession;
use hpcjudge_orchestrator::Consumer;
use hpcjudge_orchestrator::ProcessJudgeContext;
use hpcjudge_orchestrator::VerdictPublisher;
use hpcjudge_orchestrator::kvlock::KvLock;
use hpcjudge_orchestrator::objectstore::ObjectStore;
use hpcjudge_orchestrator::queue::JudgeQueueConsumer;
use hpcjudge_orchestrator::queue::JudgeQueueProducer;
use hpcjudge_orchestrator::queue::touch_interval;
use hpcjudge_orchestrator::sink::OperationalSink;
use hpcjudge_orchestrator::sink::StderrSink;
use hpcjudge_orchestrator::watchers::CommandWatcher;
use hpcjudge_orchestrator::watchers::ProblemIntakeWatcher;
use hpcjudge_orchestrator::watchers::ResultWatcher;

fn main() -> ExitCode {
    let Some(config_path) = std::env::args().nth(1) else {
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "usage: hpcjudge-judged <config.yaml>");
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
    let config = match hpcjudge_config::load_orchestrator_config(std::path::Path::new(config_path)) {
        Ok(config) => config,
        Err(err) => {
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "failed to load config: {err}");
            return ExitCode::FAILURE;
        }
    };

    let object_store = match ObjectStore::new(&config.object_store).await {
        Ok(store) => store,
        Err(err) => {
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "failed to connect object store: {err}");
            return ExitCode::FAILURE;
        }
    };

    let redis_client = match redis::Client::open(config.redis.address.clone()) {
        Ok(client) => client,
        Err(err) => {
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "invalid redis address: {err}");
            return ExitCode::FAILURE;
        }
    };
    let redis_connection = match redis_client.get_connection_manager().await {
        Ok(connection) => connection,
        Err(err) => {
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "failed to connect to redis: {err}");
            return ExitCode::FAILURE;
        }
    };
    let lock = KvLock::new(redis_connection);

    let discovery = DiscoveryClient::new(config.discovery.address.clone(), config.discovery.access_key.clone(), config.discovery.timeout);

    let consumer_queue = match JudgeQueueConsumer::connect(&config.nsq) {
        Ok(consumer) => consumer,
        Err(err) => {
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "failed to connect judge-topic consumer: {err}");
            return ExitCode::FAILURE;
        }
    };
    let producer_queue = match JudgeQueueProducer::connect(&config.nsq) {
        Ok(producer) => producer,
        Err(err) => {
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "failed to connect report-topic producer: {err}");
            return ExitCode::FAILURE;
        }
    };

    let sink: Arc<dyn OperationalSink> = Arc::new(StderrSink::default());
    let secret_key = config.secret_key.clone().into_bytes();

    let verdicts = Arc::new(VerdictPublisher::new(producer_queue, lock.clone(), config.redis.prefix.clone(), Arc::clone(&sink)));

    let ctx = Arc::new(ProcessJudgeContext {
        objectstore: object_store,
        lock: lock.clone(),
        lock_prefix: config.redis.prefix.clone(),
        lock_ttl: config.redis.expire.judge,
        discovery: discovery.clone(),
        secret_key: secret_key.clone(),
        spawn_command: config.spawn_command.clone(),
    });

    let id = config.uuid.map(ServiceId::from_uuid).unwrap_or_else(ServiceId::new_random);
    let service = Service {
        id,
        address: config.external_address.clone(),
        kind: HPC_JUDGE_DISCOVERY_TYPE.to_string(),
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

    let touch = touch_interval(config.nsq.msg_timeout);
    let consumer = Consumer::new(
        consumer_queue,
        Arc::clone(&ctx),
        Arc::clone(&verdicts),
        Arc::clone(&sink),
        config.nsq.concurrent,
        config.nsq.max_attempts,
        config.nsq.requeue_delay,
        touch,
    );

    let result_watcher = ResultWatcher::new(
        ctx.objectstore.clone(),
        lock.clone(),
        config.redis.prefix.clone(),
        config.redis.expire.report,
        config.watcher_poll_interval,
        Arc::clone(&verdicts),
        Arc::clone(&sink),
    );
    let command_watcher = CommandWatcher::new(
        ctx.objectstore.clone(),
        lock.clone(),
        config.redis.prefix.clone(),
        config.redis.expire.report,
        config.watcher_poll_interval,
        Arc::clone(&verdicts),
        Arc::clone(&sink),
    );
    let problem_watcher = ProblemIntakeWatcher::new(
        ctx.objectstore.clone(),
        lock.clone(),
        config.redis.prefix.clone(),
        config.redis.expire.report,
        config.watcher_poll_interval,
        discovery,
        secret_key,
        Arc::clone(&sink),
    );

    tokio::select! {
        () = consumer.run() => {}
        () = result_watcher.run() => {}
        () = command_watcher.run() => {}
        () = problem_watcher.run() => {}
        _ = tokio::signal::ctrl_c() => {}
    }
    ExitCode::SUCCESS
}
