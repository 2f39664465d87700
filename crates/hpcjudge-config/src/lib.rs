// crates/hpcjudge-config/src/lib.rs
// ============================================================================
// Module: HPC Judge Configuration
// Description: YAML-loaded configuration structs for every long-running
// service in the fleet (discovery, bridge, spawner, orchestrator).
// Purpose: One validated load path per service, mirroring the reference
// implementation's per-service `configure.Configure` YAML documents.
// Dependencies: hpcjudge-core, serde, serde_yaml, thiserror
// ============================================================================

//! ## Overview
//! Every `*Config` type here deserializes from a YAML document with the
//! same field names (translated to `snake_case`) as the reference
//! implementation's configuration structs, so operators migrating existing
//! deployments keep the same YAML files. [`load`] adds the validation the
//! original loader skipped: empty addresses, zero timeouts, and missing
//! partitions are rejected at load time rather than surfacing as a runtime
//! panic deep in a handler.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

// ============================================================================
// SECTION: Error Type
// ============================================================================

/// Failure loading or validating a service configuration document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("reading config file: {0}")]
    Read(#[from] std::io::Error),
    /// The configuration document did not parse as valid YAML for the
    /// target type.
    #[error("parsing config yaml: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// A required field was empty or otherwise invalid.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Shared Sub-Configs
// ============================================================================

/// Discovery client configuration shared by the bridge and the orchestrator.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DiscoveryClientConfig {
    /// Candidate discovery node addresses, tried in random order.
    pub address: Vec<String>,
    /// Access key sent as `X-Access-Key`; empty disables the check.
    #[serde(default)]
    pub access_key: String,
    /// Per-request timeout.
    #[serde(with = "duration_secs", default = "default_timeout")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Object-store (S3-compatible) connection configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ObjectStoreConfig {
    /// Endpoint URL.
    pub endpoint: String,
    /// Static credentials.
    pub credentials: ObjectStoreCredentials,
    /// Whether to use TLS.
    #[serde(default)]
    pub ssl: bool,
    /// Bucket name mapping.
    pub buckets: ObjectStoreBuckets,
    /// Validity window applied to presigned URLs.
    #[serde(with = "duration_secs", default = "default_presign_expiry")]
    pub presigned_expiry: Duration,
}

fn default_presign_expiry() -> Duration {
    Duration::from_secs(900)
}

/// Static object-store credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ObjectStoreCredentials {
    /// Access key id.
    pub access_key: String,
    /// Secret key.
    pub secret_key: String,
}

/// Named bucket mapping used across the fleet.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStoreBuckets {
    /// Bucket holding problem data.
    pub problem: String,
    /// Bucket holding solution data.
    pub solution: String,
}

// ============================================================================
// SECTION: Discovery Node Config
// ============================================================================

/// `hpcjudge-discoveryd` configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DiscoveryNodeConfig {
    /// HTTP listen address.
    pub listen: String,
    /// Access key required on every request; empty disables the check.
    #[serde(default)]
    pub access_key: String,
    /// Peer discovery node addresses to bootstrap from.
    #[serde(default)]
    pub peers: Vec<String>,
}

/// Loads and validates a [`DiscoveryNodeConfig`] from `path`.
///
/// # Errors
/// Returns [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation (empty listen address).
pub fn load_discovery_config(path: &Path) -> Result<DiscoveryNodeConfig, ConfigError> {
    let config: DiscoveryNodeConfig = parse(path)?;
    if config.listen.trim().is_empty() {
        return Err(ConfigError::Invalid("listen address must not be empty".into()));
    }
    Ok(config)
}

// ============================================================================
// SECTION: Bridge Config
// ============================================================================

/// `hpcjudge-bridged` configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BridgeConfig {
    /// This bridge's discovery identifier, if pinned; otherwise minted fresh.
    #[serde(default)]
    pub uuid: Option<uuid::Uuid>,
    /// Routing tags advertised to the discovery mesh.
    #[serde(default)]
    pub tags: Vec<String>,
    /// HTTP listen address.
    pub listen: String,
    /// Address advertised to discovery/peers for inbound requests.
    pub external_address: String,
    /// HMAC secret shared with orchestrators calling this bridge.
    pub secret_key: String,
    /// Discovery client configuration.
    pub discovery: DiscoveryClientConfig,
    /// Partition name to filesystem root mapping.
    pub storage_path: BTreeMap<String, String>,
    /// Object store connection used by upload-file.
    pub object_store: ObjectStoreConfig,
}

/// Loads and validates a [`BridgeConfig`] from `path`.
///
/// # Errors
/// Returns [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation (empty listen address, empty partition table).
pub fn load_bridge_config(path: &Path) -> Result<BridgeConfig, ConfigError> {
    let config: BridgeConfig = parse(path)?;
    if config.listen.trim().is_empty() {
        return Err(ConfigError::Invalid("listen address must not be empty".into()));
    }
    if config.storage_path.is_empty() {
        return Err(ConfigError::Invalid("storage-path must configure at least one partition".into()));
    }
    Ok(config)
}

// ============================================================================
// SECTION: Spawner Config
// ============================================================================

/// `hpcjudge-spawncmd` configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SpawnerConfig {
    /// Base directory under which per-submission cgroups are created.
    pub cgroups_base_path: String,
    /// Partition name to filesystem root mapping.
    pub storage_path: BTreeMap<String, String>,
}

/// Loads and validates a [`SpawnerConfig`] from `path`.
///
/// # Errors
/// Returns [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation (empty cgroup base path, empty partition table).
pub fn load_spawner_config(path: &Path) -> Result<SpawnerConfig, ConfigError> {
    let config: SpawnerConfig = parse(path)?;
    if config.cgroups_base_path.trim().is_empty() {
        return Err(ConfigError::Invalid("cgroups-base-path must not be empty".into()));
    }
    if config.storage_path.is_empty() {
        return Err(ConfigError::Invalid("storage-path must configure at least one partition".into()));
    }
    Ok(config)
}

// ============================================================================
// SECTION: Utility CLI Config
// ============================================================================

/// `hpcjudge-cli` configuration. Runs setuid root inside the judge script's
/// process tree on the same node as a bridge, so it reuses that bridge's
/// partition table locally (print-problem-path, mask-read/mask-write/unmask
/// never leave the box) but still signs requests to it for the two
/// operations that need object-store credentials (report-result,
/// upload-artifact).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CliConfig {
    /// Local bridge address this CLI uploads through.
    pub bridge_address: String,
    /// HMAC secret shared with the local bridge.
    pub secret_key: String,
    /// Partition name to filesystem root mapping, matching the bridge's own.
    pub storage_path: BTreeMap<String, String>,
}

/// Loads and validates a [`CliConfig`] from `path`.
///
/// # Errors
/// Returns [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation (empty bridge address, empty partition table).
pub fn load_cli_config(path: &Path) -> Result<CliConfig, ConfigError> {
    let config: CliConfig = parse(path)?;
    if config.bridge_address.trim().is_empty() {
        return Err(ConfigError::Invalid("bridge-address must not be empty".into()));
    }
    if config.storage_path.is_empty() {
        return Err(ConfigError::Invalid("storage-path must configure at least one partition".into()));
    }
    Ok(config)
}

// ============================================================================
// SECTION: Orchestrator Config
// ============================================================================

/// NSQ-like queue connection configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NsqConfig {
    /// `nsqd` producer endpoint.
    pub nsqd: NsqdConfig,
    /// `nsqlookupd` consumer endpoints.
    pub nsqlookupd: NsqLookupdConfig,
    /// Shared auth secret, if the queue requires one.
    #[serde(default)]
    pub auth_secret: String,
    /// Number of concurrent message handlers.
    pub concurrent: u16,
    /// Topic names.
    pub topics: NsqTopicsConfig,
    /// Consumer channel name.
    pub channel: String,
    /// Maximum delivery attempts before a message is abandoned with a
    /// failure report.
    pub max_attempts: u16,
    /// Base delay applied when a message is requeued.
    #[serde(with = "duration_secs")]
    pub requeue_delay: Duration,
    /// Visibility timeout; also drives the background touch interval.
    #[serde(with = "duration_secs")]
    pub msg_timeout: Duration,
}

/// `nsqd` producer endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct NsqdConfig {
    /// Producer address.
    pub address: String,
}

/// `nsqlookupd` consumer endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NsqLookupdConfig {
    /// Lookup addresses.
    pub address: Vec<String>,
}

/// Queue topic names.
#[derive(Debug, Clone, Deserialize)]
pub struct NsqTopicsConfig {
    /// Inbound judge-message topic.
    pub judge: String,
    /// Outbound report topic.
    pub report: String,
}

/// Redis-backed KV lock configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://127.0.0.1:6379`.
    pub address: String,
    /// Key prefix applied to every lock/dedupe key.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
    /// TTLs applied to the two key families the orchestrator maintains.
    pub expire: RedisExpireConfig,
}

fn default_redis_prefix() -> String {
    "hpcjudge:".to_string()
}

/// TTLs for the outer submission lock and the event-dedupe keys.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisExpireConfig {
    /// TTL for the outer submission (at-most-once) lock.
    #[serde(with = "duration_secs")]
    pub judge: Duration,
    /// TTL for event-dedupe keys (result/report/problem-intake).
    #[serde(with = "duration_secs")]
    pub report: Duration,
}

/// Where and how to invoke the sandbox spawner on a bridge, from the
/// orchestrator's point of view: it never runs the binary itself, only
/// builds the `execute-command` request that asks a bridge to.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SpawnCommandConfig {
    /// Path to the `hpcjudge-spawncmd` binary on the bridge's filesystem.
    pub binary: String,
    /// Path to the spawner's own YAML configuration on the bridge's
    /// filesystem, passed as `--config`.
    pub config_path: String,
}

/// `hpcjudge-judged` configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OrchestratorConfig {
    /// This orchestrator's discovery identifier, if pinned.
    #[serde(default)]
    pub uuid: Option<uuid::Uuid>,
    /// Routing tags advertised to the discovery mesh.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Address advertised to discovery for inbound presigned-URL callbacks.
    pub external_address: String,
    /// Queue connection.
    pub nsq: NsqConfig,
    /// Object store connection.
    pub object_store: ObjectStoreConfig,
    /// Discovery client configuration, used to locate bridges.
    pub discovery: DiscoveryClientConfig,
    /// KV lock connection.
    pub redis: RedisConfig,
    /// HMAC secret shared with bridges this orchestrator calls.
    pub secret_key: String,
    /// How to invoke the sandbox spawner through a bridge's execute-command.
    pub spawn_command: SpawnCommandConfig,
    /// Interval between polls of each object-store event watcher
    /// (result, command-report, problem-intake).
    #[serde(with = "duration_secs", default = "default_watcher_poll_interval")]
    pub watcher_poll_interval: Duration,
}

fn default_watcher_poll_interval() -> Duration {
    Duration::from_secs(2)
}

/// Loads and validates an [`OrchestratorConfig`] from `path`.
///
/// # Errors
/// Returns [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation (zero concurrency, zero timeouts).
pub fn load_orchestrator_config(path: &Path) -> Result<OrchestratorConfig, ConfigError> {
    let config: OrchestratorConfig = parse(path)?;
    if config.nsq.concurrent == 0 {
        return Err(ConfigError::Invalid("nsq.concurrent must be at least 1".into()));
    }
    if config.nsq.msg_timeout.is_zero() {
        return Err(ConfigError::Invalid("nsq.msg-timeout must be greater than zero".into()));
    }
    Ok(config)
}

// ============================================================================
// SECTION: Parsing Helpers
// ============================================================================

fn parse<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    let value = serde_yaml::from_str(&raw)?;
    Ok(value)
}

/// Serializes [`Duration`] as whole seconds, matching the reference
/// implementation's YAML duration fields.
mod duration_secs {
    use std::time::Duration;

    use serde::Deserialize;
    use serde::Deserializer;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(seconds))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests use expect on deterministic fixtures.")]

    use super::*;

    #[test]
    fn rejects_blank_discovery_listen_address() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("discovery.yaml");
        std::fs::write(&path, "listen: \"\"\naccess-key: \"\"\npeers: []\n").expect("write");
        let err = load_discovery_config(&path).expect_err("must reject blank listen");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn loads_bridge_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bridge.yaml");
        std::fs::write(
            &path,
            r#"
listen: "0.0.0.0:9000"
external-address: "http://bridge-1:9000"
secret-key: "shh"
discovery:
  address: ["http://disco-1:8500"]
  access-key: "k"
  timeout: 5
storage-path:
  home: /home
  solution: /srv/solution
object-store:
  endpoint: "minio:9000"
  credentials:
    access-key: "ak"
    secret-key: "sk"
  buckets:
    problem: problem
    solution: solution
"#,
        )
        .expect("write");
        let config = load_bridge_config(&path).expect("load");
        assert_eq!(config.storage_path.len(), 2);
    }

    #[test]
    fn rejects_cli_config_with_no_partitions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cli.yaml");
        std::fs::write(&path, "bridge-address: \"http://127.0.0.1:9000\"\nsecret-key: \"shh\"\nstorage-path: {}\n").expect("write");
        let err = load_cli_config(&path).expect_err("must reject empty partitions");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
