//! Node configuration for the Rumor engine daemon.
//!
//! Provides [`NodeConfig`] with defaults for data directory, RPC binding,
//! logging, sweep cadence, and the identity salt. Values can be loaded from
//! an optional TOML file and `RUMOR_*` environment variables; the binary
//! applies command-line overrides on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::RngCore;
use serde::Deserialize;

use rumor_core::constants::{DEFAULT_CALL_TIMEOUT_MS, DEFAULT_RPC_PORT, DEFAULT_SWEEP_INTERVAL_SECS};
use rumor_core::error::RumorError;

/// File under the data directory holding the generated identity salt (hex).
const SALT_FILE: &str = "identity.salt";

/// Bytes of randomness in a generated salt.
const GENERATED_SALT_LEN: usize = 32;

/// Configuration for a node instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Root directory for all persistent data.
    pub data_dir: PathBuf,
    /// IP address for the JSON-RPC server to bind to.
    pub rpc_bind: String,
    /// Port for the JSON-RPC server.
    pub rpc_port: u16,
    /// Log level filter string (e.g. "info", "debug", "rumor_node_lib=trace").
    pub log_level: String,
    /// Log output format, "text" or "json".
    pub log_format: String,
    /// Seconds between background resolution sweeps.
    pub sweep_interval_secs: u64,
    /// Upper bound on a single engine call made over RPC, in milliseconds.
    pub call_timeout_ms: u64,
    /// Server secret for identity hashing. Generated and persisted if unset.
    pub identity_salt: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rumor");

        Self {
            data_dir,
            rpc_bind: "127.0.0.1".to_string(),
            rpc_port: DEFAULT_RPC_PORT,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            identity_salt: None,
        }
    }
}

impl NodeConfig {
    /// Load defaults, then `file` (if given and present), then `RUMOR_*` env vars.
    pub fn load(file: Option<&Path>) -> Result<Self, RumorError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(::config::File::from(path).required(false));
        }
        builder
            .add_source(::config::Environment::with_prefix("RUMOR").try_parsing(true))
            .build()
            .and_then(|c| c.try_deserialize::<NodeConfig>())
            .map_err(|e| RumorError::Config(e.to_string()))
    }

    /// Path to the RocksDB ledger directory.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("ledger")
    }

    /// Socket address string for the RPC server.
    pub fn rpc_addr(&self) -> String {
        format!("{}:{}", self.rpc_bind, self.rpc_port)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms.max(1))
    }

    /// Resolve the identity salt.
    ///
    /// A configured salt wins. Otherwise the salt persisted under the data
    /// directory is used, generating and writing a fresh one on first start
    /// so identity keys stay stable across restarts.
    pub fn load_or_create_salt(&self) -> Result<Vec<u8>, RumorError> {
        if let Some(salt) = &self.identity_salt {
            if salt.is_empty() {
                return Err(RumorError::Config("identity_salt must not be empty".into()));
            }
            return Ok(salt.as_bytes().to_vec());
        }

        let path = self.data_dir.join(SALT_FILE);
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                let salt = hex::decode(text.trim())
                    .map_err(|e| RumorError::Config(format!("corrupt {}: {e}", path.display())))?;
                if salt.is_empty() {
                    return Err(RumorError::Config(format!("empty salt in {}", path.display())));
                }
                Ok(salt)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let mut salt = vec![0u8; GENERATED_SALT_LEN];
                rand::thread_rng().fill_bytes(&mut salt);
                std::fs::create_dir_all(&self.data_dir)
                    .and_then(|_| std::fs::write(&path, hex::encode(&salt)))
                    .map_err(|e| RumorError::Config(format!("write {}: {e}", path.display())))?;
                tracing::info!(path = %path.display(), "generated identity salt");
                Ok(salt)
            }
            Err(e) => Err(RumorError::Config(format!("read {}: {e}", path.display()))),
        }
    }
}
