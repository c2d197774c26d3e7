//! Configuration file support for fabric-syncd
//!
//! Loads and validates the daemon configuration from TOML.
//! Default location: /etc/fabric-syncd/fabric-syncd.toml

use fabric_api::RestClientOptions;
use fabric_sync_common::{PollPolicy, SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::mapping::{MappingSource, MappingTable};
use crate::tables::{DEFAULT_CONFIG_PATH, DEFAULT_STORE_PATH};

/// Fabric backend connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FabricConfig {
    /// Base URL of the backend, e.g. `https://fabric.example.net`
    #[serde(default)]
    pub url: String,

    /// Value of the `X-API-Version` header
    #[serde(default = "default_api_version")]
    pub api_version: u32,

    /// Pre-provisioned session token sent as the `Auth` header
    #[serde(default)]
    pub session_token: Option<String>,

    /// Extra CA bundle trusted for the backend's TLS certificate
    #[serde(default)]
    pub tls_cacert_file: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Physical network mappings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingsConfig {
    #[serde(default)]
    pub uplinkset_mappings: MappingSource,

    #[serde(default)]
    pub flat_net_mappings: MappingSource,
}

/// Synchronization loop and polling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds between synchronization passes
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Disables the synchronization loop
    #[serde(default)]
    pub developer_mode: bool,

    /// Seconds between power lock checks
    #[serde(default = "default_power_lock_poll")]
    pub power_lock_poll_secs: u64,

    /// Seconds between server profile state checks
    #[serde(default = "default_profile_poll")]
    pub profile_poll_secs: u64,

    /// Attempts before a wait gives up; unset waits forever
    #[serde(default)]
    pub max_poll_attempts: Option<u32>,
}

/// State store location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

/// Complete fabric-syncd configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fabric: FabricConfig,

    #[serde(default)]
    pub mappings: MappingsConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

fn default_api_version() -> u32 {
    fabric_api::rest::DEFAULT_API_VERSION
}

fn default_request_timeout() -> u64 {
    60
}

fn default_interval() -> u64 {
    3600
}

fn default_power_lock_poll() -> u64 {
    30
}

fn default_profile_poll() -> u64 {
    5
}

fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_version: default_api_version(),
            session_token: None,
            tls_cacert_file: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            developer_mode: false,
            power_lock_poll_secs: default_power_lock_poll(),
            profile_poll_secs: default_profile_poll(),
            max_poll_attempts: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Config {
    /// Parses a configuration document.
    pub fn from_toml(content: &str) -> SyncResult<Self> {
        toml::from_str(content)
            .map_err(|e| SyncError::configuration("config", format!("failed to parse: {}", e)))
    }

    /// Loads configuration from file, falling back to defaults if the file
    /// does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content).map_err(|e| match e {
                SyncError::Configuration { message, .. } => {
                    SyncError::configuration(path.display().to_string(), message)
                }
                other => other,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                eprintln!(
                    "fabric-syncd: Config file {} not found, using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(e) => Err(SyncError::configuration(
                path.display().to_string(),
                e.to_string(),
            )),
        }
    }

    /// Loads from the default location or defaults
    pub fn load() -> SyncResult<Self> {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
    }

    /// Validates option values. Mapping syntax is checked by
    /// [`Config::mapping_table`].
    pub fn validate(&self) -> SyncResult<()> {
        if self.fabric.url.trim().is_empty() {
            return Err(SyncError::configuration("fabric.url", "must be set"));
        }
        if self.fabric.request_timeout_secs == 0 {
            return Err(SyncError::configuration(
                "fabric.request_timeout_secs",
                "must be > 0",
            ));
        }
        if self.sync.interval_secs == 0 {
            return Err(SyncError::configuration("sync.interval_secs", "must be > 0"));
        }
        if self.sync.power_lock_poll_secs == 0 || self.sync.profile_poll_secs == 0 {
            return Err(SyncError::configuration(
                "sync.*_poll_secs",
                "poll intervals must be > 0",
            ));
        }
        if self.sync.max_poll_attempts == Some(0) {
            return Err(SyncError::configuration(
                "sync.max_poll_attempts",
                "must be > 0 when set",
            ));
        }
        Ok(())
    }

    /// Parses the mapping options into a table.
    pub fn mapping_table(&self) -> SyncResult<MappingTable> {
        MappingTable::from_sources(
            &self.mappings.uplinkset_mappings,
            &self.mappings.flat_net_mappings,
        )
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    /// Wait policy for the hardware power lock.
    pub fn power_lock_policy(&self) -> PollPolicy {
        PollPolicy::unbounded(Duration::from_secs(self.sync.power_lock_poll_secs))
            .with_max_attempts(self.sync.max_poll_attempts)
    }

    /// Wait policy for server profile state.
    pub fn profile_policy(&self) -> PollPolicy {
        PollPolicy::unbounded(Duration::from_secs(self.sync.profile_poll_secs))
            .with_max_attempts(self.sync.max_poll_attempts)
    }

    /// Builds REST client options, reading the CA bundle if configured.
    pub fn client_options(&self) -> SyncResult<RestClientOptions> {
        let ca_cert_pem = match &self.fabric.tls_cacert_file {
            Some(path) if !path.as_os_str().is_empty() => Some(fs::read(path).map_err(|e| {
                SyncError::configuration(
                    "fabric.tls_cacert_file",
                    format!("{}: {}", path.display(), e),
                )
            })?),
            _ => None,
        };
        Ok(RestClientOptions {
            api_version: self.fabric.api_version,
            session_token: self.fabric.session_token.clone(),
            request_timeout: Duration::from_secs(self.fabric.request_timeout_secs),
            ca_cert_pem,
            ..RestClientOptions::default()
        })
    }
}
