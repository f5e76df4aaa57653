use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ipnet::Ipv4Net;
use overlay_lease::{
    DEFAULT_ACQUIRE_LEASE_ATTEMPTS, DEFAULT_MAX_MIGRATION_ATTEMPTS,
    DEFAULT_MIGRATION_ATTEMPT_DELAY, LeaseControllerConfig, LeaseSettings,
};
use overlay_veth::{Privilege, VethManagerConfig};
use serde::{Deserialize, Serialize};

use crate::error::{DaemonError, DaemonResult};

pub(crate) const DEFAULT_MTU: u32 = 1450;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    pub database: DatabaseConfig,
    /// This host's underlay IP, used as its lease key.
    pub underlay_ip: String,
    pub subnet_range: Ipv4Net,
    pub subnet_prefix_len: u8,
    #[serde(default)]
    pub lease: LeaseConfig,
    #[serde(default)]
    pub veth: VethConfig,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaseConfig {
    pub max_migration_attempts: u32,
    pub migration_attempt_delay_ms: u64,
    pub acquire_attempts: u32,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            max_migration_attempts: DEFAULT_MAX_MIGRATION_ATTEMPTS,
            migration_attempt_delay_ms: DEFAULT_MIGRATION_ATTEMPT_DELAY.as_millis() as u64,
            acquire_attempts: DEFAULT_ACQUIRE_LEASE_ATTEMPTS,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VethConfig {
    pub mtu: u32,
    pub privilege: Privilege,
}

impl Default for VethConfig {
    fn default() -> Self {
        Self {
            mtu: DEFAULT_MTU,
            privilege: Privilege::User,
        }
    }
}

/// Load and validate an overlayd config from a YAML file.
///
/// A relative SQLite path is resolved against the config file's directory.
pub async fn load(path: &Path) -> DaemonResult<OverlayConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| DaemonError::Config(format!("read {}: {e}", path.display())))?;
    let mut config: OverlayConfig = serde_yaml_ng::from_str(&content)
        .map_err(|e| DaemonError::Config(format!("parse {}: {e}", path.display())))?;
    if let Some(config_dir) = path.parent() {
        config.database.url = resolve_sqlite_url(&config.database.url, config_dir);
    }
    config
        .validate()
        .map_err(|e| DaemonError::Config(format!("{}: {e}", path.display())))?;
    Ok(config)
}

/// Rewrite `sqlite:<relative path>` against `config_dir`. In-memory and
/// absolute URLs pass through unchanged.
fn resolve_sqlite_url(url: &str, config_dir: &Path) -> String {
    let Some(rest) = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
    else {
        return url.to_string();
    };
    let (file, query) = match rest.split_once('?') {
        Some((file, query)) => (file, format!("?{query}")),
        None => (rest, String::new()),
    };
    if file.is_empty() || file.starts_with(':') || Path::new(file).is_absolute() {
        return url.to_string();
    }
    format!("sqlite://{}{query}", config_dir.join(file).display())
}

impl OverlayConfig {
    fn validate(&self) -> Result<(), String> {
        self.underlay_ip
            .parse::<IpAddr>()
            .map_err(|_| format!("underlay_ip {:?} is not an IP address", self.underlay_ip))?;

        let min = self.subnet_range.prefix_len();
        if !(min..=32).contains(&self.subnet_prefix_len) {
            return Err(format!(
                "subnet_prefix_len {} must be between {min} and 32 for range {}",
                self.subnet_prefix_len, self.subnet_range
            ));
        }
        if self.lease.max_migration_attempts == 0 {
            return Err("lease.max_migration_attempts must be at least 1".into());
        }
        if self.lease.acquire_attempts == 0 {
            return Err("lease.acquire_attempts must be at least 1".into());
        }
        if self.veth.mtu == 0 {
            return Err("veth.mtu must be positive".into());
        }
        Ok(())
    }

    /// Key this host's lease is stored under.
    pub fn host_identifier(&self) -> &str {
        &self.underlay_ip
    }

    pub fn lease_settings(&self) -> LeaseSettings {
        LeaseSettings {
            database_url: self.database.url.clone(),
            subnet_range: self.subnet_range,
            subnet_prefix_len: self.subnet_prefix_len,
            controller: LeaseControllerConfig {
                max_migration_attempts: self.lease.max_migration_attempts,
                migration_attempt_delay: Duration::from_millis(self.lease.migration_attempt_delay_ms),
                acquire_lease_attempts: self.lease.acquire_attempts,
            },
        }
    }
}

/// Namespace paths for one veth invocation.
pub fn veth_manager_config(host_ns: PathBuf, container_ns: PathBuf) -> VethManagerConfig {
    VethManagerConfig {
        host_ns_path: host_ns,
        container_ns_path: container_ns,
    }
}
