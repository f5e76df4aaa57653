use std::time::Duration;

use ipnet::Ipv4Net;

pub const DEFAULT_MAX_MIGRATION_ATTEMPTS: u32 = 5;
pub const DEFAULT_MIGRATION_ATTEMPT_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_ACQUIRE_LEASE_ATTEMPTS: u32 = 10;

/// Retry bounds for a [`LeaseController`](crate::LeaseController).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseControllerConfig {
    /// Total migration attempts before giving up.
    pub max_migration_attempts: u32,
    /// Pause between failed migration attempts.
    pub migration_attempt_delay: Duration,
    /// Total acquisition attempts. Acquisition retries immediately: each
    /// attempt re-reads the shared lease set instead of waiting.
    pub acquire_lease_attempts: u32,
}

impl Default for LeaseControllerConfig {
    fn default() -> Self {
        Self {
            max_migration_attempts: DEFAULT_MAX_MIGRATION_ATTEMPTS,
            migration_attempt_delay: DEFAULT_MIGRATION_ATTEMPT_DELAY,
            acquire_lease_attempts: DEFAULT_ACQUIRE_LEASE_ATTEMPTS,
        }
    }
}

/// Everything [`LeaseController::connect`](crate::LeaseController::connect)
/// needs to wire the production backends.
#[derive(Debug, Clone)]
pub struct LeaseSettings {
    /// SQLite connection string (e.g. `sqlite:/var/lib/overlayd/leases.db`).
    pub database_url: String,
    /// Parent range every overlay subnet is carved from.
    pub subnet_range: Ipv4Net,
    /// Prefix length of each host's overlay subnet.
    pub subnet_prefix_len: u8,
    pub controller: LeaseControllerConfig,
}
