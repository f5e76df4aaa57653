use std::net::IpAddr;

use ipnet::Ipv4Net;

/// Error from a [`LeaseStore`](crate::LeaseStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("no lease for host {0}")]
    NotFound(String),

    #[error("conflicting lease: {0}")]
    Conflict(String),

    #[error("malformed lease row: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("subnet pool {range} exhausted: every /{prefix_len} subnet is leased")]
    Exhausted { range: Ipv4Net, prefix_len: u8 },

    #[error("invalid subnet prefix length /{prefix_len} for range {range}")]
    InvalidPrefix { range: Ipv4Net, prefix_len: u8 },
}

#[derive(Debug, thiserror::Error)]
pub enum HardwareAddressError {
    #[error("cannot derive a hardware address from {0}: only IPv4 is supported")]
    UnsupportedFamily(IpAddr),

    #[error("invalid hardware address: {0:?}")]
    Parse(String),
}

/// Error from a [`LeaseController`](crate::LeaseController) operation.
///
/// Each variant names the step that failed so the message can be logged
/// without further context.
#[derive(Debug, thiserror::Error)]
pub enum LeaseError {
    #[error("connecting to database: {0}")]
    Connect(#[source] StoreError),

    #[error("migrating database after {attempts} attempts: {source}")]
    Migration {
        attempts: u32,
        #[source]
        source: StoreError,
    },

    #[error("getting all subnets: {0}")]
    ListSubnets(#[source] StoreError),

    #[error("get available subnet: {0}")]
    Pool(#[from] PoolError),

    #[error("generate hardware address: {0}")]
    HardwareAddress(#[from] HardwareAddressError),

    #[error("adding lease entry: {0}")]
    Insert(#[source] StoreError),

    #[error("releasing lease: {0}")]
    Release(#[source] StoreError),

    #[error("getting all leases: {0}")]
    ListLeases(#[source] StoreError),

    #[error("invalid lease configuration: {0}")]
    Config(String),
}

impl LeaseError {
    /// The store had no lease for the requested host.
    pub fn is_not_found(&self) -> bool {
        matches!(self.store_error(), Some(StoreError::NotFound(_)))
    }

    /// Every subnet in the configured range was already leased.
    pub fn is_pool_exhausted(&self) -> bool {
        matches!(self, LeaseError::Pool(PoolError::Exhausted { .. }))
    }

    fn store_error(&self) -> Option<&StoreError> {
        match self {
            LeaseError::Connect(e)
            | LeaseError::Migration { source: e, .. }
            | LeaseError::ListSubnets(e)
            | LeaseError::Insert(e)
            | LeaseError::Release(e)
            | LeaseError::ListLeases(e) => Some(e),
            LeaseError::Pool(_) | LeaseError::HardwareAddress(_) | LeaseError::Config(_) => None,
        }
    }
}
