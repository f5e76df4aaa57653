use async_trait::async_trait;
use tokio::sync::Mutex;

use super::LeaseStore;
use crate::error::StoreError;
use crate::types::Lease;

/// Schema versions the in-memory store pretends to apply on first migrate.
const MEMORY_SCHEMA_VERSIONS: usize = 1;

/// In-process [`LeaseStore`] with the same uniqueness rules as the SQLite
/// store. Share one instance through an `Arc` to simulate several hosts
/// against a single database.
#[derive(Debug, Default)]
pub struct MemoryLeaseStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    migrated: bool,
    leases: Vec<Lease>,
}

impl MemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `leases` already recorded.
    pub fn with_leases(leases: Vec<Lease>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                migrated: false,
                leases,
            }),
        }
    }
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    async fn migrate(&self) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        if state.migrated {
            return Ok(0);
        }
        state.migrated = true;
        Ok(MEMORY_SCHEMA_VERSIONS)
    }

    async fn insert(&self, lease: &Lease) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.leases.iter().find(|l| {
            l.host_identifier == lease.host_identifier || l.overlay_subnet == lease.overlay_subnet
        }) {
            return Err(StoreError::Conflict(format!(
                "{} / {} collides with lease {} / {}",
                lease.host_identifier,
                lease.overlay_subnet,
                existing.host_identifier,
                existing.overlay_subnet
            )));
        }
        state.leases.push(lease.clone());
        Ok(())
    }

    async fn delete_by_host(&self, host_identifier: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let before = state.leases.len();
        state.leases.retain(|l| l.host_identifier != host_identifier);
        if state.leases.len() == before {
            return Err(StoreError::NotFound(host_identifier.to_string()));
        }
        Ok(())
    }

    async fn find_by_host(&self, host_identifier: &str) -> Result<Option<Lease>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .leases
            .iter()
            .find(|l| l.host_identifier == host_identifier)
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<Lease>, StoreError> {
        Ok(self.state.lock().await.leases.clone())
    }
}
