mod memory;
mod sqlite;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::Lease;

pub use memory::MemoryLeaseStore;
pub use sqlite::{SqliteLeaseStore, create_pool};

/// Durable record of leases, shared by every host in the overlay.
///
/// `insert` must be atomic and reject a lease whose host identifier or
/// subnet is already recorded: that rejection is the only thing that stops
/// two racing hosts from claiming the same subnet.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Apply pending schema migrations, returning how many were applied.
    async fn migrate(&self) -> Result<usize, StoreError>;
    async fn insert(&self, lease: &Lease) -> Result<(), StoreError>;
    /// Fails with [`StoreError::NotFound`] when the host holds no lease.
    async fn delete_by_host(&self, host_identifier: &str) -> Result<(), StoreError>;
    async fn find_by_host(&self, host_identifier: &str) -> Result<Option<Lease>, StoreError>;
    async fn list_all(&self) -> Result<Vec<Lease>, StoreError>;
}
