//! Overlay subnet leases.
//!
//! Every host in the overlay owns one subnet, recorded as a [`Lease`] in a
//! shared [`LeaseStore`]. Hosts never coordinate directly: the
//! [`LeaseController`] reads the current lease set, asks the [`SubnetPool`]
//! for a free subnet and inserts the candidate. The store's unique
//! constraints reject whichever host loses a race, and the loser retries
//! against the updated lease set.

mod config;
mod controller;
mod error;
mod hwaddr;
mod pool;
mod store;
mod types;

pub use config::{
    DEFAULT_ACQUIRE_LEASE_ATTEMPTS, DEFAULT_MAX_MIGRATION_ATTEMPTS,
    DEFAULT_MIGRATION_ATTEMPT_DELAY, LeaseControllerConfig, LeaseSettings,
};
pub use controller::LeaseController;
pub use error::{HardwareAddressError, LeaseError, PoolError, StoreError};
pub use hwaddr::{HardwareAddressGenerator, VtepAddressGenerator};
pub use pool::{CidrPool, SubnetPool};
pub use store::{LeaseStore, MemoryLeaseStore, SqliteLeaseStore, create_pool};
pub use types::{HardwareAddress, Lease, gateway_ip};
