use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

use ipnet::Ipv4Net;
use tracing::{debug, info, warn};

use crate::config::{LeaseControllerConfig, LeaseSettings};
use crate::error::LeaseError;
use crate::hwaddr::{HardwareAddressGenerator, VtepAddressGenerator};
use crate::pool::{CidrPool, SubnetPool};
use crate::store::{LeaseStore, SqliteLeaseStore, create_pool};
use crate::types::{Lease, gateway_ip};

/// Acquires, renews and releases overlay subnet leases.
///
/// Not meant for concurrent use: callers serialize operations on one
/// controller. Concurrency between hosts is resolved by the store.
pub struct LeaseController {
    store: Arc<dyn LeaseStore>,
    pool: Box<dyn SubnetPool>,
    hardware_addresses: Box<dyn HardwareAddressGenerator>,
    config: LeaseControllerConfig,
}

impl LeaseController {
    pub fn new(
        config: LeaseControllerConfig,
        store: Arc<dyn LeaseStore>,
        pool: Box<dyn SubnetPool>,
        hardware_addresses: Box<dyn HardwareAddressGenerator>,
    ) -> Self {
        Self {
            store,
            pool,
            hardware_addresses,
            config,
        }
    }

    /// Wire the SQLite store, CIDR pool and VTEP generator from `settings`,
    /// then run migrations. The controller is only returned once the schema
    /// is current.
    pub async fn connect(settings: &LeaseSettings) -> Result<Self, LeaseError> {
        let pool = CidrPool::new(settings.subnet_range, settings.subnet_prefix_len)
            .map_err(|e| LeaseError::Config(e.to_string()))?;
        let db = create_pool(&settings.database_url)
            .await
            .map_err(LeaseError::Connect)?;

        info!(
            range = %pool.range(),
            prefix_len = pool.prefix_len(),
            capacity = pool.capacity(),
            "lease controller configured"
        );

        let controller = Self::new(
            settings.controller.clone(),
            Arc::new(SqliteLeaseStore::new(db)),
            Box::new(pool),
            Box::new(VtepAddressGenerator),
        );
        controller.run_migrations().await?;
        Ok(controller)
    }

    /// Apply pending schema migrations, retrying any failure up to
    /// `max_migration_attempts` times with a fixed delay in between.
    pub async fn run_migrations(&self) -> Result<usize, LeaseError> {
        let max_attempts = self.config.max_migration_attempts;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.store.migrate().await {
                Ok(applied) => {
                    info!(applied, attempt, "database migration complete");
                    return Ok(applied);
                }
                Err(e) => {
                    warn!(attempt, max_attempts, error = %e, "migration attempt failed");
                    last_error = Some(e);
                    if attempt < max_attempts {
                        tokio::time::sleep(self.config.migration_attempt_delay).await;
                    }
                }
            }
        }

        match last_error {
            Some(source) => Err(LeaseError::Migration {
                attempts: max_attempts,
                source,
            }),
            None => Err(LeaseError::Config(
                "max_migration_attempts must be at least 1".into(),
            )),
        }
    }

    /// Return the host's existing lease, or acquire a new one.
    ///
    /// A fresh acquisition re-reads the lease set on every attempt and
    /// retries immediately on any failure, including store conflicts from a
    /// racing host and pool exhaustion. The last error is returned once
    /// `acquire_lease_attempts` is used up.
    pub async fn acquire_lease(&self, host_identifier: &str) -> Result<Lease, LeaseError> {
        match self.store.find_by_host(host_identifier).await {
            Ok(Some(lease)) => {
                info!(
                    host = host_identifier,
                    subnet = %lease.overlay_subnet,
                    hwaddr = %lease.overlay_hardware_address,
                    "lease renewed"
                );
                return Ok(lease);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(host = host_identifier, error = %e, "lease lookup failed, acquiring a new lease");
            }
        }

        let max_attempts = self.config.acquire_lease_attempts;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.try_acquire_lease(host_identifier).await {
                Ok(lease) => {
                    info!(
                        host = host_identifier,
                        subnet = %lease.overlay_subnet,
                        hwaddr = %lease.overlay_hardware_address,
                        attempt,
                        "lease acquired"
                    );
                    return Ok(lease);
                }
                Err(e) => {
                    debug!(host = host_identifier, attempt, error = %e, "lease acquisition attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            LeaseError::Config("acquire_lease_attempts must be at least 1".into())
        }))
    }

    async fn try_acquire_lease(&self, host_identifier: &str) -> Result<Lease, LeaseError> {
        let leases = self
            .store
            .list_all()
            .await
            .map_err(LeaseError::ListSubnets)?;
        let taken: HashSet<Ipv4Net> = leases.iter().map(|l| l.overlay_subnet.trunc()).collect();

        let overlay_subnet = self.pool.get_available(&taken)?;
        let vtep_ip = gateway_ip(&overlay_subnet);
        let overlay_hardware_address = self
            .hardware_addresses
            .generate_for_vtep(IpAddr::V4(vtep_ip))?;

        let lease = Lease {
            host_identifier: host_identifier.to_string(),
            overlay_subnet,
            overlay_hardware_address,
        };
        self.store
            .insert(&lease)
            .await
            .map_err(LeaseError::Insert)?;
        Ok(lease)
    }

    /// Delete the host's lease. Releasing a lease that does not exist is an
    /// error; check [`LeaseError::is_not_found`] to tolerate it.
    pub async fn release_lease(&self, host_identifier: &str) -> Result<(), LeaseError> {
        self.store
            .delete_by_host(host_identifier)
            .await
            .map_err(LeaseError::Release)?;
        info!(host = host_identifier, "lease released");
        Ok(())
    }

    /// Every current lease, in no particular order.
    pub async fn routable_leases(&self) -> Result<Vec<Lease>, LeaseError> {
        self.store.list_all().await.map_err(LeaseError::ListLeases)
    }
}
