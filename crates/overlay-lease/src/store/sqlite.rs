use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use ipnet::Ipv4Net;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use tracing::debug;

use super::LeaseStore;
use crate::error::StoreError;
use crate::types::{HardwareAddress, Lease};

/// How long a connection waits on a database locked by another daemon.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Applied in order; `version` must strictly increase.
const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "create_subnets",
    sql: include_str!("../../migrations/0001_create_subnets.sql"),
}];

type LeaseRow = (String, String, String);

/// Create a SQLite pool in WAL mode, creating the database file if missing.
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(BUSY_TIMEOUT)
        .create_if_missing(true);

    let pool = SqlitePool::connect_with(options).await?;

    debug!("lease database pool created");
    Ok(pool)
}

/// [`LeaseStore`] backed by the `subnets` table.
#[derive(Clone)]
pub struct SqliteLeaseStore {
    pool: SqlitePool,
}

impl SqliteLeaseStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn lease_from_row((host_identifier, subnet, hwaddr): LeaseRow) -> Result<Lease, StoreError> {
    let overlay_subnet = subnet.parse::<Ipv4Net>().map_err(|e| {
        StoreError::Corrupt(format!("subnet {subnet:?} of {host_identifier}: {e}"))
    })?;
    let overlay_hardware_address = hwaddr.parse::<HardwareAddress>().map_err(|e| {
        StoreError::Corrupt(format!("hardware address of {host_identifier}: {e}"))
    })?;
    Ok(Lease {
        host_identifier,
        overlay_subnet,
        overlay_hardware_address,
    })
}

/// Map unique-constraint violations to [`StoreError::Conflict`].
fn insert_error(err: sqlx::Error, lease: &Lease) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(format!(
            "{} / {}: {}",
            lease.host_identifier,
            lease.overlay_subnet,
            db.message()
        )),
        _ => StoreError::Sqlx(err),
    }
}

#[async_trait]
impl LeaseStore for SqliteLeaseStore {
    #[tracing::instrument(skip(self))]
    async fn migrate(&self) -> Result<usize, StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS lease_schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .execute(&self.pool)
        .await?;

        let applied: Vec<(i64,)> = sqlx::query_as("SELECT version FROM lease_schema_migrations")
            .fetch_all(&self.pool)
            .await?;
        let applied: HashSet<i64> = applied.into_iter().map(|(v,)| v).collect();

        let mut count = 0;
        for migration in MIGRATIONS.iter().filter(|m| !applied.contains(&m.version)) {
            let mut tx = self.pool.begin().await?;
            sqlx::Executor::execute(&mut *tx, sqlx::raw_sql(migration.sql)).await?;
            sqlx::query("INSERT INTO lease_schema_migrations (version, name) VALUES (?, ?)")
                .bind(migration.version)
                .bind(migration.name)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            debug!(version = migration.version, name = migration.name, "applied migration");
            count += 1;
        }
        Ok(count)
    }

    #[tracing::instrument(skip(self, lease), fields(host = %lease.host_identifier, subnet = %lease.overlay_subnet))]
    async fn insert(&self, lease: &Lease) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO subnets (underlay_ip, overlay_subnet, overlay_hwaddr) VALUES (?, ?, ?)",
        )
        .bind(&lease.host_identifier)
        .bind(lease.overlay_subnet.to_string())
        .bind(lease.overlay_hardware_address.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error(e, lease))?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_by_host(&self, host_identifier: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM subnets WHERE underlay_ip = ?")
            .bind(host_identifier)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(host_identifier.to_string()));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_host(&self, host_identifier: &str) -> Result<Option<Lease>, StoreError> {
        let row: Option<LeaseRow> = sqlx::query_as(
            "SELECT underlay_ip, overlay_subnet, overlay_hwaddr FROM subnets WHERE underlay_ip = ?",
        )
        .bind(host_identifier)
        .fetch_optional(&self.pool)
        .await?;

        row.map(lease_from_row).transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn list_all(&self) -> Result<Vec<Lease>, StoreError> {
        let rows: Vec<LeaseRow> = sqlx::query_as(
            "SELECT underlay_ip, overlay_subnet, overlay_hwaddr FROM subnets ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(lease_from_row).collect()
    }
}
