//! SQL-backed storage implementation over SQLite.
//!
//! Owns the connection pool lifecycle, query construction and result
//! mapping. Construction verifies the schema version recorded by the
//! migration runner; it never applies migrations or repairs the schema
//! itself (see [`crate::migrations`] for the runner side).

mod clients;
mod groups;
mod penalties;

use super::{ClientStream, Storage};
use crate::dsn::ConnectionDescriptor;
use crate::error::StorageError;
use crate::models::{
    Alias, AliasKey, Client, ClientMatch, ClientQuery, Group, GroupQuery, IpAddress, IpAddressKey,
    Penalty, PenaltyKind,
};
use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// SQLite-backed implementation of the storage contract.
#[derive(Debug, Clone)]
pub struct SqlStorage {
    pool: SqlitePool,
}

impl SqlStorage {
    /// Connection acquire timeout - bounds every operation so a caller is
    /// never hung on an unreachable store.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum time a connection can remain idle before being closed.
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    const MAX_CONNECTIONS: u32 = 5;

    /// Oldest schema version this build can operate against.
    pub const MIN_SCHEMA_VERSION: i64 = 1;

    /// Open a pool for the database the descriptor names and verify its
    /// schema.
    ///
    /// The migration runner must already have been applied to the target;
    /// an absent or stale schema fails with [`StorageError::Schema`], an
    /// unreachable database with [`StorageError::Unavailable`].
    pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Self, StorageError> {
        let path = descriptor.database_path();
        if path.is_empty() {
            return Err(StorageError::MalformedDsn(
                "sqlite DSN names no database file".to_string(),
            ));
        }

        let pool = if path == ":memory:" {
            // Use a uniquely named shared-cache memory database per call.
            // `file::memory:` is global-ish and will collide across
            // parallel tests.
            let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
            let memdb_uri = format!(
                "file:tribunal-memdb-{}-{}?mode=memory&cache=shared",
                std::process::id(),
                id
            );

            let options = SqliteConnectOptions::new()
                .filename(&memdb_uri)
                .shared_cache(true)
                .create_if_missing(true)
                .foreign_keys(true);

            SqlitePoolOptions::new()
                .max_connections(1)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await
        } else {
            // Existing file only: a missing database means the external
            // migration step has not produced a store to talk to.
            // WAL mode allows reads to happen while writes are in
            // progress; foreign keys back the ownership constraints.
            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(false)
                .foreign_keys(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);

            SqlitePoolOptions::new()
                .max_connections(Self::MAX_CONNECTIONS)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await
        }
        .map_err(|e| StorageError::Unavailable(format!("cannot open database {path:?}: {e}")))?;

        let storage = Self::from_pool(pool).await?;
        info!(path = %path, "sqlite storage connected");
        Ok(storage)
    }

    /// Wrap an existing pool after verifying its schema version.
    ///
    /// For callers that manage their own pool, e.g. tests that apply the
    /// migrator to an in-memory database first.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        verify_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// Reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Check that the store carries a schema at least as new as this build
/// expects. Never attempts repair.
async fn verify_schema(pool: &SqlitePool) -> Result<(), StorageError> {
    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_info")
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) => StorageError::Schema(format!(
                "schema_info missing or unreadable (was the migration runner applied?): {db_err}"
            )),
            other => StorageError::from(other),
        })?;

    match version {
        Some(v) if v >= SqlStorage::MIN_SCHEMA_VERSION => Ok(()),
        Some(v) => Err(StorageError::Schema(format!(
            "schema version {v} is older than required {}",
            SqlStorage::MIN_SCHEMA_VERSION
        ))),
        None => Err(StorageError::Schema(
            "schema_info table is empty".to_string(),
        )),
    }
}

#[async_trait]
impl Storage for SqlStorage {
    fn protocol(&self) -> &'static str {
        "sqlite"
    }

    async fn counts(&self) -> Result<HashMap<String, u64>, StorageError> {
        let mut counts = HashMap::new();
        for table in ["clients", "aliases", "ipaliases", "penalties", "groups"] {
            let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(&self.pool)
                .await?;
            counts.insert(table.to_string(), n as u64);
        }
        Ok(counts)
    }

    async fn get_client(&self, query: &ClientQuery) -> Result<Client, StorageError> {
        self.fetch_client(query).await
    }

    async fn get_clients_matching(
        &self,
        criteria: &ClientMatch,
    ) -> Result<ClientStream, StorageError> {
        Ok(clients::matching_stream(self.pool.clone(), criteria.clone()))
    }

    async fn set_client(&self, client: &Client) -> Result<Client, StorageError> {
        self.persist_client(client).await
    }

    async fn set_client_alias(&self, alias: &Alias) -> Result<Alias, StorageError> {
        self.upsert_alias(alias).await
    }

    async fn get_client_alias(&self, key: &AliasKey) -> Result<Alias, StorageError> {
        self.fetch_alias(key).await
    }

    async fn get_client_aliases(&self, client_id: i64) -> Result<Vec<Alias>, StorageError> {
        self.fetch_aliases(client_id).await
    }

    async fn set_client_ip_address(&self, ip: &IpAddress) -> Result<IpAddress, StorageError> {
        self.upsert_ip_address(ip).await
    }

    async fn get_client_ip_address(
        &self,
        key: &IpAddressKey,
    ) -> Result<IpAddress, StorageError> {
        self.fetch_ip_address(key).await
    }

    async fn get_client_ip_addresses(
        &self,
        client_id: i64,
    ) -> Result<Vec<IpAddress>, StorageError> {
        self.fetch_ip_addresses(client_id).await
    }

    async fn set_client_penalty(&self, penalty: &Penalty) -> Result<Penalty, StorageError> {
        self.persist_penalty(penalty).await
    }

    async fn get_client_penalty(&self, id: i64) -> Result<Penalty, StorageError> {
        self.fetch_penalty(id).await
    }

    async fn get_client_penalties(
        &self,
        client_id: i64,
        kind: Option<PenaltyKind>,
    ) -> Result<Vec<Penalty>, StorageError> {
        self.fetch_penalties(client_id, kind).await
    }

    async fn get_client_last_penalty(
        &self,
        client_id: i64,
        kind: Option<PenaltyKind>,
    ) -> Result<Penalty, StorageError> {
        self.fetch_edge_penalty(client_id, kind, penalties::Edge::Latest)
            .await
    }

    async fn get_client_first_penalty(
        &self,
        client_id: i64,
        kind: Option<PenaltyKind>,
    ) -> Result<Penalty, StorageError> {
        self.fetch_edge_penalty(client_id, kind, penalties::Edge::Earliest)
            .await
    }

    async fn disable_client_penalties(
        &self,
        client_id: i64,
        kind: Option<PenaltyKind>,
    ) -> Result<u64, StorageError> {
        self.deactivate_penalties(client_id, kind).await
    }

    async fn num_penalties(
        &self,
        client_id: i64,
        kind: Option<PenaltyKind>,
    ) -> Result<u64, StorageError> {
        self.count_active_penalties(client_id, kind).await
    }

    async fn get_groups(&self) -> Result<Vec<Group>, StorageError> {
        self.fetch_groups().await
    }

    async fn get_group(&self, query: &GroupQuery) -> Result<Group, StorageError> {
        self.fetch_group(query).await
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
