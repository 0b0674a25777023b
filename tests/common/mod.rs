//! Shared test infrastructure.
//!
//! Provides uniquely named in-memory databases (shared-cache memory
//! databases collide across parallel tests otherwise), plays the external
//! migration runner role, and seeds fixture rows.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicU64, Ordering};
use tribunal_storage::models::{Client, Penalty, PenaltyKind};
use tribunal_storage::{migrations, SqlStorage, Storage};

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Fresh migrated in-memory database pool.
#[allow(dead_code)]
pub async fn memdb_pool() -> SqlitePool {
    let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
    let uri = format!(
        "file:tribunal-test-{}-{}?mode=memory&cache=shared",
        std::process::id(),
        id
    );

    let options = SqliteConnectOptions::new()
        .filename(&uri)
        .shared_cache(true)
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("failed to open in-memory database");

    migrations::apply(&pool).await.expect("migrations failed");
    pool
}

/// Migrated SQL storage plus a pool handle for fault injection.
#[allow(dead_code)]
pub async fn sql_storage() -> (SqlStorage, SqlitePool) {
    let pool = memdb_pool().await;
    let storage = SqlStorage::from_pool(pool.clone())
        .await
        .expect("schema verification failed");
    (storage, pool)
}

/// Insert a client and return the persisted record.
#[allow(dead_code)]
pub async fn seed_client(storage: &SqlStorage, guid: &str, name: &str) -> Client {
    storage
        .set_client(&Client {
            id: None,
            guid: guid.to_string(),
            name: name.to_string(),
            ip: "127.0.0.1".to_string(),
            group_id: 0,
            connections: 1,
            created_at: 0,
            last_seen_at: 0,
        })
        .await
        .expect("failed to seed client")
}

/// Penalty value with sane defaults for insertion.
#[allow(dead_code)]
pub fn penalty(client_id: i64, kind: PenaltyKind) -> Penalty {
    Penalty {
        id: None,
        client_id,
        admin_id: 0,
        kind,
        keyword: String::new(),
        reason: Some("test".to_string()),
        active: true,
        issued_at: 0,
        expires_at: None,
    }
}
