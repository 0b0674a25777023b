//! Embedded schema migrations.
//!
//! The storage backends never run these themselves: applying them is the
//! migration runner's job, performed against the connection target before
//! a SQL backend is constructed for production use. The backend only
//! verifies the resulting `schema_info` version. Tests and the `dbcheck`
//! binary's `--migrate` flag play the runner role through [`apply`].

use crate::error::StorageError;
use sqlx::migrate::Migrator;
use sqlx::SqlitePool;
use tracing::info;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// The embedded migrator, for callers that drive migration themselves.
pub fn migrator() -> &'static Migrator {
    &MIGRATOR
}

/// Apply all pending migrations to the given pool.
pub async fn apply(pool: &SqlitePool) -> Result<(), StorageError> {
    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| StorageError::Schema(format!("migration failed: {e}")))?;
    info!("schema migrations checked/applied");
    Ok(())
}
