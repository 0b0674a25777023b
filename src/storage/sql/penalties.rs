//! Penalty queries.
//!
//! Penalties are append-only: inserts always mint a fresh identifier, and
//! updates through the contract can only touch the `active` flag and the
//! reason text. "Currently active" always means `active` and not expired.

use super::SqlStorage;
use crate::error::StorageError;
use crate::models::{Penalty, PenaltyKind};

type PenaltyRow = (
    i64,
    i64,
    i64,
    String,
    String,
    Option<String>,
    bool,
    i64,
    Option<i64>,
);

const PENALTY_COLUMNS: &str =
    "id, client_id, admin_id, kind, keyword, reason, active, issued_at, expires_at";

fn penalty_from_row(row: PenaltyRow) -> Result<Penalty, StorageError> {
    let (id, client_id, admin_id, kind, keyword, reason, active, issued_at, expires_at) = row;
    let kind = PenaltyKind::from_str(&kind)
        .ok_or_else(|| StorageError::Internal(format!("unknown penalty kind in store: {kind}")))?;
    Ok(Penalty {
        id: Some(id),
        client_id,
        admin_id,
        kind,
        keyword,
        reason,
        active,
        issued_at,
        expires_at,
    })
}

/// Which end of the issue-time ordering to fetch.
pub(super) enum Edge {
    Earliest,
    Latest,
}

impl SqlStorage {
    pub(super) async fn persist_penalty(
        &self,
        penalty: &Penalty,
    ) -> Result<Penalty, StorageError> {
        match penalty.id {
            None => self.insert_penalty(penalty).await,
            Some(id) => {
                // Append-only: existing rows never get re-issued, only
                // their active flag and reason may change.
                let result =
                    sqlx::query("UPDATE penalties SET active = ?, reason = ? WHERE id = ?")
                        .bind(penalty.active)
                        .bind(&penalty.reason)
                        .bind(id)
                        .execute(&self.pool)
                        .await?;

                if result.rows_affected() == 0 {
                    return Err(StorageError::NotFound(format!("penalty id {id}")));
                }

                self.fetch_penalty(id).await
            }
        }
    }

    async fn insert_penalty(&self, penalty: &Penalty) -> Result<Penalty, StorageError> {
        let now = chrono::Utc::now().timestamp();
        let issued_at = if penalty.issued_at > 0 {
            penalty.issued_at
        } else {
            now
        };

        if let Some(expires_at) = penalty.expires_at {
            if expires_at < issued_at {
                return Err(StorageError::Invalid(format!(
                    "penalty expires at {expires_at}, before it is issued at {issued_at}"
                )));
            }
        }

        let result = sqlx::query(
            r#"
            INSERT INTO penalties (client_id, admin_id, kind, keyword, reason, active, issued_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(penalty.client_id)
        .bind(penalty.admin_id)
        .bind(penalty.kind.as_str())
        .bind(&penalty.keyword)
        .bind(&penalty.reason)
        .bind(penalty.active)
        .bind(issued_at)
        .bind(penalty.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.is_foreign_key_violation() {
                    return StorageError::NotFound(format!(
                        "client id {}",
                        penalty.client_id
                    ));
                }
            }
            StorageError::from(e)
        })?;

        Ok(Penalty {
            id: Some(result.last_insert_rowid()),
            issued_at,
            ..penalty.clone()
        })
    }

    pub(super) async fn fetch_penalty(&self, id: i64) -> Result<Penalty, StorageError> {
        let row = sqlx::query_as::<_, PenaltyRow>(&format!(
            "SELECT {PENALTY_COLUMNS} FROM penalties WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => penalty_from_row(row),
            None => Err(StorageError::NotFound(format!("penalty id {id}"))),
        }
    }

    pub(super) async fn fetch_penalties(
        &self,
        client_id: i64,
        kind: Option<PenaltyKind>,
    ) -> Result<Vec<Penalty>, StorageError> {
        let now = chrono::Utc::now().timestamp();
        let mut sql = format!(
            "SELECT {PENALTY_COLUMNS} FROM penalties \
             WHERE client_id = ? AND active = 1 AND (expires_at IS NULL OR expires_at > ?)"
        );
        if kind.is_some() {
            sql.push_str(" AND kind = ?");
        }
        sql.push_str(" ORDER BY issued_at DESC");

        let mut query = sqlx::query_as::<_, PenaltyRow>(&sql).bind(client_id).bind(now);
        if let Some(kind) = kind {
            query = query.bind(kind.as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(penalty_from_row).collect()
    }

    pub(super) async fn fetch_edge_penalty(
        &self,
        client_id: i64,
        kind: Option<PenaltyKind>,
        edge: Edge,
    ) -> Result<Penalty, StorageError> {
        let now = chrono::Utc::now().timestamp();
        let order = match edge {
            Edge::Earliest => "ASC",
            Edge::Latest => "DESC",
        };

        let mut sql = format!(
            "SELECT {PENALTY_COLUMNS} FROM penalties \
             WHERE client_id = ? AND active = 1 AND (expires_at IS NULL OR expires_at > ?)"
        );
        if kind.is_some() {
            sql.push_str(" AND kind = ?");
        }
        sql.push_str(&format!(" ORDER BY issued_at {order} LIMIT 1"));

        let mut query = sqlx::query_as::<_, PenaltyRow>(&sql).bind(client_id).bind(now);
        if let Some(kind) = kind {
            query = query.bind(kind.as_str());
        }

        match query.fetch_optional(&self.pool).await? {
            Some(row) => penalty_from_row(row),
            None => Err(StorageError::NotFound(format!(
                "active penalty for client id {client_id}"
            ))),
        }
    }

    pub(super) async fn deactivate_penalties(
        &self,
        client_id: i64,
        kind: Option<PenaltyKind>,
    ) -> Result<u64, StorageError> {
        let now = chrono::Utc::now().timestamp();

        // One UPDATE, one implicit transaction: the whole history flips or
        // none of it does. Re-invoking matches nothing and affects 0 rows.
        let mut sql = String::from(
            "UPDATE penalties SET active = 0 \
             WHERE client_id = ? AND active = 1 AND (expires_at IS NULL OR expires_at > ?)",
        );
        if kind.is_some() {
            sql.push_str(" AND kind = ?");
        }

        let mut query = sqlx::query(&sql).bind(client_id).bind(now);
        if let Some(kind) = kind {
            query = query.bind(kind.as_str());
        }

        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    pub(super) async fn count_active_penalties(
        &self,
        client_id: i64,
        kind: Option<PenaltyKind>,
    ) -> Result<u64, StorageError> {
        let now = chrono::Utc::now().timestamp();
        let mut sql = String::from(
            "SELECT COUNT(*) FROM penalties \
             WHERE client_id = ? AND active = 1 AND (expires_at IS NULL OR expires_at > ?)",
        );
        if kind.is_some() {
            sql.push_str(" AND kind = ?");
        }

        let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(client_id).bind(now);
        if let Some(kind) = kind {
            query = query.bind(kind.as_str());
        }

        let count = query.fetch_one(&self.pool).await?;
        Ok(count as u64)
    }
}
