//! Permission group queries.
//!
//! Groups are seeded by the migration runner; the contract only reads
//! them. The authorization engine compares levels, so `get_groups` hands
//! back the tiers highest first.

use super::SqlStorage;
use crate::error::StorageError;
use crate::models::{Group, GroupQuery};

type GroupRow = (i64, String, String, i64);

fn group_from_row(row: GroupRow) -> Group {
    let (id, keyword, name, level) = row;
    Group {
        id,
        keyword,
        name,
        level,
    }
}

impl SqlStorage {
    pub(super) async fn fetch_groups(&self) -> Result<Vec<Group>, StorageError> {
        let rows = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT id, keyword, name, level
            FROM groups
            ORDER BY level DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(group_from_row).collect())
    }

    pub(super) async fn fetch_group(&self, query: &GroupQuery) -> Result<Group, StorageError> {
        let row = match query {
            GroupQuery::Id(id) => {
                sqlx::query_as::<_, GroupRow>(
                    "SELECT id, keyword, name, level FROM groups WHERE id = ?",
                )
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
            }
            GroupQuery::Keyword(keyword) => {
                sqlx::query_as::<_, GroupRow>(
                    "SELECT id, keyword, name, level FROM groups WHERE keyword = ?",
                )
                .bind(keyword)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        row.map(group_from_row)
            .ok_or_else(|| StorageError::NotFound(format!("group {query:?}")))
    }
}
