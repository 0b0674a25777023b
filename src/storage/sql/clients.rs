//! Client, alias and IP history queries.

use super::SqlStorage;
use crate::error::StorageError;
use crate::models::{Alias, AliasKey, Client, ClientMatch, ClientQuery, IpAddress, IpAddressKey};
use crate::storage::ClientStream;
use futures_util::stream;
use sqlx::SqlitePool;
use std::collections::VecDeque;

/// Rows fetched per round trip while streaming matches.
const MATCH_BATCH: u64 = 64;

type ClientRow = (i64, String, String, String, i64, i64, i64, i64);

fn client_from_row(row: ClientRow) -> Client {
    let (id, guid, name, ip, group_id, connections, created_at, last_seen_at) = row;
    Client {
        id: Some(id),
        guid,
        name,
        ip,
        group_id,
        connections,
        created_at,
        last_seen_at,
    }
}

const CLIENT_COLUMNS: &str =
    "id, guid, name, ip, group_id, connections, created_at, last_seen_at";

impl SqlStorage {
    pub(super) async fn fetch_client(&self, query: &ClientQuery) -> Result<Client, StorageError> {
        let row = match query {
            ClientQuery::Id(id) => {
                sqlx::query_as::<_, ClientRow>(&format!(
                    "SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?"
                ))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
            }
            ClientQuery::Guid(guid) => {
                sqlx::query_as::<_, ClientRow>(&format!(
                    "SELECT {CLIENT_COLUMNS} FROM clients WHERE guid = ?"
                ))
                .bind(guid)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        row.map(client_from_row)
            .ok_or_else(|| StorageError::NotFound(format!("client {query:?}")))
    }

    pub(super) async fn persist_client(&self, client: &Client) -> Result<Client, StorageError> {
        let now = chrono::Utc::now().timestamp();
        let created_at = if client.created_at > 0 {
            client.created_at
        } else {
            now
        };
        let last_seen_at = if client.last_seen_at > 0 {
            client.last_seen_at
        } else {
            now
        };

        match client.id {
            None => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO clients (guid, name, ip, group_id, connections, created_at, last_seen_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&client.guid)
                .bind(&client.name)
                .bind(&client.ip)
                .bind(client.group_id)
                .bind(client.connections)
                .bind(created_at)
                .bind(last_seen_at)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    if let sqlx::Error::Database(ref db_err) = e {
                        if db_err.is_unique_violation() {
                            return StorageError::Invalid(format!(
                                "guid already registered: {}",
                                client.guid
                            ));
                        }
                    }
                    StorageError::from(e)
                })?;

                Ok(Client {
                    id: Some(result.last_insert_rowid()),
                    created_at,
                    last_seen_at,
                    ..client.clone()
                })
            }
            Some(id) => {
                let result = sqlx::query(
                    r#"
                    UPDATE clients
                    SET guid = ?, name = ?, ip = ?, group_id = ?, connections = ?, last_seen_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(&client.guid)
                .bind(&client.name)
                .bind(&client.ip)
                .bind(client.group_id)
                .bind(client.connections)
                .bind(last_seen_at)
                .bind(id)
                .execute(&self.pool)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(StorageError::NotFound(format!("client id {id}")));
                }

                self.fetch_client(&ClientQuery::Id(id)).await
            }
        }
    }

    // ========== Alias history ==========

    pub(super) async fn upsert_alias(&self, alias: &Alias) -> Result<Alias, StorageError> {
        let now = chrono::Utc::now().timestamp();

        // Single atomic statement: concurrent upserts of the same
        // (client, name) pair must not create duplicate rows.
        let row = sqlx::query_as::<_, (i64, i64, String, i64, i64, i64)>(
            r#"
            INSERT INTO aliases (client_id, alias, num_used, created_at, last_seen_at)
            VALUES (?, ?, 1, ?, ?)
            ON CONFLICT(client_id, alias) DO UPDATE SET
                last_seen_at = excluded.last_seen_at,
                num_used = aliases.num_used + 1
            RETURNING id, client_id, alias, num_used, created_at, last_seen_at
            "#,
        )
        .bind(alias.client_id)
        .bind(&alias.alias)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| foreign_key_to_not_found(e, alias.client_id))?;

        let (id, client_id, name, num_used, created_at, last_seen_at) = row;
        Ok(Alias {
            id: Some(id),
            client_id,
            alias: name,
            num_used,
            created_at,
            last_seen_at,
        })
    }

    pub(super) async fn fetch_alias(&self, key: &AliasKey) -> Result<Alias, StorageError> {
        let row = match key {
            AliasKey::Id(id) => sqlx::query_as::<_, (i64, i64, String, i64, i64, i64)>(
                r#"
                SELECT id, client_id, alias, num_used, created_at, last_seen_at
                FROM aliases WHERE id = ?
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?,
            AliasKey::Named { client_id, alias } => {
                sqlx::query_as::<_, (i64, i64, String, i64, i64, i64)>(
                    r#"
                    SELECT id, client_id, alias, num_used, created_at, last_seen_at
                    FROM aliases WHERE client_id = ? AND alias = ?
                    "#,
                )
                .bind(client_id)
                .bind(alias)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        row.map(
            |(id, client_id, alias, num_used, created_at, last_seen_at)| Alias {
                id: Some(id),
                client_id,
                alias,
                num_used,
                created_at,
                last_seen_at,
            },
        )
        .ok_or_else(|| StorageError::NotFound(format!("alias {key:?}")))
    }

    pub(super) async fn fetch_aliases(&self, client_id: i64) -> Result<Vec<Alias>, StorageError> {
        let rows = sqlx::query_as::<_, (i64, i64, String, i64, i64, i64)>(
            r#"
            SELECT id, client_id, alias, num_used, created_at, last_seen_at
            FROM aliases
            WHERE client_id = ?
            ORDER BY last_seen_at DESC
            "#,
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, client_id, alias, num_used, created_at, last_seen_at)| Alias {
                    id: Some(id),
                    client_id,
                    alias,
                    num_used,
                    created_at,
                    last_seen_at,
                },
            )
            .collect())
    }

    // ========== IP history ==========

    pub(super) async fn upsert_ip_address(
        &self,
        ip: &IpAddress,
    ) -> Result<IpAddress, StorageError> {
        let now = chrono::Utc::now().timestamp();

        let row = sqlx::query_as::<_, (i64, i64, String, i64, i64, i64)>(
            r#"
            INSERT INTO ipaliases (client_id, ip, num_used, created_at, last_seen_at)
            VALUES (?, ?, 1, ?, ?)
            ON CONFLICT(client_id, ip) DO UPDATE SET
                last_seen_at = excluded.last_seen_at,
                num_used = ipaliases.num_used + 1
            RETURNING id, client_id, ip, num_used, created_at, last_seen_at
            "#,
        )
        .bind(ip.client_id)
        .bind(&ip.ip)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| foreign_key_to_not_found(e, ip.client_id))?;

        let (id, client_id, address, num_used, created_at, last_seen_at) = row;
        Ok(IpAddress {
            id: Some(id),
            client_id,
            ip: address,
            num_used,
            created_at,
            last_seen_at,
        })
    }

    pub(super) async fn fetch_ip_address(
        &self,
        key: &IpAddressKey,
    ) -> Result<IpAddress, StorageError> {
        let row = match key {
            IpAddressKey::Id(id) => sqlx::query_as::<_, (i64, i64, String, i64, i64, i64)>(
                r#"
                SELECT id, client_id, ip, num_used, created_at, last_seen_at
                FROM ipaliases WHERE id = ?
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?,
            IpAddressKey::Addressed { client_id, ip } => {
                sqlx::query_as::<_, (i64, i64, String, i64, i64, i64)>(
                    r#"
                    SELECT id, client_id, ip, num_used, created_at, last_seen_at
                    FROM ipaliases WHERE client_id = ? AND ip = ?
                    "#,
                )
                .bind(client_id)
                .bind(ip)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        row.map(
            |(id, client_id, ip, num_used, created_at, last_seen_at)| IpAddress {
                id: Some(id),
                client_id,
                ip,
                num_used,
                created_at,
                last_seen_at,
            },
        )
        .ok_or_else(|| StorageError::NotFound(format!("ip address {key:?}")))
    }

    pub(super) async fn fetch_ip_addresses(
        &self,
        client_id: i64,
    ) -> Result<Vec<IpAddress>, StorageError> {
        let rows = sqlx::query_as::<_, (i64, i64, String, i64, i64, i64)>(
            r#"
            SELECT id, client_id, ip, num_used, created_at, last_seen_at
            FROM ipaliases
            WHERE client_id = ?
            ORDER BY last_seen_at DESC
            "#,
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, client_id, ip, num_used, created_at, last_seen_at)| IpAddress {
                    id: Some(id),
                    client_id,
                    ip,
                    num_used,
                    created_at,
                    last_seen_at,
                },
            )
            .collect())
    }
}

/// Map a foreign-key violation on a history write to the missing client.
fn foreign_key_to_not_found(err: sqlx::Error, client_id: i64) -> StorageError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_foreign_key_violation() {
            return StorageError::NotFound(format!("client id {client_id}"));
        }
    }
    StorageError::from(err)
}

// ========== Match streaming ==========

struct MatchState {
    pool: SqlitePool,
    criteria: ClientMatch,
    after_id: i64,
    remaining: u64,
    buffer: VecDeque<Client>,
    exhausted: bool,
}

/// Build the lazy, keyset-paginated stream behind `get_clients_matching`.
///
/// Each batch re-queries from the last seen id, so the stream holds no
/// database cursor open between items. A failed batch fetch terminates the
/// stream with an `Err` item.
pub(super) fn matching_stream(pool: SqlitePool, criteria: ClientMatch) -> ClientStream {
    let remaining = criteria.limit.unwrap_or(u64::MAX);
    let state = MatchState {
        pool,
        criteria,
        after_id: 0,
        remaining,
        buffer: VecDeque::new(),
        exhausted: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        if let Some(client) = state.buffer.pop_front() {
            return Some((Ok(client), state));
        }
        if state.exhausted || state.remaining == 0 {
            return None;
        }
        let remaining = state.remaining;
        let want = MATCH_BATCH.min(remaining);

        match fetch_match_batch(&state.pool, &state.criteria, state.after_id, want).await {
            Ok(batch) => {
                if (batch.len() as u64) < want {
                    state.exhausted = true;
                }
                state.remaining = remaining - batch.len() as u64;
                if let Some(last) = batch.last() {
                    state.after_id = last.id.unwrap_or(state.after_id);
                }
                state.buffer.extend(batch);
                state
                    .buffer
                    .pop_front()
                    .map(|client| (Ok(client), state))
            }
            Err(e) => {
                state.exhausted = true;
                Some((Err(e), state))
            }
        }
    }))
}

async fn fetch_match_batch(
    pool: &SqlitePool,
    criteria: &ClientMatch,
    after_id: i64,
    limit: u64,
) -> Result<Vec<Client>, StorageError> {
    let mut builder = sqlx::QueryBuilder::<sqlx::Sqlite>::new(format!(
        "SELECT {CLIENT_COLUMNS} FROM clients WHERE id > "
    ));
    builder.push_bind(after_id);

    if let Some(guid) = &criteria.guid {
        builder.push(" AND guid = ").push_bind(guid);
    }
    if let Some(name) = &criteria.name {
        builder.push(" AND name = ").push_bind(name);
    }
    if let Some(ip) = &criteria.ip {
        builder.push(" AND ip = ").push_bind(ip);
    }
    if let Some(group_id) = criteria.group_id {
        builder.push(" AND group_id = ").push_bind(group_id);
    }
    if let Some(since) = criteria.seen_since {
        builder.push(" AND last_seen_at >= ").push_bind(since);
    }
    if let Some(before) = criteria.seen_before {
        builder.push(" AND last_seen_at < ").push_bind(before);
    }

    builder.push(" ORDER BY id ASC LIMIT ");
    builder.push_bind(limit as i64);

    let rows: Vec<ClientRow> = builder.build_query_as().fetch_all(pool).await?;
    Ok(rows.into_iter().map(client_from_row).collect())
}
