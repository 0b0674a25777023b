//! Storage contract and backend dispatch.
//!
//! The [`Storage`] trait is the abstract capability set every backend
//! implements. Callers obtain a backend through the
//! [`BackendRegistry`](registry::BackendRegistry) and interact only through
//! this trait, never through backend-specific types.

mod nop;
pub mod registry;
pub mod sql;

pub use nop::NopStorage;
pub use registry::BackendRegistry;
pub use sql::SqlStorage;

use crate::error::StorageError;
use crate::models::{
    Alias, AliasKey, Client, ClientMatch, ClientQuery, Group, GroupQuery, IpAddress, IpAddressKey,
    Penalty, PenaltyKind,
};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::collections::HashMap;

/// Lazy, finite sequence of matched clients.
///
/// Each call to [`Storage::get_clients_matching`] produces a fresh,
/// restartable sequence. A connectivity failure mid-iteration terminates
/// the stream with an `Err` item; it never silently truncates.
pub type ClientStream = BoxStream<'static, Result<Client, StorageError>>;

/// The storage contract.
///
/// Implementations must be safe for concurrent use by multiple callers
/// against the same instance, and must bound every database call with a
/// timeout, surfacing [`StorageError::Unavailable`] rather than hanging.
#[async_trait]
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Protocol scheme this backend was resolved from (`""` for the no-op
    /// backend).
    fn protocol(&self) -> &'static str;

    /// Row counts per entity kind, for diagnostics.
    async fn counts(&self) -> Result<HashMap<String, u64>, StorageError>;

    /// Fetch a single client by identifier or GUID.
    async fn get_client(&self, query: &ClientQuery) -> Result<Client, StorageError>;

    /// Produce a lazy sequence of clients matching the criteria, ordered by
    /// identifier ascending.
    async fn get_clients_matching(
        &self,
        criteria: &ClientMatch,
    ) -> Result<ClientStream, StorageError>;

    /// Insert (identifier unset) or update (identifier set) a client and
    /// return the persisted record.
    async fn set_client(&self, client: &Client) -> Result<Client, StorageError>;

    /// Upsert an alias history row: insert if the (client, name) pair is
    /// unseen, otherwise bump `last_seen_at` and `num_used`.
    async fn set_client_alias(&self, alias: &Alias) -> Result<Alias, StorageError>;

    /// Fetch a single alias row.
    async fn get_client_alias(&self, key: &AliasKey) -> Result<Alias, StorageError>;

    /// All alias rows for a client, most recently seen first.
    async fn get_client_aliases(&self, client_id: i64) -> Result<Vec<Alias>, StorageError>;

    /// Upsert an IP history row; same semantics as [`set_client_alias`].
    ///
    /// [`set_client_alias`]: Storage::set_client_alias
    async fn set_client_ip_address(&self, ip: &IpAddress) -> Result<IpAddress, StorageError>;

    /// Fetch a single IP history row.
    async fn get_client_ip_address(&self, key: &IpAddressKey)
        -> Result<IpAddress, StorageError>;

    /// All IP history rows for a client, most recently seen first.
    async fn get_client_ip_addresses(
        &self,
        client_id: i64,
    ) -> Result<Vec<IpAddress>, StorageError>;

    /// Record a penalty. An unset identifier appends a new row; a set
    /// identifier updates only the `active` and `reason` fields.
    async fn set_client_penalty(&self, penalty: &Penalty) -> Result<Penalty, StorageError>;

    /// Fetch a single penalty by identifier, regardless of state.
    async fn get_client_penalty(&self, id: i64) -> Result<Penalty, StorageError>;

    /// Currently-active penalties for a client, most recently issued first,
    /// optionally restricted to one kind.
    async fn get_client_penalties(
        &self,
        client_id: i64,
        kind: Option<PenaltyKind>,
    ) -> Result<Vec<Penalty>, StorageError>;

    /// The most recently issued currently-active matching penalty.
    async fn get_client_last_penalty(
        &self,
        client_id: i64,
        kind: Option<PenaltyKind>,
    ) -> Result<Penalty, StorageError>;

    /// The earliest issued currently-active matching penalty.
    async fn get_client_first_penalty(
        &self,
        client_id: i64,
        kind: Option<PenaltyKind>,
    ) -> Result<Penalty, StorageError>;

    /// Deactivate every currently-active matching penalty in one atomic
    /// step and return the affected count. Idempotent.
    async fn disable_client_penalties(
        &self,
        client_id: i64,
        kind: Option<PenaltyKind>,
    ) -> Result<u64, StorageError>;

    /// Count of currently-active matching penalties.
    async fn num_penalties(
        &self,
        client_id: i64,
        kind: Option<PenaltyKind>,
    ) -> Result<u64, StorageError>;

    /// All permission groups, highest level first.
    async fn get_groups(&self) -> Result<Vec<Group>, StorageError>;

    /// Fetch a single group by identifier or keyword.
    async fn get_group(&self, query: &GroupQuery) -> Result<Group, StorageError>;

    /// Release backend resources. Lifetime management belongs to the
    /// caller; the factory never pools instances.
    async fn close(&self);
}
