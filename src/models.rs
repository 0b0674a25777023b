//! Record model for the moderation storage layer.
//!
//! All timestamps are unix seconds (`chrono::Utc::now().timestamp()`).
//! Identifiers are `None` until a record is first persisted; the backend
//! assigns them on insert and they are immutable afterwards.

/// A player identity.
///
/// The GUID resolves to at most one client per game title; the backend
/// enforces its uniqueness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub id: Option<i64>,
    /// In-game unique id, e.g. a hardware or account hash.
    pub guid: String,
    /// Current display name.
    pub name: String,
    /// Most recent network address.
    pub ip: String,
    /// Permission group reference (see [`Group`]).
    pub group_id: i64,
    /// Total connections observed.
    pub connections: i64,
    pub created_at: i64,
    pub last_seen_at: i64,
}

/// A historical display name used by a client.
///
/// (client, name) pairs are unique; repeated use bumps `last_seen_at` and
/// `num_used` instead of duplicating the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub id: Option<i64>,
    pub client_id: i64,
    pub alias: String,
    pub num_used: i64,
    pub created_at: i64,
    pub last_seen_at: i64,
}

/// A historical network address used by a client.
///
/// Same shape and upsert semantics as [`Alias`], keyed by (client, ip).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpAddress {
    pub id: Option<i64>,
    pub client_id: i64,
    pub ip: String,
    pub num_used: i64,
    pub created_at: i64,
    pub last_seen_at: i64,
}

/// Kind of disciplinary action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PenaltyKind {
    Warning,
    Kick,
    TempBan,
    Ban,
    Notice,
}

impl PenaltyKind {
    /// Storage representation, also used in DSN-facing diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Kick => "kick",
            Self::TempBan => "tempban",
            Self::Ban => "ban",
            Self::Notice => "notice",
        }
    }

    /// Parse the storage representation.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "warning" => Some(Self::Warning),
            "kick" => Some(Self::Kick),
            "tempban" => Some(Self::TempBan),
            "ban" => Some(Self::Ban),
            "notice" => Some(Self::Notice),
            _ => None,
        }
    }
}

impl std::fmt::Display for PenaltyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A disciplinary action recorded against a client.
///
/// Penalties are append-only: an update to an existing identifier can only
/// touch `active` and `reason`, never re-issue. Disabling is irreversible
/// through the public contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Penalty {
    pub id: Option<i64>,
    pub client_id: i64,
    /// Issuing admin's client id; 0 means console/system.
    pub admin_id: i64,
    pub kind: PenaltyKind,
    /// Free-form type code for programmatic matching by plugins.
    pub keyword: String,
    pub reason: Option<String>,
    pub active: bool,
    pub issued_at: i64,
    /// `None` means the penalty never expires.
    pub expires_at: Option<i64>,
}

impl Penalty {
    /// Whether this penalty is currently in force.
    ///
    /// An expired row with a stale `active` flag does not count.
    pub fn is_in_force(&self, now: i64) -> bool {
        self.active && self.expires_at.is_none_or(|t| t > now)
    }
}

/// A permission tier. Level establishes a total order used for
/// authorization comparisons by the permission engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: i64,
    /// Machine name, unique.
    pub keyword: String,
    /// Human label.
    pub name: String,
    pub level: i64,
}

/// Lookup key for a single client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientQuery {
    Id(i64),
    Guid(String),
}

/// Lookup key for a single alias row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasKey {
    Id(i64),
    /// The unique (client, name) pair.
    Named { client_id: i64, alias: String },
}

/// Lookup key for a single IP history row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpAddressKey {
    Id(i64),
    /// The unique (client, address) pair.
    Addressed { client_id: i64, ip: String },
}

/// Lookup key for a single group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupQuery {
    Id(i64),
    Keyword(String),
}

/// Field predicates for [`Storage::get_clients_matching`].
///
/// All set fields must match (conjunction). Results are ordered by client
/// id ascending.
///
/// [`Storage::get_clients_matching`]: crate::storage::Storage::get_clients_matching
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientMatch {
    pub guid: Option<String>,
    pub name: Option<String>,
    pub ip: Option<String>,
    pub group_id: Option<i64>,
    /// Inclusive lower bound on `last_seen_at`.
    pub seen_since: Option<i64>,
    /// Exclusive upper bound on `last_seen_at`.
    pub seen_before: Option<i64>,
    /// Cap on the number of rows produced.
    pub limit: Option<u64>,
}

impl ClientMatch {
    /// Criteria that match every client.
    pub fn any() -> Self {
        Self::default()
    }
}
