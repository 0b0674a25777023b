//! Unified error handling for the storage layer.
//!
//! Every failing operation surfaces one of these typed errors to its caller;
//! nothing is swallowed internally. Callers must not conflate "no matching
//! row" (`NotFound`) with "backend unreachable" (`Unavailable`).

use thiserror::Error;

/// Errors produced by the storage contract and its backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No row matched the query. Expected and recoverable; the caller
    /// decides the fallback.
    #[error("not found: {0}")]
    NotFound(String),

    /// The configured backend provides no real persistence for this
    /// operation. A configuration error, not a transient failure.
    #[error("operation not implemented by this backend: {0}")]
    NotImplemented(&'static str),

    /// The connection string could not be parsed.
    #[error("malformed DSN: {0}")]
    MalformedDsn(String),

    /// The DSN names a protocol no registered backend handles.
    #[error("unsupported storage backend: {0}")]
    UnsupportedBackend(String),

    /// The backend is unreachable or timed out. Transient; the caller may
    /// retry with backoff, the storage layer never retries internally.
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    /// The persistent store is in an unexpected state (missing or stale
    /// schema). Fatal; requires operator intervention, never auto-healed.
    #[error("schema error: {0}")]
    Schema(String),

    /// Caller input violated an operation's constraints.
    #[error("invalid input: {0}")]
    Invalid(String),

    /// Unexpected database fault, distinct from connectivity loss.
    #[error("internal storage error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Get a static error code string for log/metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::NotImplemented(_) => "not_implemented",
            Self::MalformedDsn(_) => "malformed_dsn",
            Self::UnsupportedBackend(_) => "unsupported_backend",
            Self::Unavailable(_) => "unavailable",
            Self::Schema(_) => "schema_error",
            Self::Invalid(_) => "invalid_input",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Whether a retry with backoff is a reasonable caller response.
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StorageError::NotFound("no matching row".to_string()),
            sqlx::Error::PoolTimedOut => {
                StorageError::Unavailable("connection pool timed out".to_string())
            }
            sqlx::Error::PoolClosed => {
                StorageError::Unavailable("connection pool closed".to_string())
            }
            sqlx::Error::WorkerCrashed => {
                StorageError::Unavailable("database worker crashed".to_string())
            }
            sqlx::Error::Io(e) => StorageError::Unavailable(format!("i/o error: {e}")),
            sqlx::Error::Tls(e) => StorageError::Unavailable(format!("tls error: {e}")),
            other => StorageError::Internal(other.to_string()),
        }
    }
}
