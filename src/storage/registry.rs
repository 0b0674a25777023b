//! Backend registry and factory.
//!
//! Maps a protocol name to a backend constructor. The registry is built
//! once at process start and never mutated afterwards; pass it by
//! reference wherever resolution is needed. The factory creates exactly
//! one backend instance per `resolve` call and performs no caching or
//! pooling; releasing the instance (via [`Storage::close`]) is the
//! caller's responsibility.

use super::nop::NopStorage;
use super::sql::SqlStorage;
use super::Storage;
use crate::dsn::ConnectionDescriptor;
use crate::error::StorageError;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use tracing::info;

/// Constructor for one backend variant. The backend performs its own
/// connectivity/schema check before returning.
pub type BackendConstructor =
    for<'a> fn(
        &'a ConnectionDescriptor,
    ) -> BoxFuture<'a, Result<Box<dyn Storage>, StorageError>>;

/// Immutable protocol-to-constructor map.
pub struct BackendRegistry {
    backends: HashMap<String, BackendConstructor>,
}

impl BackendRegistry {
    /// Registry with every built-in backend registered.
    pub fn builtin() -> Self {
        Self {
            backends: HashMap::new(),
        }
        .with_backend("sqlite", connect_sqlite)
    }

    /// Build-time extension point for additional backend variants.
    ///
    /// Consumes and returns `self` so a finished registry is never
    /// mutated.
    pub fn with_backend(mut self, protocol: &str, constructor: BackendConstructor) -> Self {
        self.backends
            .insert(protocol.to_ascii_lowercase(), constructor);
        self
    }

    /// Protocols this registry can resolve.
    pub fn protocols(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }

    /// Instantiate the backend the descriptor names.
    ///
    /// An empty protocol yields the no-op backend; an unregistered one
    /// fails with [`StorageError::UnsupportedBackend`].
    pub async fn resolve(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Box<dyn Storage>, StorageError> {
        if descriptor.protocol.is_empty() {
            info!("no storage protocol configured, using no-op backend");
            return Ok(Box::new(NopStorage::new()));
        }

        let protocol = descriptor.protocol.to_ascii_lowercase();
        let constructor = self
            .backends
            .get(&protocol)
            .ok_or_else(|| StorageError::UnsupportedBackend(protocol.clone()))?;

        let backend = constructor(descriptor).await?;
        info!(protocol = %protocol, "storage backend resolved");
        Ok(backend)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn connect_sqlite(
    descriptor: &ConnectionDescriptor,
) -> BoxFuture<'_, Result<Box<dyn Storage>, StorageError>> {
    Box::pin(async move {
        let storage = SqlStorage::connect(descriptor).await?;
        Ok(Box::new(storage) as Box<dyn Storage>)
    })
}
