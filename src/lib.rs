//! tribunal-storage - persistence layer for the Tribunal game-server
//! moderation platform.
//!
//! Records players ("clients"), their alias and IP history, disciplinary
//! penalties and permission groups, behind a backend-agnostic storage
//! contract:
//!
//! ```no_run
//! use tribunal_storage::{dsn, BackendRegistry, Storage};
//!
//! # async fn run() -> Result<(), tribunal_storage::StorageError> {
//! let registry = BackendRegistry::builtin();
//! let descriptor = dsn::parse("sqlite://clients.db")?;
//! let storage = registry.resolve(&descriptor).await?;
//!
//! let groups = storage.get_groups().await?;
//! storage.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! Callers interact only through the [`Storage`] trait; backend-specific
//! types never cross the contract boundary.

pub mod config;
pub mod dsn;
pub mod error;
pub mod migrations;
pub mod models;
pub mod storage;

pub use config::Config;
pub use dsn::ConnectionDescriptor;
pub use error::StorageError;
pub use storage::{BackendRegistry, ClientStream, NopStorage, SqlStorage, Storage};
