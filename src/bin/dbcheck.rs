//! dbcheck - storage diagnostics for Tribunal operators.
//!
//! Loads the platform config, resolves the configured backend and prints
//! entity counts. With `--migrate`, applies pending schema migrations
//! first (the same step the deployment pipeline runs).

use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tribunal_storage::{dsn, migrations, BackendRegistry, Config, SqlStorage, Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let mut migrate = false;
    let mut config_path = "tribunal.toml".to_string();
    for arg in std::env::args().skip(1) {
        if arg == "--migrate" {
            migrate = true;
        } else {
            config_path = arg;
        }
    }

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "failed to load config");
        e
    })?;

    let descriptor = dsn::parse(&config.storage.dsn)?;
    info!(protocol = %descriptor.protocol, "checking storage backend");

    if migrate {
        if descriptor.protocol != "sqlite" {
            anyhow::bail!(
                "--migrate only supports sqlite DSNs, got {:?}",
                descriptor.protocol
            );
        }
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(
                sqlx::sqlite::SqliteConnectOptions::new()
                    .filename(descriptor.database_path())
                    .create_if_missing(true),
            )
            .await?;
        migrations::apply(&pool).await?;
        pool.close().await;
    }

    let registry = BackendRegistry::builtin();
    let storage = registry.resolve(&descriptor).await?;

    let counts = storage.counts().await?;
    let mut entities: Vec<_> = counts.iter().collect();
    entities.sort();
    for (entity, count) in entities {
        info!(entity = %entity, rows = count, "entity count");
    }
    info!(
        min_schema_version = SqlStorage::MIN_SCHEMA_VERSION,
        "storage check passed"
    );

    storage.close().await;
    Ok(())
}
