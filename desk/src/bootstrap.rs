//! Infrastructure setup.
//!
//! Turns a [`Config`] into a ready [`QueueDesk`]:
//!
//! 1. Validate the branch directory
//! 2. Connect to `PostgreSQL` and run migrations (or use in-memory stores)
//! 3. Wire the allocator and state machine over the stores
//!
//! # Example
//!
//! ```rust,no_run
//! use queue_desk::{Config, bootstrap};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let desk = bootstrap::postgres_desk(&config).await?;
//! let queue_no = desk.allocate_queue_number("MAIN").await?;
//! # Ok(())
//! # }
//! ```

use crate::app::QueueDesk;
use crate::config::{Config, ConfigError, PostgresConfig};
use queue_desk_core::StoreError;
use queue_desk_core::environment::SystemClock;
use queue_desk_postgres::PostgresQueueStore;
use queue_desk_testing::{InMemorySequenceStore, InMemoryTicketStore};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Errors raised while bringing the desk up.
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// Configuration failed validation
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Database connection failed
    #[error("Database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    /// Store setup (migrations) failed
    #[error("Store setup failed: {0}")]
    Store(#[from] StoreError),
}

/// Connect a pool sized by `config`.
///
/// # Errors
///
/// Returns [`BootstrapError::Database`] if no connection can be established.
pub async fn connect_pool(config: &PostgresConfig) -> Result<PgPool, BootstrapError> {
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Connecting to queue database..."
    );
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout))
        .connect(&config.url)
        .await?;
    Ok(pool)
}

/// Desk backed by `PostgreSQL`, with migrations applied.
///
/// # Errors
///
/// Returns [`BootstrapError`] if the configuration is invalid, the database is
/// unreachable or a migration fails.
pub async fn postgres_desk(config: &Config) -> Result<QueueDesk, BootstrapError> {
    let directory = config.branch_directory()?;
    let pool = connect_pool(&config.postgres).await?;

    let store = PostgresQueueStore::from_pool(pool);
    info!("Running queue desk migrations...");
    store.migrate().await?;

    let store = Arc::new(store);
    info!(branches = directory.branches().len(), "Queue desk ready (postgres)");
    Ok(QueueDesk::new(
        Arc::new(directory),
        store.clone(),
        store,
        Arc::new(SystemClock),
    ))
}

/// Desk backed by in-memory stores. State is lost when the process exits.
///
/// # Errors
///
/// Returns [`BootstrapError::Config`] if the branch directory is invalid.
pub fn in_memory_desk(config: &Config) -> Result<QueueDesk, BootstrapError> {
    let directory = config.branch_directory()?;
    info!(branches = directory.branches().len(), "Queue desk ready (in-memory)");
    Ok(QueueDesk::new(
        Arc::new(directory),
        Arc::new(InMemoryTicketStore::new()),
        Arc::new(InMemorySequenceStore::new()),
        Arc::new(SystemClock),
    ))
}
