use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

use super::repo_types::User;
use crate::{
    config::{AppConfig, StoreBackend},
    error::StoreError,
};

mod document;
mod memory;
mod postgres;

pub use document::DocumentStore;
pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Persistence for user credentials. Every backend honors the same contract:
/// exact-match email lookup, and `create` failing with `Conflict` on a
/// duplicate email even when two inserts race.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn create(&self, email: &str, password_hash: &str) -> Result<User, StoreError>;
}

/// Builds the configured backend, connecting and migrating when it is SQL-backed.
pub async fn connect(config: &AppConfig) -> anyhow::Result<Arc<dyn CredentialStore>> {
    if config.backend == StoreBackend::Memory {
        warn!("using in-memory credential store; users are lost on restart");
        return Ok(Arc::new(MemoryStore::default()));
    }

    let options = config.database.connect_options()?;
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(options)
        .await
        .context("connect to database")?;

    migrate(&pool).await?;

    info!(backend = ?config.backend, "credential store ready");
    Ok(match config.backend {
        StoreBackend::Document => Arc::new(DocumentStore::new(pool)),
        _ => Arc::new(PostgresStore::new(pool)),
    })
}

/// Applies pending migrations. A failure stops startup.
pub(crate) async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("run database migrations")?;
    Ok(())
}
