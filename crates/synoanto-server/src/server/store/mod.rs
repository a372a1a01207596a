//! Persistence backends selectable at startup.

pub mod postgres;

use crate::server::{
    config::{ServerConfig, StoreBackend},
    service::handler::Backends,
};
use anyhow::Context;
use std::sync::Arc;
use synoanto_core::store::MemoryStore;

/// Connects the backend named by `config.store`, applying migrations for
/// Postgres.
pub async fn connect_backends(config: &ServerConfig) -> anyhow::Result<Backends> {
    match config.store {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; cached entries will not survive a restart");
            Ok(Backends::shared(Arc::new(MemoryStore::new())))
        }
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("missing `DATABASE_URL`")?;
            let store = postgres::PgStore::connect(url, config.database_max_connections)
                .await
                .context("failed to connect to Postgres")?;
            store.migrate().await.context("failed to apply migrations")?;
            tracing::info!("Database migration completed");
            Ok(Backends::shared(Arc::new(store)))
        }
    }
}
