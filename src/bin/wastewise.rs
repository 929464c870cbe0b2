//! wastewise REST server
//!
//! Usage: `wastewise [config.yaml]`. Without a file every setting comes from
//! defaults and `WASTEWISE_*` variables.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use wastewise::config::{AppConfig, StoreBackend};
use wastewise::core::DataStore;
use wastewise::server::ServerBuilder;
use wastewise::services::ServiceHub;
use wastewise::storage::InMemoryStore;
use wastewise::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = AppConfig::load(path.as_deref()).context("failed to load configuration")?;
    let addr = config.server.bind_addr()?;

    let store = open_store(&config)?;
    tracing::info!(backend = ?config.store.backend, schema = ?config.payments.schema, "store ready");

    let hub = ServiceHub::new(store, &config);
    ServerBuilder::new(hub)
        .with_permissive_cors()
        .serve(&addr.to_string())
        .await
}

fn open_store(config: &AppConfig) -> Result<Arc<dyn DataStore>> {
    match config.store.backend {
        StoreBackend::InMemory => {
            tracing::warn!("using the in-memory store; data is lost on exit");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StoreBackend::Postgrest => open_postgrest(config),
    }
}

#[cfg(feature = "postgrest")]
fn open_postgrest(config: &AppConfig) -> Result<Arc<dyn DataStore>> {
    use wastewise::storage::PostgrestStore;

    let url = config.store.url.as_deref().context("store.url is required")?;
    let key = config
        .store
        .api_key
        .as_deref()
        .context("store.api_key is required")?;
    let store = PostgrestStore::new(url, key, config.store.timeout())?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "postgrest"))]
fn open_postgrest(_config: &AppConfig) -> Result<Arc<dyn DataStore>> {
    anyhow::bail!("the postgrest backend requires building with the `postgrest` feature")
}
