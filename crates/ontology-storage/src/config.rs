//! Store configuration

use crate::broadcast::DEFAULT_DELIVERY_TIMEOUT;
use crate::engine::Engine;
use crate::memory::MemoryEngine;
use crate::store::{GraphStore, Store};
use ontology_core::{limits, Error, Result, TypeRegistry, DEFAULT_MAX_DEPTH};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}

fn default_delivery_timeout_ms() -> u64 {
    DEFAULT_DELIVERY_TIMEOUT.as_millis() as u64
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

/// Which engine backs the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    #[default]
    Memory,
    Redb {
        path: PathBuf,
    },
    Gremlin {
        url: String,
        #[serde(default = "default_request_timeout_ms")]
        request_timeout_ms: u64,
    },
}

/// Configuration for a store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Hops taken when a traversal leaves `max_depth` unset
    #[serde(default = "default_max_depth")]
    pub default_max_depth: u32,

    /// How long a broadcast waits on one watcher
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,

    #[serde(default)]
    pub backend: BackendConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_max_depth: default_max_depth(),
            delivery_timeout_ms: default_delivery_timeout_ms(),
            backend: BackendConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| Error::InvalidArgument(format!("Failed to parse store config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidArgument(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        limits::validate_traversal_depth(self.default_max_depth)?;
        if self.delivery_timeout_ms == 0 {
            return Err(Error::InvalidArgument(
                "delivery_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

fn finish<E: Engine + 'static>(
    engine: E,
    config: &StoreConfig,
    registry: Arc<TypeRegistry>,
) -> Arc<dyn Store> {
    tracing::info!(
        "Opened {} store (default depth {}, delivery timeout {}ms)",
        engine.name(),
        config.default_max_depth,
        config.delivery_timeout_ms
    );

    Arc::new(
        GraphStore::new(engine, registry)
            .with_default_depth(config.default_max_depth)
            .with_delivery_timeout(config.delivery_timeout()),
    )
}

#[cfg(feature = "redb")]
fn open_redb(
    path: &Path,
    config: &StoreConfig,
    registry: Arc<TypeRegistry>,
) -> Result<Arc<dyn Store>> {
    let engine = crate::redb::RedbEngine::open(path)?;
    Ok(finish(engine, config, registry))
}

#[cfg(not(feature = "redb"))]
fn open_redb(_: &Path, _: &StoreConfig, _: Arc<TypeRegistry>) -> Result<Arc<dyn Store>> {
    Err(Error::Unimplemented("built without the redb feature".to_string()))
}

#[cfg(feature = "gremlin")]
fn open_gremlin(
    url: &str,
    request_timeout_ms: u64,
    config: &StoreConfig,
    registry: Arc<TypeRegistry>,
) -> Result<Arc<dyn Store>> {
    use crate::gremlin::{GremlinEngine, HttpGremlinClient};

    let client = HttpGremlinClient::new(url, Duration::from_millis(request_timeout_ms))?;
    Ok(finish(GremlinEngine::new(client), config, registry))
}

#[cfg(not(feature = "gremlin"))]
fn open_gremlin(_: &str, _: u64, _: &StoreConfig, _: Arc<TypeRegistry>) -> Result<Arc<dyn Store>> {
    Err(Error::Unimplemented("built without the gremlin feature".to_string()))
}

/// Build the store described by `config`
pub fn open(config: &StoreConfig, registry: Arc<TypeRegistry>) -> Result<Arc<dyn Store>> {
    config.validate()?;

    match &config.backend {
        BackendConfig::Memory => Ok(finish(MemoryEngine::new(), config, registry)),
        BackendConfig::Redb { path } => open_redb(path, config, registry),
        BackendConfig::Gremlin {
            url,
            request_timeout_ms,
        } => open_gremlin(url, *request_timeout_ms, config, registry),
    }
}
