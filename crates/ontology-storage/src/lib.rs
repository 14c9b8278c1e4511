//! Ontology Storage - Stores and storage engines for the asset graph
//!
//! A [`Store`] validates and dispatches instances against a type registry,
//! hands them to an [`Engine`] for persistence and fans each change out to
//! watchers. Engines evaluate queries either directly (memory, redb) or by
//! compiling them to Gremlin.

#![allow(clippy::result_large_err)]

pub mod broadcast;
pub mod config;
pub mod engine;
pub mod error;
pub mod gremlin;
pub mod memory;
pub mod store;

#[cfg(feature = "redb")]
pub mod redb;

pub use broadcast::{Broadcast, Subscription, DEFAULT_DELIVERY_TIMEOUT};
pub use config::{open, BackendConfig, StoreConfig};
pub use engine::{Engine, StoredRecord};
pub use error::{EngineError, EngineResult};
pub use gremlin::{GremlinClient, GremlinEngine};
pub use memory::MemoryEngine;
pub use store::{GraphStore, Store};

#[cfg(feature = "redb")]
pub use redb::RedbEngine;

#[cfg(feature = "gremlin")]
pub use gremlin::HttpGremlinClient;
