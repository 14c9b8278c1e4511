//! Compiled evaluation against a Gremlin-compatible graph server

pub mod client;
pub mod compile;
pub mod engine;
pub mod graphson;
pub mod lang;

pub use client::GremlinClient;
#[cfg(feature = "gremlin")]
pub use client::HttpGremlinClient;
pub use compile::Query;
pub use engine::GremlinEngine;
pub use lang::{anon, g, Bindings, Order, Predicate, Source, Step, Traversal};
