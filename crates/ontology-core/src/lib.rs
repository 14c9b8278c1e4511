//! Ontology Core - Type registry and traversal planning for the asset store
//!
//! This crate provides the instance model, the type forest that routes
//! records to their registered shapes, and the traversal planner shared by
//! every storage engine.

pub mod entity;
pub mod error;
pub mod id;
pub mod instance;
pub mod limits;
pub mod query;
pub mod registry;
pub mod relation;
pub mod traversal;

/// Cancellation carried by every store call
pub type Context = tokio_util::sync::CancellationToken;

pub use entity::{Entity, Properties};
pub use error::{BackendError, Error, Result};
pub use id::{Id, Metadata};
pub use instance::{Branch, DynInstance, Instance, Record};
pub use query::{ListByTypeOptions, ListFromByTypeOptions, ListOptions, SortField, SortOrder};
pub use registry::{
    TypeInfo, TypeRegistry, TypeRegistryBuilder, TypeSet, ENTITY_TYPE, RELATION_TYPE,
};
pub use relation::{Direction, Endpoints, Relation, RelationProperties};
pub use traversal::{walk, EdgeRef, GraphView, TraversalPlan, TraversalPlanner, DEFAULT_MAX_DEPTH};
