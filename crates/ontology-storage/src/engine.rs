//! Engine trait: what a backing graph must do for the store

use async_trait::async_trait;
use ontology_core::{
    Branch, Context, Endpoints, Id, Instance, ListOptions, Record, Result, TraversalPlan, TypeSet,
};
use serde::{Deserialize, Serialize};

/// A record as persisted by an engine, with relation endpoints pulled out for indexing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub record: Record,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<Endpoints>,
}

impl StoredRecord {
    pub fn new(record: Record, endpoints: Option<Endpoints>) -> Self {
        Self { record, endpoints }
    }

    pub fn from_instance(instance: &dyn Instance) -> Result<Self> {
        Ok(Self {
            record: instance.to_record()?,
            endpoints: instance.endpoints(),
        })
    }

    pub fn id(&self) -> &Id {
        &self.record.metadata.id
    }

    pub fn type_id(&self) -> &Id {
        &self.record.metadata.type_id
    }

    pub fn is_relation(&self) -> bool {
        self.endpoints.is_some()
    }
}

/// Persistence and evaluation for one kind of backing graph
///
/// Engines never see the type forest: every type argument arrives already
/// expanded into a flat [`TypeSet`].
#[async_trait]
pub trait Engine: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Insert or replace the record stored under its ID
    async fn upsert(&self, record: &StoredRecord) -> Result<()>;

    async fn get(&self, id: &Id) -> Result<Option<Record>>;

    /// Records whose type is in `types`, sorted and paged
    async fn list_by_types(
        &self,
        types: &TypeSet,
        branch: Branch,
        list: &ListOptions,
    ) -> Result<Vec<Record>>;

    /// Relations with `id` as either endpoint whose type is in `types`, sorted and paged
    async fn relations_of(&self, id: &Id, types: &TypeSet, list: &ListOptions)
        -> Result<Vec<Record>>;

    /// Evaluate a traversal plan; results are unordered and unpaged
    async fn traverse(&self, ctx: &Context, plan: &TraversalPlan) -> Result<Vec<Record>>;

    /// Number of stored instances
    async fn len(&self) -> Result<usize>;
}
