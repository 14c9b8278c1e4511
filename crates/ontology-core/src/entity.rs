//! Entity (node) shapes

use crate::error::Result;
use crate::id::{Id, Metadata};
use crate::instance::{Instance, Record};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;

/// Free-form properties section
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// An entity in the asset graph (a node)
///
/// `P` is the properties shape registered for the entity's type. The default
/// keeps properties as an untyped JSON object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "P: Serialize",
    deserialize = "P: DeserializeOwned + Default"
))]
pub struct Entity<P = Properties> {
    pub metadata: Metadata,

    #[serde(default)]
    pub properties: P,
}

impl<P> Entity<P> {
    /// Create a new entity
    pub fn new(id: impl Into<Id>, type_id: impl Into<Id>, properties: P) -> Self {
        Self {
            metadata: Metadata::new(id, type_id),
            properties,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.metadata.name = name.into();
        self
    }
}

impl Entity<Properties> {
    /// Create an entity with no properties
    pub fn bare(id: impl Into<Id>, type_id: impl Into<Id>) -> Self {
        Self::new(id, type_id, Properties::new())
    }

    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

impl<P> Instance for Entity<P>
where
    P: Serialize + DeserializeOwned + std::fmt::Debug + Send + Sync + 'static,
{
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn to_record(&self) -> Result<Record> {
        Ok(Record::new(
            self.metadata.clone(),
            serde_json::to_value(&self.properties)?,
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
