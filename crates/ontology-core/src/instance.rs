//! The polymorphic instance model and its serialized record form

use crate::error::Result;
use crate::id::{Id, Metadata};
use crate::relation::Endpoints;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;

/// A stored entity or relation
///
/// The concrete field shape is owned by whatever prototype was registered for
/// the instance's type; the store only ever sees this trait.
pub trait Instance: std::fmt::Debug + Send + Sync + 'static {
    fn metadata(&self) -> &Metadata;

    fn id(&self) -> &Id {
        &self.metadata().id
    }

    fn instance_type(&self) -> &Id {
        &self.metadata().type_id
    }

    /// Relation endpoints, `None` for entities
    fn endpoints(&self) -> Option<Endpoints> {
        None
    }

    /// Serialize back into the generic record form
    fn to_record(&self) -> Result<Record>;

    fn as_any(&self) -> &dyn Any;
}

/// Shared, type-erased instance
pub type DynInstance = Arc<dyn Instance>;

impl dyn Instance {
    /// Borrow the concrete shape if it is `T`
    pub fn downcast_ref<T: Instance>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is_relation(&self) -> bool {
        self.endpoints().is_some()
    }
}

/// Which side of the type forest a type lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    Entity,
    Relation,
}

impl std::fmt::Display for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entity => f.write_str("entity"),
            Self::Relation => f.write_str("relation"),
        }
    }
}

fn empty_properties() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Generic serialized instance: a metadata section plus type-specific properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub metadata: Metadata,

    #[serde(default = "empty_properties")]
    pub properties: serde_json::Value,
}

impl Record {
    pub fn new(metadata: Metadata, properties: serde_json::Value) -> Self {
        Self {
            metadata,
            properties,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn into_value(self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Endpoints read straight from the properties section
    pub fn endpoints(&self) -> Option<Endpoints> {
        let a = self.properties.get("a")?.as_str()?;
        let b = self.properties.get("b")?.as_str()?;
        Some(Endpoints::new(a, b))
    }
}
