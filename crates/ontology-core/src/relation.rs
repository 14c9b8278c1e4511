//! Relation (edge) shapes and traversal direction

use crate::entity::Properties;
use crate::error::{Error, Result};
use crate::id::{Id, Metadata};
use crate::instance::{Instance, Record};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::str::FromStr;

/// Direction for graph traversal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Follow relations whose `a` is the current entity, land on `b`
    #[default]
    Out,
    /// Follow relations whose `b` is the current entity, land on `a`
    In,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Out => "out",
            Self::In => "in",
        }
    }

    pub fn reverse(self) -> Self {
        match self {
            Self::Out => Self::In,
            Self::In => Self::Out,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "out" | "outgoing" => Ok(Self::Out),
            "in" | "incoming" => Ok(Self::In),
            other => Err(Error::InvalidArgument(format!(
                "unknown traversal direction: {}",
                other
            ))),
        }
    }
}

/// The two entity IDs a relation connects
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoints {
    pub a: Id,
    pub b: Id,
}

impl Endpoints {
    pub fn new(a: impl Into<Id>, b: impl Into<Id>) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
        }
    }

    /// The endpoint a walk in `direction` starts from
    pub fn departure(&self, direction: Direction) -> &Id {
        match direction {
            Direction::Out => &self.a,
            Direction::In => &self.b,
        }
    }

    /// The endpoint a walk in `direction` lands on
    pub fn landing(&self, direction: Direction) -> &Id {
        match direction {
            Direction::Out => &self.b,
            Direction::In => &self.a,
        }
    }

    pub fn involves(&self, id: &Id) -> bool {
        &self.a == id || &self.b == id
    }
}

/// Properties every relation carries: its endpoints, plus anything its type adds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationProperties<X = Properties> {
    pub a: Id,
    pub b: Id,

    #[serde(flatten)]
    pub extra: X,
}

/// A relation (edge) between two entities
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "X: Serialize", deserialize = "X: DeserializeOwned"))]
pub struct Relation<X = Properties> {
    pub metadata: Metadata,
    pub properties: RelationProperties<X>,
}

impl<X> Relation<X> {
    /// Create a new relation from `a` to `b`
    pub fn new(
        id: impl Into<Id>,
        type_id: impl Into<Id>,
        a: impl Into<Id>,
        b: impl Into<Id>,
        extra: X,
    ) -> Self {
        Self {
            metadata: Metadata::new(id, type_id),
            properties: RelationProperties {
                a: a.into(),
                b: b.into(),
                extra,
            },
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.metadata.name = name.into();
        self
    }

    pub fn a(&self) -> &Id {
        &self.properties.a
    }

    pub fn b(&self) -> &Id {
        &self.properties.b
    }
}

impl Relation<Properties> {
    /// Create a relation with no extra properties
    pub fn between(
        id: impl Into<Id>,
        type_id: impl Into<Id>,
        a: impl Into<Id>,
        b: impl Into<Id>,
    ) -> Self {
        Self::new(id, type_id, a, b, Properties::new())
    }

    /// Create a relation with a generated ID below its type
    pub fn generated(type_id: impl Into<Id>, a: impl Into<Id>, b: impl Into<Id>) -> Self {
        let type_id = type_id.into();
        Self::between(Id::generate(type_id.as_str()), type_id, a, b)
    }
}

impl<X> Instance for Relation<X>
where
    X: Serialize + DeserializeOwned + std::fmt::Debug + Send + Sync + 'static,
{
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn endpoints(&self) -> Option<Endpoints> {
        Some(Endpoints::new(
            self.properties.a.clone(),
            self.properties.b.clone(),
        ))
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
