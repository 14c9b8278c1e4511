//! Identifiers and instance metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use ulid::Ulid;

/// Opaque identifier shared by instances and types
///
/// IDs are hierarchical by convention (`/entity/host/web-1`) but the store
/// never interprets their structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Mint a fresh identifier below `prefix`
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{}/{}", prefix.trim_end_matches('/'), Ulid::new()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&String> for Id {
    fn from(s: &String) -> Self {
        Self(s.clone())
    }
}

impl From<&Id> for Id {
    fn from(id: &Id) -> Self {
        id.clone()
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Id {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Metadata carried by every instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Instance identifier
    #[serde(default)]
    pub id: Id,

    /// The single type this instance belongs to
    #[serde(rename = "type")]
    pub type_id: Id,

    /// Human readable name
    #[serde(default)]
    pub name: String,

    /// Last time the instance was replaced
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl Metadata {
    pub fn new(id: impl Into<Id>, type_id: impl Into<Id>) -> Self {
        Self {
            id: id.into(),
            type_id: type_id.into(),
            name: String::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}
