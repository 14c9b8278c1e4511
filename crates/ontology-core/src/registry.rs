//! Type registry: the type forest and record dispatch
//!
//! Types are registered on a [`TypeRegistryBuilder`] in any order and
//! validated as a whole when the registry is built. A built [`TypeRegistry`]
//! is immutable and is shared by reference (usually behind an `Arc`) with the
//! store and anything else that needs to dispatch records.

use crate::entity::{Entity, Properties};
use crate::error::{Error, Result};
use crate::id::Id;
use crate::instance::{Branch, DynInstance, Instance, Record};
use crate::relation::Relation;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

/// Root of the entity branch
pub const ENTITY_TYPE: &str = "/entity";

/// Root of the relation branch
pub const RELATION_TYPE: &str = "/relation";

/// A flat set of type IDs, ordered so compiled queries are deterministic
pub type TypeSet = BTreeSet<Id>;

type Factory = Arc<dyn Fn(serde_json::Value) -> Result<DynInstance> + Send + Sync>;

/// Public view of a registered type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub id: Id,
    pub parent: Option<Id>,
}

struct Registration {
    info: TypeInfo,
    factory: Factory,
}

/// Collects type registrations before the forest is validated
#[derive(Default)]
pub struct TypeRegistryBuilder {
    registrations: Vec<Registration>,
}

impl TypeRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` as the shape of type `id`, optionally below `parent`
    pub fn register<T>(mut self, id: impl Into<Id>, parent: Option<&str>) -> Self
    where
        T: Instance + DeserializeOwned,
    {
        let factory: Factory = Arc::new(|value: serde_json::Value| -> Result<DynInstance> {
            let instance: T = serde_json::from_value(value)?;
            Ok(Arc::new(instance) as DynInstance)
        });

        self.registrations.push(Registration {
            info: TypeInfo {
                id: id.into(),
                parent: parent.filter(|p| !p.is_empty()).map(Id::from),
            },
            factory,
        });
        self
    }

    /// Register the `/entity` and `/relation` roots with free-form properties
    pub fn with_core_types(self) -> Self {
        self.register::<Entity<Properties>>(ENTITY_TYPE, None)
            .register::<Relation<Properties>>(RELATION_TYPE, None)
    }

    /// Validate the forest and freeze it
    pub fn build(self) -> Result<TypeRegistry> {
        let mut types: HashMap<Id, Registration> = HashMap::with_capacity(self.registrations.len());

        for registration in self.registrations {
            let id = registration.info.id.clone();
            if id.is_empty() {
                return Err(Error::InvalidArgument("type ID cannot be empty".to_string()));
            }
            if types.insert(id.clone(), registration).is_some() {
                return Err(Error::DuplicateType(id));
            }
        }

        let mut children: HashMap<Id, Vec<Id>> = HashMap::new();
        for registration in types.values() {
            if let Some(parent) = &registration.info.parent {
                if !types.contains_key(parent) {
                    return Err(Error::UnknownType(parent.clone()));
                }
                children
                    .entry(parent.clone())
                    .or_default()
                    .push(registration.info.id.clone());
            }
        }
        for ids in children.values_mut() {
            ids.sort();
        }

        // Every chain must reach a root within |types| steps
        for id in types.keys() {
            let mut current = Some(id);
            let mut steps = 0;
            while let Some(cur) = current {
                if steps > types.len() {
                    return Err(Error::InvalidArgument(format!(
                        "type hierarchy contains a cycle through {}",
                        id
                    )));
                }
                current = types.get(cur).and_then(|r| r.info.parent.as_ref());
                steps += 1;
            }
        }

        tracing::debug!("Built type registry with {} types", types.len());

        Ok(TypeRegistry { types, children })
    }
}

/// Immutable type forest plus the factories that materialize each type
pub struct TypeRegistry {
    types: HashMap<Id, Registration>,
    children: HashMap<Id, Vec<Id>>,
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&Id> = self.types.keys().collect();
        ids.sort();
        f.debug_struct("TypeRegistry").field("types", &ids).finish()
    }
}

#[derive(Deserialize)]
struct TypeProbe {
    metadata: TypeProbeMetadata,
}

#[derive(Deserialize)]
struct TypeProbeMetadata {
    #[serde(rename = "type")]
    type_id: Id,
}

impl TypeRegistry {
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.types.contains_key(id)
    }

    /// Look up a registered type
    pub fn get(&self, id: &str) -> Option<&TypeInfo> {
        self.types.get(id).map(|r| &r.info)
    }

    /// All registered type IDs, sorted
    pub fn ids(&self) -> Vec<Id> {
        let mut ids: Vec<Id> = self.types.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn parent_of(&self, id: &str) -> Option<&Id> {
        self.types.get(id).and_then(|r| r.info.parent.as_ref())
    }

    /// True iff `ancestor` is on `id`'s parent chain (including `id` itself)
    pub fn inherits_from(&self, id: &str, ancestor: &str) -> bool {
        if !self.contains(id) {
            return false;
        }

        let mut current = Some(id);
        while let Some(cur) = current {
            if cur == ancestor {
                return true;
            }
            current = self.parent_of(cur).map(Id::as_str);
        }
        false
    }

    /// The chain from `id` up to its root, starting with `id`
    pub fn ancestors(&self, id: &str) -> Vec<Id> {
        let mut chain = Vec::new();
        let mut current = self.types.get(id).map(|r| &r.info.id);
        while let Some(cur) = current {
            chain.push(cur.clone());
            current = self.parent_of(cur.as_str());
        }
        chain
    }

    /// Every type transitively below `id`, excluding `id`
    pub fn subclasses_of(&self, id: &str) -> TypeSet {
        let mut found = TypeSet::new();
        let mut queue: VecDeque<&Id> = VecDeque::new();

        if let Some(kids) = self.children.get(id) {
            queue.extend(kids);
        }

        while let Some(current) = queue.pop_front() {
            if found.insert(current.clone()) {
                if let Some(kids) = self.children.get(current.as_str()) {
                    queue.extend(kids);
                }
            }
        }

        found
    }

    /// `id` plus its subtype closure
    pub fn closure(&self, id: &str) -> TypeSet {
        let mut set = self.subclasses_of(id);
        set.insert(Id::from(id));
        set
    }

    /// Which branch a type belongs to, if any
    pub fn branch_of(&self, id: &str) -> Option<Branch> {
        if self.inherits_from(id, RELATION_TYPE) {
            Some(Branch::Relation)
        } else if self.inherits_from(id, ENTITY_TYPE) {
            Some(Branch::Entity)
        } else {
            None
        }
    }

    /// True if the instance's type is `type_id` or one of its subtypes
    pub fn is_a(&self, instance: &dyn Instance, type_id: &str) -> bool {
        self.inherits_from(instance.instance_type().as_str(), type_id)
    }

    /// Materialize a typed instance from a generic record
    ///
    /// Only `metadata.type` is read to pick the shape; the whole record is
    /// then parsed into it.
    pub fn dispatch(&self, record: serde_json::Value) -> Result<DynInstance> {
        let probe = TypeProbe::deserialize(&record)?;
        let registration = self
            .types
            .get(&probe.metadata.type_id)
            .ok_or(Error::UnknownType(probe.metadata.type_id))?;

        (registration.factory)(record)
    }

    pub fn dispatch_str(&self, raw: &str) -> Result<DynInstance> {
        self.dispatch(serde_json::from_str(raw)?)
    }

    pub fn dispatch_record(&self, record: Record) -> Result<DynInstance> {
        self.dispatch(record.into_value()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Wibble {
        wibble: String,
    }

    fn hierarchy() -> TypeRegistry {
        TypeRegistry::builder()
            .with_core_types()
            .register::<Entity>("/entity/computer", Some(ENTITY_TYPE))
            .register::<Entity>("/entity/computer/laptop", Some("/entity/computer"))
            .register::<Entity>("/entity/person", Some(ENTITY_TYPE))
            .register::<Relation>("/relation/owns", Some(RELATION_TYPE))
            .build()
            .unwrap()
    }

    #[test]
    fn test_inherits_from_is_reflexive() {
        let registry = hierarchy();
        for id in registry.ids() {
            assert!(registry.inherits_from(id.as_str(), id.as_str()), "{}", id);
        }
    }

    #[test]
    fn test_inherits_from_is_transitive() {
        let registry = hierarchy();

        assert!(registry.inherits_from("/entity/computer/laptop", "/entity/computer"));
        assert!(registry.inherits_from("/entity/computer/laptop", ENTITY_TYPE));
        assert!(registry.subclasses_of(ENTITY_TYPE).contains("/entity/computer/laptop"));
        assert!(!registry.inherits_from("/entity/person", "/entity/computer"));
        assert!(!registry.inherits_from("/entity/unknown", "/entity/unknown"));
    }

    #[test]
    fn test_subclasses_exclude_self() {
        let registry = hierarchy();
        let subclasses = registry.subclasses_of("/entity/computer");

        assert_eq!(subclasses.len(), 1);
        assert!(!subclasses.contains("/entity/computer"));
        assert!(registry.subclasses_of("/entity/computer/laptop").is_empty());
        assert_eq!(registry.closure("/entity/computer").len(), 2);
    }

    #[test]
    fn test_registration_order_is_free() {
        let registry = TypeRegistry::builder()
            .register::<Entity>("/entity/computer/laptop", Some("/entity/computer"))
            .register::<Entity>("/entity/computer", Some(ENTITY_TYPE))
            .with_core_types()
            .build()
            .unwrap();

        assert!(registry.subclasses_of(ENTITY_TYPE).contains("/entity/computer/laptop"));
        assert_eq!(
            registry.ancestors("/entity/computer/laptop"),
            vec![
                Id::from("/entity/computer/laptop"),
                Id::from("/entity/computer"),
                Id::from(ENTITY_TYPE)
            ]
        );
    }

    #[test]
    fn test_build_rejects_bad_forests() {
        let duplicate = TypeRegistry::builder()
            .with_core_types()
            .register::<Entity>(ENTITY_TYPE, None)
            .build();
        assert!(matches!(duplicate, Err(Error::DuplicateType(_))));

        let orphan = TypeRegistry::builder()
            .register::<Entity>("/entity/host", Some(ENTITY_TYPE))
            .build();
        assert!(matches!(orphan, Err(Error::UnknownType(id)) if id.as_str() == ENTITY_TYPE));

        let cycle = TypeRegistry::builder()
            .register::<Entity>("/a", Some("/b"))
            .register::<Entity>("/b", Some("/a"))
            .build();
        assert!(matches!(cycle, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_branches() {
        let registry = hierarchy();
        assert_eq!(registry.branch_of("/entity/computer/laptop"), Some(Branch::Entity));
        assert_eq!(registry.branch_of("/relation/owns"), Some(Branch::Relation));
        assert_eq!(registry.branch_of("/nowhere"), None);
    }

    #[test]
    fn test_dispatch_picks_registered_shape() {
        let registry = TypeRegistry::builder()
            .with_core_types()
            .register::<Entity<Wibble>>("/entity/test", Some(ENTITY_TYPE))
            .build()
            .unwrap();

        let instance = registry
            .dispatch_str(
                r#"{
                    "metadata": {"id": "t1", "type": "/entity/test"},
                    "properties": {"wibble": "bibble"}
                }"#,
            )
            .unwrap();

        let typed = instance.downcast_ref::<Entity<Wibble>>().unwrap();
        assert_eq!(typed.properties.wibble, "bibble");
        assert!(registry.is_a(instance.as_ref(), ENTITY_TYPE));
    }

    #[test]
    fn test_dispatch_relation_exposes_endpoints() {
        let registry = hierarchy();
        let instance = registry
            .dispatch_str(
                r#"{"metadata": {"id": "r1", "type": "/relation/owns"}, "properties": {"a": "p1", "b": "c1"}}"#,
            )
            .unwrap();

        assert!(instance.is_relation());
        assert_eq!(instance.endpoints().unwrap().b.as_str(), "c1");
    }

    #[test]
    fn test_dispatch_unknown_type() {
        let registry = hierarchy();
        let result = registry.dispatch_str(r#"{"metadata": {"type": "/entity/ghost"}}"#);
        assert!(matches!(result, Err(Error::UnknownType(id)) if id.as_str() == "/entity/ghost"));
    }
}
