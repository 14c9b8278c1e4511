//! In-memory engine

use crate::engine::{Engine, StoredRecord};
use crate::error::EngineError;
use async_trait::async_trait;
use ontology_core::{
    walk, Branch, Context, Direction, EdgeRef, GraphView, Id, ListOptions, Record, Result,
    TraversalPlan, TypeSet,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

#[derive(Debug, Default)]
struct Graph {
    records: HashMap<Id, StoredRecord>,
    /// entity ID -> relations departing it (`a` side)
    outgoing: HashMap<Id, BTreeSet<Id>>,
    /// entity ID -> relations arriving at it (`b` side)
    incoming: HashMap<Id, BTreeSet<Id>>,
}

impl Graph {
    fn upsert(&mut self, record: StoredRecord) {
        let id = record.id().clone();

        if let Some(previous) = self.records.get(&id).and_then(|r| r.endpoints.clone()) {
            unindex(&mut self.outgoing, &previous.a, &id);
            unindex(&mut self.incoming, &previous.b, &id);
        }

        if let Some(ends) = &record.endpoints {
            self.outgoing
                .entry(ends.a.clone())
                .or_default()
                .insert(id.clone());
            self.incoming
                .entry(ends.b.clone())
                .or_default()
                .insert(id.clone());
        }

        self.records.insert(id, record);
    }

    fn index(&self, direction: Direction) -> &HashMap<Id, BTreeSet<Id>> {
        match direction {
            Direction::Out => &self.outgoing,
            Direction::In => &self.incoming,
        }
    }
}

fn unindex(index: &mut HashMap<Id, BTreeSet<Id>>, node: &Id, relation: &Id) {
    if let Some(relations) = index.get_mut(node) {
        relations.remove(relation);
        if relations.is_empty() {
            index.remove(node);
        }
    }
}

impl GraphView for Graph {
    fn edges(&self, node: &Id, direction: Direction) -> Result<Vec<EdgeRef>> {
        Ok(self
            .index(direction)
            .get(node)
            .into_iter()
            .flatten()
            .filter_map(|rid| self.records.get(rid))
            .filter_map(|stored| {
                let ends = stored.endpoints.as_ref()?;
                Some(EdgeRef {
                    id: stored.id().clone(),
                    type_id: stored.type_id().clone(),
                    other: ends.landing(direction).clone(),
                })
            })
            .collect())
    }

    fn type_of(&self, id: &Id) -> Result<Option<Id>> {
        Ok(self.records.get(id).map(|r| r.type_id().clone()))
    }
}

/// In-memory engine
///
/// Useful for testing and for processes that rebuild their inventory on start.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    graph: RwLock<Graph>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Engine for MemoryEngine {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn upsert(&self, record: &StoredRecord) -> Result<()> {
        let mut graph = self.graph.write().map_err(EngineError::lock)?;
        graph.upsert(record.clone());
        Ok(())
    }

    async fn get(&self, id: &Id) -> Result<Option<Record>> {
        let graph = self.graph.read().map_err(EngineError::lock)?;
        Ok(graph.records.get(id).map(|r| r.record.clone()))
    }

    async fn list_by_types(
        &self,
        types: &TypeSet,
        _branch: Branch,
        list: &ListOptions,
    ) -> Result<Vec<Record>> {
        let matching: Vec<Record> = {
            let graph = self.graph.read().map_err(EngineError::lock)?;
            graph
                .records
                .values()
                .filter(|r| types.contains(r.type_id()))
                .map(|r| r.record.clone())
                .collect()
        };

        Ok(list.apply(matching, |r| &r.metadata))
    }

    async fn relations_of(
        &self,
        id: &Id,
        types: &TypeSet,
        list: &ListOptions,
    ) -> Result<Vec<Record>> {
        let matching: Vec<Record> = {
            let graph = self.graph.read().map_err(EngineError::lock)?;
            let mut relation_ids: BTreeSet<&Id> = BTreeSet::new();
            for index in [&graph.outgoing, &graph.incoming] {
                relation_ids.extend(index.get(id).into_iter().flatten());
            }

            relation_ids
                .into_iter()
                .filter_map(|rid| graph.records.get(rid))
                .filter(|r| types.contains(r.type_id()))
                .map(|r| r.record.clone())
                .collect()
        };

        Ok(list.apply(matching, |r| &r.metadata))
    }

    async fn traverse(&self, ctx: &Context, plan: &TraversalPlan) -> Result<Vec<Record>> {
        // One read guard for the whole walk so it sees a single consistent graph
        let graph = self.graph.read().map_err(EngineError::lock)?;
        let found = walk(ctx, &*graph, plan)?;

        Ok(found
            .iter()
            .filter_map(|id| graph.records.get(id))
            .map(|r| r.record.clone())
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        let graph = self.graph.read().map_err(EngineError::lock)?;
        Ok(graph.records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontology_core::{Endpoints, Metadata};

    fn entity(id: &str) -> StoredRecord {
        StoredRecord::new(
            Record::new(Metadata::new(id, "/entity/host"), serde_json::json!({})),
            None,
        )
    }

    fn relation(id: &str, a: &str, b: &str) -> StoredRecord {
        StoredRecord::new(
            Record::new(
                Metadata::new(id, "/relation/connects_to"),
                serde_json::json!({"a": a, "b": b}),
            ),
            Some(Endpoints::new(a, b)),
        )
    }

    fn types(ids: &[&str]) -> TypeSet {
        ids.iter().map(|s| Id::from(*s)).collect()
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let engine = MemoryEngine::new();
        engine.upsert(&entity("h1")).await.unwrap();

        let mut renamed = entity("h1");
        renamed.record.metadata.name = "web-1".to_string();
        engine.upsert(&renamed).await.unwrap();

        assert_eq!(engine.len().await.unwrap(), 1);
        let stored = engine.get(&Id::from("h1")).await.unwrap().unwrap();
        assert_eq!(stored.metadata.name, "web-1");
    }

    #[tokio::test]
    async fn test_replacing_relation_moves_its_edges() {
        let engine = MemoryEngine::new();
        engine.upsert(&relation("r1", "h1", "h2")).await.unwrap();
        engine.upsert(&relation("r1", "h3", "h2")).await.unwrap();

        let connects = types(&["/relation/connects_to"]);
        let list = ListOptions::default();
        assert!(engine
            .relations_of(&Id::from("h1"), &connects, &list)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            engine
                .relations_of(&Id::from("h3"), &connects, &list)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_relations_of_self_loop_once() {
        let engine = MemoryEngine::new();
        engine.upsert(&relation("loop", "h1", "h1")).await.unwrap();

        let found = engine
            .relations_of(
                &Id::from("h1"),
                &types(&["/relation/connects_to"]),
                &ListOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_list_by_types_matches_exact_membership() {
        let engine = MemoryEngine::new();
        engine.upsert(&entity("h1")).await.unwrap();
        engine.upsert(&entity("h2")).await.unwrap();
        engine.upsert(&relation("r1", "h1", "h2")).await.unwrap();

        let hosts = engine
            .list_by_types(&types(&["/entity/host"]), Branch::Entity, &ListOptions::default())
            .await
            .unwrap();
        let ids: Vec<&str> = hosts.iter().map(|r| r.metadata.id.as_str()).collect();
        assert_eq!(ids, vec!["h1", "h2"]);

        let nothing = engine
            .list_by_types(&types(&["/entity"]), Branch::Entity, &ListOptions::default())
            .await
            .unwrap();
        assert!(nothing.is_empty());
    }
}
