//! ReDB engine

use crate::engine::{Engine, StoredRecord};
use crate::error::EngineResult;
use async_trait::async_trait;
use ontology_core::{
    walk, Branch, Context, Direction, EdgeRef, GraphView, Id, ListOptions, Record, Result,
    TraversalPlan, TypeSet,
};
use redb::{
    Database, MultimapTableDefinition, ReadOnlyMultimapTable, ReadOnlyTable, ReadableTable,
    ReadableTableMetadata, TableDefinition,
};
use std::collections::BTreeSet;
use std::path::Path;

// Table definitions
const INSTANCES: TableDefinition<&str, &[u8]> = TableDefinition::new("instances");
const OUTGOING: MultimapTableDefinition<&str, &str> = MultimapTableDefinition::new("outgoing");
const INCOMING: MultimapTableDefinition<&str, &str> = MultimapTableDefinition::new("incoming");

/// ReDB engine
///
/// Instances are stored as JSON under their ID. Relations are additionally
/// indexed by the entity on each side so traversals never scan the table.
pub struct RedbEngine {
    db: Database,
}

impl RedbEngine {
    /// Open or create a ReDB database at the given path
    pub fn open(path: impl AsRef<Path>) -> EngineResult<Self> {
        let db = Database::create(path)?;

        // Initialize tables
        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(INSTANCES)?;
            write_txn.open_multimap_table(OUTGOING)?;
            write_txn.open_multimap_table(INCOMING)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    fn upsert_record(&self, record: &StoredRecord) -> EngineResult<()> {
        let id = record.id().as_str();
        let value = serde_json::to_vec(record)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut instances = write_txn.open_table(INSTANCES)?;
            let mut outgoing = write_txn.open_multimap_table(OUTGOING)?;
            let mut incoming = write_txn.open_multimap_table(INCOMING)?;

            let previous: Option<StoredRecord> = match instances.get(id)? {
                Some(bytes) => Some(serde_json::from_slice(bytes.value())?),
                None => None,
            };

            if let Some(ends) = previous.and_then(|p| p.endpoints) {
                outgoing.remove(ends.a.as_str(), id)?;
                incoming.remove(ends.b.as_str(), id)?;
            }
            if let Some(ends) = &record.endpoints {
                outgoing.insert(ends.a.as_str(), id)?;
                incoming.insert(ends.b.as_str(), id)?;
            }

            instances.insert(id, value.as_slice())?;
        }
        write_txn.commit()?;

        Ok(())
    }

    fn snapshot(&self) -> EngineResult<Snapshot> {
        let read_txn = self.db.begin_read()?;
        Ok(Snapshot {
            instances: read_txn.open_table(INSTANCES)?,
            outgoing: read_txn.open_multimap_table(OUTGOING)?,
            incoming: read_txn.open_multimap_table(INCOMING)?,
        })
    }

    fn scan(&self, types: &TypeSet) -> EngineResult<Vec<Record>> {
        let snapshot = self.snapshot()?;

        let mut records = Vec::new();
        for entry in snapshot.instances.iter()? {
            let (_, value) = entry?;
            let stored: StoredRecord = serde_json::from_slice(value.value())?;
            if types.contains(stored.type_id()) {
                records.push(stored.record);
            }
        }
        Ok(records)
    }

    fn relations_touching(&self, id: &Id, types: &TypeSet) -> EngineResult<Vec<Record>> {
        let snapshot = self.snapshot()?;

        let mut relation_ids = BTreeSet::new();
        for direction in [Direction::Out, Direction::In] {
            relation_ids.extend(snapshot.relation_ids(id, direction)?);
        }

        let mut records = Vec::new();
        for rid in relation_ids {
            if let Some(stored) = snapshot.record(&rid)? {
                if types.contains(stored.type_id()) {
                    records.push(stored.record);
                }
            }
        }
        Ok(records)
    }

    fn count(&self) -> EngineResult<usize> {
        let snapshot = self.snapshot()?;
        Ok(snapshot.instances.len()? as usize)
    }
}

/// Tables opened in one read transaction
struct Snapshot {
    instances: ReadOnlyTable<&'static str, &'static [u8]>,
    outgoing: ReadOnlyMultimapTable<&'static str, &'static str>,
    incoming: ReadOnlyMultimapTable<&'static str, &'static str>,
}

impl Snapshot {
    fn record(&self, id: &Id) -> EngineResult<Option<StoredRecord>> {
        match self.instances.get(id.as_str())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes.value())?)),
            None => Ok(None),
        }
    }

    fn relation_ids(&self, node: &Id, direction: Direction) -> EngineResult<Vec<Id>> {
        let index = match direction {
            Direction::Out => &self.outgoing,
            Direction::In => &self.incoming,
        };

        let mut ids = Vec::new();
        for rid in index.get(node.as_str())? {
            ids.push(Id::from(rid?.value()));
        }
        Ok(ids)
    }

    fn edge_refs(&self, node: &Id, direction: Direction) -> EngineResult<Vec<EdgeRef>> {
        let mut edges = Vec::new();
        for rid in self.relation_ids(node, direction)? {
            let Some(stored) = self.record(&rid)? else {
                continue;
            };
            if let Some(ends) = &stored.endpoints {
                edges.push(EdgeRef {
                    id: rid,
                    type_id: stored.type_id().clone(),
                    other: ends.landing(direction).clone(),
                });
            }
        }
        Ok(edges)
    }
}

impl GraphView for Snapshot {
    fn edges(&self, node: &Id, direction: Direction) -> Result<Vec<EdgeRef>> {
        Ok(self.edge_refs(node, direction)?)
    }

    fn type_of(&self, id: &Id) -> Result<Option<Id>> {
        Ok(self.record(id)?.map(|r| r.record.metadata.type_id))
    }
}

#[async_trait]
impl Engine for RedbEngine {
    fn name(&self) -> &'static str {
        "redb"
    }

    async fn upsert(&self, record: &StoredRecord) -> Result<()> {
        self.upsert_record(record)?;
        Ok(())
    }

    async fn get(&self, id: &Id) -> Result<Option<Record>> {
        let snapshot = self.snapshot()?;
        Ok(snapshot.record(id)?.map(|r| r.record))
    }

    async fn list_by_types(
        &self,
        types: &TypeSet,
        _branch: Branch,
        list: &ListOptions,
    ) -> Result<Vec<Record>> {
        let records = self.scan(types)?;
        Ok(list.apply(records, |r| &r.metadata))
    }

    async fn relations_of(
        &self,
        id: &Id,
        types: &TypeSet,
        list: &ListOptions,
    ) -> Result<Vec<Record>> {
        let records = self.relations_touching(id, types)?;
        Ok(list.apply(records, |r| &r.metadata))
    }

    async fn traverse(&self, ctx: &Context, plan: &TraversalPlan) -> Result<Vec<Record>> {
        let snapshot = self.snapshot()?;
        let found = walk(ctx, &snapshot, plan)?;

        let mut records = Vec::with_capacity(found.len());
        for id in &found {
            if let Some(stored) = snapshot.record(id)? {
                records.push(stored.record);
            }
        }
        Ok(records)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.count()?)
    }
}
