//! Engine that evaluates by compiling to Gremlin

use super::client::GremlinClient;
use super::compile::{self, Query};
use crate::engine::{Engine, StoredRecord};
use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use ontology_core::{
    Branch, Context, Error, Id, ListOptions, Record, Result, TraversalPlan, TypeSet,
};
use serde_json::Value;

/// Compiled evaluation against an external graph
pub struct GremlinEngine<C> {
    client: C,
}

impl<C: GremlinClient> GremlinEngine<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    async fn records(&self, query: &Query) -> EngineResult<Vec<Record>> {
        self.client
            .submit(query)
            .await?
            .into_iter()
            .map(decode_record)
            .collect()
    }

    async fn count(&self, query: &Query) -> EngineResult<usize> {
        let values = self.client.submit(query).await?;
        match values.first() {
            None => Ok(0),
            Some(value) => value
                .as_u64()
                .map(|n| n as usize)
                .ok_or_else(|| EngineError::Decode(format!("expected a count, got {}", value))),
        }
    }
}

/// `record` comes back as the JSON text it was stored as
fn decode_record(value: Value) -> EngineResult<Record> {
    match value {
        Value::String(raw) => Ok(serde_json::from_str(&raw)?),
        other => Ok(serde_json::from_value(other)?),
    }
}

#[async_trait]
impl<C: GremlinClient> Engine for GremlinEngine<C> {
    fn name(&self) -> &'static str {
        "gremlin"
    }

    async fn upsert(&self, record: &StoredRecord) -> Result<()> {
        let query = compile::upsert(record)?;
        self.client.submit(&query).await?;
        Ok(())
    }

    async fn get(&self, id: &Id) -> Result<Option<Record>> {
        let mut found = self.records(&compile::get_vertex(id)).await?;
        if found.is_empty() {
            found = self.records(&compile::get_edge(id)).await?;
        }
        Ok(found.into_iter().next())
    }

    async fn list_by_types(
        &self,
        types: &TypeSet,
        branch: Branch,
        list: &ListOptions,
    ) -> Result<Vec<Record>> {
        let query = compile::list_by_types(types, branch, list)?;
        Ok(self.records(&query).await?)
    }

    async fn relations_of(
        &self,
        id: &Id,
        types: &TypeSet,
        list: &ListOptions,
    ) -> Result<Vec<Record>> {
        let query = compile::relations_of(id, types, list)?;
        Ok(self.records(&query).await?)
    }

    async fn traverse(&self, ctx: &Context, plan: &TraversalPlan) -> Result<Vec<Record>> {
        let query = Query::new(&compile::traversal(plan));
        tracing::debug!("Compiled traversal: {}", query.script);

        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(Error::Cancelled),
            records = self.records(&query) => Ok(records?),
        }
    }

    async fn len(&self) -> Result<usize> {
        let vertices = self.count(&compile::count_vertices()).await?;
        let edges = self.count(&compile::count_edges()).await?;
        Ok(vertices + edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontology_core::{Direction, Metadata};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        sent: Mutex<Vec<Query>>,
        replies: Mutex<VecDeque<EngineResult<Vec<Value>>>>,
    }

    impl RecordingClient {
        fn replying(replies: Vec<EngineResult<Vec<Value>>>) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                replies: Mutex::new(replies.into()),
            }
        }

        fn sent(&self) -> Vec<Query> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GremlinClient for RecordingClient {
        async fn submit(&self, query: &Query) -> EngineResult<Vec<Value>> {
            self.sent.lock().unwrap().push(query.clone());
            self.replies.lock().unwrap().pop_front().unwrap_or(Ok(Vec::new()))
        }
    }

    fn record_json(id: &str, type_id: &str) -> Value {
        let record = Record::new(Metadata::new(id, type_id), json!({}));
        Value::String(record.to_json().unwrap())
    }

    #[tokio::test]
    async fn test_get_falls_back_to_edges() {
        let engine = GremlinEngine::new(RecordingClient::replying(vec![
            Ok(vec![]),
            Ok(vec![record_json("r1", "/relation/connects_to")]),
        ]));

        let found = engine.get(&Id::from("r1")).await.unwrap().unwrap();
        assert_eq!(found.metadata.type_id.as_str(), "/relation/connects_to");

        let sent = engine.client().sent();
        assert!(sent[0].script.starts_with("g.V()"));
        assert!(sent[1].script.starts_with("g.E()"));
    }

    #[tokio::test]
    async fn test_traverse_submits_compiled_plan() {
        let engine = GremlinEngine::new(RecordingClient::replying(vec![Ok(vec![
            record_json("h2", "/entity/host"),
        ])]));
        let plan = TraversalPlan {
            root: Id::from("h1"),
            targets: [Id::from("/entity/host")].into_iter().collect(),
            target_branch: Branch::Entity,
            max_depth: 1,
            direction: Direction::Out,
            constraint: None,
        };

        let found = engine.traverse(&Context::new(), &plan).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].metadata.id.as_str(), "h2");

        let sent = engine.client().sent();
        assert!(sent[0].script.contains("times(1)"));
        assert_eq!(sent[0].bindings["p0"], "h1");
    }

    #[tokio::test]
    async fn test_cancelled_traversal() {
        let engine = GremlinEngine::new(RecordingClient::default());
        let ctx = Context::new();
        ctx.cancel();

        let plan = TraversalPlan {
            root: Id::from("h1"),
            targets: TypeSet::new(),
            target_branch: Branch::Entity,
            max_depth: 2,
            direction: Direction::Out,
            constraint: None,
        };
        assert!(matches!(
            engine.traverse(&ctx, &plan).await,
            Err(Error::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_len_and_server_errors() {
        let engine = GremlinEngine::new(RecordingClient::replying(vec![
            Ok(vec![json!(3)]),
            Ok(vec![json!(2)]),
            Err(EngineError::GremlinStatus {
                code: 500,
                message: "boom".to_string(),
            }),
        ]));

        assert_eq!(engine.len().await.unwrap(), 5);

        let err = engine.get(&Id::from("h1")).await.unwrap_err();
        assert!(err.is_backend());
    }
}
