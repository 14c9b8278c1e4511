//! The store: typed instances over any engine

use crate::broadcast::{Broadcast, Subscription, DEFAULT_DELIVERY_TIMEOUT};
use crate::engine::{Engine, StoredRecord};
use async_trait::async_trait;
use ontology_core::{
    limits, Branch, Context, DynInstance, Entity, Error, Id, ListByTypeOptions,
    ListFromByTypeOptions, ListOptions, Properties, Record, Relation, Result, TraversalPlanner,
    TypeRegistry, RELATION_TYPE,
};
use std::sync::Arc;
use std::time::Duration;

/// Operations every store offers, whatever engine backs it
#[async_trait]
pub trait Store: Send + Sync {
    /// The type forest records are dispatched through
    fn registry(&self) -> &Arc<TypeRegistry>;

    /// Insert or replace each instance by ID, notifying watchers as each lands
    ///
    /// Not atomic: instances applied before a failure stay applied.
    async fn add(&self, ctx: &Context, instances: Vec<DynInstance>) -> Result<()>;

    async fn get(&self, ctx: &Context, id: &Id) -> Result<DynInstance>;

    /// Instances whose type is one of `type_ids` (or a subclass, if asked)
    async fn list_by_type(
        &self,
        ctx: &Context,
        type_ids: &[Id],
        options: &ListByTypeOptions,
    ) -> Result<Vec<DynInstance>>;

    /// Instances of `type_ids` reachable from `root` by a bounded walk
    async fn list_from_by_type(
        &self,
        ctx: &Context,
        root: &Id,
        type_ids: &[Id],
        options: &ListFromByTypeOptions,
    ) -> Result<Vec<DynInstance>>;

    /// Relations with `entity` on either side, limited to `relation_type` and
    /// its subclasses (`/relation` when `None`)
    async fn list_relations_for_entity(
        &self,
        ctx: &Context,
        entity: &Id,
        relation_type: Option<&Id>,
        list: &ListOptions,
    ) -> Result<Vec<DynInstance>>;

    async fn len(&self, ctx: &Context) -> Result<usize>;

    /// Instances added with `type_id` or any of its subclasses, until `ctx` ends
    async fn watch_by_type(&self, ctx: &Context, type_id: &Id) -> Result<Subscription>;

    /// Instances added under `id`, until `ctx` ends
    async fn watch_by_id(&self, ctx: &Context, id: &Id) -> Result<Subscription>;
}

fn check(ctx: &Context) -> Result<()> {
    if ctx.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}

/// [`Store`] over a backing [`Engine`]
///
/// Validation, type expansion, dispatch and broadcasting happen here so every
/// engine behaves the same.
pub struct GraphStore<E> {
    engine: E,
    planner: TraversalPlanner,
    by_type: Broadcast,
    by_id: Broadcast,
}

impl<E: Engine> GraphStore<E> {
    pub fn new(engine: E, registry: Arc<TypeRegistry>) -> Self {
        Self {
            engine,
            planner: TraversalPlanner::new(registry),
            by_type: Broadcast::new(DEFAULT_DELIVERY_TIMEOUT),
            by_id: Broadcast::new(DEFAULT_DELIVERY_TIMEOUT),
        }
    }

    /// Hops taken when a traversal leaves `max_depth` unset
    pub fn with_default_depth(mut self, depth: u32) -> Self {
        self.planner = self.planner.with_default_depth(depth);
        self
    }

    /// How long a broadcast waits on one watcher before skipping it
    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.by_type = Broadcast::new(timeout);
        self.by_id = Broadcast::new(timeout);
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Turn a stored record back into a typed instance
    ///
    /// Records of unregistered types come back in the free-form shape of
    /// their branch.
    fn materialize(&self, record: Record) -> Result<DynInstance> {
        let registry = self.planner.registry();
        if registry.contains(record.metadata.type_id.as_str()) {
            return registry.dispatch_record(record);
        }

        tracing::debug!(
            "No shape registered for {}, returning {} untyped",
            record.metadata.type_id,
            record.metadata.id
        );
        let value = record.into_value()?;
        if value["properties"].get("a").is_some() && value["properties"].get("b").is_some() {
            let relation: Relation<Properties> = serde_json::from_value(value)?;
            Ok(Arc::new(relation))
        } else {
            let entity: Entity<Properties> = serde_json::from_value(value)?;
            Ok(Arc::new(entity))
        }
    }

    fn materialize_all(&self, records: Vec<Record>) -> Result<Vec<DynInstance>> {
        records.into_iter().map(|r| self.materialize(r)).collect()
    }

    /// Keys an instance of `type_id` is broadcast under on the type channel
    fn type_keys(&self, type_id: &Id) -> Vec<Id> {
        let ancestors = self.planner.registry().ancestors(type_id.as_str());
        if ancestors.is_empty() {
            vec![type_id.clone()]
        } else {
            ancestors
        }
    }
}

#[async_trait]
impl<E: Engine> Store for GraphStore<E> {
    fn registry(&self) -> &Arc<TypeRegistry> {
        self.planner.registry()
    }

    async fn add(&self, ctx: &Context, instances: Vec<DynInstance>) -> Result<()> {
        for instance in instances {
            check(ctx)?;
            limits::validate_id(instance.id().as_str())?;
            limits::validate_id(instance.instance_type().as_str())?;

            let stored = StoredRecord::from_instance(instance.as_ref())?;
            self.engine.upsert(&stored).await?;
            tracing::debug!(
                "Stored {} ({}) in {}",
                stored.id(),
                stored.type_id(),
                self.engine.name()
            );

            self.by_id
                .send(ctx, &instance, std::slice::from_ref(instance.id()))
                .await;
            self.by_type
                .send(ctx, &instance, &self.type_keys(instance.instance_type()))
                .await;
        }
        Ok(())
    }

    async fn get(&self, ctx: &Context, id: &Id) -> Result<DynInstance> {
        check(ctx)?;
        limits::validate_id(id.as_str())?;

        match self.engine.get(id).await? {
            Some(record) => self.materialize(record),
            None => Err(Error::NotFound(id.clone())),
        }
    }

    async fn list_by_type(
        &self,
        ctx: &Context,
        type_ids: &[Id],
        options: &ListByTypeOptions,
    ) -> Result<Vec<DynInstance>> {
        check(ctx)?;
        options.list.validate()?;

        let (types, branch) = self.planner.expand(type_ids, options.include_subclasses)?;
        let records = self
            .engine
            .list_by_types(&types, branch, &options.list)
            .await?;

        self.materialize_all(records)
    }

    async fn list_from_by_type(
        &self,
        ctx: &Context,
        root: &Id,
        type_ids: &[Id],
        options: &ListFromByTypeOptions,
    ) -> Result<Vec<DynInstance>> {
        check(ctx)?;
        options.list.validate()?;

        let plan = self.planner.plan(root, type_ids, options)?;
        if self.engine.get(root).await?.is_none() {
            return Err(Error::NotFound(root.clone()));
        }
        if plan.max_depth == 0 {
            return Ok(Vec::new());
        }

        tracing::debug!(
            "Traversing {} from {} up to {} hops for {} target types",
            plan.direction,
            plan.root,
            plan.max_depth,
            plan.targets.len()
        );

        let records = self.engine.traverse(ctx, &plan).await?;
        let page = options.list.apply(records, |r| &r.metadata);

        self.materialize_all(page)
    }

    async fn list_relations_for_entity(
        &self,
        ctx: &Context,
        entity: &Id,
        relation_type: Option<&Id>,
        list: &ListOptions,
    ) -> Result<Vec<DynInstance>> {
        check(ctx)?;
        limits::validate_id(entity.as_str())?;
        list.validate()?;

        let registry = self.planner.registry();
        let relation_type = relation_type.map_or(RELATION_TYPE, Id::as_str);
        if !registry.contains(relation_type) {
            return Err(Error::UnknownType(Id::from(relation_type)));
        }
        if registry.branch_of(relation_type) != Some(Branch::Relation) {
            return Err(Error::InvalidArgument(format!(
                "{} is not a relation type",
                relation_type
            )));
        }

        let types = registry.closure(relation_type);
        let records = self.engine.relations_of(entity, &types, list).await?;

        self.materialize_all(records)
    }

    async fn len(&self, ctx: &Context) -> Result<usize> {
        check(ctx)?;
        self.engine.len().await
    }

    async fn watch_by_type(&self, ctx: &Context, type_id: &Id) -> Result<Subscription> {
        limits::validate_id(type_id.as_str())?;
        if !self.planner.registry().contains(type_id.as_str()) {
            return Err(Error::UnknownType(type_id.clone()));
        }
        self.by_type.register(ctx, type_id.clone())
    }

    async fn watch_by_id(&self, ctx: &Context, id: &Id) -> Result<Subscription> {
        limits::validate_id(id.as_str())?;
        self.by_id.register(ctx, id.clone())
    }
}
