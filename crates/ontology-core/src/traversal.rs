//! Traversal planning and direct (BFS) evaluation
//!
//! A [`TraversalPlanner`] expands the caller's type IDs into flat membership
//! sets once, producing a [`TraversalPlan`] that every engine evaluates
//! as-is. Engines holding the graph locally run [`walk`] over a
//! [`GraphView`]; engines that compile the plan into a remote query must
//! reach the same instance set.

use crate::error::{Error, Result};
use crate::id::Id;
use crate::instance::Branch;
use crate::limits;
use crate::query::ListFromByTypeOptions;
use crate::registry::{TypeRegistry, TypeSet};
use crate::relation::Direction;
use crate::Context;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// Hops taken when the caller leaves `max_depth` unset
pub const DEFAULT_MAX_DEPTH: u32 = 2;

/// A fully expanded, backend-agnostic traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalPlan {
    pub root: Id,

    /// Type closure results are filtered to
    pub targets: TypeSet,

    /// Whether the targets are relations (edges) or entities (landed nodes)
    pub target_branch: Branch,

    pub max_depth: u32,

    pub direction: Direction,

    /// Types an edge and its landed node must both belong to; `None` is unconstrained
    pub constraint: Option<TypeSet>,
}

impl TraversalPlan {
    /// True if a hop may pass through something of this type
    ///
    /// A missing type (a dangling endpoint) only passes an unconstrained walk.
    pub fn admits(&self, type_id: Option<&Id>) -> bool {
        match (&self.constraint, type_id) {
            (None, _) => true,
            (Some(set), Some(t)) => set.contains(t),
            (Some(_), None) => false,
        }
    }

    pub fn is_target(&self, type_id: &Id) -> bool {
        self.targets.contains(type_id)
    }
}

/// Expands type IDs against a registry and builds traversal plans
#[derive(Debug, Clone)]
pub struct TraversalPlanner {
    registry: Arc<TypeRegistry>,
    default_depth: u32,
}

impl TraversalPlanner {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            default_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_default_depth(mut self, depth: u32) -> Self {
        self.default_depth = depth;
        self
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn default_depth(&self) -> u32 {
        self.default_depth
    }

    /// Expand `type_ids` into one membership set on a single branch
    pub fn expand(&self, type_ids: &[Id], include_subclasses: bool) -> Result<(TypeSet, Branch)> {
        let (first, _) = type_ids
            .split_first()
            .ok_or_else(|| Error::InvalidArgument("at least one type ID is required".to_string()))?;

        let branch = self.branch_for(first)?;
        let mut set = TypeSet::new();

        for type_id in type_ids {
            let this_branch = self.branch_for(type_id)?;
            if this_branch != branch {
                return Err(Error::MixedBranch(format!(
                    "{} is a {} type but {} is a {} type",
                    first, branch, type_id, this_branch
                )));
            }

            if include_subclasses {
                set.extend(self.registry.closure(type_id.as_str()));
            } else {
                set.insert(type_id.clone());
            }
        }

        Ok((set, branch))
    }

    fn branch_for(&self, type_id: &Id) -> Result<Branch> {
        if !self.registry.contains(type_id.as_str()) {
            return Err(Error::UnknownType(type_id.clone()));
        }
        self.registry.branch_of(type_id.as_str()).ok_or_else(|| {
            Error::MixedBranch(format!(
                "{} is on neither the entity nor the relation branch",
                type_id
            ))
        })
    }

    /// Union of each constraining type and its subclasses; empty means unconstrained
    fn constraint(&self, type_ids: &[Id]) -> Result<Option<TypeSet>> {
        if type_ids.is_empty() {
            return Ok(None);
        }

        let mut set = TypeSet::new();
        for type_id in type_ids {
            if !self.registry.contains(type_id.as_str()) {
                return Err(Error::UnknownType(type_id.clone()));
            }
            set.extend(self.registry.closure(type_id.as_str()));
        }
        Ok(Some(set))
    }

    pub fn plan(
        &self,
        root: &Id,
        type_ids: &[Id],
        options: &ListFromByTypeOptions,
    ) -> Result<TraversalPlan> {
        limits::validate_id(root.as_str())?;

        let max_depth = options.max_depth.unwrap_or(self.default_depth);
        limits::validate_traversal_depth(max_depth)?;

        let (targets, target_branch) = self.expand(type_ids, options.include_subclasses)?;
        let constraint = self.constraint(&options.constrain_by_type)?;

        Ok(TraversalPlan {
            root: root.clone(),
            targets,
            target_branch,
            max_depth,
            direction: options.direction,
            constraint,
        })
    }
}

/// One relation seen from the node it departs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRef {
    /// The relation's ID
    pub id: Id,
    /// The relation's type
    pub type_id: Id,
    /// The endpoint a hop along this relation lands on
    pub other: Id,
}

/// Read access to a graph for direct evaluation
pub trait GraphView {
    /// Relations departing `node` in `direction`
    fn edges(&self, node: &Id, direction: Direction) -> Result<Vec<EdgeRef>>;

    /// Type of a stored instance, `None` if nothing is stored under `id`
    fn type_of(&self, id: &Id) -> Result<Option<Id>>;
}

/// Evaluate `plan` breadth-first over `view`
///
/// Returns the IDs of the matching instances in discovery order, each once.
/// Nodes are expanded at their shortest distance from the root, which reaches
/// the same set as following every walk of up to `max_depth` hops.
pub fn walk<G>(ctx: &Context, view: &G, plan: &TraversalPlan) -> Result<Vec<Id>>
where
    G: GraphView + ?Sized,
{
    let mut visited: HashSet<Id> = HashSet::new();
    let mut emitted: HashSet<Id> = HashSet::new();
    let mut results = Vec::new();
    let mut queue: VecDeque<(Id, u32)> = VecDeque::new();

    visited.insert(plan.root.clone());
    queue.push_back((plan.root.clone(), 0));

    let mut edges_traversed = 0usize;

    while let Some((node, depth)) = queue.pop_front() {
        if depth >= plan.max_depth {
            continue;
        }
        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }

        for edge in view.edges(&node, plan.direction)? {
            if !plan.admits(Some(&edge.type_id)) {
                continue;
            }
            let landed_type = view.type_of(&edge.other)?;
            if !plan.admits(landed_type.as_ref()) {
                continue;
            }

            edges_traversed += 1;

            if plan.target_branch == Branch::Relation
                && plan.is_target(&edge.type_id)
                && emitted.insert(edge.id.clone())
            {
                results.push(edge.id.clone());
            }

            if visited.insert(edge.other.clone()) {
                if plan.target_branch == Branch::Entity {
                    if let Some(t) = &landed_type {
                        if plan.is_target(t) && emitted.insert(edge.other.clone()) {
                            results.push(edge.other.clone());
                        }
                    }
                }
                queue.push_back((edge.other, depth + 1));
            }
        }
    }

    tracing::debug!(
        "Traversal from {} ({}, depth {}) crossed {} edges, {} results",
        plan.root,
        plan.direction,
        plan.max_depth,
        edges_traversed,
        results.len()
    );

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::registry::{ENTITY_TYPE, RELATION_TYPE};
    use crate::relation::{Endpoints, Relation};
    use std::collections::HashMap;

    struct TestGraph {
        types: HashMap<Id, Id>,
        relations: Vec<(Id, Id, Endpoints)>,
    }

    impl TestGraph {
        fn new() -> Self {
            Self {
                types: HashMap::new(),
                relations: Vec::new(),
            }
        }

        fn node(mut self, id: &str, type_id: &str) -> Self {
            self.types.insert(Id::from(id), Id::from(type_id));
            self
        }

        fn edge(mut self, id: &str, type_id: &str, a: &str, b: &str) -> Self {
            self.types.insert(Id::from(id), Id::from(type_id));
            self.relations
                .push((Id::from(id), Id::from(type_id), Endpoints::new(a, b)));
            self
        }
    }

    impl GraphView for TestGraph {
        fn edges(&self, node: &Id, direction: Direction) -> Result<Vec<EdgeRef>> {
            Ok(self
                .relations
                .iter()
                .filter(|(_, _, ends)| ends.departure(direction) == node)
                .map(|(id, type_id, ends)| EdgeRef {
                    id: id.clone(),
                    type_id: type_id.clone(),
                    other: ends.landing(direction).clone(),
                })
                .collect())
        }

        fn type_of(&self, id: &Id) -> Result<Option<Id>> {
            Ok(self.types.get(id).cloned())
        }
    }

    fn registry() -> Arc<TypeRegistry> {
        Arc::new(
            TypeRegistry::builder()
                .with_core_types()
                .register::<Entity>("/entity/host", Some(ENTITY_TYPE))
                .register::<Entity>("/entity/service", Some(ENTITY_TYPE))
                .register::<Entity>("/entity/orphan", None)
                .register::<Relation>("/relation/connects_to", Some(RELATION_TYPE))
                .register::<Relation>("/relation/runs", Some(RELATION_TYPE))
                .build()
                .unwrap(),
        )
    }

    fn ids(list: &[&str]) -> Vec<Id> {
        list.iter().map(|s| Id::from(*s)).collect()
    }

    fn sorted(mut found: Vec<Id>) -> Vec<String> {
        found.sort();
        found.into_iter().map(|id| id.to_string()).collect()
    }

    // h1 -> h2 -> h3, plus h1 -> h3 directly and h3 -runs-> s1
    fn chain() -> TestGraph {
        TestGraph::new()
            .node("h1", "/entity/host")
            .node("h2", "/entity/host")
            .node("h3", "/entity/host")
            .node("s1", "/entity/service")
            .edge("r12", "/relation/connects_to", "h1", "h2")
            .edge("r23", "/relation/connects_to", "h2", "h3")
            .edge("r13", "/relation/connects_to", "h1", "h3")
            .edge("r3s", "/relation/runs", "h3", "s1")
    }

    fn plan(
        planner: &TraversalPlanner,
        root: &str,
        types: &[&str],
        options: ListFromByTypeOptions,
    ) -> TraversalPlan {
        planner.plan(&Id::from(root), &ids(types), &options).unwrap()
    }

    #[test]
    fn test_expand_rejects_bad_type_sets() {
        let planner = TraversalPlanner::new(registry());

        assert!(matches!(planner.expand(&[], true), Err(Error::InvalidArgument(_))));
        assert!(matches!(
            planner.expand(&ids(&["/entity/ghost"]), true),
            Err(Error::UnknownType(_))
        ));
        assert!(matches!(
            planner.expand(&ids(&["/entity/host", "/relation/runs"]), false),
            Err(Error::MixedBranch(_))
        ));
        assert!(matches!(
            planner.expand(&ids(&["/entity/orphan"]), false),
            Err(Error::MixedBranch(_))
        ));
    }

    #[test]
    fn test_expand_with_subclasses() {
        let planner = TraversalPlanner::new(registry());
        let (set, branch) = planner.expand(&ids(&[ENTITY_TYPE]), true).unwrap();

        assert_eq!(branch, Branch::Entity);
        assert!(set.contains("/entity/host"));
        assert!(set.contains(ENTITY_TYPE));

        let (exact, _) = planner.expand(&ids(&[ENTITY_TYPE]), false).unwrap();
        assert_eq!(exact.len(), 1);
    }

    #[test]
    fn test_plan_depth_defaults_and_limits() {
        let planner = TraversalPlanner::new(registry());
        let defaulted = plan(&planner, "h1", &[ENTITY_TYPE], ListFromByTypeOptions::new());
        assert_eq!(defaulted.max_depth, DEFAULT_MAX_DEPTH);
        assert!(defaulted.constraint.is_none());

        let configured = TraversalPlanner::new(registry()).with_default_depth(4);
        assert_eq!(
            plan(&configured, "h1", &[ENTITY_TYPE], ListFromByTypeOptions::new()).max_depth,
            4
        );

        let too_deep = planner.plan(
            &Id::from("h1"),
            &ids(&[ENTITY_TYPE]),
            &ListFromByTypeOptions::new().with_max_depth(limits::MAX_TRAVERSAL_DEPTH + 1),
        );
        assert!(matches!(too_deep, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_walk_respects_depth() {
        let planner = TraversalPlanner::new(registry());
        let graph = chain();
        let ctx = Context::new();

        let depth = |d| ListFromByTypeOptions::new().with_subclasses().with_max_depth(d);

        let none = plan(&planner, "h1", &[ENTITY_TYPE], depth(0));
        assert!(walk(&ctx, &graph, &none).unwrap().is_empty());

        let one = plan(&planner, "h1", &[ENTITY_TYPE], depth(1));
        assert_eq!(sorted(walk(&ctx, &graph, &one).unwrap()), vec!["h2", "h3"]);

        let two = plan(&planner, "h1", &[ENTITY_TYPE], depth(2));
        assert_eq!(sorted(walk(&ctx, &graph, &two).unwrap()), vec!["h2", "h3", "s1"]);
    }

    #[test]
    fn test_walk_relations_dedup() {
        let planner = TraversalPlanner::new(registry());
        let options = ListFromByTypeOptions::new().with_subclasses().with_max_depth(3);
        let relations = plan(&planner, "h1", &[RELATION_TYPE], options);

        let found = walk(&Context::new(), &chain(), &relations).unwrap();
        assert_eq!(sorted(found), vec!["r12", "r13", "r23", "r3s"]);
    }

    #[test]
    fn test_walk_direction_symmetry() {
        let planner = TraversalPlanner::new(registry());
        let graph = chain();
        let ctx = Context::new();

        let out = plan(
            &planner,
            "h1",
            &["/entity/host"],
            ListFromByTypeOptions::new().with_max_depth(1),
        );
        let back = plan(
            &planner,
            "h2",
            &["/entity/host"],
            ListFromByTypeOptions::new().with_max_depth(1).with_direction(Direction::In),
        );

        assert!(walk(&ctx, &graph, &out).unwrap().contains(&Id::from("h2")));
        assert_eq!(sorted(walk(&ctx, &graph, &back).unwrap()), vec!["h1"]);
    }

    #[test]
    fn test_walk_constraint_applies_to_edges_and_nodes() {
        let planner = TraversalPlanner::new(registry());
        let graph = chain();
        let ctx = Context::new();

        // runs edges are excluded, so s1 is unreachable
        let by_edge = plan(
            &planner,
            "h1",
            &[ENTITY_TYPE],
            ListFromByTypeOptions::new()
                .with_subclasses()
                .with_max_depth(5)
                .constrained_by("/relation/connects_to")
                .constrained_by("/entity/host"),
        );
        assert_eq!(sorted(walk(&ctx, &graph, &by_edge).unwrap()), vec!["h2", "h3"]);

        // hosts are not admitted as landing nodes
        let by_node = plan(
            &planner,
            "h1",
            &[ENTITY_TYPE],
            ListFromByTypeOptions::new()
                .with_subclasses()
                .constrained_by(RELATION_TYPE)
                .constrained_by("/entity/service"),
        );
        assert!(walk(&ctx, &graph, &by_node).unwrap().is_empty());
    }

    #[test]
    fn test_walk_never_emits_root() {
        let planner = TraversalPlanner::new(registry());
        let graph = chain().edge("r31", "/relation/connects_to", "h3", "h1");
        let options = ListFromByTypeOptions::new().with_subclasses().with_max_depth(4);
        let plan = plan(&planner, "h1", &[ENTITY_TYPE], options);

        let found = walk(&Context::new(), &graph, &plan).unwrap();
        assert!(!found.contains(&Id::from("h1")));
    }

    #[test]
    fn test_walk_through_dangling_endpoint() {
        let planner = TraversalPlanner::new(registry());
        let graph = TestGraph::new()
            .node("h1", "/entity/host")
            .node("h9", "/entity/host")
            .edge("r1", "/relation/connects_to", "h1", "ghost")
            .edge("r2", "/relation/connects_to", "ghost", "h9");
        let ctx = Context::new();

        let options = ListFromByTypeOptions::new().with_subclasses();
        let open = plan(&planner, "h1", &[ENTITY_TYPE], options);
        assert_eq!(sorted(walk(&ctx, &graph, &open).unwrap()), vec!["h9"]);

        let constrained = plan(
            &planner,
            "h1",
            &[ENTITY_TYPE],
            ListFromByTypeOptions::new()
                .with_subclasses()
                .constrained_by(RELATION_TYPE)
                .constrained_by(ENTITY_TYPE),
        );
        assert!(walk(&ctx, &graph, &constrained).unwrap().is_empty());
    }

    #[test]
    fn test_walk_cancelled() {
        let planner = TraversalPlanner::new(registry());
        let options = ListFromByTypeOptions::new().with_subclasses();
        let plan = plan(&planner, "h1", &[ENTITY_TYPE], options);
        let ctx = Context::new();
        ctx.cancel();

        assert!(matches!(walk(&ctx, &chain(), &plan), Err(Error::Cancelled)));
    }
}
