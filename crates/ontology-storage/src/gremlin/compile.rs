//! Compiles store operations into Gremlin queries
//!
//! Graph encoding: instance vertices carry the label `instance`, relation
//! edges the label `relation`. Both hold `iid`, `type`, `name` and `record`
//! (the full JSON record). A relation whose endpoint has not been stored yet
//! creates a placeholder vertex holding only `iid`.

use super::lang::{anon, g, Bindings, Order, Predicate, Traversal};
use crate::engine::StoredRecord;
use ontology_core::{
    Branch, Direction, Error, Id, ListOptions, Result, SortField, SortOrder, TraversalPlan,
    TypeSet,
};
use serde_json::Value;

pub const VERTEX_LABEL: &str = "instance";
pub const EDGE_LABEL: &str = "relation";

pub const IID: &str = "iid";
pub const TYPE: &str = "type";
pub const NAME: &str = "name";
pub const RECORD: &str = "record";

/// A script plus the parameters it references
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub script: String,
    pub bindings: Bindings,
}

impl Query {
    pub fn new(traversal: &Traversal) -> Self {
        Self::statements(std::slice::from_ref(traversal))
    }

    /// Several traversals run in order as one script
    pub fn statements(traversals: &[Traversal]) -> Self {
        let mut bindings = Bindings::new();
        let script = traversals
            .iter()
            .map(|t| t.render(&mut bindings))
            .collect::<Vec<_>>()
            .join(";\n");
        Self { script, bindings }
    }
}

fn type_set(types: &TypeSet) -> Predicate {
    Predicate::within(types.iter().map(|t| t.as_str()))
}

/// `g.V()` narrowed to the vertex for `id`, creating a placeholder if missing
fn vertex_or_placeholder(id: &Id) -> Traversal {
    g().v()
        .has_label(VERTEX_LABEL)
        .has_eq(IID, id.as_str())
        .fold()
        .coalesce(vec![
            anon().unfold(),
            anon().add_v(VERTEX_LABEL).property(IID, id.as_str()),
        ])
}

/// Insert or replace an instance
pub fn upsert(stored: &StoredRecord) -> Result<Query> {
    let meta = &stored.record.metadata;
    let record = stored.record.to_json()?;

    let Some(ends) = &stored.endpoints else {
        let vertex = vertex_or_placeholder(&meta.id)
            .property_single(TYPE, meta.type_id.as_str())
            .property_single(NAME, meta.name.as_str())
            .property_single(RECORD, record)
            .iterate();
        return Ok(Query::new(&vertex));
    };

    // An edge's endpoints are fixed at creation, so a replaced relation is re-created
    let drop_previous = g()
        .e()
        .has_label(EDGE_LABEL)
        .has_eq(IID, meta.id.as_str())
        .drop_elements()
        .iterate();
    let departure = vertex_or_placeholder(&ends.a).iterate();
    let landing = vertex_or_placeholder(&ends.b).iterate();
    let edge = g()
        .v()
        .has_label(VERTEX_LABEL)
        .has_eq(IID, ends.a.as_str())
        .add_e(EDGE_LABEL)
        .to(anon()
            .v()
            .has_label(VERTEX_LABEL)
            .has_eq(IID, ends.b.as_str()))
        .property(IID, meta.id.as_str())
        .property(TYPE, meta.type_id.as_str())
        .property(NAME, meta.name.as_str())
        .property(RECORD, record)
        .iterate();

    Ok(Query::statements(&[drop_previous, departure, landing, edge]))
}

/// Stored vertex record for `id`; placeholders have no record and never match
pub fn get_vertex(id: &Id) -> Query {
    Query::new(
        &g().v()
            .has_label(VERTEX_LABEL)
            .has_eq(IID, id.as_str())
            .values(RECORD),
    )
}

pub fn get_edge(id: &Id) -> Query {
    Query::new(
        &g().e()
            .has_label(EDGE_LABEL)
            .has_eq(IID, id.as_str())
            .values(RECORD),
    )
}

/// Append ordering and paging to a traversal
fn paged(traversal: Traversal, list: &ListOptions) -> Result<Traversal> {
    let order = match list.sort_order {
        SortOrder::Ascending => Order::Asc,
        SortOrder::Descending => Order::Desc,
    };

    let ordered = match list.sort_field {
        SortField::Id => traversal.order().by(IID, order),
        SortField::Name => traversal.order().by(NAME, order).by(IID, order),
        SortField::UpdatedAt => {
            return Err(Error::Unimplemented(
                "the gremlin engine cannot sort by updated_at".to_string(),
            ))
        }
    };

    let high = list.number_of_results.map(|n| list.offset + n);
    Ok(ordered.range(list.offset, high))
}

/// Vertices or edges whose type is in `types`
pub fn list_by_types(types: &TypeSet, branch: Branch, list: &ListOptions) -> Result<Query> {
    let elements = match branch {
        Branch::Entity => g().v().has_label(VERTEX_LABEL),
        Branch::Relation => g().e().has_label(EDGE_LABEL),
    };

    let traversal = paged(elements.has(TYPE, type_set(types)), list)?.values(RECORD);
    Ok(Query::new(&traversal))
}

/// Edges of `types` with `id` on either side
pub fn relations_of(id: &Id, types: &TypeSet, list: &ListOptions) -> Result<Query> {
    let edges = g()
        .v()
        .has_label(VERTEX_LABEL)
        .has_eq(IID, id.as_str())
        .both_e(EDGE_LABEL)
        .has(TYPE, type_set(types))
        .dedup();

    let traversal = paged(edges, list)?.values(RECORD);
    Ok(Query::new(&traversal))
}

/// Count of stored vertices, placeholders excluded
pub fn count_vertices() -> Query {
    Query::new(&g().v().has_label(VERTEX_LABEL).has_key(TYPE).count())
}

pub fn count_edges() -> Query {
    Query::new(&g().e().has_label(EDGE_LABEL).count())
}

/// The repeated hop clause plus target filtering for a plan
///
/// Every walk of up to `max_depth` hops is followed. Each hop crosses an edge
/// of the constrained set and lands on a vertex of the constrained set; the
/// walked paths are unfolded and filtered down to the targets.
pub fn traversal(plan: &TraversalPlan) -> Traversal {
    let mut hop = match plan.direction {
        Direction::Out => anon().out_e(EDGE_LABEL),
        Direction::In => anon().in_e(EDGE_LABEL),
    };
    if let Some(constraint) = &plan.constraint {
        hop = hop.has(TYPE, type_set(constraint));
    }
    hop = match plan.direction {
        Direction::Out => hop.in_v(),
        Direction::In => hop.out_v(),
    };
    if let Some(constraint) = &plan.constraint {
        hop = hop.has(TYPE, type_set(constraint));
    }

    let walked = g()
        .v()
        .has_label(VERTEX_LABEL)
        .has_eq(IID, plan.root.as_str())
        .repeat(hop)
        .emit()
        .times(plan.max_depth)
        .path()
        .unfold();

    let targets = match plan.target_branch {
        Branch::Relation => walked
            .has_label(EDGE_LABEL)
            .has(TYPE, type_set(&plan.targets)),
        Branch::Entity => walked
            .has_label(VERTEX_LABEL)
            .has(TYPE, type_set(&plan.targets))
            .has(IID, Predicate::Neq(Value::from(plan.root.as_str()))),
    };

    targets.dedup().values(RECORD)
}
