//! Filter plans and the engine that applies them to a mutable store.
use std::fmt;
use std::sync::Arc;

use infragraph_core::{EdgeId, MutableStore, Node, NodeId, Store, TraversalOrder, Uuid};
use infragraph_error::Result;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};
use tracing::{debug, trace};

use crate::preset;
use crate::reroot::reroot;

pub type NodePredicate = Arc<dyn Fn(&Store, NodeId) -> bool + Send + Sync>;
pub type EdgePredicate = Arc<dyn Fn(&Store, EdgeId) -> bool + Send + Sync>;
pub type StoreFilterFn = Arc<dyn Fn(&mut MutableStore) -> Result<()> + Send + Sync>;
pub type RootResolver = Arc<dyn Fn(&Store) -> Option<NodeId> + Send + Sync>;

/// What happens to a node a filter rejects. Rejected edges are always pruned.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterStrategy {
    /// Destroy the node and its subtree.
    #[default]
    Prune,
    /// Collapse the node's children into it.
    Collapse,
    /// Collapse the node into its parent.
    CollapseToParent,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FilterPreset {
    Compact,
    NonExtraneous,
    None,
}

impl FilterPreset {
    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }
}

/// Node and/or edge predicate applied with a strategy.
///
/// A predicate returning `true` keeps the entity. With `inverse` the
/// matches are removed instead.
#[derive(Clone, Default)]
pub struct GraphFilter {
    pub node: Option<NodePredicate>,
    pub edge: Option<EdgePredicate>,
    pub inverse: bool,
    pub strategy: FilterStrategy,
    /// Overrides the plan's `all_nodes` for this filter.
    pub all_nodes: Option<bool>,
}

impl GraphFilter {
    pub fn nodes(predicate: impl Fn(&Store, NodeId) -> bool + Send + Sync + 'static) -> Self {
        Self {
            node: Some(Arc::new(predicate)),
            ..Default::default()
        }
    }

    pub fn edges(predicate: impl Fn(&Store, EdgeId) -> bool + Send + Sync + 'static) -> Self {
        Self {
            edge: Some(Arc::new(predicate)),
            ..Default::default()
        }
    }

    pub fn with_inverse(mut self, inverse: bool) -> Self {
        self.inverse = inverse;
        self
    }

    pub fn with_strategy(mut self, strategy: FilterStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_all_nodes(mut self, all_nodes: bool) -> Self {
        self.all_nodes = Some(all_nodes);
        self
    }

    /// Whether an entity with this predicate result is removed.
    fn rejects(&self, matched: bool) -> bool {
        matched == self.inverse
    }
}

impl fmt::Debug for GraphFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphFilter")
            .field("node", &self.node.is_some())
            .field("edge", &self.edge.is_some())
            .field("inverse", &self.inverse)
            .field("strategy", &self.strategy)
            .field("all_nodes", &self.all_nodes)
            .finish()
    }
}

#[derive(Clone)]
pub enum Filter {
    Graph(GraphFilter),
    /// Arbitrary rewrite of the whole store.
    Store(StoreFilterFn),
}

impl Filter {
    pub fn store(filter: impl Fn(&mut MutableStore) -> Result<()> + Send + Sync + 'static) -> Self {
        Filter::Store(Arc::new(filter))
    }
}

impl From<GraphFilter> for Filter {
    fn from(filter: GraphFilter) -> Self {
        Filter::Graph(filter)
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Graph(filter) => f.debug_tuple("Graph").field(filter).finish(),
            Filter::Store(_) => f.write_str("Store(..)"),
        }
    }
}

/// Node the graph is focused on.
#[derive(Clone)]
pub enum RootSelector {
    Uuid(Uuid),
    Resolve(RootResolver),
}

impl RootSelector {
    pub fn resolve(&self, store: &Store) -> Result<Option<NodeId>> {
        match self {
            RootSelector::Uuid(uuid) => store.get_node(uuid.as_str()).map(Some),
            RootSelector::Resolve(resolver) => Ok(resolver(store)),
        }
    }
}

impl fmt::Debug for RootSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootSelector::Uuid(uuid) => f.debug_tuple("Uuid").field(uuid).finish(),
            RootSelector::Resolve(_) => f.write_str("Resolve(..)"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterPlan {
    pub preset: Option<FilterPreset>,
    pub root: Option<RootSelector>,
    /// Move the root directly under the store root and drop everything else.
    pub hoist_root: bool,
    pub filters: Vec<Filter>,
    /// Offer every node to node predicates, not only resource-like ones.
    pub all_nodes: bool,
    pub order: TraversalOrder,
}

impl FilterPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preset(mut self, preset: FilterPreset) -> Self {
        self.preset = Some(preset);
        self
    }

    pub fn with_root(mut self, root: RootSelector) -> Self {
        self.root = Some(root);
        self
    }

    pub fn with_hoist_root(mut self, hoist_root: bool) -> Self {
        self.hoist_root = hoist_root;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<Filter>) -> Self {
        self.filters.push(filter.into());
        self
    }

    pub fn with_all_nodes(mut self, all_nodes: bool) -> Self {
        self.all_nodes = all_nodes;
        self
    }

    pub fn with_order(mut self, order: TraversalOrder) -> Self {
        self.order = order;
        self
    }
}

/// Apply `plan` to `store`: focus on the root, run the preset, then every
/// filter in order.
#[tracing::instrument(skip_all, fields(preset = ?plan.preset, filters = plan.filters.len()))]
pub fn apply_filter_plan(store: &mut MutableStore, plan: &FilterPlan) -> Result<()> {
    store.verify_destructive_mutation_allowed()?;

    if let Some(selector) = &plan.root
        && let Some(root) = selector.resolve(store.as_store())?
    {
        reroot(store, root, plan.hoist_root)?;
    }

    if let Some(preset) = plan.preset {
        preset::apply_preset(store, preset)?;
    }

    for filter in &plan.filters {
        match filter {
            Filter::Store(filter) => filter(store)?,
            Filter::Graph(filter) => apply_graph_filter(store, filter, plan)?,
        }
    }

    let counts = store.counts();
    debug!(nodes = counts.nodes, edges = counts.edges, "filter plan applied");
    Ok(())
}

fn apply_graph_filter(
    store: &mut MutableStore,
    filter: &GraphFilter,
    plan: &FilterPlan,
) -> Result<()> {
    if let Some(predicate) = &filter.node {
        let all_nodes = filter.all_nodes.unwrap_or(plan.all_nodes);
        let candidates: Vec<NodeId> = store
            .find_all(plan.order)
            .into_iter()
            .filter(|id| all_nodes || store.node(*id).is_ok_and(Node::is_resource_like))
            .collect();

        for id in candidates {
            if !store.contains_node(id) {
                continue;
            }
            if !filter.rejects(predicate(store.as_store(), id)) {
                continue;
            }
            trace!(%id, strategy = %filter.strategy, "node rejected");
            match filter.strategy {
                FilterStrategy::Prune => store.destroy_node(id, false)?,
                FilterStrategy::Collapse => store.collapse_node(id)?,
                FilterStrategy::CollapseToParent => {
                    store.collapse_to_parent(id)?;
                }
            }
        }
    }

    if let Some(predicate) = &filter.edge {
        let edges: Vec<EdgeId> = store.edges().map(|(id, _)| id).collect();
        for id in edges {
            if store.contains_edge(id) && filter.rejects(predicate(store.as_store(), id)) {
                trace!(%id, "edge rejected");
                store.destroy_edge(id)?;
            }
        }
    }

    Ok(())
}
