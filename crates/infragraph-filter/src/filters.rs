//! Reusable filters built on the plan engine.
//!
//! Functions returning [`Filter`] are meant to be pushed onto a
//! [`FilterPlan`](crate::FilterPlan). The `*_nodes` / `*_edges` functions
//! taking a [`MutableStore`] do the actual rewrite and are shared with the
//! presets.
use std::collections::HashSet;

use infragraph_core::{MutableStore, Node, NodeId, NodeType, Store, TraversalOrder};
use infragraph_error::{Error, Result};
use regex::Regex;
use tracing::trace;

use crate::plan::{Filter, FilterPreset, GraphFilter};
use crate::preset::apply_preset;

/// Match against a resource type.
#[derive(Debug, Clone)]
pub enum CfnTypePattern {
    Exact(String),
    Regex(Regex),
}

impl CfnTypePattern {
    pub fn exact(value: impl Into<String>) -> Self {
        CfnTypePattern::Exact(value.into())
    }

    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(CfnTypePattern::Regex)
            .map_err(|e| {
                Error::invalid_argument(format!("invalid resource type pattern '{pattern}'"))
                    .set_source(e)
            })
    }

    pub fn is_match(&self, input: &str) -> bool {
        match self {
            CfnTypePattern::Exact(value) => value == input,
            CfnTypePattern::Regex(regex) => regex.is_match(input),
        }
    }
}

impl From<&str> for CfnTypePattern {
    fn from(value: &str) -> Self {
        CfnTypePattern::exact(value)
    }
}

impl From<Regex> for CfnTypePattern {
    fn from(value: Regex) -> Self {
        CfnTypePattern::Regex(value)
    }
}

/// Live nodes matching `predicate`, in post-order.
fn collect_post_order(store: &Store, predicate: impl Fn(&Node) -> bool) -> Vec<NodeId> {
    store
        .find_all(TraversalOrder::PostOrder)
        .into_iter()
        .filter(|id| store.node(*id).is_ok_and(&predicate))
        .collect()
}

/// Fold every extraneous node into its nearest non-extraneous ancestor, or
/// destroy it when that ancestor is a graph container.
pub fn prune_extraneous_nodes(store: &mut MutableStore) -> Result<()> {
    for id in collect_post_order(store, Node::is_extraneous) {
        if !store.contains_node(id) {
            continue;
        }
        let keeper = store
            .find_ancestor(id, |n| !n.is_extraneous(), None)
            .filter(|ancestor| store.node(*ancestor).is_ok_and(|n| !n.is_graph_container()));
        match keeper {
            Some(ancestor) => {
                store.collapse_to(id, ancestor)?;
            }
            None => store.destroy_node(id, false)?,
        }
    }
    Ok(())
}

/// Collapse the top-most framework owned nodes into themselves.
pub fn collapse_cdk_owned_nodes(store: &mut MutableStore) -> Result<()> {
    let owned: Vec<NodeId> = collect_post_order(store, Node::is_cdk_owned)
        .into_iter()
        .filter(|id| {
            store
                .node(*id)
                .ok()
                .and_then(Node::parent)
                .and_then(|parent| store.node(parent).ok())
                .is_none_or(|parent| !parent.is_cdk_owned())
        })
        .collect();
    for id in owned {
        if store.contains_node(id) {
            store.collapse_node(id)?;
        }
    }
    Ok(())
}

/// Merge every resource wrapper with the leaf resource it wraps.
pub fn collapse_wrapper_nodes(store: &mut MutableStore) -> Result<()> {
    let resources = collect_post_order(store, |n| n.node_type() == NodeType::Resource);
    for id in resources {
        let Ok(node) = store.node(id) else {
            continue;
        };
        if node.is_resource_wrapper() {
            store.collapse_node(id)?;
        } else if let Some(leaf) = store.cfn_resource_of(id) {
            store.collapse_to_parent(leaf)?;
        }
    }
    Ok(())
}

pub fn destroy_extraneous_edges(store: &mut MutableStore) -> Result<()> {
    let extraneous: Vec<_> = store
        .edges()
        .filter(|(_, edge)| edge.is_extraneous())
        .map(|(id, _)| id)
        .collect();
    trace!(count = extraneous.len(), "destroying extraneous edges");
    for id in extraneous {
        if store.contains_edge(id) {
            store.destroy_edge(id)?;
        }
    }
    Ok(())
}

/// Hoist the children of every matching cluster and fold the cluster away.
/// An empty `types` matches every node flagged as a cluster.
pub fn uncluster_nodes(store: &mut MutableStore, types: &[NodeType]) -> Result<()> {
    let clusters: Vec<NodeId> = store
        .find_all(TraversalOrder::PreOrder)
        .into_iter()
        .filter(|id| {
            store.node(*id).is_ok_and(|n| {
                !n.is_graph_container()
                    && if types.is_empty() {
                        n.is_cluster()
                    } else {
                        types.contains(&n.node_type())
                    }
            })
        })
        .collect();
    for id in clusters {
        if store.contains_node(id) {
            store.uncluster_node(id)?;
        }
    }
    Ok(())
}

/// Extraneous nodes folded into their owners, then extraneous edges removed.
pub fn prune_extraneous() -> Filter {
    Filter::store(|store| {
        prune_extraneous_nodes(store)?;
        destroy_extraneous_edges(store)
    })
}

/// Collapse framework owned resources into themselves.
pub fn collapse_cdk_owned_resources() -> Filter {
    Filter::store(|store| {
        let owned = collect_post_order(store, |n| {
            n.node_type() == NodeType::Resource && n.is_cdk_owned()
        });
        for id in owned {
            if store.contains_node(id) {
                store.collapse_node(id)?;
            }
        }
        Ok(())
    })
}

pub fn collapse_cdk_wrappers() -> Filter {
    Filter::store(collapse_wrapper_nodes)
}

/// The compact preset as a filter step.
pub fn compact() -> Filter {
    Filter::store(|store| {
        store.verify_destructive_mutation_allowed()?;
        apply_preset(store, FilterPreset::Compact)
    })
}

pub fn uncluster(types: Vec<NodeType>) -> Filter {
    Filter::store(move |store| uncluster_nodes(store, &types))
}

/// Prune every node whose type is not in `types`. Clusters, graph
/// containers and ancestors of matching nodes are kept.
pub fn include_node_type(types: Vec<NodeType>) -> Filter {
    let types: HashSet<NodeType> = types.into_iter().collect();
    GraphFilter::nodes(move |store, id| {
        let Ok(node) = store.node(id) else {
            return true;
        };
        node.is_cluster()
            || node.is_graph_container()
            || types.contains(&node.node_type())
            || store
                .descendants(id, TraversalOrder::PreOrder)
                .into_iter()
                .any(|d| store.node(d).is_ok_and(|n| types.contains(&n.node_type())))
    })
    .with_all_nodes(true)
    .into()
}

/// Prune every node whose type is in `types`, except graph containers.
pub fn exclude_node_type(types: Vec<NodeType>) -> Filter {
    let types: HashSet<NodeType> = types.into_iter().collect();
    GraphFilter::nodes(move |store, id| {
        store
            .node(id)
            .is_ok_and(|n| n.is_graph_container() || !types.contains(&n.node_type()))
    })
    .with_all_nodes(true)
    .into()
}

fn filter_cfn_type(patterns: Vec<CfnTypePattern>, exclude: bool) -> Filter {
    GraphFilter::nodes(move |store, id| {
        let Ok(node) = store.node(id) else {
            return true;
        };
        if node.is_cluster() || node.is_graph_container() || !node.is_resource_like() {
            return true;
        }
        let matched = store
            .resource_type_of(id)
            .is_some_and(|cfn_type| patterns.iter().any(|p| p.is_match(&cfn_type)));
        matched != exclude
    })
    .into()
}

/// Prune resource nodes whose resource type matches none of `patterns`.
pub fn include_cfn_type(patterns: Vec<CfnTypePattern>) -> Filter {
    filter_cfn_type(patterns, false)
}

/// Prune resource nodes whose resource type matches any of `patterns`.
pub fn exclude_cfn_type(patterns: Vec<CfnTypePattern>) -> Filter {
    filter_cfn_type(patterns, true)
}
