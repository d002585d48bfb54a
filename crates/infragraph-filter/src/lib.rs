//! Destructive rewriting of a cloned graph store for presentation.
//!
//! A [`FilterPlan`] optionally focuses the graph on one node, applies a
//! [`FilterPreset`] and then runs its filters in order. Every operation
//! requires a [`MutableStore`](infragraph_core::MutableStore), so the
//! canonical computed store is never touched.
pub mod filters;
pub mod plan;
pub mod preset;
pub mod reroot;

pub use filters::{
    CfnTypePattern, collapse_cdk_owned_resources, collapse_cdk_wrappers, compact,
    exclude_cfn_type, exclude_node_type, include_cfn_type, include_node_type, prune_extraneous,
    uncluster,
};
pub use plan::{
    EdgePredicate, Filter, FilterPlan, FilterPreset, FilterStrategy, GraphFilter, NodePredicate,
    RootResolver, RootSelector, StoreFilterFn, apply_filter_plan,
};
pub use preset::apply_preset;
pub use reroot::reroot;
