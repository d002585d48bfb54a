//! Build a graph store from a construct tree.
//!
//! Computation is two sequential passes. The [`collector`] walks the tree once
//! and stores one node per construct, recording references and dependencies
//! whose targets may not be stored yet. The [`binder`] then resolves those
//! records into edges.
pub mod binder;
pub mod collector;
pub mod construct;
pub mod infer;
pub mod reference;

pub use binder::{BindSummary, bind_unresolved};
pub use collector::{Collected, Collector};
pub use construct::{Construct, ConstructKind, ConstructNode, OutputProps, ParameterProps};
pub use reference::{
    ReferenceKind, UnresolvedDependency, UnresolvedReference, extract_unresolved_references,
};

use infragraph_core::Store;
use infragraph_error::Result;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ComputeOption {
    /// Construct paths left out of the graph along with their subtrees.
    pub ignored_paths: Vec<String>,
}

impl ComputeOption {
    pub fn with_ignored_path(mut self, path: impl Into<String>) -> Self {
        self.ignored_paths.push(path.into());
        self
    }

    pub fn with_ignored_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignored_paths.iter().any(|ignored| ignored == path)
    }
}

/// Compute the canonical, read-only store for `app`.
///
/// A malformed tree aborts with a [`StructuralTraversal`] error carrying the
/// path of the offending construct and its ancestors. References that cannot
/// be resolved are logged and left out.
///
/// [`StructuralTraversal`]: infragraph_error::ErrorKind::StructuralTraversal
#[tracing::instrument(skip_all)]
pub fn compute_graph<C: Construct>(app: &C, option: &ComputeOption) -> Result<Store> {
    let Collected {
        mut store,
        references,
        dependencies,
    } = Collector::new(option).collect(app)?;

    let summary = bind_unresolved(&mut store, &references, &dependencies);
    let counts = store.counts();
    debug!(
        nodes = counts.nodes,
        edges = counts.edges,
        dropped_references = summary.dropped_references,
        "graph computed"
    );
    Ok(store)
}
