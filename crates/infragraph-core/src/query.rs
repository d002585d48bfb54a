//! Read-only navigation over a store: ancestry, traversal, links and the
//! resource binding lookups.

use std::collections::HashSet;

use serde_json::Value;

use crate::entity::GraphEntity;
use crate::node::{CfnBinding, Node, NodeKind};
use crate::store::{ROOT, Store};
use crate::types::{EdgeId, EdgeType, NodeId, NodeType, TraversalOrder, attr, construct_id};
use crate::{Error, Result};

impl Store {
    /// Ancestors from the parent up to and including the root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut ancestors = Vec::new();
        let mut current = self.node(id).ok().and_then(Node::parent);
        while let Some(parent) = current {
            ancestors.push(parent);
            current = self.node(parent).ok().and_then(Node::parent);
        }
        ancestors
    }

    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    /// Nearest ancestor matching `predicate`, looking at most `max` levels up.
    pub fn find_ancestor(
        &self,
        id: NodeId,
        predicate: impl Fn(&Node) -> bool,
        max: Option<usize>,
    ) -> Option<NodeId> {
        self.ancestors(id)
            .into_iter()
            .take(max.unwrap_or(usize::MAX))
            .find(|ancestor| self.node(*ancestor).is_ok_and(&predicate))
    }

    pub fn nearest_ancestor(&self, id: NodeId, types: &[NodeType]) -> Option<NodeId> {
        self.find_ancestor(id, |node| types.contains(&node.node_type()), None)
    }

    /// Scope chain from the top-most ancestor below the root down to the node.
    pub fn scopes(&self, id: NodeId) -> Vec<NodeId> {
        let mut scopes: Vec<NodeId> = self
            .ancestors(id)
            .into_iter()
            .filter(|ancestor| *ancestor != ROOT)
            .collect();
        scopes.reverse();
        if id != ROOT {
            scopes.push(id);
        }
        scopes
    }

    /// Top-most plain stack in the scope chain.
    pub fn root_stack(&self, id: NodeId) -> Option<NodeId> {
        self.scopes(id)
            .into_iter()
            .find(|scope| self.node(*scope).is_ok_and(|n| n.node_type() == NodeType::Stack))
    }

    /// Parent is the root or the app.
    pub fn is_top_level(&self, id: NodeId) -> bool {
        self.node(id)
            .ok()
            .and_then(Node::parent)
            .and_then(|parent| self.node(parent).ok())
            .is_some_and(Node::is_graph_container)
    }

    /// Every node except the root, in the requested order.
    pub fn find_all(&self, order: TraversalOrder) -> Vec<NodeId> {
        self.descendants(ROOT, order)
    }

    /// Descendants of `id`, excluding `id` itself.
    pub fn descendants(&self, id: NodeId, order: TraversalOrder) -> Vec<NodeId> {
        let mut out = Vec::new();
        if let Ok(node) = self.node(id) {
            for child in node.children() {
                self.collect_subtree(*child, order, &mut out);
            }
        }
        out
    }

    fn collect_subtree(&self, id: NodeId, order: TraversalOrder, out: &mut Vec<NodeId>) {
        let Ok(node) = self.node(id) else {
            return;
        };
        if order == TraversalOrder::PreOrder {
            out.push(id);
        }
        for child in node.children() {
            self.collect_subtree(*child, order, out);
        }
        if order == TraversalOrder::PostOrder {
            out.push(id);
        }
    }

    /// First node in pre-order matching `predicate`.
    pub fn find(&self, predicate: impl Fn(&Node) -> bool) -> Option<NodeId> {
        self.find_all(TraversalOrder::PreOrder)
            .into_iter()
            .find(|id| self.node(*id).is_ok_and(&predicate))
    }

    pub fn find_child(&self, parent: NodeId, child_id: &str) -> Option<NodeId> {
        let parent = self.node(parent).ok()?;
        parent
            .children()
            .iter()
            .copied()
            .find(|child| self.node(*child).is_ok_and(|c| c.id() == child_id))
    }

    pub fn siblings(&self, id: NodeId) -> Vec<NodeId> {
        let Some(parent) = self.node(id).ok().and_then(Node::parent) else {
            return Vec::new();
        };
        self.node(parent)
            .map(|p| p.children().iter().copied().filter(|c| *c != id).collect())
            .unwrap_or_default()
    }

    /// Outgoing edges whose type is one of `types`.
    pub fn links_of(&self, id: NodeId, types: &[EdgeType]) -> Vec<EdgeId> {
        self.filter_edges(self.node(id).map(|n| n.links()).ok(), types)
    }

    /// Incoming edges whose type is one of `types`.
    pub fn reverse_links_of(&self, id: NodeId, types: &[EdgeType]) -> Vec<EdgeId> {
        self.filter_edges(self.node(id).map(|n| n.reverse_links()).ok(), types)
    }

    fn filter_edges<'a>(
        &self,
        edges: Option<impl IntoIterator<Item = &'a EdgeId>>,
        types: &[EdgeType],
    ) -> Vec<EdgeId> {
        edges
            .into_iter()
            .flatten()
            .copied()
            .filter(|e| self.edge(*e).is_ok_and(|edge| types.contains(&edge.edge_type())))
            .collect()
    }

    /// Targets of this node's reference edges.
    pub fn references(&self, id: NodeId) -> Vec<NodeId> {
        self.targets(self.links_of(id, &REFERENCE_TYPES))
    }

    pub fn referenced_by(&self, id: NodeId) -> Vec<NodeId> {
        self.sources(self.reverse_links_of(id, &REFERENCE_TYPES))
    }

    pub fn dependencies(&self, id: NodeId) -> Vec<NodeId> {
        self.targets(self.links_of(id, &[EdgeType::Dependency]))
    }

    pub fn depended_on_by(&self, id: NodeId) -> Vec<NodeId> {
        self.sources(self.reverse_links_of(id, &[EdgeType::Dependency]))
    }

    pub fn does_reference(&self, id: NodeId, target: NodeId) -> bool {
        self.references(id).contains(&target)
    }

    pub fn does_depend_on(&self, id: NodeId, target: NodeId) -> bool {
        self.dependencies(id).contains(&target)
    }

    fn targets(&self, edges: Vec<EdgeId>) -> Vec<NodeId> {
        edges
            .into_iter()
            .filter_map(|e| self.edge(e).ok().map(|edge| edge.target()))
            .collect()
    }

    fn sources(&self, edges: Vec<EdgeId>) -> Vec<NodeId> {
        edges
            .into_iter()
            .filter_map(|e| self.edge(e).ok().map(|edge| edge.source()))
            .collect()
    }

    pub fn is_cross_stack(&self, edge: EdgeId) -> Result<bool> {
        let edge = self.edge(edge)?;
        Ok(self.node(edge.source())?.stack() != self.node(edge.target())?.stack())
    }

    /// Final targets of a reference, following references made by outputs
    /// so a reference to an exported output lands on the exported resource.
    pub fn resolve_reference_targets(&self, edge: EdgeId) -> Result<Vec<NodeId>> {
        let mut resolved = Vec::new();
        let mut seen = HashSet::new();
        let mut pending = vec![self.edge(edge)?.target()];

        while let Some(target) = pending.pop() {
            if !seen.insert(target) {
                continue;
            }
            let node = self.node(target)?;
            if node.node_type() == NodeType::Output && !self.references(target).is_empty() {
                pending.extend(self.references(target));
            } else {
                resolved.push(target);
            }
        }
        Ok(resolved)
    }

    /// Output of `stack` with the given logical id.
    pub fn find_output(&self, stack: NodeId, logical_id: &str) -> Result<NodeId> {
        self.node(stack)?
            .outputs()
            .find(|o| self.node(*o).is_ok_and(|n| n.logical_id() == Some(logical_id)))
            .ok_or_else(|| {
                Error::reference_resolution(format!(
                    "output '{logical_id}' does not exist in stack {stack}"
                ))
            })
    }

    pub fn find_parameter(&self, stack: NodeId, parameter_id: &str) -> Result<NodeId> {
        self.node(stack)?
            .parameters()
            .find(|p| self.node(*p).is_ok_and(|n| n.id() == parameter_id))
            .ok_or_else(|| {
                Error::not_found("parameter", parameter_id).with_context("stack", stack.to_string())
            })
    }

    /// Outputs of `stack` that carry an export name.
    pub fn exports(&self, stack: NodeId) -> Vec<NodeId> {
        self.node(stack)
            .map(|s| {
                s.outputs()
                    .filter(|o| self.node(*o).is_ok_and(Node::is_export))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Leaf resource bound to a resource wrapper.
    ///
    /// Unless set explicitly, the binding is the `Resource` child, else the
    /// `Default` child, else the only leaf child whose type name is `Cfn`
    /// followed by the wrapper's type name.
    pub fn cfn_resource_of(&self, resource: NodeId) -> Option<NodeId> {
        let node = self.node(resource).ok()?;
        let NodeKind::Resource { binding } = node.kind() else {
            return None;
        };
        match binding {
            CfnBinding::Bound(leaf) => self.contains_node(*leaf).then_some(*leaf),
            CfnBinding::Unbound => None,
            CfnBinding::Inferred => self.infer_cfn_resource(resource, node),
        }
    }

    fn infer_cfn_resource(&self, resource: NodeId, node: &Node) -> Option<NodeId> {
        let is_leaf = |id: &NodeId| {
            self.node(*id)
                .is_ok_and(|child| child.node_type() == NodeType::CfnResource)
        };

        for name in [construct_id::RESOURCE, construct_id::DEFAULT] {
            if let Some(child) = self.find_child(resource, name).filter(is_leaf) {
                return Some(child);
            }
        }

        let wrapper_type = node.binding_info()?.type_name().to_lowercase();
        let expected = format!("cfn{wrapper_type}");
        let mut candidates = node.children().iter().copied().filter(|child| {
            is_leaf(child)
                && self
                    .node(*child)
                    .ok()
                    .and_then(Node::binding_info)
                    .is_some_and(|info| info.type_name().to_lowercase() == expected)
        });
        match (candidates.next(), candidates.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    }

    /// Effective resource type: the node's own, else the type folded in from
    /// a destroyed leaf, else the bound leaf's.
    pub fn resource_type_of(&self, id: NodeId) -> Option<String> {
        let node = self.node(id).ok()?;
        if let Some(cfn_type) = node.cfn_type() {
            return Some(cfn_type.to_string());
        }
        if let Some(Value::String(wrapped)) = node.get_attribute(attr::RESOURCE_CFN_TYPE) {
            return Some(wrapped.clone());
        }
        let leaf = self.cfn_resource_of(id)?;
        self.node(leaf).ok()?.cfn_type().map(str::to_string)
    }
}

const REFERENCE_TYPES: [EdgeType; 3] = [
    EdgeType::Reference,
    EdgeType::AttributeReference,
    EdgeType::ImportReference,
];
