//! Destructive mutations over a private copy of a store.
//!
//! Every mutator re-checks `verify_destructive_mutation_allowed` and marks
//! the entities it touches with `MUTATED`. Collections that are iterated
//! while the store changes underneath are always snapshotted first.

use std::ops::Deref;

use tracing::trace;

use crate::edge::Edge;
use crate::entity::{Entity, GraphEntity};
use crate::node::{CfnBinding, NodeKind, StackMembers};
use crate::store::{ROOT, Store};
use crate::types::{EdgeDirection, EdgeId, Flag, NodeId, NodeType, TraversalOrder, attr};
use crate::{Error, Result};

const STACK_TYPES: [NodeType; 2] = [NodeType::Stack, NodeType::NestedStack];

/// A store that owns its data exclusively and may be rewritten.
///
/// Reads go through `Deref<Target = Store>`.
#[derive(Debug)]
pub struct MutableStore {
    store: Store,
}

impl Deref for MutableStore {
    type Target = Store;

    fn deref(&self) -> &Store {
        &self.store
    }
}

impl MutableStore {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn into_store(self) -> Store {
        self.store
    }

    pub fn as_store(&self) -> &Store {
        &self.store
    }

    /// Entity data of a node, for attribute/tag/flag edits.
    pub fn node_entity_mut(&mut self, id: NodeId) -> Result<&mut Entity> {
        self.store.verify_destructive_mutation_allowed()?;
        Ok(self.store.node_mut(id)?.entity_mut())
    }

    pub fn edge_entity_mut(&mut self, id: EdgeId) -> Result<&mut Entity> {
        self.store.verify_destructive_mutation_allowed()?;
        Ok(self.store.edge_mut(id)?.entity_mut())
    }

    fn pre_mutate_node(&mut self, id: NodeId, operation: &str) -> Result<()> {
        self.verify_node_mutation(id, operation)?;
        self.mark_node(id)
    }

    fn verify_node_mutation(&self, id: NodeId, operation: &str) -> Result<()> {
        self.store.verify_destructive_mutation_allowed()?;
        if id == ROOT {
            return Err(Error::unsupported(format!(
                "root node does not support {operation}"
            )));
        }
        Ok(())
    }

    /// Rejects `ancestor` unless it sits above `id`.
    fn verify_ancestor(&self, ancestor: NodeId, id: NodeId) -> Result<()> {
        if !self.store.is_ancestor(ancestor, id) {
            return Err(Error::invalid_argument(format!(
                "{ancestor} is not an ancestor of {id}"
            )));
        }
        Ok(())
    }

    fn mark_node(&mut self, id: NodeId) -> Result<()> {
        self.store.node_mut(id)?.entity_mut().add_flag(Flag::Mutated);
        Ok(())
    }

    fn pre_mutate_edge(&mut self, id: EdgeId) -> Result<()> {
        self.store.verify_destructive_mutation_allowed()?;
        self.store.edge_mut(id)?.entity_mut().add_flag(Flag::Mutated);
        Ok(())
    }

    // ==================== Node mutations ====================

    /// Remove a node and everything below it.
    ///
    /// With `strict`, a node that still has children or edges is rejected
    /// and the store is left untouched.
    pub fn destroy_node(&mut self, id: NodeId, strict: bool) -> Result<()> {
        self.store.verify_destructive_mutation_allowed()?;
        if id == ROOT {
            return Err(Error::unsupported("root node cannot be destroyed"));
        }

        let node = self.store.node(id)?;
        if strict {
            if !node.is_leaf() {
                return Err(Error::invalid_argument(format!(
                    "[strict] {id} cannot be destroyed because it has children"
                ))
                .with_context("node", node.uuid().to_string()));
            }
            if !node.links().is_empty() || !node.reverse_links().is_empty() {
                return Err(Error::invalid_argument(format!(
                    "[strict] {id} cannot be destroyed because edges still reference it"
                ))
                .with_context("node", node.uuid().to_string()));
            }
        }

        self.mark_node(id)?;
        if self.store.node(id)?.node_type() == NodeType::CfnResource {
            self.release_wrapped_leaf(id)?;
        }

        let children = self.store.node(id)?.children().to_vec();
        for child in children {
            if self.store.contains_node(child) {
                self.destroy_node(child, false)?;
            }
        }

        let node = self.store.node(id)?;
        let edges: Vec<EdgeId> = node
            .links()
            .iter()
            .chain(node.reverse_links())
            .copied()
            .collect();
        for edge in edges {
            if self.store.contains_edge(edge) {
                self.destroy_edge(edge)?;
            }
        }

        let node = self.store.node(id)?;
        let parent = node.parent();
        let node_type = node.node_type();
        let stack = node.stack();
        let stage = node.stage();

        if let Some(parent) = parent {
            self.remove_child(parent, id)?;
        }
        match node_type {
            NodeType::Output => {
                if let Some(stack) = stack.filter(|s| self.store.contains_node(*s)) {
                    self.remove_output(stack, id)?;
                }
            }
            NodeType::Parameter => {
                if let Some(stack) = stack.filter(|s| self.store.contains_node(*s)) {
                    self.remove_parameter(stack, id)?;
                }
            }
            NodeType::Stack | NodeType::NestedStack => {
                if let Some(stage) = stage.filter(|s| self.store.contains_node(*s)) {
                    self.remove_stack_from_stage(stage, id)?;
                }
            }
            _ => {}
        }

        self.store.remove_node_entry(id)?;
        trace!(%id, %node_type, "node destroyed");
        Ok(())
    }

    /// A leaf resource being destroyed hands its type and props over to the
    /// wrapper it is bound to.
    fn release_wrapped_leaf(&mut self, leaf: NodeId) -> Result<()> {
        let Some(resource) = self.store.nearest_ancestor(leaf, &[NodeType::Resource]) else {
            return Ok(());
        };
        if self.store.cfn_resource_of(resource) != Some(leaf) {
            return Ok(());
        }

        let leaf_node = self.store.node(leaf)?;
        let cfn_type = leaf_node.cfn_type().map(str::to_string);
        let cfn_props = leaf_node.get_attribute(attr::CFN_PROPS).cloned();

        let entity = self.store.node_mut(resource)?.entity_mut();
        if let Some(cfn_type) = cfn_type {
            entity.set_attribute(attr::RESOURCE_CFN_TYPE, cfn_type.into());
        }
        if let Some(props) = cfn_props {
            entity.set_attribute(attr::RESOURCE_CFN_PROPS, props);
        }
        self.set_cfn_resource(resource, None)
    }

    /// Collapse every child into this node.
    pub fn collapse_node(&mut self, id: NodeId) -> Result<()> {
        self.pre_mutate_node(id, "collapse")?;

        let children = self.store.node(id)?.children().to_vec();
        for child in children {
            if self.store.contains_node(child) {
                self.collapse_to_parent(child)?;
            }
        }
        self.reconcile_links(id)
    }

    pub fn collapse_to_parent(&mut self, id: NodeId) -> Result<NodeId> {
        self.pre_mutate_node(id, "collapse to parent")?;
        let parent = self.store.node(id)?.parent().ok_or_else(|| {
            Error::invalid_argument(format!("{id} does not have a parent to collapse to"))
        })?;
        self.collapse_to(id, parent)
    }

    /// Fold a node into one of its ancestors.
    ///
    /// Descendants collapse first, edges are moved onto the ancestor (edges
    /// that would loop on the ancestor are dropped) and the node's data is
    /// merged in without overwriting the ancestor's own.
    pub fn collapse_to(&mut self, id: NodeId, ancestor: NodeId) -> Result<NodeId> {
        self.verify_node_mutation(id, "collapse")?;
        self.verify_ancestor(ancestor, id)?;
        self.mark_node(id)?;

        let children = self.store.node(id)?.children().to_vec();
        for child in children {
            if self.store.contains_node(child) {
                self.collapse_to_parent(child)?;
            }
        }

        let links: Vec<EdgeId> = self.store.node(id)?.links().iter().copied().collect();
        for link in links {
            if !self.store.contains_edge(link) {
                continue;
            }
            if self.store.edge(link)?.target() == ancestor {
                self.destroy_edge(link)?;
            } else {
                self.set_edge_source(link, ancestor)?;
            }
        }

        let reverse_links: Vec<EdgeId> = self
            .store
            .node(id)?
            .reverse_links()
            .iter()
            .copied()
            .collect();
        for link in reverse_links {
            if !self.store.contains_edge(link) {
                continue;
            }
            if self.store.edge(link)?.source() == ancestor {
                self.destroy_edge(link)?;
            } else {
                self.set_edge_target(link, ancestor)?;
            }
        }

        if ancestor != ROOT {
            let data = self.store.node(id)?.entity().clone();
            self.store
                .node_mut(ancestor)?
                .entity_mut()
                .apply_data(&data, false, false);
        }

        self.destroy_node(id, false)?;
        self.reconcile_links(ancestor)?;
        trace!(%id, %ancestor, "node collapsed");
        Ok(ancestor)
    }

    /// Merge equivalent edges of `id` so at most one of each remains.
    fn reconcile_links(&mut self, id: NodeId) -> Result<()> {
        self.mark_node(id)?;

        let outgoing: Vec<EdgeId> = self.store.node(id)?.links().iter().copied().collect();
        self.consume_equivalents(&outgoing)?;

        let incoming: Vec<EdgeId> = self
            .store
            .node(id)?
            .reverse_links()
            .iter()
            .copied()
            .collect();
        self.consume_equivalents(&incoming)
    }

    fn consume_equivalents(&mut self, edges: &[EdgeId]) -> Result<()> {
        for (i, &a) in edges.iter().enumerate() {
            for &b in &edges[i + 1..] {
                if !self.store.contains_edge(a) {
                    break;
                }
                if !self.store.contains_edge(b) {
                    continue;
                }
                if self.store.edge(a)?.is_equivalent(self.store.edge(b)?) {
                    self.consume_edge(a, b)?;
                }
            }
        }
        Ok(())
    }

    /// Move a node under one of its ancestors.
    ///
    /// Depth, enclosing stack, stage and parent stack of the whole moved
    /// subtree are refreshed where they fell out of the scope chain.
    pub fn hoist_node(&mut self, id: NodeId, new_parent: NodeId) -> Result<()> {
        self.verify_node_mutation(id, "hoist")?;
        self.verify_ancestor(new_parent, id)?;
        self.mark_node(id)?;

        if let Some(parent) = self.store.node(id)?.parent() {
            self.remove_child(parent, id)?;
        }
        self.store.node_mut(id)?.parent = Some(new_parent);
        self.store.node_mut(new_parent)?.children.push(id);

        let mut subtree = vec![id];
        subtree.extend(self.store.descendants(id, TraversalOrder::PreOrder));
        for node in subtree {
            self.refresh_scope(node)?;
        }

        trace!(%id, %new_parent, "node hoisted");
        Ok(())
    }

    fn refresh_scope(&mut self, id: NodeId) -> Result<()> {
        let parent_depth = match self.store.node(id)?.parent() {
            Some(parent) => self.store.node(parent)?.depth(),
            None => 0,
        };
        self.store.node_mut(id)?.depth = parent_depth + 1;

        let node = self.store.node(id)?;
        let node_type = node.node_type();

        if let Some(stack) = node.stack()
            && stack != id
            && !self.store.is_ancestor(stack, id)
        {
            let new_stack = self.store.nearest_ancestor(id, &STACK_TYPES);
            self.move_to_stack(id, stack, new_stack)?;
        }

        if node_type.is_stack() {
            let node = self.store.node(id)?;
            if let Some(stage) = node.stage()
                && !self.store.is_ancestor(stage, id)
            {
                self.remove_stack_from_stage(stage, id)?;
                if let Some(new_stage) = self.store.nearest_ancestor(id, &[NodeType::Stage]) {
                    self.store.register_stack_in_stage(new_stage, id)?;
                }
            }

            if let Some(parent_stack) = self.store.node(id)?.parent_stack()
                && !self.store.is_ancestor(parent_stack, id)
            {
                let new_parent_stack = self.store.nearest_ancestor(id, &STACK_TYPES);
                if let NodeKind::NestedStack { parent_stack, .. } =
                    &mut self.store.node_mut(id)?.kind
                {
                    *parent_stack = new_parent_stack;
                }
            }
        }
        Ok(())
    }

    fn move_to_stack(&mut self, id: NodeId, old: NodeId, new: Option<NodeId>) -> Result<()> {
        let node = self.store.node(id)?;
        let node_type = node.node_type();
        let logical_id = node.logical_id().map(str::to_string);

        if let Some(logical_id) = &logical_id {
            self.store.forget_logical_id(Some(old), logical_id, id);
        }
        match node_type {
            NodeType::Output => {
                self.remove_output(old, id)?;
            }
            NodeType::Parameter => {
                self.remove_parameter(old, id)?;
            }
            _ => {}
        }

        self.store.node_mut(id)?.stack = new;
        if let Some(new) = new {
            if let Some(logical_id) = &logical_id {
                self.store.record_logical_id(new, logical_id, id)?;
            }
            if matches!(node_type, NodeType::Output | NodeType::Parameter) {
                self.store.register_stack_member(new, id, node_type)?;
            }
        }
        trace!(%id, %old, new = ?new, "enclosing stack changed");
        Ok(())
    }

    /// Hoist every child to this node's parent, then collapse the emptied
    /// node into the parent. Leaves are left as they are.
    pub fn uncluster_node(&mut self, id: NodeId) -> Result<()> {
        self.pre_mutate_node(id, "uncluster")?;
        let node = self.store.node(id)?;
        let Some(parent) = node.parent() else {
            return Ok(());
        };
        if node.is_leaf() {
            return Ok(());
        }

        let children = node.children().to_vec();
        for child in children {
            if self.store.contains_node(child) {
                self.hoist_node(child, parent)?;
            }
        }
        self.collapse_to_parent(id)?;
        Ok(())
    }

    /// Detach `child` from `parent`. Returns whether it was a child.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<bool> {
        self.store.verify_destructive_mutation_allowed()?;
        self.mark_node(parent)?;

        if self.store.cfn_resource_of(parent) == Some(child) {
            self.set_cfn_resource(parent, None)?;
        }

        let children = &mut self.store.node_mut(parent)?.children;
        let before = children.len();
        children.retain(|c| *c != child);
        Ok(children.len() != before)
    }

    /// Drop `edge` from the outgoing index of `id`.
    pub fn remove_link(&mut self, id: NodeId, edge: EdgeId) -> Result<bool> {
        self.store.verify_destructive_mutation_allowed()?;
        self.mark_node(id)?;
        Ok(self.store.node_mut(id)?.links.remove(&edge))
    }

    /// Drop `edge` from the incoming index of `id`.
    pub fn remove_reverse_link(&mut self, id: NodeId, edge: EdgeId) -> Result<bool> {
        self.store.verify_destructive_mutation_allowed()?;
        self.mark_node(id)?;
        Ok(self.store.node_mut(id)?.reverse_links.remove(&edge))
    }

    /// Bind a resource wrapper to `leaf`, or clear its binding with `None`.
    pub fn set_cfn_resource(&mut self, resource: NodeId, leaf: Option<NodeId>) -> Result<()> {
        self.pre_mutate_node(resource, "binding a leaf resource")?;
        if let Some(leaf) = leaf
            && self.store.node(leaf)?.node_type() != NodeType::CfnResource
        {
            return Err(Error::invalid_argument(format!(
                "{leaf} is not a leaf resource"
            )));
        }

        match &mut self.store.node_mut(resource)?.kind {
            NodeKind::Resource { binding } => {
                *binding = leaf.map_or(CfnBinding::Unbound, CfnBinding::Bound);
                Ok(())
            }
            _ => Err(Error::invalid_argument(format!(
                "{resource} is not a resource wrapper"
            ))),
        }
    }

    pub fn remove_output(&mut self, stack: NodeId, output: NodeId) -> Result<bool> {
        self.store.verify_destructive_mutation_allowed()?;
        self.mark_node(stack)?;
        Ok(self
            .members_mut(stack)?
            .is_some_and(|members| members.outputs.remove(&output)))
    }

    pub fn remove_parameter(&mut self, stack: NodeId, parameter: NodeId) -> Result<bool> {
        self.store.verify_destructive_mutation_allowed()?;
        self.mark_node(stack)?;
        Ok(self
            .members_mut(stack)?
            .is_some_and(|members| members.parameters.remove(&parameter)))
    }

    pub fn remove_stack_from_stage(&mut self, stage: NodeId, stack: NodeId) -> Result<bool> {
        self.store.verify_destructive_mutation_allowed()?;
        self.mark_node(stage)?;

        let removed = match &mut self.store.node_mut(stage)?.kind {
            NodeKind::Stage { stacks } => stacks.remove(&stack),
            _ => false,
        };
        if self.store.contains_node(stack)
            && let Some(members) = self.members_mut(stack)?
            && members.stage == Some(stage)
        {
            members.stage = None;
        }
        Ok(removed)
    }

    fn members_mut(&mut self, stack: NodeId) -> Result<Option<&mut StackMembers>> {
        Ok(self.store.node_mut(stack)?.kind.stack_members_mut())
    }

    // ==================== Edge mutations ====================

    pub fn destroy_edge(&mut self, id: EdgeId) -> Result<()> {
        self.pre_mutate_edge(id)?;
        let edge = self.store.edge(id)?;
        let (source, target) = (edge.source(), edge.target());

        if self.store.contains_node(source) {
            self.remove_link(source, id)?;
        }
        if self.store.contains_node(target) {
            self.remove_reverse_link(target, id)?;
        }
        let edge = self.store.remove_edge_entry(id)?;
        trace!(%id, edge_type = %edge.edge_type(), "edge destroyed");
        Ok(())
    }

    /// Merge an equivalent edge into `id` and destroy it.
    pub fn consume_edge(&mut self, id: EdgeId, other: EdgeId) -> Result<()> {
        self.pre_mutate_edge(id)?;
        let edge = self.store.edge(id)?;
        let other_edge = self.store.edge(other)?;
        if id == other || !edge.is_equivalent(other_edge) {
            return Err(Error::not_equivalent(
                other_edge.uuid().to_string(),
                edge.uuid().to_string(),
            ));
        }

        let data = other_edge.entity().clone();
        self.store.edge_mut(id)?.entity_mut().apply_data(&data, false, false);
        self.destroy_edge(other)
    }

    pub fn set_edge_direction(&mut self, id: EdgeId, direction: EdgeDirection) -> Result<()> {
        self.pre_mutate_edge(id)?;
        self.store.edge_mut(id)?.direction = direction;
        Ok(())
    }

    /// Re-attach the tail of an edge, moving it between outgoing indexes.
    pub fn set_edge_source(&mut self, id: EdgeId, source: NodeId) -> Result<()> {
        self.pre_mutate_edge(id)?;
        self.store.node(source)?;

        let previous = self.store.edge(id)?.source();
        if self.store.contains_node(previous) {
            self.remove_link(previous, id)?;
        }
        self.store.edge_mut(id)?.source = source;
        self.store.node_mut(source)?.links.insert(id);
        self.flag_if_closed(id)
    }

    /// Re-attach the head of an edge, moving it between incoming indexes.
    pub fn set_edge_target(&mut self, id: EdgeId, target: NodeId) -> Result<()> {
        self.pre_mutate_edge(id)?;
        self.store.node(target)?;

        let previous = self.store.edge(id)?.target();
        if self.store.contains_node(previous) {
            self.remove_reverse_link(previous, id)?;
        }
        self.store.edge_mut(id)?.target = target;
        self.store.node_mut(target)?.reverse_links.insert(id);
        self.flag_if_closed(id)
    }

    fn flag_if_closed(&mut self, id: EdgeId) -> Result<()> {
        let edge: &mut Edge = self.store.edge_mut(id)?;
        if edge.source == edge.target {
            edge.entity_mut().add_flag(Flag::ClosedEdge);
        }
        Ok(())
    }
}

impl From<MutableStore> for Store {
    fn from(store: MutableStore) -> Self {
        store.into_store()
    }
}
