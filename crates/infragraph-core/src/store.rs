//! The arena that owns every node and edge of a graph.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use serde_json::Value;
use tracing::trace;

use crate::counter::Counter;
use crate::edge::{Edge, EdgeSpec};
use crate::entity::{Entity, GraphEntity};
use crate::mutate::MutableStore;
use crate::node::{Node, NodeKind, NodeSpec, NodeVariant, StackMembers};
use crate::types::{
    EdgeId, EdgeType, Flag, NodeId, NodeType, ROOT_UUID, Uuid, attr,
};
use crate::{Error, Result};

/// Version written into serialized graphs.
pub const STORE_VERSION: &str = "0.1.0";

pub(crate) const ROOT: NodeId = NodeId(0);

/// Aggregate statistics of a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreCounts {
    pub nodes: usize,
    pub edges: usize,
    pub stacks: usize,
    pub stages: usize,
    pub node_types: BTreeMap<NodeType, usize>,
    pub edge_types: BTreeMap<EdgeType, usize>,
    pub cfn_resources: BTreeMap<String, usize>,
}

/// Owner of all nodes, edges, the stack/stage tables, the logical-id index
/// and the per-type counters.
///
/// A `Store` only exposes construction (`add_node`, `add_edge`) and reads.
/// Destructive mutations live on [`MutableStore`], which can only be
/// obtained through [`Store::clone_mutable`] or [`Store::into_mutable`].
#[derive(Debug)]
pub struct Store {
    version: String,
    allow_destructive_mutations: bool,
    pub(crate) nodes: Vec<Option<Node>>,
    pub(crate) edges: Vec<Option<Edge>>,
    node_index: HashMap<Uuid, NodeId>,
    edge_index: HashMap<Uuid, EdgeId>,
    stacks: BTreeSet<NodeId>,
    stages: BTreeSet<NodeId>,
    /// `stackUuid:logicalId` -> node
    logical_ids: HashMap<String, NodeId>,
    node_counter: Counter<NodeType>,
    edge_counter: Counter<EdgeType>,
    cfn_resource_counter: Counter<String>,
}

impl Store {
    pub fn new(allow_destructive_mutations: bool) -> Self {
        Self::with_version(STORE_VERSION, allow_destructive_mutations)
    }

    pub(crate) fn with_version(version: &str, allow_destructive_mutations: bool) -> Self {
        Self {
            version: version.to_string(),
            allow_destructive_mutations,
            nodes: vec![Some(Node::root())],
            edges: Vec::new(),
            node_index: HashMap::new(),
            edge_index: HashMap::new(),
            stacks: BTreeSet::new(),
            stages: BTreeSet::new(),
            logical_ids: HashMap::new(),
            node_counter: Counter::new(),
            edge_counter: Counter::new(),
            cfn_resource_counter: Counter::new(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn allow_destructive_mutations(&self) -> bool {
        self.allow_destructive_mutations
    }

    pub fn verify_destructive_mutation_allowed(&self) -> Result<()> {
        if self.allow_destructive_mutations {
            Ok(())
        } else {
            Err(Error::immutable_store())
        }
    }

    /// Deep copy through serialize + deserialize. The copy shares no
    /// entities with `self`.
    pub fn clone_store(&self, allow_destructive_mutations: bool) -> Result<Store> {
        let graph = self.serialize()?;
        Store::deserialize(&graph, allow_destructive_mutations).map_err(|e| e.with_operation("store::clone"))
    }

    /// Private, mutation enabled copy of this store.
    pub fn clone_mutable(&self) -> Result<MutableStore> {
        self.clone_store(true)?.into_mutable()
    }

    /// Turn a store that was created with mutations enabled into a
    /// [`MutableStore`]. Fails with `ImmutableStore` otherwise.
    pub fn into_mutable(self) -> Result<MutableStore> {
        self.verify_destructive_mutation_allowed()?;
        Ok(MutableStore::new(self))
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.index()), Some(Some(_)))
    }

    pub fn contains_edge(&self, id: EdgeId) -> bool {
        matches!(self.edges.get(id.index()), Some(Some(_)))
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or_else(|| Error::not_found("node", id.to_string()))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or_else(|| Error::not_found("node", id.to_string()))
    }

    pub fn edge(&self, id: EdgeId) -> Result<&Edge> {
        self.edges
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or_else(|| Error::not_found("edge", id.to_string()))
    }

    pub(crate) fn edge_mut(&mut self, id: EdgeId) -> Result<&mut Edge> {
        self.edges
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or_else(|| Error::not_found("edge", id.to_string()))
    }

    /// Look up a node by uuid. `"Root"` always resolves to the root.
    pub fn get_node(&self, uuid: &str) -> Result<NodeId> {
        if uuid == ROOT_UUID {
            return Ok(ROOT);
        }
        self.node_index
            .get(uuid)
            .copied()
            .ok_or_else(|| Error::not_found("node", uuid))
    }

    pub fn get_edge(&self, uuid: &str) -> Result<EdgeId> {
        self.edge_index
            .get(uuid)
            .copied()
            .ok_or_else(|| Error::not_found("edge", uuid))
    }

    pub fn get_stack(&self, uuid: &str) -> Result<NodeId> {
        self.node_index
            .get(uuid)
            .copied()
            .filter(|id| self.stacks.contains(id))
            .ok_or_else(|| Error::not_found("stack", uuid))
    }

    pub fn get_stage(&self, uuid: &str) -> Result<NodeId> {
        self.node_index
            .get(uuid)
            .copied()
            .filter(|id| self.stages.contains(id))
            .ok_or_else(|| Error::not_found("stage", uuid))
    }

    /// All live nodes except the root, in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(i, slot)| slot.as_ref().map(|node| (NodeId(i as u32), node)))
    }

    /// All live edges, in creation order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|edge| (EdgeId(i as u32), edge)))
    }

    pub fn stacks(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.stacks.iter().copied()
    }

    pub fn stages(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.stages.iter().copied()
    }

    pub fn counts(&self) -> StoreCounts {
        StoreCounts {
            nodes: self.node_index.len(),
            edges: self.edge_index.len(),
            stacks: self.stacks.len(),
            stages: self.stages.len(),
            node_types: self.node_counter.counts().clone(),
            edge_types: self.edge_counter.counts().clone(),
            cfn_resources: self.cfn_resource_counter.counts().clone(),
        }
    }

    /// `stackUuid:logicalId`, unique across the whole graph.
    pub fn compute_logical_universal_id(&self, stack: NodeId, logical_id: &str) -> Result<String> {
        let stack = self.node(stack)?;
        Ok(format!("{}:{}", stack.uuid(), logical_id))
    }

    /// Find a node by logical id within `stack`. Nested stacks fall back to
    /// their parent stack's namespace.
    pub fn find_node_by_logical_id(&self, stack: NodeId, logical_id: &str) -> Result<NodeId> {
        let universal_id = self.compute_logical_universal_id(stack, logical_id)?;
        if let Some(id) = self.logical_ids.get(&universal_id) {
            return Ok(*id);
        }

        if let Some(parent_stack) = self.node(stack)?.parent_stack() {
            return self.find_node_by_logical_id(parent_stack, logical_id);
        }

        Err(Error::reference_resolution(format!(
            "failed to find node by logical id '{logical_id}' in stack '{}'",
            self.node(stack)?.path()
        ))
        .with_context("universal_id", universal_id))
    }

    pub fn find_node_by_logical_universal_id(&self, universal_id: &str) -> Result<NodeId> {
        let (stack_uuid, logical_id) = universal_id.split_once(':').ok_or_else(|| {
            Error::invalid_argument(format!(
                "'{universal_id}' is not a universal logical id (stack:logicalId)"
            ))
        })?;
        let stack = self.get_stack(stack_uuid)?;
        self.find_node_by_logical_id(stack, logical_id)
    }

    pub(crate) fn record_logical_id(&mut self, stack: NodeId, logical_id: &str, node: NodeId) -> Result<()> {
        let key = self.compute_logical_universal_id(stack, logical_id)?;
        if let Some(previous) = self.logical_ids.insert(key, node)
            && previous != node
        {
            trace!(logical_id, %previous, %node, "logical id rebound");
        }
        Ok(())
    }

    pub(crate) fn forget_logical_id(&mut self, stack: Option<NodeId>, logical_id: &str, node: NodeId) {
        let key = stack.and_then(|s| self.compute_logical_universal_id(s, logical_id).ok());
        match key {
            Some(key) if self.logical_ids.get(&key) == Some(&node) => {
                self.logical_ids.remove(&key);
            }
            _ => self.logical_ids.retain(|_, v| *v != node),
        }
    }

    /// Create a node under `parent` and register it in every table.
    pub fn add_node(&mut self, parent: NodeId, spec: NodeSpec) -> Result<NodeId> {
        let parent_depth = self.node(parent)?.depth;
        if self.node_index.contains_key(spec.uuid.as_str()) {
            return Err(Error::invariant_violation(format!(
                "node '{}' already exists in store",
                spec.uuid
            ))
            .with_context("path", spec.path));
        }
        if let Some(stack) = spec.stack
            && !self.node(stack)?.is_stack()
        {
            return Err(Error::structural(
                spec.path,
                format!("node {stack} is not a stack"),
            ));
        }

        let id = NodeId(self.nodes.len() as u32);
        let node_type = spec.variant.node_type();
        let mut entity = Entity::with_data(
            spec.uuid,
            spec.attributes,
            spec.metadata,
            spec.tags,
            spec.flags,
        );

        let (kind, stack) = match spec.variant {
            NodeVariant::App => {
                entity.add_flag(Flag::GraphContainer);
                entity.add_flag(Flag::Cluster);
                (NodeKind::App, spec.stack)
            }
            NodeVariant::Stage => {
                entity.add_flag(Flag::Cluster);
                (
                    NodeKind::Stage {
                        stacks: BTreeSet::new(),
                    },
                    spec.stack,
                )
            }
            NodeVariant::Stack => {
                entity.add_flag(Flag::Cluster);
                (NodeKind::Stack(StackMembers::default()), Some(id))
            }
            NodeVariant::NestedStack { parent_stack } => {
                entity.add_flag(Flag::Cluster);
                (
                    NodeKind::NestedStack {
                        members: StackMembers::default(),
                        parent_stack,
                    },
                    Some(id),
                )
            }
            NodeVariant::Resource { cdk_owned } => {
                if cdk_owned {
                    entity.add_flag(Flag::CdkOwned);
                }
                (
                    NodeKind::Resource {
                        binding: Default::default(),
                    },
                    spec.stack,
                )
            }
            NodeVariant::CfnResource => {
                if spec.cfn_type.is_none() {
                    return Err(Error::structural(
                        spec.path,
                        "leaf resource node requires a resource type",
                    ));
                }
                (NodeKind::CfnResource, spec.stack)
            }
            NodeVariant::Output {
                value,
                export_name,
                description,
            } => {
                entity.add_flag(Flag::Extraneous);
                entity.set_attribute(attr::OUTPUT_VALUE, value);
                if let Some(name) = export_name {
                    entity.set_attribute(attr::OUTPUT_EXPORT_NAME, Value::String(name));
                }
                if let Some(description) = description {
                    entity.set_attribute(attr::DESCRIPTION, Value::String(description));
                }
                (NodeKind::Output, spec.stack)
            }
            NodeVariant::Parameter {
                value,
                parameter_type,
                description,
            } => {
                entity.add_flag(Flag::Extraneous);
                entity.set_attribute(attr::PARAMETER_VALUE, value);
                entity.set_attribute(attr::PARAMETER_TYPE, Value::String(parameter_type));
                if let Some(description) = description {
                    entity.set_attribute(attr::DESCRIPTION, Value::String(description));
                }
                (NodeKind::Parameter, spec.stack)
            }
            NodeVariant::Default => (NodeKind::Default, spec.stack),
        };

        if spec.logical_id.is_some() && stack.is_none() {
            return Err(Error::structural(
                spec.path,
                "logical id defined outside of a stack",
            ));
        }

        let uuid = entity.uuid().clone();
        let cfn_type = spec.cfn_type.clone();
        let logical_id = spec.logical_id.clone();
        self.nodes.push(Some(Node {
            entity,
            kind,
            id: spec.id,
            path: spec.path,
            depth: parent_depth + 1,
            parent: Some(parent),
            stack,
            binding_info: spec.binding_info,
            logical_id: spec.logical_id,
            cfn_type: spec.cfn_type,
            children: Vec::new(),
            links: BTreeSet::new(),
            reverse_links: BTreeSet::new(),
        }));
        self.node_index.insert(uuid, id);
        self.node_mut(parent)?.children.push(id);

        self.node_counter.add(node_type);
        if node_type == NodeType::CfnResource
            && let Some(cfn_type) = cfn_type
        {
            self.cfn_resource_counter.add(cfn_type);
        }
        if let (Some(logical_id), Some(stack)) = (logical_id, stack) {
            self.record_logical_id(stack, &logical_id, id)?;
        }

        match node_type {
            NodeType::Stack | NodeType::NestedStack => {
                self.stacks.insert(id);
                if let Some(stage) = self.nearest_ancestor(id, &[NodeType::Stage]) {
                    self.register_stack_in_stage(stage, id)?;
                }
            }
            NodeType::Stage => {
                self.stages.insert(id);
            }
            NodeType::Output | NodeType::Parameter => {
                if let Some(stack) = stack {
                    self.register_stack_member(stack, id, node_type)?;
                }
            }
            _ => {}
        }

        trace!(%id, %node_type, "node added");
        Ok(id)
    }

    pub(crate) fn register_stack_in_stage(&mut self, stage: NodeId, stack: NodeId) -> Result<()> {
        if let NodeKind::Stage { stacks } = &mut self.node_mut(stage)?.kind {
            stacks.insert(stack);
        }
        if let Some(members) = self.node_mut(stack)?.kind.stack_members_mut() {
            members.stage = Some(stage);
        }
        Ok(())
    }

    pub(crate) fn register_stack_member(
        &mut self,
        stack: NodeId,
        member: NodeId,
        node_type: NodeType,
    ) -> Result<()> {
        let members = self.node_mut(stack)?.kind.stack_members_mut().ok_or_else(|| {
            Error::invariant_violation(format!("node {stack} does not hold stack members"))
        })?;
        match node_type {
            NodeType::Output => members.outputs.insert(member),
            NodeType::Parameter => members.parameters.insert(member),
            _ => false,
        };
        Ok(())
    }

    /// Create an edge and index it on both endpoints. An edge with a uuid
    /// that is already stored is not added twice.
    pub fn add_edge(&mut self, spec: EdgeSpec) -> Result<EdgeId> {
        self.node(spec.source)?;
        self.node(spec.target)?;
        if let Some(existing) = self.edge_index.get(spec.uuid.as_str()) {
            trace!(uuid = %spec.uuid, "edge already stored");
            return Ok(*existing);
        }

        let id = EdgeId(self.edges.len() as u32);
        let mut entity = Entity::with_data(
            spec.uuid,
            spec.attributes,
            spec.metadata,
            spec.tags,
            spec.flags,
        );
        if spec.source == spec.target {
            entity.add_flag(Flag::ClosedEdge);
        }

        self.edge_index.insert(entity.uuid().clone(), id);
        self.edges.push(Some(Edge {
            entity,
            edge_type: spec.edge_type,
            direction: spec.direction,
            source: spec.source,
            target: spec.target,
        }));
        self.node_mut(spec.source)?.links.insert(id);
        self.node_mut(spec.target)?.reverse_links.insert(id);
        self.edge_counter.add(spec.edge_type);

        trace!(%id, edge_type = %spec.edge_type, "edge added");
        Ok(id)
    }

    /// Drop a node from the arena and every table. Callers detach it from
    /// its parent and edges first.
    pub(crate) fn remove_node_entry(&mut self, id: NodeId) -> Result<Node> {
        if id == ROOT {
            return Err(Error::unsupported("the root node cannot be removed"));
        }
        let node = self
            .nodes
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or_else(|| Error::not_found("node", id.to_string()))?;

        self.node_index.remove(node.uuid().as_str());
        self.node_counter.subtract(&node.node_type());
        if node.node_type() == NodeType::CfnResource
            && let Some(cfn_type) = &node.cfn_type
        {
            self.cfn_resource_counter.subtract(cfn_type);
        }
        if let Some(logical_id) = &node.logical_id {
            self.forget_logical_id(node.stack, logical_id, id);
        }
        self.stacks.remove(&id);
        self.stages.remove(&id);

        Ok(node)
    }

    pub(crate) fn remove_edge_entry(&mut self, id: EdgeId) -> Result<Edge> {
        let edge = self
            .edges
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or_else(|| Error::not_found("edge", id.to_string()))?;
        self.edge_index.remove(edge.uuid().as_str());
        self.edge_counter.subtract(&edge.edge_type);
        Ok(edge)
    }
}
