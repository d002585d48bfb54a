use std::collections::BTreeSet;

use serde_json::Value;

use crate::entity::{Entity, GraphEntity};
use crate::types::{
    Attributes, BindingInfo, EdgeId, Flag, MetadataEntry, NodeId, NodeType, Tags, Uuid,
};

/// Membership registries kept by stack nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackMembers {
    pub(crate) stage: Option<NodeId>,
    pub(crate) outputs: BTreeSet<NodeId>,
    pub(crate) parameters: BTreeSet<NodeId>,
}

/// Binding of a resource wrapper to its leaf resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CfnBinding {
    /// Not decided yet: derived from the children on lookup.
    #[default]
    Inferred,
    Bound(NodeId),
    /// Explicitly cleared, e.g. after the leaf was destroyed.
    Unbound,
}

/// Variant specific state of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    App,
    Stage { stacks: BTreeSet<NodeId> },
    Stack(StackMembers),
    NestedStack {
        members: StackMembers,
        parent_stack: Option<NodeId>,
    },
    Resource { binding: CfnBinding },
    CfnResource,
    Output,
    Parameter,
    Default,
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Root => NodeType::Root,
            NodeKind::App => NodeType::App,
            NodeKind::Stage { .. } => NodeType::Stage,
            NodeKind::Stack(_) => NodeType::Stack,
            NodeKind::NestedStack { .. } => NodeType::NestedStack,
            NodeKind::Resource { .. } => NodeType::Resource,
            NodeKind::CfnResource => NodeType::CfnResource,
            NodeKind::Output => NodeType::Output,
            NodeKind::Parameter => NodeType::Parameter,
            NodeKind::Default => NodeType::Default,
        }
    }

    pub(crate) fn stack_members(&self) -> Option<&StackMembers> {
        match self {
            NodeKind::Stack(members) | NodeKind::NestedStack { members, .. } => Some(members),
            _ => None,
        }
    }

    pub(crate) fn stack_members_mut(&mut self) -> Option<&mut StackMembers> {
        match self {
            NodeKind::Stack(members) | NodeKind::NestedStack { members, .. } => Some(members),
            _ => None,
        }
    }
}

/// A node of the graph tree. Owned by the store arena; all relations are
/// handles into the same arena.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) entity: Entity,
    pub(crate) kind: NodeKind,
    pub(crate) id: String,
    pub(crate) path: String,
    pub(crate) depth: usize,
    pub(crate) parent: Option<NodeId>,
    pub(crate) stack: Option<NodeId>,
    pub(crate) binding_info: Option<BindingInfo>,
    pub(crate) logical_id: Option<String>,
    pub(crate) cfn_type: Option<String>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) links: BTreeSet<EdgeId>,
    pub(crate) reverse_links: BTreeSet<EdgeId>,
}

impl GraphEntity for Node {
    fn entity(&self) -> &Entity {
        &self.entity
    }
}

impl Node {
    pub(crate) fn root() -> Self {
        let mut entity = Entity::new(Uuid::new(crate::types::ROOT_UUID));
        entity.add_flag(Flag::GraphContainer);
        entity.add_flag(Flag::Cluster);
        Self {
            entity,
            kind: NodeKind::Root,
            id: crate::types::ROOT_UUID.to_string(),
            path: String::new(),
            depth: 0,
            parent: None,
            stack: None,
            binding_info: None,
            logical_id: None,
            cfn_type: None,
            children: Vec::new(),
            links: BTreeSet::new(),
            reverse_links: BTreeSet::new(),
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    /// Id unique among siblings.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Nearest enclosing stack, or the node itself for stacks.
    pub fn stack(&self) -> Option<NodeId> {
        self.stack
    }

    pub fn binding_info(&self) -> Option<&BindingInfo> {
        self.binding_info.as_ref()
    }

    pub fn fqn(&self) -> Option<&str> {
        self.binding_info.as_ref().map(|info| info.fqn.as_str())
    }

    pub fn logical_id(&self) -> Option<&str> {
        self.logical_id.as_deref()
    }

    /// Resource type stored on this node. For resource wrappers use
    /// [`Store::resource_type_of`](crate::Store::resource_type_of), which
    /// also looks at the bound leaf.
    pub fn cfn_type(&self) -> Option<&str> {
        self.cfn_type.as_deref()
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Edges where this node is the source.
    pub fn links(&self) -> &BTreeSet<EdgeId> {
        &self.links
    }

    /// Edges where this node is the target.
    pub fn reverse_links(&self) -> &BTreeSet<EdgeId> {
        &self.reverse_links
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_cluster(&self) -> bool {
        self.has_flag(Flag::Cluster)
    }

    pub fn is_graph_container(&self) -> bool {
        self.has_flag(Flag::GraphContainer)
    }

    pub fn is_resource_wrapper(&self) -> bool {
        self.has_flag(Flag::ResourceWrapper)
    }

    pub fn is_asset(&self) -> bool {
        self.has_flag(Flag::Asset)
    }

    pub fn is_cdk_owned(&self) -> bool {
        self.has_flag(Flag::CdkOwned)
    }

    /// Flagged extraneous, or an empty cluster.
    pub fn is_extraneous(&self) -> bool {
        self.has_flag(Flag::Extraneous) || (self.is_cluster() && self.is_leaf())
    }

    pub fn is_stack(&self) -> bool {
        self.node_type().is_stack()
    }

    pub fn is_resource_like(&self) -> bool {
        self.node_type().is_resource_like()
    }

    /// Stage of a stack node.
    pub fn stage(&self) -> Option<NodeId> {
        self.kind.stack_members().and_then(|members| members.stage)
    }

    /// Outputs registered with a stack node.
    pub fn outputs(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.kind
            .stack_members()
            .into_iter()
            .flat_map(|members| members.outputs.iter().copied())
    }

    /// Parameters registered with a stack node.
    pub fn parameters(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.kind
            .stack_members()
            .into_iter()
            .flat_map(|members| members.parameters.iter().copied())
    }

    /// Stacks registered with a stage node.
    pub fn stage_stacks(&self) -> impl Iterator<Item = NodeId> + '_ {
        let stacks = match &self.kind {
            NodeKind::Stage { stacks } => Some(stacks),
            _ => None,
        };
        stacks.into_iter().flat_map(|s| s.iter().copied())
    }

    pub fn parent_stack(&self) -> Option<NodeId> {
        match &self.kind {
            NodeKind::NestedStack { parent_stack, .. } => *parent_stack,
            _ => None,
        }
    }

    /// An output with an export name.
    pub fn is_export(&self) -> bool {
        matches!(self.kind, NodeKind::Output)
            && self.get_attribute(crate::types::attr::OUTPUT_EXPORT_NAME).is_some()
    }

    pub fn export_name(&self) -> Option<&str> {
        self.get_attribute(crate::types::attr::OUTPUT_EXPORT_NAME)
            .and_then(Value::as_str)
    }

    /// A parameter generated for a cross stack reference.
    pub fn is_stack_reference(&self) -> bool {
        matches!(self.kind, NodeKind::Parameter) && self.id.starts_with("reference-to-")
    }

    pub(crate) fn entity_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }
}

/// Variant chosen for a new node, with its variant specific inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeVariant {
    App,
    Stage,
    Stack,
    NestedStack { parent_stack: Option<NodeId> },
    Resource { cdk_owned: bool },
    CfnResource,
    Output {
        value: Value,
        export_name: Option<String>,
        description: Option<String>,
    },
    Parameter {
        value: Value,
        parameter_type: String,
        description: Option<String>,
    },
    Default,
}

impl NodeVariant {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeVariant::App => NodeType::App,
            NodeVariant::Stage => NodeType::Stage,
            NodeVariant::Stack => NodeType::Stack,
            NodeVariant::NestedStack { .. } => NodeType::NestedStack,
            NodeVariant::Resource { .. } => NodeType::Resource,
            NodeVariant::CfnResource => NodeType::CfnResource,
            NodeVariant::Output { .. } => NodeType::Output,
            NodeVariant::Parameter { .. } => NodeType::Parameter,
            NodeVariant::Default => NodeType::Default,
        }
    }
}

/// Everything needed to add a node to a store.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub uuid: Uuid,
    pub id: String,
    pub path: String,
    pub variant: NodeVariant,
    /// Enclosing stack. Ignored for stack variants, which are their own stack.
    pub stack: Option<NodeId>,
    pub binding_info: Option<BindingInfo>,
    pub logical_id: Option<String>,
    pub cfn_type: Option<String>,
    pub attributes: Attributes,
    pub metadata: Vec<MetadataEntry>,
    pub tags: Tags,
    pub flags: BTreeSet<Flag>,
}

impl NodeSpec {
    pub fn new(
        uuid: Uuid,
        id: impl Into<String>,
        path: impl Into<String>,
        variant: NodeVariant,
    ) -> Self {
        Self {
            uuid,
            id: id.into(),
            path: path.into(),
            variant,
            stack: None,
            binding_info: None,
            logical_id: None,
            cfn_type: None,
            attributes: Attributes::new(),
            metadata: Vec::new(),
            tags: Tags::new(),
            flags: BTreeSet::new(),
        }
    }

    pub fn with_stack(mut self, stack: Option<NodeId>) -> Self {
        self.stack = stack;
        self
    }

    pub fn with_binding_info(mut self, info: Option<BindingInfo>) -> Self {
        self.binding_info = info;
        self
    }

    pub fn with_logical_id(mut self, logical_id: Option<String>) -> Self {
        self.logical_id = logical_id;
        self
    }

    pub fn with_cfn_type(mut self, cfn_type: Option<String>) -> Self {
        self.cfn_type = cfn_type;
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_metadata(mut self, metadata: Vec<MetadataEntry>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_flags(mut self, flags: impl IntoIterator<Item = Flag>) -> Self {
        self.flags.extend(flags);
        self
    }
}
