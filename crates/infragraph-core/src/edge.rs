use std::collections::BTreeSet;

use serde_json::Value;

use crate::entity::{Entity, GraphEntity};
use crate::types::{
    Attributes, EdgeDirection, EdgeType, Flag, MetadataEntry, NodeId, Tags, Uuid, attr,
};

/// A directed relation between two nodes of the same store.
#[derive(Debug, Clone)]
pub struct Edge {
    pub(crate) entity: Entity,
    pub(crate) edge_type: EdgeType,
    pub(crate) direction: EdgeDirection,
    pub(crate) source: NodeId,
    pub(crate) target: NodeId,
}

impl GraphEntity for Edge {
    fn entity(&self) -> &Entity {
        &self.entity
    }
}

impl Edge {
    pub fn edge_type(&self) -> EdgeType {
        self.edge_type
    }

    pub fn direction(&self) -> EdgeDirection {
        self.direction
    }

    pub fn source(&self) -> NodeId {
        self.source
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    /// Same edge type, source and target.
    pub fn is_equivalent(&self, other: &Edge) -> bool {
        self.edge_type == other.edge_type
            && self.source == other.source
            && self.target == other.target
    }

    pub fn is_closed(&self) -> bool {
        self.has_flag(Flag::ClosedEdge) || self.source == self.target
    }

    pub fn is_extraneous(&self) -> bool {
        self.has_flag(Flag::Extraneous) || self.is_closed()
    }

    pub fn is_reference(&self) -> bool {
        self.edge_type.is_reference()
    }

    /// Referenced attribute name of an attribute reference.
    pub fn reference_value(&self) -> Option<&str> {
        self.get_attribute(attr::REFERENCE_VALUE)
            .and_then(Value::as_str)
    }

    pub(crate) fn entity_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }
}

/// Everything needed to add an edge to a store.
#[derive(Debug, Clone)]
pub struct EdgeSpec {
    pub uuid: Uuid,
    pub edge_type: EdgeType,
    pub direction: EdgeDirection,
    pub source: NodeId,
    pub target: NodeId,
    pub attributes: Attributes,
    pub metadata: Vec<MetadataEntry>,
    pub tags: Tags,
    pub flags: BTreeSet<Flag>,
}

impl EdgeSpec {
    pub fn new(uuid: Uuid, edge_type: EdgeType, source: NodeId, target: NodeId) -> Self {
        Self {
            uuid,
            edge_type,
            direction: EdgeDirection::Forward,
            source,
            target,
            attributes: Attributes::new(),
            metadata: Vec::new(),
            tags: Tags::new(),
            flags: BTreeSet::new(),
        }
    }

    /// Deployment dependency. Extraneous by default.
    pub fn dependency(uuid: Uuid, source: NodeId, target: NodeId) -> Self {
        Self::new(uuid, EdgeType::Dependency, source, target).with_flags([Flag::Extraneous])
    }

    pub fn reference(uuid: Uuid, source: NodeId, target: NodeId) -> Self {
        Self::new(uuid, EdgeType::Reference, source, target)
    }

    /// Reference to the attribute `value` of the target.
    pub fn attribute_reference(uuid: Uuid, source: NodeId, target: NodeId, value: &str) -> Self {
        Self::new(uuid, EdgeType::AttributeReference, source, target)
            .with_attribute(attr::REFERENCE_VALUE, Value::String(value.to_string()))
    }

    pub fn import_reference(uuid: Uuid, source: NodeId, target: NodeId) -> Self {
        Self::new(uuid, EdgeType::ImportReference, source, target)
    }

    pub fn with_direction(mut self, direction: EdgeDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes.extend(attributes);
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
