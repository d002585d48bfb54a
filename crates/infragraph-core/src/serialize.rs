//! The serialized graph artifact and the round trip through it.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::edge::EdgeSpec;
use crate::entity::GraphEntity;
use crate::node::{CfnBinding, Node, NodeKind, NodeSpec, NodeVariant};
use crate::store::{ROOT, Store};
use crate::types::{
    Attributes, BindingInfo, EdgeDirection, EdgeType, Flag, MetadataEntry, NodeId, NodeType,
    Tags, Uuid, attr,
};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedGraph {
    pub version: String,
    pub tree: SerializedNode,
    pub edges: Vec<SerializedEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedNode {
    pub uuid: Uuid,
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Uuid>,
    pub id: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding_info: Option<BindingInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    /// Leaf binding of a resource wrapper; absent while it is inferred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfn_resource: Option<SerializedBinding>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: Attributes,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<MetadataEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub flags: BTreeSet<Flag>,
    /// Keyed by construct id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, SerializedNode>,
    /// Outgoing edge uuids.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SerializedBinding {
    Bound(Uuid),
    Unbound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedEdge {
    pub uuid: Uuid,
    pub edge_type: EdgeType,
    pub direction: EdgeDirection,
    pub source: Uuid,
    pub target: Uuid,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: Attributes,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<MetadataEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub flags: BTreeSet<Flag>,
}

impl SerializedGraph {
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let out = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        out.map_err(|e| Error::serialization_failed("failed to encode graph").set_source(e))
    }

    pub fn from_json(input: &str) -> Result<Self> {
        serde_json::from_str(input)
            .map_err(|e| Error::deserialization_failed("failed to decode graph").set_source(e))
    }
}

impl Store {
    pub fn serialize(&self) -> Result<SerializedGraph> {
        let mut edges: Vec<SerializedEdge> = self
            .edges()
            .filter_map(|(_, edge)| {
                Some(SerializedEdge {
                    uuid: edge.uuid().clone(),
                    edge_type: edge.edge_type(),
                    direction: edge.direction(),
                    source: self.node(edge.source()).ok()?.uuid().clone(),
                    target: self.node(edge.target()).ok()?.uuid().clone(),
                    attributes: edge.attributes().clone(),
                    metadata: edge.metadata().to_vec(),
                    tags: edge.tags().clone(),
                    flags: edge.flags().clone(),
                })
            })
            .collect();
        edges.sort_by(|a, b| a.uuid.cmp(&b.uuid));

        Ok(SerializedGraph {
            version: self.version().to_string(),
            tree: self.serialize_node(self.node(ROOT)?),
            edges,
        })
    }

    fn serialize_node(&self, node: &Node) -> SerializedNode {
        let uuid_of = |id: Option<NodeId>| {
            id.and_then(|id| self.node(id).ok())
                .map(|n| n.uuid().clone())
        };

        let mut children = BTreeMap::new();
        for child in node.children().iter().filter_map(|c| self.node(*c).ok()) {
            let serialized = self.serialize_node(child);
            let key = if children.contains_key(&serialized.id) {
                serialized.uuid.to_string()
            } else {
                serialized.id.clone()
            };
            children.insert(key, serialized);
        }

        let mut edges: Vec<Uuid> = node
            .links()
            .iter()
            .filter_map(|e| self.edge(*e).ok().map(|edge| edge.uuid().clone()))
            .collect();
        edges.sort();

        let cfn_resource = match node.kind() {
            NodeKind::Resource {
                binding: CfnBinding::Bound(leaf),
            } => Some(match uuid_of(Some(*leaf)) {
                Some(uuid) => SerializedBinding::Bound(uuid),
                None => SerializedBinding::Unbound,
            }),
            NodeKind::Resource {
                binding: CfnBinding::Unbound,
            } => Some(SerializedBinding::Unbound),
            _ => None,
        };

        SerializedNode {
            uuid: node.uuid().clone(),
            node_type: node.node_type(),
            stack: uuid_of(node.stack()),
            parent: uuid_of(node.parent()),
            id: node.id().to_string(),
            path: node.path().to_string(),
            binding_info: node.binding_info().cloned(),
            logical_id: node.logical_id().map(str::to_string),
            resource_type: node.cfn_type().map(str::to_string),
            cfn_resource,
            attributes: node.attributes().clone(),
            metadata: node.metadata().to_vec(),
            tags: node.tags().clone(),
            flags: node.flags().clone(),
            children,
            edges,
        }
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        self.serialize()?.to_json(pretty)
    }

    pub fn from_json(input: &str, allow_destructive_mutations: bool) -> Result<Store> {
        let graph = SerializedGraph::from_json(input)?;
        Store::deserialize(&graph, allow_destructive_mutations)
    }

    /// Rebuild a store from its serialized form.
    pub fn deserialize(graph: &SerializedGraph, allow_destructive_mutations: bool) -> Result<Store> {
        let mut store = Store::with_version(&graph.version, allow_destructive_mutations);

        for child in graph.tree.children.values() {
            store
                .deserialize_node(child, ROOT)
                .map_err(|e| e.with_operation("store::deserialize"))?;
        }
        store
            .restore_bindings(&graph.tree)
            .map_err(|e| e.with_operation("store::deserialize"))?;

        for edge in &graph.edges {
            let source = store.get_node(edge.source.as_str()).map_err(|e| edge_error(edge, e))?;
            let target = store.get_node(edge.target.as_str()).map_err(|e| edge_error(edge, e))?;
            store.add_edge(EdgeSpec {
                uuid: edge.uuid.clone(),
                edge_type: edge.edge_type,
                direction: edge.direction,
                source,
                target,
                attributes: edge.attributes.clone(),
                metadata: edge.metadata.clone(),
                tags: edge.tags.clone(),
                flags: edge.flags.clone(),
            })?;
        }

        Ok(store)
    }

    fn deserialize_node(&mut self, serialized: &SerializedNode, parent: NodeId) -> Result<()> {
        let parent_uuid = self.node(parent)?.uuid().clone();
        if serialized.parent.as_ref() != Some(&parent_uuid) {
            return Err(Error::deserialization_failed(format!(
                "serialized node parent {:?} does not match visitor parent {parent_uuid}",
                serialized.parent
            ))
            .with_context("uuid", serialized.uuid.to_string()));
        }

        let stack = match &serialized.stack {
            Some(stack) if *stack != serialized.uuid => Some(self.get_stack(stack.as_str())?),
            _ => None,
        };

        let variant = self.variant_of(serialized, parent)?;
        let spec = NodeSpec {
            uuid: serialized.uuid.clone(),
            id: serialized.id.clone(),
            path: serialized.path.clone(),
            variant,
            stack,
            binding_info: serialized.binding_info.clone(),
            logical_id: serialized.logical_id.clone(),
            cfn_type: serialized.resource_type.clone(),
            attributes: serialized.attributes.clone(),
            metadata: serialized.metadata.clone(),
            tags: serialized.tags.clone(),
            flags: serialized.flags.clone(),
        };
        let id = self.add_node(parent, spec)?;

        for child in serialized.children.values() {
            self.deserialize_node(child, id)?;
        }
        Ok(())
    }

    /// Explicit leaf bindings may point anywhere in the tree, so they are
    /// applied once every node exists.
    fn restore_bindings(&mut self, serialized: &SerializedNode) -> Result<()> {
        if let Some(binding) = &serialized.cfn_resource {
            let resource = self.get_node(serialized.uuid.as_str())?;
            let binding = match binding {
                SerializedBinding::Bound(leaf) => CfnBinding::Bound(self.get_node(leaf.as_str())?),
                SerializedBinding::Unbound => CfnBinding::Unbound,
            };
            match &mut self.node_mut(resource)?.kind {
                NodeKind::Resource { binding: slot } => *slot = binding,
                _ => {
                    return Err(Error::deserialization_failed(
                        "leaf binding on a node that is not a resource wrapper",
                    )
                    .with_context("uuid", serialized.uuid.to_string()));
                }
            }
        }
        for child in serialized.children.values() {
            self.restore_bindings(child)?;
        }
        Ok(())
    }

    fn variant_of(&self, serialized: &SerializedNode, parent: NodeId) -> Result<NodeVariant> {
        let attribute = |key: &str| serialized.attributes.get(key).cloned();
        let text = |key: &str| {
            serialized
                .attributes
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        let variant = match serialized.node_type {
            NodeType::Root => {
                return Err(Error::deserialization_failed(
                    "a root node can only appear at the top of the tree",
                )
                .with_context("uuid", serialized.uuid.to_string()));
            }
            NodeType::App => NodeVariant::App,
            NodeType::Stage => NodeVariant::Stage,
            NodeType::Stack => NodeVariant::Stack,
            NodeType::NestedStack => {
                let parent_node = self.node(parent)?;
                let parent_stack = if parent_node.is_stack() {
                    Some(parent)
                } else {
                    self.nearest_ancestor(parent, &[NodeType::Stack, NodeType::NestedStack])
                };
                NodeVariant::NestedStack { parent_stack }
            }
            NodeType::Resource => NodeVariant::Resource {
                cdk_owned: serialized.flags.contains(&Flag::CdkOwned),
            },
            NodeType::CfnResource => NodeVariant::CfnResource,
            NodeType::Output => NodeVariant::Output {
                value: attribute(attr::OUTPUT_VALUE).unwrap_or(Value::Null),
                export_name: text(attr::OUTPUT_EXPORT_NAME),
                description: text(attr::DESCRIPTION),
            },
            NodeType::Parameter => NodeVariant::Parameter {
                value: attribute(attr::PARAMETER_VALUE).unwrap_or(Value::Null),
                parameter_type: text(attr::PARAMETER_TYPE).unwrap_or_default(),
                description: text(attr::DESCRIPTION),
            },
            NodeType::Default => NodeVariant::Default,
        };
        Ok(variant)
    }
}

fn edge_error(edge: &SerializedEdge, err: Error) -> Error {
    err.with_operation("store::deserialize")
        .with_context("edge", edge.uuid.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_serialized_node_shape() {
        let mut store = Store::new(false);
        let app = store
            .add_node(
                store.root(),
                NodeSpec::new(Uuid::new("App"), "App", "", NodeVariant::App),
            )
            .unwrap();
        store
            .add_node(
                app,
                NodeSpec::new(Uuid::new("s1"), "Stack", "Stack", NodeVariant::Stack)
                    .with_attribute("region", json!("eu-west-1")),
            )
            .unwrap();

        let value = serde_json::to_value(store.serialize().unwrap()).unwrap();
        let stack = &value["tree"]["children"]["App"]["children"]["Stack"];
        assert_eq!(stack["nodeType"], json!("STACK"));
        assert_eq!(stack["stack"], json!("s1"));
        assert_eq!(stack["parent"], json!("App"));
        assert_eq!(stack["flags"], json!(["CLUSTER"]));
        assert_eq!(stack["attributes"], json!({"region": "eu-west-1"}));
        assert!(stack.get("children").is_none());
        assert!(stack.get("logicalId").is_none());
    }

    #[test]
    fn test_parent_mismatch_is_rejected() {
        let input = json!({
            "version": "0.1.0",
            "tree": {
                "uuid": "Root", "nodeType": "ROOT", "id": "Root", "path": "",
                "children": {
                    "App": {"uuid": "App", "nodeType": "APP", "parent": "Other", "id": "App", "path": ""}
                }
            },
            "edges": []
        });
        let err = Store::from_json(&input.to_string(), false).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::DeserializationFailed);
    }
}
