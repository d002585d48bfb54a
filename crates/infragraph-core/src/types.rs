use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// Attribute bag of an entity. Values are arbitrary JSON.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Tag map of an entity.
pub type Tags = BTreeMap<String, String>;

/// Uuid of the store root. Never indexed in the node table.
pub const ROOT_UUID: &str = "Root";

/// Uuid of the app node.
pub const APP_UUID: &str = "App";

/// Stable entity identifier, persisted in the serialized graph.
///
/// Most uuids are name-based uuids derived from a construct's unique id;
/// the root and app use the fixed values [`ROOT_UUID`] and [`APP_UUID`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uuid(String);

impl Uuid {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Deterministic uuid for a structurally unique name.
    pub fn from_name(name: &str) -> Self {
        Self(uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, name.as_bytes()).to_string())
    }

    /// Deterministic uuid with a readable prefix, e.g. `REF:<uuid>`.
    pub fn prefixed(prefix: &str, name: &str) -> Self {
        Self(format!("{prefix}{}", Self::from_name(name).0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Uuid {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Uuid {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Uuid {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Arena handle of a node inside one store. Not stable across clones.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Default)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Arena handle of an edge inside one store.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Default)]
pub struct EdgeId(pub(crate) u32);

impl EdgeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Root,
    App,
    Stage,
    Stack,
    NestedStack,
    /// Higher level resource wrapping a leaf resource.
    Resource,
    /// Leaf resource, one deployable unit with a resource type.
    CfnResource,
    Output,
    Parameter,
    Default,
}

impl NodeType {
    pub fn is_stack(self) -> bool {
        matches!(self, NodeType::Stack | NodeType::NestedStack)
    }

    pub fn is_resource_like(self) -> bool {
        matches!(self, NodeType::Resource | NodeType::CfnResource)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    Dependency,
    Reference,
    AttributeReference,
    ImportReference,
}

impl EdgeType {
    pub fn is_reference(self) -> bool {
        !matches!(self, EdgeType::Dependency)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EdgeDirection {
    None,
    #[default]
    Forward,
    Back,
    Both,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Flag {
    /// Structural grouping (app, stage, stack).
    Cluster,
    /// Root and app: hold the graph but are not part of the deployment.
    GraphContainer,
    /// Safe to elide without changing what the graph means.
    Extraneous,
    /// Construct whose only child is `Resource` or `Default`.
    ResourceWrapper,
    Asset,
    /// Resource created by the framework rather than the user.
    CdkOwned,
    CfnFqn,
    /// Edge created with the same source and target.
    ClosedEdge,
    Mutated,
    Import,
    CustomResource,
    AwsCustomResource,
    AwsApiCallLambda,
}

/// Order in which `find_all` yields nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum TraversalOrder {
    #[default]
    PreOrder,
    PostOrder,
}

/// One entry of an entity's metadata list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl MetadataEntry {
    pub fn new(kind: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }
}

/// Source type of the construct a node was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingInfo {
    pub fqn: String,
    #[serde(default)]
    pub version: String,
}

impl BindingInfo {
    pub fn new(fqn: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            fqn: fqn.into(),
            version: version.into(),
        }
    }

    /// Last segment of the fqn, e.g. `Bucket` for `aws-cdk-lib.aws_s3.Bucket`.
    pub fn type_name(&self) -> &str {
        self.fqn.rsplit('.').next().unwrap_or(&self.fqn)
    }
}

/// Well known attribute keys.
pub mod attr {
    /// Resource type of a leaf construct, as supplied by the framework.
    pub const CFN_TYPE: &str = "aws:cdk:cloudformation:type";
    /// Resolved properties of a leaf construct.
    pub const CFN_PROPS: &str = "aws:cdk:cloudformation:props";

    pub const DESCRIPTION: &str = "description";

    pub const REFERENCE_VALUE: &str = "graph:reference:attribute:value";

    pub const RESOURCE_CFN_TYPE: &str = "graph:resource:cfn-type";
    pub const RESOURCE_CFN_PROPS: &str = "graph:resource:cfn-props";

    pub const OUTPUT_VALUE: &str = "graph:output:value";
    pub const OUTPUT_EXPORT_NAME: &str = "graph:output:export-name";

    pub const PARAMETER_VALUE: &str = "graph:parameter:value";
    pub const PARAMETER_TYPE: &str = "graph:parameter:type";
}

/// Construct ids with a fixed meaning in the source framework.
pub mod construct_id {
    pub const RESOURCE: &str = "Resource";
    pub const DEFAULT: &str = "Default";
    pub const EXPORTS: &str = "Exports";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_uuid_from_name_is_stable() {
        assert_eq!(Uuid::from_name("App/Stack"), Uuid::from_name("App/Stack"));
        assert_ne!(Uuid::from_name("App/Stack"), Uuid::from_name("App/Other"));
        assert!(Uuid::prefixed("REF:", "x").as_str().starts_with("REF:"));
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(NodeType::CfnResource.to_string(), "CFN_RESOURCE");
        assert_eq!(NodeType::from_str("NESTED_STACK").unwrap(), NodeType::NestedStack);
        assert_eq!(
            serde_json::to_string(&EdgeType::AttributeReference).unwrap(),
            "\"ATTRIBUTE_REFERENCE\""
        );
        assert_eq!(
            serde_json::to_string(&EdgeDirection::Forward).unwrap(),
            "\"forward\""
        );
        assert_eq!(Flag::GraphContainer.to_string(), "GRAPH_CONTAINER");
    }

    #[test]
    fn test_binding_type_name() {
        let info = BindingInfo::new("aws-cdk-lib.aws_s3.Bucket", "2.0.0");
        assert_eq!(info.type_name(), "Bucket");
    }
}
