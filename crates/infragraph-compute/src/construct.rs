//! Input side of graph computation: the tree of constructs produced by the
//! infrastructure framework.
use std::path::Path;

use infragraph_core::{Attributes, BindingInfo, MetadataEntry, attr};
use infragraph_error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared type of a construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConstructKind {
    App,
    Stage,
    Stack,
    NestedStack,
    Output,
    Parameter,
    /// Higher level resource that wraps leaf resources.
    Resource,
    /// Leaf resource carrying a resource type.
    CfnResource,
    #[default]
    Other,
}

/// Resolved values of an output construct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputProps {
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Resolved values of a parameter construct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParameterProps {
    pub value: Value,
    #[serde(rename = "type")]
    pub parameter_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for ParameterProps {
    fn default() -> Self {
        Self {
            value: Value::Null,
            parameter_type: "String".to_string(),
            description: None,
        }
    }
}

/// One node of the external construct tree.
///
/// Everything is already resolved by the framework: attributes hold plain
/// JSON apart from the reference expressions (`Ref`, `Fn::GetAtt`,
/// `Fn::ImportValue`) the graph turns into edges, and dependencies name
/// their targets by unique id.
pub trait Construct: Sized {
    fn id(&self) -> &str;

    fn path(&self) -> &str;

    /// Structurally unique name the node uuid is derived from.
    fn unique_id(&self) -> &str {
        self.path()
    }

    fn kind(&self) -> ConstructKind;

    fn binding_info(&self) -> Option<&BindingInfo>;

    fn attributes(&self) -> &Attributes;

    fn metadata(&self) -> &[MetadataEntry];

    /// Unique ids of the constructs this one depends on.
    fn dependencies(&self) -> &[String];

    fn logical_id(&self) -> Option<&str>;

    fn children(&self) -> &[Self];

    /// Construct referencing a resource that lives outside the app.
    fn is_import(&self) -> bool {
        false
    }

    /// Resource created by the framework on behalf of another construct.
    fn is_owned_resource(&self) -> bool {
        false
    }

    fn output(&self) -> Option<&OutputProps> {
        None
    }

    fn parameter(&self) -> Option<&ParameterProps> {
        None
    }

    fn find_child(&self, id: &str) -> Option<&Self> {
        self.children().iter().find(|child| child.id() == id)
    }
}

/// Serde backed construct, the shape read from a construct tree file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructNode {
    pub id: String,
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub kind: ConstructKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub construct_info: Option<BindingInfo>,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<MetadataEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_id: Option<String>,
    #[serde(default)]
    pub imported: bool,
    #[serde(default)]
    pub owned_resource: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputProps>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<ParameterProps>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ConstructNode>,
}

impl ConstructNode {
    pub fn new(id: impl Into<String>, kind: ConstructKind) -> Self {
        let id = id.into();
        Self {
            path: id.clone(),
            id,
            kind,
            ..Default::default()
        }
    }

    /// The app construct, whose path is empty.
    pub fn app() -> Self {
        Self {
            id: "App".to_string(),
            kind: ConstructKind::App,
            ..Default::default()
        }
    }

    pub fn from_json(input: &str) -> Result<Self> {
        serde_json::from_str(input).map_err(|e| {
            Error::deserialization_failed("failed to decode construct tree").set_source(e)
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)
            .map_err(|e| Error::from(e).with_context("path", path.display().to_string()))?;
        Self::from_json(&input).map_err(|e| e.with_context("path", path.display().to_string()))
    }

    /// Append `child`, re-deriving the paths of its whole subtree.
    pub fn with_child(mut self, mut child: ConstructNode) -> Self {
        child.rebase(&self.path);
        self.children.push(child);
        self
    }

    fn rebase(&mut self, parent_path: &str) {
        self.path = if parent_path.is_empty() {
            self.id.clone()
        } else {
            format!("{parent_path}/{}", self.id)
        };
        let path = self.path.clone();
        for child in &mut self.children {
            child.rebase(&path);
        }
    }

    pub fn with_fqn(mut self, fqn: impl Into<String>) -> Self {
        self.construct_info = Some(BindingInfo::new(fqn, "2.0.0"));
        self
    }

    pub fn with_logical_id(mut self, logical_id: impl Into<String>) -> Self {
        self.logical_id = Some(logical_id.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_cfn_type(self, cfn_type: &str) -> Self {
        self.with_attribute(attr::CFN_TYPE, Value::String(cfn_type.to_string()))
    }

    pub fn with_props(self, props: Value) -> Self {
        self.with_attribute(attr::CFN_PROPS, props)
    }

    pub fn with_metadata(mut self, kind: impl Into<String>, data: Value) -> Self {
        self.metadata.push(MetadataEntry::new(kind, data));
        self
    }

    pub fn with_dependency(mut self, unique_id: impl Into<String>) -> Self {
        self.dependencies.push(unique_id.into());
        self
    }

    pub fn with_output(mut self, output: OutputProps) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_parameter(mut self, parameter: ParameterProps) -> Self {
        self.parameter = Some(parameter);
        self
    }

    pub fn imported(mut self) -> Self {
        self.imported = true;
        self
    }

    pub fn owned(mut self) -> Self {
        self.owned_resource = true;
        self
    }
}

impl Construct for ConstructNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn unique_id(&self) -> &str {
        self.unique_id.as_deref().unwrap_or(&self.path)
    }

    fn kind(&self) -> ConstructKind {
        self.kind
    }

    fn binding_info(&self) -> Option<&BindingInfo> {
        self.construct_info.as_ref()
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn metadata(&self) -> &[MetadataEntry] {
        &self.metadata
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn logical_id(&self) -> Option<&str> {
        self.logical_id.as_deref()
    }

    fn children(&self) -> &[Self] {
        &self.children
    }

    fn is_import(&self) -> bool {
        self.imported
    }

    fn is_owned_resource(&self) -> bool {
        self.owned_resource
    }

    fn output(&self) -> Option<&OutputProps> {
        self.output.as_ref()
    }

    fn parameter(&self) -> Option<&ParameterProps> {
        self.parameter.as_ref()
    }
}
