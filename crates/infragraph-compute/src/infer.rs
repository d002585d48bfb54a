//! Classification helpers: node properties and flags inferred from a construct.
use std::collections::BTreeSet;

use infragraph_core::{
    APP_UUID, Attributes, BindingInfo, Flag, MetadataEntry, Tags, Uuid, attr, construct_id,
};
use serde_json::Value;

use crate::construct::{Construct, ConstructKind};
use crate::reference::{UnresolvedReference, extract_unresolved_references};

/// Binding types the classification depends on.
pub mod fqn {
    pub const APP: &str = "aws-cdk-lib.App";
    pub const STAGE: &str = "aws-cdk-lib.Stage";
    pub const STACK: &str = "aws-cdk-lib.Stack";
    pub const NESTED_STACK: &str = "aws-cdk-lib.NestedStack";
    pub const CFN_STACK: &str = "aws-cdk-lib.CfnStack";
    pub const CFN_OUTPUT: &str = "aws-cdk-lib.CfnOutput";
    pub const CFN_PARAMETER: &str = "aws-cdk-lib.CfnParameter";

    pub const CUSTOM_RESOURCE: &str = "aws-cdk-lib.CustomResource";
    pub const AWS_CUSTOM_RESOURCE: &str = "aws-cdk-lib.custom_resources.AwsCustomResource";
    pub const CUSTOM_RESOURCE_PROVIDER: &str = "aws-cdk-lib.custom_resources.Provider";
    pub const CUSTOM_RESOURCE_PROVIDER_2: &str = "aws-cdk-lib.CustomResourceProvider";

    pub const LAMBDA: &str = "aws-cdk-lib.aws_lambda.Function";
    pub const LAMBDA_LAYER_VERSION: &str = "aws-cdk-lib.aws_lambda.LayerVersion";
    pub const CFN_LAMBDA_LAYER_VERSION: &str = "aws-cdk-lib.aws_lambda.CfnLayerVersion";
    pub const LAMBDA_ALIAS: &str = "aws-cdk-lib.aws_lambda.Alias";
    pub const CFN_LAMBDA_ALIAS: &str = "aws-cdk-lib.aws_lambda.CfnAlias";
    pub const LAMBDA_BASE: &str = "aws-cdk-lib.aws_lambda.FunctionBase";
    pub const LAMBDA_SINGLETON: &str = "aws-cdk-lib.aws_lambda.SingletonFunction";
    pub const LAMBDA_LAYER_AWSCLI: &str = "aws-cdk-lib.lambda_layer_awscli.AwsCliLayer";
    pub const CFN_LAMBDA_PERMISSIONS: &str = "aws-cdk-lib.aws_lambda.CfnPermission";

    pub const ASSET_STAGING: &str = "aws-cdk-lib.AssetStaging";
    pub const S3_ASSET: &str = "aws-cdk-lib.aws_s3_assets.Asset";
    pub const ECR_TARBALL_ASSET: &str = "aws-cdk-lib.aws_ecr_assets.TarballImageAsset";
}

const ASSET_FQNS: &[&str] = &[fqn::S3_ASSET, fqn::ECR_TARBALL_ASSET];

const EXTRANEOUS_FQNS: &[&str] = &[
    fqn::S3_ASSET,
    fqn::ECR_TARBALL_ASSET,
    fqn::ASSET_STAGING,
    fqn::LAMBDA_LAYER_VERSION,
    fqn::CFN_LAMBDA_LAYER_VERSION,
    fqn::LAMBDA_ALIAS,
    fqn::CFN_LAMBDA_ALIAS,
    fqn::LAMBDA_BASE,
    fqn::LAMBDA_SINGLETON,
    fqn::LAMBDA_LAYER_AWSCLI,
    fqn::CFN_LAMBDA_PERMISSIONS,
];

const CUSTOM_RESOURCE_FQNS: &[&str] = &[
    fqn::CUSTOM_RESOURCE,
    fqn::AWS_CUSTOM_RESOURCE,
    fqn::CUSTOM_RESOURCE_PROVIDER,
    fqn::CUSTOM_RESOURCE_PROVIDER_2,
];

/// Id of the singleton function backing framework API-call custom resources.
pub const AWS_API_CALL_LAMBDA_ID: &str = "AWS679f53fac002430cb0da5b7982bd2287";

const SSM_PARAMETER_PREFIX: &str = "SsmParameterValue:";

/// Metadata entry type carrying the logical id, dropped from node metadata.
const LOGICAL_ID_METADATA: &str = "aws:cdk:logicalId";

/// Declared kind of `construct`, falling back to its binding type when the
/// kind was left as `other`.
pub fn effective_kind<C: Construct>(construct: &C) -> ConstructKind {
    match construct.kind() {
        ConstructKind::Other => construct
            .binding_info()
            .and_then(|info| kind_from_fqn(&info.fqn))
            .unwrap_or(ConstructKind::Other),
        kind => kind,
    }
}

fn kind_from_fqn(fqn: &str) -> Option<ConstructKind> {
    Some(match fqn {
        fqn::APP => ConstructKind::App,
        fqn::STAGE => ConstructKind::Stage,
        fqn::STACK => ConstructKind::Stack,
        fqn::NESTED_STACK => ConstructKind::NestedStack,
        fqn::CFN_OUTPUT => ConstructKind::Output,
        fqn::CFN_PARAMETER => ConstructKind::Parameter,
        _ => return None,
    })
}

pub fn is_cfn_stack<C: Construct>(construct: &C) -> bool {
    construct
        .binding_info()
        .is_some_and(|info| info.fqn == fqn::CFN_STACK)
}

pub fn construct_uuid<C: Construct>(construct: &C) -> Uuid {
    if effective_kind(construct) == ConstructKind::App {
        Uuid::new(APP_UUID)
    } else {
        Uuid::from_name(construct.unique_id())
    }
}

/// Everything the collector needs to build a node, before the variant is chosen.
#[derive(Debug, Clone, PartialEq)]
pub struct InferredProps {
    pub uuid: Uuid,
    pub attributes: Attributes,
    pub metadata: Vec<MetadataEntry>,
    pub tags: Tags,
    pub logical_id: Option<String>,
    pub cfn_type: Option<String>,
    pub binding_info: Option<BindingInfo>,
    pub dependencies: Vec<Uuid>,
    pub references: Vec<UnresolvedReference>,
    pub flags: BTreeSet<Flag>,
}

pub fn infer_node_props<C: Construct>(construct: &C, parent_is_stack: bool) -> InferredProps {
    let uuid = construct_uuid(construct);

    let metadata = construct
        .metadata()
        .iter()
        .filter(|entry| entry.kind != LOGICAL_ID_METADATA)
        .cloned()
        .collect();

    let mut attributes = construct.attributes().clone();
    let cfn_type = match attributes.remove(attr::CFN_TYPE) {
        Some(Value::String(cfn_type)) => Some(cfn_type),
        Some(other) => {
            attributes.insert(attr::CFN_TYPE.to_string(), other);
            None
        }
        None => None,
    };

    let tags = attributes
        .get_mut(attr::CFN_PROPS)
        .and_then(Value::as_object_mut)
        .and_then(|props| props.remove("tags"))
        .map(normalize_tags)
        .unwrap_or_default();

    let references = attributes
        .values()
        .flat_map(|value| extract_unresolved_references(&uuid, value))
        .collect();

    InferredProps {
        flags: infer_flags(construct, parent_is_stack),
        dependencies: construct
            .dependencies()
            .iter()
            .map(|dep| Uuid::from_name(dep))
            .collect(),
        uuid,
        attributes,
        metadata,
        tags,
        logical_id: construct.logical_id().map(str::to_string),
        cfn_type,
        binding_info: construct.binding_info().cloned(),
        references,
    }
}

/// Tags come either as a list of `{key, value}` pairs or as a plain map.
fn normalize_tags(tags: Value) -> Tags {
    fn text(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    match tags {
        Value::Array(entries) => entries
            .iter()
            .filter_map(|entry| {
                let key = entry.get("key")?;
                let value = entry.get("value")?;
                Some((text(key), text(value)))
            })
            .collect(),
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), text(v))).collect(),
        _ => Tags::new(),
    }
}

pub fn infer_flags<C: Construct>(construct: &C, parent_is_stack: bool) -> BTreeSet<Flag> {
    let mut flags = BTreeSet::new();
    let fqn = construct.binding_info().map(|info| info.fqn.as_str());
    let id = construct.id();

    if construct.is_import() {
        flags.insert(Flag::Import);
    } else if let Some(fqn) = fqn {
        if EXTRANEOUS_FQNS.contains(&fqn) {
            flags.insert(Flag::Extraneous);
        }
        if ASSET_FQNS.contains(&fqn) {
            flags.insert(Flag::Asset);
        }
    }

    if let [only_child] = construct.children()
        && matches!(only_child.id(), construct_id::RESOURCE | construct_id::DEFAULT)
    {
        flags.insert(Flag::ResourceWrapper);
    }

    if id == construct_id::EXPORTS && parent_is_stack {
        flags.insert(Flag::Extraneous);
    }

    if id.starts_with(SSM_PARAMETER_PREFIX) {
        flags.insert(Flag::Extraneous);
    }

    if fqn == Some(fqn::LAMBDA) && construct.is_owned_resource() && id == AWS_API_CALL_LAMBDA_ID {
        flags.insert(Flag::AwsApiCallLambda);
        flags.insert(Flag::Extraneous);
    }

    if let Some(fqn) = fqn
        && CUSTOM_RESOURCE_FQNS.contains(&fqn)
    {
        flags.insert(Flag::CustomResource);
        if fqn == fqn::AWS_CUSTOM_RESOURCE {
            flags.insert(Flag::AwsCustomResource);
        }
    }

    flags
}

/// Recursive object merge; values from `source` win on conflicts.
pub fn deep_merge(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, source) => *target = source.clone(),
    }
}

pub fn merge_attributes(target: &mut Attributes, source: &Attributes) {
    for (key, value) in source {
        match target.get_mut(key) {
            Some(existing) => deep_merge(existing, value),
            None => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}
