//! First pass: walk the construct tree once, classify every construct into a
//! node and record the references and dependencies to resolve later.
use std::collections::HashSet;

use infragraph_core::{NodeId, NodeSpec, NodeType, NodeVariant, Store};
use infragraph_error::{Error, Result};
use tracing::{debug, trace, warn};

use crate::ComputeOption;
use crate::construct::{Construct, ConstructKind};
use crate::infer::{
    InferredProps, effective_kind, infer_node_props, is_cfn_stack, merge_attributes,
};
use crate::reference::{UnresolvedDependency, UnresolvedReference, extract_unresolved_references};

/// Children of a stack that only exist to support deployment.
const IGNORED_STACK_CHILDREN: &[&str] = &["CDKMetadata", "BootstrapVersion", "CheckBootstrapVersion"];

/// Construct under the app that synthesizes the tree file itself.
const TREE_ID: &str = "Tree";

const NESTED_STACK_WRAPPER_SUFFIX: &str = ".NestedStack";
const NESTED_STACK_RESOURCE_SUFFIX: &str = ".NestedStackResource";

/// Output of the first pass. The store is complete; edges are still missing.
#[derive(Debug)]
pub struct Collected {
    pub store: Store,
    pub references: Vec<UnresolvedReference>,
    pub dependencies: Vec<UnresolvedDependency>,
}

#[derive(Debug)]
pub struct Collector<'a> {
    option: &'a ComputeOption,
    store: Store,
    references: Vec<UnresolvedReference>,
    dependencies: Vec<UnresolvedDependency>,
}

impl<'a> Collector<'a> {
    pub fn new(option: &'a ComputeOption) -> Self {
        Self {
            option,
            store: Store::new(false),
            references: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn collect<C: Construct>(mut self, root: &C) -> Result<Collected> {
        let store_root = self.store.root();
        self.visit(root, None, store_root, None)?;

        debug!(
            nodes = self.store.counts().nodes,
            references = self.references.len(),
            dependencies = self.dependencies.len(),
            "construct tree collected"
        );
        Ok(Collected {
            store: self.store,
            references: self.references,
            dependencies: self.dependencies,
        })
    }

    fn is_skipped<C: Construct>(&self, construct: &C, parent_type: NodeType) -> bool {
        let id = construct.id();
        (parent_type == NodeType::App && id == TREE_ID)
            || (parent_type.is_stack() && IGNORED_STACK_CHILDREN.contains(&id))
            || self.option.is_ignored(construct.path())
    }

    fn visit<C: Construct>(
        &mut self,
        construct: &C,
        scope: Option<&C>,
        parent: NodeId,
        stack: Option<NodeId>,
    ) -> Result<()> {
        let parent_type = self.store.node(parent)?.node_type();
        if self.is_skipped(construct, parent_type) {
            trace!(path = construct.path(), "construct skipped");
            return Ok(());
        }

        let path = construct.path();
        if is_cfn_stack(construct) {
            return Err(Error::structural(
                path,
                "nested stack resource reached outside of its nested stack",
            ));
        }

        let mut props = infer_node_props(construct, parent_type.is_stack());
        let variant = match effective_kind(construct) {
            ConstructKind::App => NodeVariant::App,
            ConstructKind::Stage => NodeVariant::Stage,
            ConstructKind::Stack => NodeVariant::Stack,
            ConstructKind::NestedStack => {
                merge_nested_stack(construct, scope, &mut props)?;
                NodeVariant::NestedStack {
                    parent_stack: stack,
                }
            }
            ConstructKind::Output => {
                if stack.is_none() {
                    return Err(Error::structural(path, "output must be within a stack"));
                }
                let output = construct.output().cloned().unwrap_or_default();
                props
                    .references
                    .extend(extract_unresolved_references(&props.uuid, &output.value));
                NodeVariant::Output {
                    value: output.value,
                    export_name: output.export_name,
                    description: output.description,
                }
            }
            ConstructKind::Parameter => {
                if stack.is_none() {
                    return Err(Error::structural(path, "parameter must be within a stack"));
                }
                let parameter = construct.parameter().cloned().unwrap_or_default();
                NodeVariant::Parameter {
                    value: parameter.value,
                    parameter_type: parameter.parameter_type,
                    description: parameter.description,
                }
            }
            ConstructKind::Resource => NodeVariant::Resource {
                cdk_owned: construct.is_owned_resource(),
            },
            ConstructKind::CfnResource | ConstructKind::Other if props.cfn_type.is_some() => {
                NodeVariant::CfnResource
            }
            ConstructKind::CfnResource | ConstructKind::Other => NodeVariant::Default,
        };

        let uuid = props.uuid.clone();
        self.dependencies.extend(
            props
                .dependencies
                .iter()
                .map(|target| UnresolvedDependency::new(uuid.clone(), target.clone())),
        );
        self.references.append(&mut props.references);

        let spec = NodeSpec::new(props.uuid, construct.id(), path, variant)
            .with_stack(stack)
            .with_binding_info(props.binding_info)
            .with_logical_id(props.logical_id)
            .with_cfn_type(props.cfn_type)
            .with_attributes(props.attributes)
            .with_metadata(props.metadata)
            .with_tags(props.tags)
            .with_flags(props.flags);
        let node = self.store.add_node(parent, spec)?;
        trace!(%node, path, "construct collected");

        let child_stack = if self.store.node(node)?.is_stack() {
            Some(node)
        } else {
            stack
        };

        // Wrappers of nested stacks are merged into the nested stack node.
        let wrappers: HashSet<String> = construct
            .children()
            .iter()
            .filter(|child| effective_kind(*child) == ConstructKind::NestedStack)
            .map(|child| format!("{}{NESTED_STACK_WRAPPER_SUFFIX}", child.id()))
            .collect();

        for child in construct.children() {
            if wrappers.contains(child.id()) {
                continue;
            }
            if let Err(err) = self.visit(child, Some(construct), node, child_stack) {
                warn!(path = child.path(), error = %err.message(), "failed to compute graph for construct");
                if path.is_empty() {
                    return Err(err);
                }
                return Err(err.with_context("ancestor", path));
            }
        }

        Ok(())
    }
}

/// Fold the nested stack wrapper (`<id>.NestedStack`) and its stack resource
/// (`<id>.NestedStackResource`) into the nested stack's own properties.
fn merge_nested_stack<C: Construct>(
    construct: &C,
    scope: Option<&C>,
    props: &mut InferredProps,
) -> Result<()> {
    let path = construct.path();
    let scope =
        scope.ok_or_else(|| Error::structural(path, "nested stack has no enclosing scope"))?;

    let wrapper_id = format!("{}{NESTED_STACK_WRAPPER_SUFFIX}", construct.id());
    let wrapper = scope.find_child(&wrapper_id).ok_or_else(|| {
        Error::structural(path, format!("nested stack wrapper '{wrapper_id}' is missing"))
    })?;
    let resource_id = format!("{}{NESTED_STACK_RESOURCE_SUFFIX}", construct.id());
    let resource = wrapper.find_child(&resource_id).ok_or_else(|| {
        Error::structural(
            wrapper.path(),
            format!("nested stack resource '{resource_id}' is missing"),
        )
    })?;

    let wrapper = infer_node_props(wrapper, true);
    let resource = infer_node_props(resource, false);

    merge_attributes(&mut props.attributes, &wrapper.attributes);
    merge_attributes(&mut props.attributes, &resource.attributes);
    props.metadata.extend(wrapper.metadata);
    props.metadata.extend(resource.metadata);
    props.logical_id = resource.logical_id;

    for dependency in wrapper.dependencies.into_iter().chain(resource.dependencies) {
        if !props.dependencies.contains(&dependency) {
            props.dependencies.push(dependency);
        }
    }

    let merged: Vec<UnresolvedReference> = wrapper
        .references
        .into_iter()
        .chain(resource.references)
        .map(|mut reference| {
            reference.source = props.uuid.clone();
            reference
        })
        .collect();
    for reference in merged {
        let duplicate = props
            .references
            .iter()
            .any(|existing| existing.dedup_key() == reference.dedup_key());
        if !duplicate {
            props.references.push(reference);
        }
    }

    Ok(())
}
