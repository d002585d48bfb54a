//! Second pass: turn the recorded references and dependencies into edges now
//! that every node is stored.
use infragraph_core::{EdgeId, EdgeSpec, NodeId, Store, Uuid};
use infragraph_error::{Error, Result};
use tracing::{debug, trace, warn};

use crate::reference::{ReferenceKind, UnresolvedDependency, UnresolvedReference};

/// Attribute prefix of a reference to a nested stack output.
const OUTPUTS_PREFIX: &str = "Outputs.";

/// Tally of the second pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindSummary {
    pub references: usize,
    pub dropped_references: usize,
    pub dependencies: usize,
    pub dropped_dependencies: usize,
}

/// Resolve every record into an edge. A record that cannot be resolved is
/// logged and dropped; the rest of the graph is still bound.
pub fn bind_unresolved(
    store: &mut Store,
    references: &[UnresolvedReference],
    dependencies: &[UnresolvedDependency],
) -> BindSummary {
    let mut summary = BindSummary::default();

    for unresolved in references {
        match resolve_reference(store, unresolved) {
            Ok(edge) => {
                trace!(%edge, target = %unresolved.target, "reference bound");
                summary.references += 1;
            }
            Err(err) => {
                warn!(
                    source = %unresolved.source,
                    kind = ?unresolved.kind,
                    target = %unresolved.target,
                    error = %err.message(),
                    "dropping unresolved reference"
                );
                summary.dropped_references += 1;
            }
        }
    }

    for unresolved in dependencies {
        match resolve_dependency(store, unresolved) {
            Ok(_) => summary.dependencies += 1,
            Err(err) => {
                warn!(
                    source = %unresolved.source,
                    target = %unresolved.target,
                    error = %err.message(),
                    "dropping unresolved dependency"
                );
                summary.dropped_dependencies += 1;
            }
        }
    }

    debug!(?summary, "references bound");
    summary
}

pub fn resolve_reference(store: &mut Store, unresolved: &UnresolvedReference) -> Result<EdgeId> {
    let source = store.get_node(unresolved.source.as_str())?;
    let source_node = store.node(source)?;
    let stack = source_node.stack().ok_or_else(|| {
        Error::reference_resolution(format!("node '{}' is not within a stack", source_node.path()))
    })?;
    let uuid = unresolved.edge_uuid()?;

    let spec = match unresolved.kind {
        // Logical ids are only unique within a stack.
        ReferenceKind::Ref => {
            let target = store.find_node_by_logical_id(stack, &unresolved.target)?;
            EdgeSpec::reference(uuid, source, target)
        }
        ReferenceKind::Import => {
            let target = resolve_import(store, &unresolved.target)?;
            EdgeSpec::import_reference(uuid, source, target)
        }
        ReferenceKind::Attribute => {
            let attribute = unresolved.value.as_deref().unwrap_or_default();
            let target = match attribute.strip_prefix(OUTPUTS_PREFIX) {
                Some(output) => {
                    let output_stack = find_output_stack(store, source, &unresolved.target)?;
                    store.find_output(output_stack, output)?
                }
                None => store.find_node_by_logical_id(stack, &unresolved.target)?,
            };
            EdgeSpec::attribute_reference(uuid, source, target, attribute)
        }
    };
    store.add_edge(spec)
}

pub fn resolve_dependency(store: &mut Store, unresolved: &UnresolvedDependency) -> Result<EdgeId> {
    let source = store.get_node(unresolved.source.as_str())?;
    let target = store.get_node(unresolved.target.as_str())?;
    store.add_edge(EdgeSpec::dependency(unresolved.edge_uuid(), source, target))
}

/// The stack whose logical id is `logical_id`, searched among the stacks of
/// the source's stage (all stacks when there is no stage). Anything but
/// exactly one candidate is a failure.
fn find_output_stack(store: &Store, source: NodeId, logical_id: &str) -> Result<NodeId> {
    let stage = store
        .root_stack(source)
        .and_then(|stack| store.node(stack).ok())
        .and_then(|stack| stack.stage());
    let stacks: Vec<NodeId> = match stage.and_then(|stage| store.node(stage).ok()) {
        Some(stage) => stage.stage_stacks().collect(),
        None => store.stacks().collect(),
    };

    let candidates: Vec<NodeId> = stacks
        .into_iter()
        .filter(|stack| store.node(*stack).is_ok_and(|n| n.logical_id() == Some(logical_id)))
        .collect();

    match candidates.as_slice() {
        [stack] => Ok(*stack),
        _ => Err(Error::reference_resolution(format!(
            "failed to find Fn::GetAtt stack for output reference '{logical_id}': {} candidates",
            candidates.len()
        ))
        .with_context("candidates", describe_nodes(store, &candidates))),
    }
}

/// Target of an imported export: the output exporting that name, else the
/// `<stack>:<logicalId>` form read from the name itself.
fn resolve_import(store: &Store, name: &str) -> Result<NodeId> {
    let exporters: Vec<NodeId> = store
        .stacks()
        .flat_map(|stack| store.exports(stack))
        .filter(|output| store.node(*output).is_ok_and(|n| n.export_name() == Some(name)))
        .collect();
    match exporters.as_slice() {
        [output] => return Ok(*output),
        [] => {}
        _ => {
            return Err(Error::reference_resolution(format!(
                "export '{name}' is declared by {} outputs",
                exporters.len()
            ))
            .with_context("candidates", describe_nodes(store, &exporters)));
        }
    }

    // Staged stack names carry a `-` separator that the id form drops.
    let normalized = name.replacen('-', "", 1);
    let (stack_token, logical_id) = normalized.split_once(':').ok_or_else(|| {
        Error::reference_resolution(format!("no output exports '{name}'"))
    })?;
    let stack = find_stack_by_token(store, stack_token)?;
    store.find_node_by_logical_id(stack, logical_id)
}

fn find_stack_by_token(store: &Store, token: &str) -> Result<NodeId> {
    if let Ok(stack) = store.get_stack(token) {
        return Ok(stack);
    }
    if let Ok(stack) = store.get_stack(Uuid::from_name(token).as_str()) {
        return Ok(stack);
    }

    let candidates: Vec<NodeId> = store
        .stacks()
        .filter(|stack| {
            store
                .node(*stack)
                .is_ok_and(|n| n.id() == token || n.path().replace('/', "") == token)
        })
        .collect();
    match candidates.as_slice() {
        [stack] => Ok(*stack),
        _ => Err(Error::reference_resolution(format!(
            "stack '{token}' matches {} stacks",
            candidates.len()
        ))
        .with_context("candidates", describe_nodes(store, &candidates))),
    }
}

fn describe_nodes(store: &Store, ids: &[NodeId]) -> String {
    ids.iter()
        .filter_map(|id| store.node(*id).ok())
        .map(|n| format!("{}:{}", n.path(), n.logical_id().unwrap_or("ROOT")))
        .collect::<Vec<_>>()
        .join(", ")
}
