use std::collections::BTreeMap;

use infragraph_core::{
    EdgeSpec, GraphEntity, NodeSpec, NodeVariant, Store, Uuid, attr,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn build() -> Store {
    let mut store = Store::new(false);
    let root = store.root();
    let app = store
        .add_node(root, NodeSpec::new(Uuid::new("App"), "App", "", NodeVariant::App))
        .unwrap();
    let stage = store
        .add_node(app, NodeSpec::new(Uuid::new("dev"), "Dev", "Dev", NodeVariant::Stage))
        .unwrap();
    let stack = store
        .add_node(
            stage,
            NodeSpec::new(Uuid::new("dev-stack"), "Stack", "Dev/Stack", NodeVariant::Stack),
        )
        .unwrap();
    let nested = store
        .add_node(
            stack,
            NodeSpec::new(
                Uuid::new("dev-nested"),
                "Nested",
                "Dev/Stack/Nested",
                NodeVariant::NestedStack { parent_stack: Some(stack) },
            )
            .with_logical_id(Some("NestedStackResource".into())),
        )
        .unwrap();
    let table = store
        .add_node(
            nested,
            NodeSpec::new(
                Uuid::new("dev-table"),
                "Table",
                "Dev/Stack/Nested/Table",
                NodeVariant::CfnResource,
            )
            .with_stack(Some(nested))
            .with_cfn_type(Some("AWS::DynamoDB::Table".into()))
            .with_logical_id(Some("Table1".into()))
            .with_tags(BTreeMap::from([("team".to_string(), "data".to_string())])),
        )
        .unwrap();
    let param = store
        .add_node(
            stack,
            NodeSpec::new(
                Uuid::new("dev-param"),
                "reference-to-Other",
                "Dev/Stack/reference-to-Other",
                NodeVariant::Parameter {
                    value: json!("x"),
                    parameter_type: "String".into(),
                    description: Some("cross stack".into()),
                },
            )
            .with_stack(Some(stack)),
        )
        .unwrap();
    store
        .add_edge(EdgeSpec::attribute_reference(
            Uuid::new("ATT:param-table"),
            param,
            table,
            "Arn",
        ))
        .unwrap();
    store
        .add_edge(EdgeSpec::dependency(Uuid::new("DEP:nested-stack"), nested, stack))
        .unwrap();
    store
}

fn snapshot(store: &Store) -> BTreeMap<String, (Value, Value)> {
    store
        .nodes()
        .map(|(_, node)| {
            let parent_uuid = node
                .parent()
                .map(|p| store.node(p).unwrap().uuid().to_string());
            (
                node.uuid().to_string(),
                (
                    serde_json::to_value(node.attributes()).unwrap(),
                    json!({
                        "flags": node.flags(),
                        "tags": node.tags(),
                        "parent": parent_uuid,
                        "depth": node.depth(),
                        "logicalId": node.logical_id(),
                    }),
                ),
            )
        })
        .collect()
}

#[test]
fn round_trip_preserves_graph() {
    let store = build();
    let json = store.to_json(true).unwrap();
    let restored = Store::from_json(&json, false).unwrap();

    assert_eq!(restored.counts(), store.counts());
    assert_eq!(snapshot(&restored), snapshot(&store));

    let edge = restored.get_edge("ATT:param-table").unwrap();
    assert_eq!(restored.edge(edge).unwrap().reference_value(), Some("Arn"));
    assert_eq!(restored.to_json(true).unwrap(), json);
}

#[test]
fn round_trip_rebuilds_registries() {
    let restored = build().clone_store(false).unwrap();

    let stage = restored.get_stage("dev").unwrap();
    let stack = restored.get_stack("dev-stack").unwrap();
    let nested = restored.get_stack("dev-nested").unwrap();
    let table = restored.get_node("dev-table").unwrap();
    let param = restored.get_node("dev-param").unwrap();

    assert_eq!(restored.node(stack).unwrap().stage(), Some(stage));
    assert_eq!(restored.node(nested).unwrap().stage(), Some(stage));
    assert_eq!(restored.node(nested).unwrap().parent_stack(), Some(stack));
    assert_eq!(restored.find_node_by_logical_id(nested, "Table1").unwrap(), table);
    assert_eq!(restored.find_parameter(stack, "reference-to-Other").unwrap(), param);
    assert!(restored.node(param).unwrap().is_stack_reference());
    assert_eq!(
        restored.node(param).unwrap().get_attribute(attr::PARAMETER_TYPE),
        Some(&json!("String"))
    );
    assert!(!restored.allow_destructive_mutations());
}

#[test]
fn round_trip_after_mutation() {
    let store = build();
    let mut copy = store.clone_mutable().unwrap();
    let nested = copy.get_node("dev-nested").unwrap();
    copy.collapse_node(nested).unwrap();

    let copy = copy.into_store();
    let restored = Store::from_json(&copy.to_json(false).unwrap(), true).unwrap();

    assert_eq!(restored.counts(), copy.counts());
    assert_eq!(snapshot(&restored), snapshot(&copy));
    assert!(restored.get_node("dev-table").is_err());
    let nested = restored.get_node("dev-nested").unwrap();
    assert_eq!(
        restored.node(nested).unwrap().get_attribute(attr::RESOURCE_CFN_TYPE),
        None
    );
    assert_eq!(restored.node(nested).unwrap().get_tag("team"), Some("data"));
}

#[test]
fn serialized_edges_are_sorted() {
    let graph = build().serialize().unwrap();
    let uuids: Vec<_> = graph.edges.iter().map(|e| e.uuid.to_string()).collect();
    assert_eq!(uuids, vec!["ATT:param-table", "DEP:nested-stack"]);
    assert_eq!(graph.tree.children["App"].children["Dev"].node_type.to_string(), "STAGE");
}

fn bucket_with_two_leaves() -> Store {
    let mut store = Store::new(false);
    let app = store
        .add_node(store.root(), NodeSpec::new(Uuid::new("App"), "App", "", NodeVariant::App))
        .unwrap();
    let stack = store
        .add_node(app, NodeSpec::new(Uuid::new("stack"), "Stack", "Stack", NodeVariant::Stack))
        .unwrap();
    let bucket = store
        .add_node(
            stack,
            NodeSpec::new(
                Uuid::new("bucket"),
                "Bucket",
                "Stack/Bucket",
                NodeVariant::Resource { cdk_owned: false },
            )
            .with_stack(Some(stack)),
        )
        .unwrap();
    for (id, cfn_type) in [("Resource", "AWS::S3::Bucket"), ("Policy", "AWS::S3::BucketPolicy")] {
        store
            .add_node(
                bucket,
                NodeSpec::new(
                    Uuid::new(format!("bucket-{id}")),
                    id,
                    format!("Stack/Bucket/{id}"),
                    NodeVariant::CfnResource,
                )
                .with_stack(Some(stack))
                .with_cfn_type(Some(cfn_type.into())),
            )
            .unwrap();
    }
    store
}

fn bound_leaf_id(store: &Store) -> Option<String> {
    let bucket = store.get_node("bucket").unwrap();
    store
        .cfn_resource_of(bucket)
        .map(|leaf| store.node(leaf).unwrap().id().to_string())
}

#[test]
fn round_trip_keeps_explicit_leaf_binding() {
    let store = bucket_with_two_leaves();
    assert_eq!(bound_leaf_id(&store).as_deref(), Some("Resource"));
    assert!(store.serialize().unwrap().tree.children["App"].children["Stack"].children["Bucket"]
        .cfn_resource
        .is_none());

    let mut copy = store.clone_mutable().unwrap();
    let bucket = copy.get_node("bucket").unwrap();
    let policy = copy.get_node("bucket-Policy").unwrap();
    copy.set_cfn_resource(bucket, Some(policy)).unwrap();
    let bound = copy.into_store();
    assert_eq!(bound_leaf_id(&bound).as_deref(), Some("Policy"));

    let cloned = bound.clone_store(false).unwrap();
    assert_eq!(bound_leaf_id(&cloned).as_deref(), Some("Policy"));
    let restored = Store::from_json(&bound.to_json(false).unwrap(), false).unwrap();
    assert_eq!(bound_leaf_id(&restored).as_deref(), Some("Policy"));
}

#[test]
fn round_trip_keeps_cleared_leaf_binding() {
    let mut copy = bucket_with_two_leaves().clone_mutable().unwrap();
    let bucket = copy.get_node("bucket").unwrap();
    copy.set_cfn_resource(bucket, None).unwrap();
    let cleared = copy.into_store();

    let restored = cleared.clone_store(false).unwrap();
    assert_eq!(bound_leaf_id(&restored), None);
    assert_eq!(restored.to_json(true).unwrap(), cleared.to_json(true).unwrap());
}
