use infragraph_compute::infer::fqn;
use infragraph_compute::{
    ComputeOption, ConstructKind, ConstructNode, OutputProps, compute_graph,
};
use infragraph_core::{
    APP_UUID, EdgeType, ErrorKind, Flag, GraphEntity, NodeId, NodeType, Store, Uuid, attr,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn app() -> ConstructNode {
    ConstructNode::app().with_fqn(fqn::APP)
}

fn stack(id: &str) -> ConstructNode {
    ConstructNode::new(id, ConstructKind::Stack).with_fqn(fqn::STACK)
}

fn stage(id: &str) -> ConstructNode {
    ConstructNode::new(id, ConstructKind::Stage).with_fqn(fqn::STAGE)
}

/// Resource wrapper with a single `Resource` leaf.
fn resource(id: &str, cfn_type: &str, logical_id: &str, props: Value) -> ConstructNode {
    ConstructNode::new(id, ConstructKind::Resource)
        .with_fqn("aws-cdk-lib.aws_s3.Bucket")
        .with_child(
            ConstructNode::new("Resource", ConstructKind::CfnResource)
                .with_fqn("aws-cdk-lib.aws_s3.CfnBucket")
                .with_cfn_type(cfn_type)
                .with_logical_id(logical_id)
                .with_props(props),
        )
}

fn output(id: &str, logical_id: &str, value: Value, export_name: Option<&str>) -> ConstructNode {
    ConstructNode::new(id, ConstructKind::Output)
        .with_fqn(fqn::CFN_OUTPUT)
        .with_logical_id(logical_id)
        .with_output(OutputProps {
            value,
            export_name: export_name.map(str::to_string),
            description: None,
        })
}

/// Nested stack `id` together with the wrapper construct the framework
/// generates next to it.
fn nested_stack(id: &str, logical_id: &str, children: Vec<ConstructNode>) -> [ConstructNode; 2] {
    let wrapper = ConstructNode::new(format!("{id}.NestedStack"), ConstructKind::Other)
        .with_attribute("wrapper", json!({ "kept": true }))
        .with_child(
            ConstructNode::new(format!("{id}.NestedStackResource"), ConstructKind::Other)
                .with_fqn(fqn::CFN_STACK)
                .with_cfn_type("AWS::CloudFormation::Stack")
                .with_logical_id(logical_id)
                .with_props(json!({ "TemplateURL": "https://templates/nested.json" })),
        );
    let nested = children.into_iter().fold(
        ConstructNode::new(id, ConstructKind::NestedStack).with_fqn(fqn::NESTED_STACK),
        ConstructNode::with_child,
    );
    [wrapper, nested]
}

fn compute(tree: &ConstructNode) -> Store {
    compute_graph(tree, &ComputeOption::default()).unwrap()
}

fn node(store: &Store, path: &str) -> NodeId {
    store
        .get_node(Uuid::from_name(path).as_str())
        .unwrap_or_else(|_| panic!("no node at {path}"))
}

fn edge_count(store: &Store, edge_type: EdgeType) -> usize {
    store.counts().edge_types.get(&edge_type).copied().unwrap_or(0)
}

fn single_link(store: &Store, source: NodeId, edge_type: EdgeType) -> NodeId {
    let links = store.links_of(source, &[edge_type]);
    assert_eq!(links.len(), 1, "expected one {edge_type} edge");
    store.edge(links[0]).unwrap().target()
}

#[test]
fn reference_resolves_by_logical_id_within_stack() {
    let tree = app().with_child(
        stack("A")
            .with_child(resource("R1", "AWS::S3::Bucket", "R1", json!({})))
            .with_child(resource(
                "R2",
                "AWS::SQS::Queue",
                "R2",
                json!({ "Target": { "Ref": "R1" }, "Again": { "Ref": "R1" } }),
            )),
    );
    let store = compute(&tree);

    assert_eq!(edge_count(&store, EdgeType::Reference), 1);
    let r2 = node(&store, "A/R2/Resource");
    assert_eq!(single_link(&store, r2, EdgeType::Reference), node(&store, "A/R1/Resource"));
}

#[test]
fn reference_from_nested_stack_falls_back_to_parent_stack() {
    let [wrapper, nested] = nested_stack(
        "B",
        "BNested",
        vec![resource(
            "R2",
            "AWS::SQS::Queue",
            "R2",
            json!({ "Target": { "Ref": "R1" } }),
        )],
    );
    let tree = app().with_child(
        stack("A")
            .with_child(resource("R1", "AWS::S3::Bucket", "R1", json!({})))
            .with_child(wrapper)
            .with_child(nested),
    );
    let store = compute(&tree);

    let r2 = node(&store, "A/B/R2/Resource");
    assert_eq!(single_link(&store, r2, EdgeType::Reference), node(&store, "A/R1/Resource"));
}

#[test]
fn reference_across_unrelated_stacks_is_dropped() {
    let tree = app()
        .with_child(stack("A").with_child(resource("R1", "AWS::S3::Bucket", "R1", json!({}))))
        .with_child(stack("B").with_child(resource(
            "R2",
            "AWS::SQS::Queue",
            "R2",
            json!({ "Target": { "Ref": "R1" } }),
        )));
    let store = compute(&tree);
    assert_eq!(store.counts().edges, 0);
}

#[test]
fn import_resolves_to_exporting_output() {
    let tree = app()
        .with_child(
            stack("A")
                .with_child(resource("Bucket", "AWS::S3::Bucket", "Bucket1", json!({})))
                .with_child(output("Out", "Out1", json!({ "Ref": "Bucket1" }), Some("Exp"))),
        )
        .with_child(stack("B").with_child(resource(
            "Consumer",
            "AWS::Lambda::Function",
            "Consumer1",
            json!({ "Environment": { "BUCKET": { "Fn::ImportValue": "Exp" } } }),
        )));
    let store = compute(&tree);

    assert_eq!(edge_count(&store, EdgeType::ImportReference), 1);
    let consumer = node(&store, "B/Consumer/Resource");
    let out = node(&store, "A/Out");
    assert_eq!(single_link(&store, consumer, EdgeType::ImportReference), out);
    assert_eq!(single_link(&store, out, EdgeType::Reference), node(&store, "A/Bucket/Resource"));

    let a = node(&store, "A");
    assert_eq!(store.exports(a), vec![out]);
    assert_eq!(store.find_output(a, "Out1").unwrap(), out);
}

#[test]
fn import_falls_back_to_stack_and_logical_id() {
    let tree = app().with_child(
        stage("Dev")
            .with_child(stack("A").with_child(resource("Bucket", "AWS::S3::Bucket", "Bucket1", json!({}))))
            .with_child(stack("B").with_child(resource(
                "Consumer",
                "AWS::Lambda::Function",
                "Consumer1",
                json!({ "Bucket": { "Fn::ImportValue": "Dev-A:Bucket1" } }),
            ))),
    );
    let store = compute(&tree);

    let consumer = node(&store, "Dev/B/Consumer/Resource");
    assert_eq!(
        single_link(&store, consumer, EdgeType::ImportReference),
        node(&store, "Dev/A/Bucket/Resource")
    );
}

#[test]
fn nested_stack_merges_wrapper_and_resource() {
    let [wrapper, nested] = nested_stack(
        "Child",
        "ChildStackRes",
        vec![output("TableArn", "TableArnOut", json!("arn:table"), None)],
    );
    let tree = app().with_child(
        stack("Parent")
            .with_child(wrapper)
            .with_child(nested)
            .with_child(resource(
                "Reader",
                "AWS::Lambda::Function",
                "Reader1",
                json!({ "Arn": { "Fn::GetAtt": ["ChildStackRes", "Outputs.TableArnOut"] } }),
            )),
    );
    let store = compute(&tree);

    assert!(store.get_node(Uuid::from_name("Parent/Child.NestedStack").as_str()).is_err());
    let parent = node(&store, "Parent");
    let child = node(&store, "Parent/Child");
    let child_node = store.node(child).unwrap();
    assert_eq!(child_node.node_type(), NodeType::NestedStack);
    assert_eq!(child_node.logical_id(), Some("ChildStackRes"));
    assert_eq!(child_node.parent_stack(), Some(parent));
    assert_eq!(child_node.cfn_type(), None);
    assert_eq!(
        child_node.get_attribute(attr::CFN_PROPS),
        Some(&json!({ "TemplateURL": "https://templates/nested.json" }))
    );
    assert_eq!(child_node.get_attribute("wrapper"), Some(&json!({ "kept": true })));

    let reader = node(&store, "Parent/Reader/Resource");
    let links = store.links_of(reader, &[EdgeType::AttributeReference]);
    assert_eq!(links.len(), 1);
    let edge = store.edge(links[0]).unwrap();
    assert_eq!(edge.target(), node(&store, "Parent/Child/TableArn"));
    assert_eq!(edge.reference_value(), Some("Outputs.TableArnOut"));
}

#[test]
fn ambiguous_output_stack_is_dropped() {
    let [wrapper1, nested1] = nested_stack("N", "Nested", vec![output("X", "X", json!(1), None)]);
    let [wrapper2, nested2] = nested_stack("N", "Nested", vec![output("X", "X", json!(2), None)]);
    let tree = app()
        .with_child(
            stack("P1")
                .with_child(wrapper1)
                .with_child(nested1)
                .with_child(resource(
                    "Reader",
                    "AWS::Lambda::Function",
                    "Reader1",
                    json!({ "Value": { "Fn::GetAtt": ["Nested", "Outputs.X"] } }),
                )),
        )
        .with_child(stack("P2").with_child(wrapper2).with_child(nested2));

    let store = compute(&tree);
    assert_eq!(edge_count(&store, EdgeType::AttributeReference), 0);
    assert_eq!(store.counts().stacks, 4);
}

#[test]
fn unresolvable_references_do_not_abort() {
    let tree = app().with_child(stack("A").with_child(resource(
        "R1",
        "AWS::S3::Bucket",
        "R1",
        json!({
            "Region": { "Ref": "AWS::Region" },
            "Missing": { "Ref": "Nowhere" },
            "Att": { "Fn::GetAtt": ["Nowhere", "Arn"] },
        }),
    )));
    let store = compute(&tree);
    assert_eq!(store.counts().edges, 0);
    assert_eq!(store.counts().nodes, 4);
}

#[test]
fn dependencies_become_extraneous_edges() {
    let tree = app().with_child(
        stack("A")
            .with_child(resource("R1", "AWS::S3::Bucket", "R1", json!({})))
            .with_child(
                resource("R2", "AWS::SQS::Queue", "R2", json!({}))
                    .with_dependency("A/R1")
                    .with_dependency("A/Ignored"),
            )
            .with_child(ConstructNode::new("Ignored", ConstructKind::Other)),
    );
    let option = ComputeOption::default().with_ignored_path("A/Ignored");
    let store = compute_graph(&tree, &option).unwrap();

    let r2 = node(&store, "A/R2");
    let links = store.links_of(r2, &[EdgeType::Dependency]);
    assert_eq!(links.len(), 1);
    let edge = store.edge(links[0]).unwrap();
    assert_eq!(edge.target(), node(&store, "A/R1"));
    assert!(edge.is_extraneous());
    assert!(store.get_node(Uuid::from_name("A/Ignored").as_str()).is_err());
}

#[test]
fn scaffolding_constructs_are_skipped() {
    let tree = app()
        .with_child(ConstructNode::new("Tree", ConstructKind::Other))
        .with_child(
            stack("A")
                .with_child(ConstructNode::new("CDKMetadata", ConstructKind::Other))
                .with_child(
                    ConstructNode::new("BootstrapVersion", ConstructKind::Parameter)
                        .with_fqn(fqn::CFN_PARAMETER),
                )
                .with_child(ConstructNode::new("Exports", ConstructKind::Other)),
        );
    let store = compute(&tree);

    let counts = store.counts();
    assert_eq!(counts.nodes, 3);
    assert_eq!(counts.node_types.get(&NodeType::Parameter), None);
    let exports = store.node(node(&store, "A/Exports")).unwrap();
    assert_eq!(exports.node_type(), NodeType::Default);
    assert!(exports.has_flag(Flag::Extraneous));
}

#[test]
fn classification_and_flags() {
    let tree = app().with_child(
        stack("A")
            .with_child(resource("Bucket", "AWS::S3::Bucket", "Bucket1", json!({})).owned())
            .with_child(
                ConstructNode::new("Param", ConstructKind::Parameter)
                    .with_fqn(fqn::CFN_PARAMETER)
                    .with_logical_id("Param1"),
            )
            .with_child(
                ConstructNode::new("Raw", ConstructKind::Other)
                    .with_cfn_type("AWS::SNS::Topic")
                    .with_logical_id("Raw1")
                    .with_props(json!({ "tags": [{ "key": "team", "value": "infra" }] })),
            ),
    );
    let store = compute(&tree);

    let bucket = store.node(node(&store, "A/Bucket")).unwrap();
    assert_eq!(bucket.node_type(), NodeType::Resource);
    assert!(bucket.is_cdk_owned());
    assert!(bucket.is_resource_wrapper());
    assert_eq!(store.cfn_resource_of(node(&store, "A/Bucket")), Some(node(&store, "A/Bucket/Resource")));

    let raw = store.node(node(&store, "A/Raw")).unwrap();
    assert_eq!(raw.node_type(), NodeType::CfnResource);
    assert_eq!(raw.cfn_type(), Some("AWS::SNS::Topic"));
    assert_eq!(raw.get_tag("team"), Some("infra"));

    let a = node(&store, "A");
    let param = store.find_parameter(a, "Param").unwrap();
    assert!(store.node(param).unwrap().is_extraneous());
    assert_eq!(store.find_node_by_logical_id(a, "Raw1").unwrap(), node(&store, "A/Raw"));
    let app = store.get_node(APP_UUID).unwrap();
    assert_eq!(store.node(app).unwrap().node_type(), NodeType::App);
}

#[test]
fn orphan_nested_stack_resource_is_structural() {
    let tree = app().with_child(
        stack("A").with_child(
            ConstructNode::new("Orphan", ConstructKind::Other)
                .with_fqn(fqn::CFN_STACK)
                .with_cfn_type("AWS::CloudFormation::Stack"),
        ),
    );
    let err = compute_graph(&tree, &ComputeOption::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StructuralTraversal);
    let context_of = |name: &str| -> Vec<&str> {
        err.context()
            .iter()
            .filter(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
            .collect()
    };
    assert_eq!(context_of("path"), vec!["A/Orphan"]);
    assert_eq!(context_of("ancestor"), vec!["A"]);
}

#[test]
fn leaf_resource_without_type_becomes_default_node() {
    let tree = app().with_child(
        stack("A")
            .with_child(resource("Bucket", "AWS::S3::Bucket", "Bucket1", json!({})))
            .with_child(ConstructNode::new("Thing", ConstructKind::CfnResource).with_logical_id("Thing1")),
    );
    let store = compute(&tree);

    let thing = node(&store, "A/Thing");
    assert_eq!(store.node(thing).unwrap().node_type(), NodeType::Default);
    assert_eq!(store.node(thing).unwrap().cfn_type(), None);
    assert_eq!(store.find_node_by_logical_id(node(&store, "A"), "Thing1").unwrap(), thing);
    assert_eq!(
        store.node(node(&store, "A/Bucket/Resource")).unwrap().node_type(),
        NodeType::CfnResource
    );
}

#[test]
fn nested_stack_without_wrapper_is_structural() {
    let tree = app().with_child(
        stack("A").with_child(ConstructNode::new("B", ConstructKind::NestedStack)),
    );
    let err = compute_graph(&tree, &ComputeOption::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StructuralTraversal);
    assert_eq!(err.context_value("path"), Some("A/B"));
}

#[test]
fn output_outside_stack_is_structural() {
    let tree = app().with_child(output("Out", "Out1", json!("x"), None));
    let err = compute_graph(&tree, &ComputeOption::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StructuralTraversal);
}

#[test]
fn computed_store_is_read_only() {
    let tree = app().with_child(stack("A"));
    let store = compute(&tree);
    assert!(!store.allow_destructive_mutations());
    assert_eq!(store.into_mutable().unwrap_err().kind(), ErrorKind::ImmutableStore);
}
