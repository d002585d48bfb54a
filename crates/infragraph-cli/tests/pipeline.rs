use std::fs;
use std::path::Path;

use infragraph::{GraphOptions, run_main};
use infragraph_compute::infer::fqn;
use infragraph_compute::{ConstructKind, ConstructNode, OutputProps};
use infragraph_core::{EdgeType, ErrorKind, NodeType, SerializedGraph, Store};
use infragraph_filter::FilterPreset;
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

fn tree() -> ConstructNode {
    let bucket = ConstructNode::new("Bucket", ConstructKind::Resource)
        .with_fqn("aws-cdk-lib.aws_s3.Bucket")
        .with_child(
            ConstructNode::new("Resource", ConstructKind::CfnResource)
                .with_fqn("aws-cdk-lib.aws_s3.CfnBucket")
                .with_cfn_type("AWS::S3::Bucket")
                .with_logical_id("Bucket1")
                .with_props(json!({ "BucketName": "assets" })),
        );
    let output = ConstructNode::new("BucketName", ConstructKind::Output)
        .with_fqn(fqn::CFN_OUTPUT)
        .with_logical_id("BucketNameOut")
        .with_output(OutputProps {
            value: json!({ "Ref": "Bucket1" }),
            export_name: Some("BucketName".to_string()),
            description: None,
        });
    ConstructNode::app().with_fqn(fqn::APP).with_child(
        ConstructNode::new("Storage", ConstructKind::Stack)
            .with_fqn(fqn::STACK)
            .with_child(bucket)
            .with_child(output)
            .with_child(ConstructNode::new("CDKMetadata", ConstructKind::Other)),
    )
}

/// Assembly directory holding `tree.json`.
fn assembly() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("tree.json"),
        serde_json::to_string_pretty(&tree()).unwrap(),
    )
    .unwrap();
    dir
}

fn read_graph(path: &Path) -> Store {
    Store::from_json(&fs::read_to_string(path).unwrap(), false).unwrap()
}

#[test]
fn writes_full_graph_into_default_outdir() {
    let dir = assembly();
    let report = run_main(&GraphOptions::new(dir.path()), dir.path()).unwrap();

    let expected = dir.path().join("infragraph").join("graph.json");
    assert_eq!(report.outdir, dir.path().join("infragraph"));
    assert_eq!(report.graphs.len(), 1);
    assert_eq!(report.graphs[0].path, expected);

    let store = read_graph(&expected);
    assert_eq!(store.counts(), report.graphs[0].counts);
    // App, stack, bucket, its leaf and the output; CDKMetadata is skipped.
    assert_eq!(store.counts().nodes, 5);
    assert_eq!(store.counts().edges, 1);
}

#[test]
fn renders_each_requested_preset() {
    let dir = assembly();
    let out = tempfile::tempdir().unwrap();
    let opts = GraphOptions::new(dir.path().join("tree.json"))
        .with_outdir(out.path())
        .with_preset(FilterPreset::Compact)
        .with_preset(FilterPreset::NonExtraneous);
    let report = run_main(&opts, dir.path()).unwrap();

    let names: Vec<String> = report
        .graphs
        .iter()
        .map(|g| g.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec!["graph.json", "graph.compact.json", "graph.non-extraneous.json"]
    );

    let compact = read_graph(&out.path().join("graph.compact.json"));
    assert_eq!(compact.counts().node_types.get(&NodeType::CfnResource).copied().unwrap_or(0), 0);
    assert_eq!(compact.counts().node_types.get(&NodeType::Output).copied().unwrap_or(0), 0);

    let full = read_graph(&out.path().join("graph.json"));
    assert_eq!(full.counts().nodes, 5);
}

#[test]
fn config_file_is_discovered_and_overridden() {
    let dir = assembly();
    fs::write(
        dir.path().join("infragraph.toml"),
        r#"
        outdir = "{assembly}/graphs"
        presets = ["compact"]
        ignored-paths = ["Storage/BucketName"]
        "#,
    )
    .unwrap();
    let nested = dir.path().join("sub").join("dir");
    fs::create_dir_all(&nested).unwrap();

    let report = run_main(&GraphOptions::new(dir.path()), &nested).unwrap();
    assert_eq!(report.outdir, dir.path().join("graphs"));
    assert_eq!(report.graphs.len(), 2);
    assert_eq!(report.graphs[0].counts.nodes, 4);

    let opts = GraphOptions::new(dir.path()).with_preset(FilterPreset::None);
    let report = run_main(&opts, &nested).unwrap();
    assert_eq!(report.graphs[1].preset, Some(FilterPreset::None));
    assert_eq!(report.graphs[1].counts, report.graphs[0].counts);
}

#[test]
fn root_focuses_filtered_graphs() {
    let dir = assembly();
    let bucket = infragraph_core::Uuid::from_name("Storage/Bucket");
    let opts = GraphOptions::new(dir.path())
        .with_preset(FilterPreset::None)
        .with_root(bucket.as_str(), true);
    let report = run_main(&opts, dir.path()).unwrap();

    let focused = read_graph(&report.graphs[1].path);
    assert_eq!(focused.counts().nodes, 2);
    assert_eq!(focused.counts().edges, 0);
}

#[test]
fn serialized_graph_nests_nodes_under_the_root() {
    let dir = assembly();
    let report = run_main(&GraphOptions::new(dir.path()), dir.path()).unwrap();

    let text = fs::read_to_string(&report.graphs[0].path).unwrap();
    let graph = SerializedGraph::from_json(&text).unwrap();
    assert_eq!(graph.tree.node_type, NodeType::Root);

    let app = &graph.tree.children["App"];
    let stack = &app.children["Storage"];
    let names: Vec<&str> = stack.children.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["Bucket", "BucketName"]);

    assert_eq!(graph.edges.len(), 1);
    assert_eq!(graph.edges[0].edge_type, EdgeType::Reference);
    assert_eq!(stack.children["BucketName"].edges, vec![graph.edges[0].uuid.clone()]);
}

#[test]
fn missing_tree_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = run_main(&GraphOptions::new(dir.path()), dir.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileNotFound);
}

#[test]
fn malformed_config_is_rejected() {
    let dir = assembly();
    let config = dir.path().join("custom.toml");
    fs::write(&config, "presets = \"compact\"").unwrap();

    let opts = GraphOptions::new(dir.path()).with_config(&config);
    let err = run_main(&opts, dir.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
}
