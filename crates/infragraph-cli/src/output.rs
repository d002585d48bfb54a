//! Graph artifacts and the `--stats` summary.

use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};

use infragraph_core::{Store, StoreCounts};
use infragraph_error::{Error, Result};
use infragraph_filter::FilterPreset;
use tracing::debug;

pub const GRAPH_FILE_NAME: &str = "graph.json";

/// `graph.json`, or `graph.<preset>.json` for a filtered graph.
pub fn graph_file_name(preset: Option<FilterPreset>) -> String {
    match preset {
        Some(preset) => format!("graph.{preset}.json"),
        None => GRAPH_FILE_NAME.to_string(),
    }
}

pub fn write_graph(store: &Store, outdir: &Path, preset: Option<FilterPreset>) -> Result<PathBuf> {
    let path = outdir.join(graph_file_name(preset));
    let json = store.to_json(true)?;
    fs::write(&path, json).map_err(|e| {
        Error::from(e)
            .with_operation("output::write_graph")
            .with_context("path", path.display().to_string())
    })?;
    debug!(path = %path.display(), "graph written");
    Ok(path)
}

/// Human readable summary of one graph's counts.
pub fn format_counts(label: &str, counts: &StoreCounts) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{label}: {} nodes, {} edges, {} stacks, {} stages",
        counts.nodes, counts.edges, counts.stacks, counts.stages
    );
    for (node_type, count) in counts.node_types.iter().filter(|(_, c)| **c > 0) {
        let _ = writeln!(out, "  node {node_type:<14} {count}");
    }
    for (edge_type, count) in counts.edge_types.iter().filter(|(_, c)| **c > 0) {
        let _ = writeln!(out, "  edge {edge_type:<20} {count}");
    }
    for (cfn_type, count) in counts.cfn_resources.iter().filter(|(_, c)| **c > 0) {
        let _ = writeln!(out, "  resource {cfn_type} {count}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use infragraph_core::NodeType;

    #[test]
    fn test_graph_file_names() {
        assert_eq!(graph_file_name(None), "graph.json");
        assert_eq!(
            graph_file_name(Some(FilterPreset::NonExtraneous)),
            "graph.non-extraneous.json"
        );
    }

    #[test]
    fn test_format_counts_skips_zero_entries() {
        let mut counts = StoreCounts {
            nodes: 2,
            edges: 0,
            ..Default::default()
        };
        counts.node_types.insert(NodeType::App, 1);
        counts.node_types.insert(NodeType::Stack, 1);
        counts.node_types.insert(NodeType::Output, 0);

        let text = format_counts("graph", &counts);
        assert!(text.starts_with("graph: 2 nodes, 0 edges, 0 stacks, 0 stages\n"));
        assert!(text.contains("node STACK"));
        assert!(!text.contains("OUTPUT"));
    }
}
