//! Processing pipeline: locate tree → compute graph → write → filter per preset.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use tracing::info;

use infragraph_compute::{ComputeOption, ConstructNode, compute_graph};
use infragraph_core::{Store, StoreCounts, Uuid};
use infragraph_error::{Error, Result};
use infragraph_filter::{FilterPlan, FilterPreset, RootSelector, apply_filter_plan};

use crate::config::GraphConfig;
use crate::discovery::locate_tree;
use crate::output::write_graph;

/// One written graph artifact.
#[derive(Debug, Clone)]
pub struct RenderedGraph {
    pub preset: Option<FilterPreset>,
    pub path: PathBuf,
    pub counts: StoreCounts,
}

/// Everything the pipeline wrote, the full graph first.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub tree: PathBuf,
    pub outdir: PathBuf,
    pub graphs: Vec<RenderedGraph>,
}

/// Filter plan rendering `preset` with the configured root.
pub fn preset_plan(config: &GraphConfig, preset: FilterPreset) -> FilterPlan {
    let plan = FilterPlan::new().with_preset(preset);
    match &config.root {
        Some(root) => plan
            .with_root(RootSelector::Uuid(Uuid::new(root.as_str())))
            .with_hoist_root(config.hoist_root),
        None => plan,
    }
}

/// Run the whole pipeline for `input`.
///
/// 1. Locate and decode the construct tree
/// 2. Compute the canonical graph and write `graph.json`
/// 3. Render every preset on its own clone, in parallel
pub fn run_pipeline(input: &Path, config: &GraphConfig) -> Result<PipelineReport> {
    // 1. Load
    let load_start = Instant::now();
    let tree_path = locate_tree(input)?;
    let tree = ConstructNode::from_path(&tree_path)?;
    info!(
        path = %tree_path.display(),
        "Loading construct tree: {:.2}s",
        load_start.elapsed().as_secs_f64()
    );

    // 2. Compute
    let compute_start = Instant::now();
    let option = ComputeOption::default().with_ignored_paths(config.ignored_paths.iter().cloned());
    let store = compute_graph(&tree, &option)?;
    info!(
        "Graph computation: {:.2}s",
        compute_start.elapsed().as_secs_f64()
    );

    let assembly = tree_path.parent().unwrap_or_else(|| Path::new("."));
    let outdir = config.resolve_outdir(assembly);
    fs::create_dir_all(&outdir).map_err(|e| {
        Error::from(e)
            .with_operation("pipeline::create_outdir")
            .with_context("path", outdir.display().to_string())
    })?;

    let mut graphs = vec![RenderedGraph {
        preset: None,
        path: write_graph(&store, &outdir, None)?,
        counts: store.counts(),
    }];

    // 3. Filter
    let filter_start = Instant::now();
    let filtered: Vec<RenderedGraph> = config
        .presets
        .par_iter()
        .map(|preset| render_preset(&store, config, *preset, &outdir))
        .collect::<Result<_>>()?;
    info!(
        presets = filtered.len(),
        "Preset filtering: {:.2}s",
        filter_start.elapsed().as_secs_f64()
    );
    graphs.extend(filtered);

    Ok(PipelineReport {
        tree: tree_path,
        outdir,
        graphs,
    })
}

fn render_preset(
    store: &Store,
    config: &GraphConfig,
    preset: FilterPreset,
    outdir: &Path,
) -> Result<RenderedGraph> {
    let mut copy = store.clone_mutable()?;
    apply_filter_plan(&mut copy, &preset_plan(config, preset))
        .map_err(|e| e.with_context("preset", preset.as_str()))?;
    let filtered = copy.into_store();
    Ok(RenderedGraph {
        preset: Some(preset),
        path: write_graph(&filtered, outdir, Some(preset))?,
        counts: filtered.counts(),
    })
}
