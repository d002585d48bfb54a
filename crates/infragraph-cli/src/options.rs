//! Command-line options shared by the binary and the pipeline.

use std::path::PathBuf;

use clap::Args;
use infragraph_filter::FilterPreset;

/// Options controlling where the graph is read from and written to.
#[derive(Args, Debug, Clone, Default)]
pub struct GraphOptions {
    /// Construct tree file, or a directory containing `tree.json`.
    #[arg(short = 'i', long = "input", value_name = "PATH")]
    pub input: PathBuf,

    /// Configuration file (default: nearest `infragraph.toml` above the
    /// working directory).
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory the graph artifacts are written to.
    #[arg(short = 'o', long = "outdir", value_name = "DIR")]
    pub outdir: Option<PathBuf>,

    /// Filter preset to render in addition to the full graph (repeatable).
    #[arg(
        short = 'p',
        long = "preset",
        value_name = "PRESET",
        value_parser = parse_preset,
        action = clap::ArgAction::Append
    )]
    pub presets: Vec<FilterPreset>,

    /// Uuid of the node filtered graphs are focused on.
    #[arg(long = "root", value_name = "UUID")]
    pub root: Option<String>,

    /// Move the root to the top of filtered graphs and drop everything else.
    #[arg(long = "hoist-root", requires = "root")]
    pub hoist_root: bool,

    /// Construct path left out of the graph (repeatable).
    #[arg(long = "ignore", value_name = "PATH", action = clap::ArgAction::Append)]
    pub ignored_paths: Vec<String>,

    /// Print node, edge and resource counts of every rendered graph.
    #[arg(long)]
    pub stats: bool,
}

fn parse_preset(value: &str) -> Result<FilterPreset, String> {
    value.parse().map_err(|_| {
        format!("unknown preset '{value}', expected one of: compact, non-extraneous, none")
    })
}

impl GraphOptions {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            ..Default::default()
        }
    }

    pub fn with_config(mut self, config: impl Into<PathBuf>) -> Self {
        self.config = Some(config.into());
        self
    }

    pub fn with_outdir(mut self, outdir: impl Into<PathBuf>) -> Self {
        self.outdir = Some(outdir.into());
        self
    }

    pub fn with_preset(mut self, preset: FilterPreset) -> Self {
        self.presets.push(preset);
        self
    }

    pub fn with_root(mut self, root: impl Into<String>, hoist: bool) -> Self {
        self.root = Some(root.into());
        self.hoist_root = hoist;
        self
    }

    pub fn with_stats(mut self, stats: bool) -> Self {
        self.stats = stats;
        self
    }
}
