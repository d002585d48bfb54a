//! infragraph command-line interface.
//!
pub mod config;
pub mod discovery;
pub mod options;
pub mod output;
pub mod pipeline;

use std::path::Path;

use infragraph_error::Result;

pub use config::GraphConfig;
pub use options::GraphOptions;
pub use pipeline::{PipelineReport, RenderedGraph, run_pipeline};

/// Main entry point: resolve the configuration and run the pipeline.
pub fn run_main(opts: &GraphOptions, cwd: &Path) -> Result<PipelineReport> {
    let config = GraphConfig::load(opts.config.as_deref(), cwd)?.merge_options(opts);
    run_pipeline(&opts.input, &config)
}
