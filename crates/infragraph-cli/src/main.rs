use std::time::Instant;

use clap::Parser;

use infragraph::output::format_counts;
use infragraph::{GraphOptions, run_main};
use infragraph_error::Result;

#[derive(Parser, Debug)]
#[command(
    name = "infragraph",
    about = "infragraph: turn a construct tree into a filterable resource graph",
    version
)]
pub struct Cli {
    #[command(flatten)]
    graph: GraphOptions,
}

pub fn run(args: Cli) -> Result<()> {
    let total_start = Instant::now();

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    let cwd = std::env::current_dir()?;
    let report = match run_main(&args.graph, &cwd) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {e}");
            tracing::error!(error = %e, "execution failed");
            return Err(e);
        }
    };

    for graph in &report.graphs {
        println!("{}", graph.path.display());
        if args.graph.stats {
            let label = graph.preset.map_or("graph", |p| p.as_str());
            print!("{}", format_counts(label, &graph.counts));
        }
    }

    let total_secs = total_start.elapsed().as_secs_f64();
    tracing::info!(total_secs, "complete");
    Ok(())
}

pub fn main() -> Result<()> {
    let args = Cli::parse();
    run(args)
}
