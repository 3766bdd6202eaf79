use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pixcla_seg::{run_job, Config, OnnxModel, ProgressBarReporter, StatusReporter, TracingReporter};

fn main() -> Result<()> {
    let config = Config::parse();

    // keep the bar readable unless RUST_LOG asks for more
    let default_level = if config.no_progress { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let reporter: Box<dyn StatusReporter> = if config.no_progress {
        Box::new(TracingReporter)
    } else {
        Box::new(ProgressBarReporter::new())
    };

    run_job(config, reporter.as_ref(), OnnxModel::load)?;
    Ok(())
}
