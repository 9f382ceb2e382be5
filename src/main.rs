mod checkpoint;
mod cli;
mod config;
mod engine;
mod enumerate;
mod error;
mod paths;
mod record;
mod report;
mod stage_log;
mod stages;
#[cfg(test)]
mod test_support;
mod util;
mod vocab;
mod workflow;

use anyhow::Result;
use clap::Parser;
use cli::{Command, RootArgs};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing(args.verbose);

    match &args.command {
        Command::Batch(args) => workflow::run_batch(args),
        Command::Describe(args) => workflow::run_describe(args),
        Command::Index(args) => workflow::run_index(args),
        Command::Status(args) => workflow::run_status(args),
        Command::Config(args) => workflow::run_config(args),
    }
}

/// `RUST_LOG` wins when set; otherwise `info`, or `debug` with `--verbose`.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
