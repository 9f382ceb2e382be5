//! Batch command: run the resumable pipeline over a source directory.
use super::resolve_with_endpoints;
use crate::cli::BatchArgs;
use crate::engine::{run_pipeline, PipelineSettings, RunOutcome};
use crate::paths::RunPaths;
use crate::stages::{ClipExtractor, EmbeddingClient, LmGenerator};
use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

pub fn run_batch(args: &BatchArgs) -> Result<()> {
    if !args.source.is_dir() {
        return Err(anyhow!("source is not a directory: {}", args.source.display()));
    }
    let config = resolve_with_endpoints(&args.endpoints, args.checkpoint_every)?;
    let paths = RunPaths::new(args.out.clone());
    tracing::info!(
        source = %args.source.display(),
        out = %paths.root().display(),
        lm = %config.generator.endpoint,
        embed = %config.embedding.endpoint,
        "starting batch"
    );

    let extractor = ClipExtractor::new(EmbeddingClient::new(&config.embedding));
    let generator = LmGenerator::new(&config.generator);
    let settings = PipelineSettings {
        source: args.source.clone(),
        extensions: config.extensions.clone(),
        checkpoint_every: config.checkpoint_every,
        progress: progress_bar(args.quiet)?,
    };
    let outcome = run_pipeline(&paths, settings, extractor, generator)?;
    print_summary(&outcome);
    Ok(())
}

fn progress_bar(quiet: bool) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    // Draws to stderr and hides itself when stderr is not a terminal.
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner} {bar:40.cyan/blue} {pos}/{len} {wide_msg}")
            .context("build progress style")?,
    );
    Ok(bar)
}

fn print_summary(outcome: &RunOutcome) {
    let report = &outcome.report;
    println!(
        "processed {} item(s): {} succeeded, {} failed, {} already checkpointed",
        report.counters.attempted, report.counters.succeeded, report.counters.failed, report.skipped
    );
    println!(
        "wrote {} row(s) to {}",
        outcome.table.len(),
        report.final_path.display()
    );
    if report.failures.is_empty() {
        return;
    }
    println!("failures:");
    for failure in &report.failures {
        println!("  {} ({}): {}", failure.id, failure.stage, failure.cause);
    }
}
