//! Status command: summarize pending work without side effects.
use crate::checkpoint::CheckpointStore;
use crate::cli::StatusArgs;
use crate::config::{resolve_config, ConfigOverrides};
use crate::enumerate::{filter_pending, list_candidates};
use crate::paths::RunPaths;
use crate::stage_log::{StageLog, StageOutcome};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub source: PathBuf,
    pub checkpoint_path: PathBuf,
    pub candidates: usize,
    /// Rows in the rolling checkpoint.
    pub checkpointed: usize,
    pub pending: usize,
    pub final_present: bool,
    /// Collaborator calls recorded in the stage log across all runs.
    pub stage_calls: usize,
    pub failed_stage_calls: usize,
}

pub fn status_summary(
    source: &Path,
    paths: &RunPaths,
    extensions: &[String],
) -> Result<StatusSummary> {
    let checkpoint = CheckpointStore::new(paths.checkpoint_path()).load();
    let candidates = list_candidates(source, extensions)?;
    let candidate_count = candidates.len();
    let pending = filter_pending(candidates, &checkpoint);
    let stage_entries = StageLog::new(paths.stage_log_path()).load()?;
    let failed_stage_calls = stage_entries
        .iter()
        .filter(|entry| entry.outcome == StageOutcome::Failed)
        .count();
    Ok(StatusSummary {
        source: source.to_path_buf(),
        checkpoint_path: paths.checkpoint_path(),
        candidates: candidate_count,
        checkpointed: checkpoint.len(),
        pending: pending.len(),
        final_present: paths.final_path().is_file(),
        stage_calls: stage_entries.len(),
        failed_stage_calls,
    })
}

pub fn run_status(args: &StatusArgs) -> Result<()> {
    let config = resolve_config(args.config.as_deref(), &ConfigOverrides::default())?;
    let paths = RunPaths::new(args.out.clone());
    let summary = status_summary(&args.source, &paths, &config.extensions)?;

    if args.json {
        let text = serde_json::to_string_pretty(&summary).context("serialize status summary")?;
        println!("{text}");
        return Ok(());
    }
    println!("source: {}", summary.source.display());
    println!("candidates: {}", summary.candidates);
    println!(
        "checkpointed: {} ({})",
        summary.checkpointed,
        summary.checkpoint_path.display()
    );
    println!("pending: {}", summary.pending);
    if summary.stage_calls > 0 {
        println!(
            "stage calls: {} ({} failed)",
            summary.stage_calls, summary.failed_stage_calls
        );
    }
    if summary.pending > 0 {
        println!(
            "next: catalog-enrich batch --source {} --out {}",
            summary.source.display(),
            paths.root().display()
        );
    }
    Ok(())
}
