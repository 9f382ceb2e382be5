//! Resumable batch engine.
//!
//! A run loads the rolling checkpoint, enumerates candidates, drives the
//! pending ones through the stage orchestrator and commits the merged table.
//! Interrupting a run loses at most the records produced since the last
//! snapshot; re-running picks up from there.
mod finalize;
mod orchestrator;
mod session;

pub use finalize::Finalizer;
pub use orchestrator::Orchestrator;
pub use session::{ItemFailure, ProcessingSession, SessionCounters};

use crate::checkpoint::{CheckpointStore, CheckpointTable};
use crate::enumerate::{filter_pending, list_candidates};
use crate::paths::RunPaths;
use crate::report::{append_history, write_report, RunReport, REPORT_SCHEMA_VERSION};
use crate::stage_log::StageLog;
use crate::stages::{AttributeExtractor, MetadataGenerator};
use crate::util::now_epoch_ms;
use anyhow::Result;
use indicatif::ProgressBar;
use std::path::PathBuf;

/// Inputs for one batch run.
pub struct PipelineSettings {
    pub source: PathBuf,
    pub extensions: Vec<String>,
    pub checkpoint_every: usize,
    pub progress: ProgressBar,
}

/// Result of a completed run: the committed table and its report.
#[derive(Debug)]
pub struct RunOutcome {
    pub table: CheckpointTable,
    pub report: RunReport,
}

/// Enumerate, process and finalize one batch under `paths`.
pub fn run_pipeline<E, G>(
    paths: &RunPaths,
    settings: PipelineSettings,
    extractor: E,
    generator: G,
) -> Result<RunOutcome>
where
    E: AttributeExtractor,
    G: MetadataGenerator,
{
    let started_at_epoch_ms = now_epoch_ms();
    let store = CheckpointStore::new(paths.checkpoint_path());
    let checkpoint = store.load();

    let candidates = list_candidates(&settings.source, &settings.extensions)?;
    let candidate_count = candidates.len();
    let pending = filter_pending(candidates, &checkpoint);
    let skipped = candidate_count - pending.len();
    tracing::info!(
        candidates = candidate_count,
        skipped,
        pending = pending.len(),
        "work enumerated"
    );

    let mut session = ProcessingSession::new(checkpoint);
    let orchestrator = Orchestrator::new(
        extractor,
        generator,
        store.clone(),
        settings.checkpoint_every,
    )
    .with_stage_log(StageLog::new(paths.stage_log_path()))
    .with_progress(settings.progress);
    orchestrator.run(&mut session, &pending)?;

    let finalizer = Finalizer::new(CheckpointStore::new(paths.final_path()), store);
    let table = finalizer.finalize(session.checkpoint(), session.results())?;

    let report = RunReport {
        schema_version: REPORT_SCHEMA_VERSION,
        started_at_epoch_ms,
        finished_at_epoch_ms: now_epoch_ms(),
        source: settings.source,
        candidates: candidate_count,
        skipped,
        counters: session.counters(),
        rows: table.len(),
        failures: session.failures().to_vec(),
        checkpoint_path: paths.checkpoint_path(),
        final_path: paths.final_path(),
    };
    write_report(paths, &report)?;
    append_history(paths, &report.history_entry())?;

    Ok(RunOutcome { table, report })
}
