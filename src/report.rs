//! Run report and history persistence.
//!
//! `report.json` is a snapshot of the latest batch run; `history.jsonl` keeps
//! one summary line per run so progress across resumptions stays auditable.
use crate::engine::{ItemFailure, SessionCounters};
use crate::paths::RunPaths;
use crate::util::write_json_atomic;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Snapshot of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub schema_version: u32,
    pub started_at_epoch_ms: u64,
    pub finished_at_epoch_ms: u64,
    pub source: PathBuf,
    pub candidates: usize,
    /// Candidates already present in the checkpoint at startup.
    pub skipped: usize,
    #[serde(flatten)]
    pub counters: SessionCounters,
    pub rows: usize,
    pub failures: Vec<ItemFailure>,
    pub checkpoint_path: PathBuf,
    pub final_path: PathBuf,
}

impl RunReport {
    pub fn history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            schema_version: self.schema_version,
            ts: self.finished_at_epoch_ms,
            candidates: self.candidates,
            skipped: self.skipped,
            counters: self.counters,
            rows: self.rows,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub schema_version: u32,
    pub ts: u64,
    pub candidates: usize,
    pub skipped: usize,
    #[serde(flatten)]
    pub counters: SessionCounters,
    pub rows: usize,
}

/// Write the latest run report snapshot.
pub fn write_report(paths: &RunPaths, report: &RunReport) -> Result<()> {
    write_json_atomic(&paths.report_path(), report)
}

/// Append a history entry as JSONL.
pub fn append_history(paths: &RunPaths, entry: &HistoryEntry) -> Result<()> {
    let path = paths.history_path();
    fs::create_dir_all(paths.root()).context("create output dir")?;
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open {}", path.display()))?;
    let line = serde_json::to_string(entry).context("serialize history entry")?;
    writeln!(file, "{line}").with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;

    fn sample_report(root: &std::path::Path) -> RunReport {
        let paths = RunPaths::new(root.to_path_buf());
        RunReport {
            schema_version: REPORT_SCHEMA_VERSION,
            started_at_epoch_ms: 1,
            finished_at_epoch_ms: 2,
            source: root.join("images"),
            candidates: 3,
            skipped: 1,
            counters: SessionCounters {
                attempted: 2,
                succeeded: 1,
                failed: 1,
            },
            rows: 2,
            failures: vec![ItemFailure {
                id: "b.jpg".to_string(),
                stage: Stage::Generation,
                cause: "no choices returned from LM".to_string(),
            }],
            checkpoint_path: paths.checkpoint_path(),
            final_path: paths.final_path(),
        }
    }

    #[test]
    fn report_round_trips_with_flattened_counters() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let paths = RunPaths::new(dir.path().to_path_buf());
        let report = sample_report(dir.path());
        write_report(&paths, &report).expect("write report");

        let text = fs::read_to_string(paths.report_path()).expect("read report");
        let value: serde_json::Value = serde_json::from_str(&text).expect("report JSON");
        assert_eq!(value["failed"], 1);
        assert_eq!(value["failures"][0]["stage"], "generation");
        let parsed: RunReport = serde_json::from_str(&text).expect("parse report");
        assert_eq!(parsed, report);
    }

    #[test]
    fn history_appends_one_line_per_run() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let paths = RunPaths::new(dir.path().to_path_buf());
        let entry = sample_report(dir.path()).history_entry();
        append_history(&paths, &entry).expect("first append");
        append_history(&paths, &entry).expect("second append");

        let text = fs::read_to_string(paths.history_path()).expect("read history");
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: HistoryEntry = serde_json::from_str(lines[1]).expect("parse entry");
        assert_eq!(parsed.rows, 2);
        assert_eq!(parsed.counters.succeeded, 1);
    }
}
