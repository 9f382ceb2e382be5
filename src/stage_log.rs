//! Per-call log of collaborator invocations.
//!
//! Entries are appended to `stage_log.jsonl` as newline-delimited JSON so a
//! run can be audited after the fact:
//!
//! ```jsonl
//! {"schema_version":1,"ts":1707900000000,"item":"a.jpg","stage":"extraction","duration_ms":420,"outcome":"success"}
//! {"schema_version":1,"ts":1707900000500,"item":"a.jpg","stage":"generation","duration_ms":3100,"outcome":"failed","error":"..."}
//! ```
use crate::error::Stage;
use crate::util::now_epoch_ms;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::time::Instant;

/// Current schema version for stage log entries.
pub const STAGE_LOG_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageLogEntry {
    pub schema_version: u32,
    /// Unix timestamp in milliseconds when the call finished.
    pub ts: u64,
    pub item: String,
    pub stage: Stage,
    pub duration_ms: u64,
    pub outcome: StageOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Times one collaborator call and turns it into a log entry.
pub struct StageTimer {
    start: Instant,
    item: String,
    stage: Stage,
}

impl StageTimer {
    pub fn start(item: &str, stage: Stage) -> Self {
        Self {
            start: Instant::now(),
            item: item.to_string(),
            stage,
        }
    }

    pub fn success(self) -> StageLogEntry {
        self.build(StageOutcome::Success, None)
    }

    pub fn failed(self, error: impl Into<String>) -> StageLogEntry {
        self.build(StageOutcome::Failed, Some(error.into()))
    }

    fn build(self, outcome: StageOutcome, error: Option<String>) -> StageLogEntry {
        StageLogEntry {
            schema_version: STAGE_LOG_SCHEMA_VERSION,
            ts: now_epoch_ms(),
            item: self.item,
            stage: self.stage,
            duration_ms: self.start.elapsed().as_millis() as u64,
            outcome,
            error,
        }
    }
}

/// Append-only JSONL sink.
#[derive(Debug, Clone)]
pub struct StageLog {
    path: PathBuf,
}

impl StageLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn append(&self, entry: &StageLogEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("create stage log directory")?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open stage log for append: {}", self.path.display()))?;
        let line = serde_json::to_string(entry).context("serialize stage log entry")?;
        writeln!(file, "{}", line).context("write stage log entry")?;
        Ok(())
    }

    /// Load all entries, skipping lines that fail to parse.
    pub fn load(&self) -> Result<Vec<StageLogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)
            .with_context(|| format!("open stage log: {}", self.path.display()))?;
        let mut entries = Vec::new();
        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("read line {} of stage log", line_num + 1))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StageLogEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    tracing::warn!(line = line_num + 1, error = %err, "skip corrupt stage log entry");
                }
            }
        }
        Ok(entries)
    }
}
