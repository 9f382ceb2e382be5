use crate::checkpoint::CheckpointTable;
use crate::error::{Stage, StageError};
use crate::record::ResultRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Per-run tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounters {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Diagnostic for an item that failed a stage during this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub id: String,
    pub stage: Stage,
    pub cause: String,
}

/// State owned by one invocation: the checkpoint it started from, the
/// records it produced, and what went wrong.
#[derive(Debug, Clone)]
pub struct ProcessingSession {
    checkpoint: CheckpointTable,
    processed: HashSet<String>,
    results: Vec<ResultRecord>,
    counters: SessionCounters,
    failures: Vec<ItemFailure>,
}

impl ProcessingSession {
    pub fn new(checkpoint: CheckpointTable) -> Self {
        let processed = checkpoint.ids().map(str::to_string).collect();
        Self {
            checkpoint,
            processed,
            results: Vec::new(),
            counters: SessionCounters::default(),
            failures: Vec::new(),
        }
    }

    pub fn is_processed(&self, id: &str) -> bool {
        self.processed.contains(id)
    }

    /// The table loaded at startup.
    pub fn checkpoint(&self) -> &CheckpointTable {
        &self.checkpoint
    }

    /// Records produced by this run, in processing order.
    pub fn results(&self) -> &[ResultRecord] {
        &self.results
    }

    pub fn counters(&self) -> SessionCounters {
        self.counters
    }

    pub fn failures(&self) -> &[ItemFailure] {
        &self.failures
    }

    pub(super) fn begin_item(&mut self) {
        self.counters.attempted += 1;
    }

    /// Returns the number of records produced so far.
    pub(super) fn record_success(&mut self, record: ResultRecord) -> usize {
        self.counters.succeeded += 1;
        self.processed.insert(record.id.clone());
        self.results.push(record);
        self.results.len()
    }

    pub(super) fn record_failure(&mut self, id: &str, err: &StageError) {
        self.counters.failed += 1;
        self.failures.push(ItemFailure {
            id: id.to_string(),
            stage: err.stage(),
            cause: err.cause().to_string(),
        });
    }
}
