use super::session::ProcessingSession;
use crate::checkpoint::CheckpointStore;
use crate::error::{CheckpointError, StageError};
use crate::record::{ResultRecord, WorkItem};
use crate::stage_log::{StageLog, StageLogEntry, StageTimer};
use crate::stages::{AttributeExtractor, ItemState, MetadataGenerator};
use indicatif::ProgressBar;

/// Drives pending items through both stages, one at a time, and snapshots
/// the checkpoint every `checkpoint_every` new records.
pub struct Orchestrator<E, G> {
    extractor: E,
    generator: G,
    store: CheckpointStore,
    checkpoint_every: usize,
    stage_log: Option<StageLog>,
    progress: ProgressBar,
}

impl<E, G> Orchestrator<E, G>
where
    E: AttributeExtractor,
    G: MetadataGenerator,
{
    pub fn new(extractor: E, generator: G, store: CheckpointStore, checkpoint_every: usize) -> Self {
        Self {
            extractor,
            generator,
            store,
            checkpoint_every: checkpoint_every.max(1),
            stage_log: None,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_stage_log(mut self, stage_log: StageLog) -> Self {
        self.stage_log = Some(stage_log);
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Run one item to `Committed`, logging every collaborator call.
    pub fn process(&self, item: &WorkItem) -> Result<ResultRecord, StageError> {
        let mut state = ItemState::Pending(item.clone());
        loop {
            if let ItemState::Committed(record) = state {
                return Ok(record);
            }
            let timer = state
                .next_stage()
                .map(|stage| StageTimer::start(state.item_id(), stage));
            let next = state.advance(&self.extractor, &self.generator);
            if let Some(timer) = timer {
                let entry = match &next {
                    Ok(_) => timer.success(),
                    Err(err) => timer.failed(err.cause()),
                };
                tracing::debug!(
                    item = %entry.item,
                    stage = %entry.stage,
                    elapsed_ms = entry.duration_ms,
                    "stage finished"
                );
                self.log_stage(&entry);
            }
            state = next?;
        }
    }

    /// Process `pending` in order. Stage failures are recorded on the
    /// session and skipped; a failed checkpoint persist aborts the run.
    pub fn run(
        &self,
        session: &mut ProcessingSession,
        pending: &[WorkItem],
    ) -> Result<(), CheckpointError> {
        self.progress.set_length(pending.len() as u64);
        for item in pending {
            if session.is_processed(&item.id) {
                tracing::debug!(item = %item.id, "already processed; skipping");
                self.progress.inc(1);
                continue;
            }
            self.progress.set_message(item.id.clone());
            session.begin_item();
            match self.process(item) {
                Ok(record) => {
                    let produced = session.record_success(record);
                    if produced % self.checkpoint_every == 0 {
                        let table =
                            CheckpointStore::snapshot(session.checkpoint(), session.results());
                        self.store.persist(&table)?;
                        tracing::info!(rows = table.len(), "checkpoint saved");
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        item = %item.id,
                        stage = %err.stage(),
                        error = %err.cause(),
                        "item failed; continuing"
                    );
                    session.record_failure(&item.id, &err);
                }
            }
            self.progress.inc(1);
        }
        self.progress.finish_and_clear();
        Ok(())
    }

    fn log_stage(&self, entry: &StageLogEntry) {
        let Some(stage_log) = &self.stage_log else {
            return;
        };
        if let Err(err) = stage_log.append(entry) {
            tracing::warn!(error = %format!("{err:#}"), "stage log append failed");
        }
    }
}
