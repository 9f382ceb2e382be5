use crate::checkpoint::{CheckpointStore, CheckpointTable};
use crate::error::CheckpointError;
use crate::record::ResultRecord;

/// Commits the merged table as the final artifact.
pub struct Finalizer {
    output: CheckpointStore,
    rolling: CheckpointStore,
}

impl Finalizer {
    pub fn new(output: CheckpointStore, rolling: CheckpointStore) -> Self {
        Self { output, rolling }
    }

    /// Merge `results` into `checkpoint` (last write wins) and persist the
    /// outcome to both the rolling checkpoint and the final output.
    pub fn finalize(
        &self,
        checkpoint: &CheckpointTable,
        results: &[ResultRecord],
    ) -> Result<CheckpointTable, CheckpointError> {
        let table = CheckpointStore::snapshot(checkpoint, results);
        self.rolling.persist(&table)?;
        self.output.persist(&table)?;
        if table.is_empty() {
            tracing::warn!("final table has no rows");
        }
        tracing::info!(
            path = %self.output.path().display(),
            rows = table.len(),
            "final table written"
        );
        Ok(table)
    }
}
