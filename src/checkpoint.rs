//! Rolling checkpoint of committed result rows.
//!
//! The checkpoint is the only durable state a run owns. It is read once at
//! startup, merged in memory, and replaced wholesale on every persist so a
//! crash leaves either the previous or the next complete snapshot on disk.
use crate::error::CheckpointError;
use crate::record::{CsvRow, ResultRecord};
use crate::util::write_atomic;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Output columns, in order.
pub const COLUMNS: [&str; 12] = [
    "image",
    "color",
    "neckline",
    "sleeve",
    "pattern",
    "fabric",
    "fit",
    "title",
    "bullet_points",
    "description",
    "style_summary",
    "seo_tags",
];

/// Ordered result rows keyed by item identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckpointTable {
    records: Vec<ResultRecord>,
    index: HashMap<String, usize>,
}

impl CheckpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    #[cfg(test)]
    pub fn get(&self, id: &str) -> Option<&ResultRecord> {
        self.index.get(id).map(|&idx| &self.records[idx])
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|record| record.id.as_str())
    }

    /// Insert `record`, replacing an existing row with the same identifier in
    /// place.
    pub fn upsert(&mut self, record: ResultRecord) {
        match self.index.get(&record.id) {
            Some(&idx) => self.records[idx] = record,
            None => {
                self.index.insert(record.id.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    /// Return a copy of this table with `new_records` merged in order.
    pub fn merged(&self, new_records: &[ResultRecord]) -> Self {
        let mut table = self.clone();
        for record in new_records {
            table.upsert(record.clone());
        }
        table
    }

    /// Encode the table as CSV with a header row, even when empty.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, CheckpointError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer
            .write_record(COLUMNS)
            .map_err(CheckpointError::Encode)?;
        for record in &self.records {
            writer
                .serialize(CsvRow::from(record))
                .map_err(CheckpointError::Encode)?;
        }
        writer
            .into_inner()
            .map_err(|err| CheckpointError::Encode(csv::Error::from(err.into_error())))
    }

    /// Decode a CSV table. Rows that fail to parse or violate record
    /// invariants are skipped and counted.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<(Self, usize), csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);
        reader.headers()?;
        let mut table = Self::new();
        let mut skipped = 0;
        for (row_num, row) in reader.deserialize::<CsvRow>().enumerate() {
            let record = match row {
                Ok(row) => ResultRecord::try_from(row),
                Err(err) => Err(err.into()),
            };
            match record {
                Ok(record) => table.upsert(record),
                Err(err) => {
                    skipped += 1;
                    tracing::warn!(row = row_num + 1, error = %err, "skip invalid checkpoint row");
                }
            }
        }
        Ok((table, skipped))
    }
}

/// File-backed store for one CSV table.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load prior state; a missing or unreadable file yields an empty table.
    pub fn load(&self) -> CheckpointTable {
        match self.try_load() {
            Ok(Some(table)) => {
                tracing::info!(
                    path = %self.path.display(),
                    rows = table.len(),
                    "resuming from checkpoint"
                );
                table
            }
            Ok(None) => {
                tracing::debug!(path = %self.path.display(), "no checkpoint present");
                CheckpointTable::new()
            }
            Err(err) => {
                tracing::warn!(error = %err, "checkpoint unreadable; starting empty");
                CheckpointTable::new()
            }
        }
    }

    fn try_load(&self) -> Result<Option<CheckpointTable>, CheckpointError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let file = File::open(&self.path).map_err(|err| CheckpointError::Read {
            path: self.path.clone(),
            source: csv::Error::from(err),
        })?;
        let (table, skipped) =
            CheckpointTable::from_csv_reader(file).map_err(|source| CheckpointError::Read {
                path: self.path.clone(),
                source,
            })?;
        if skipped > 0 {
            tracing::warn!(
                path = %self.path.display(),
                skipped,
                "checkpoint rows skipped; they will be reprocessed"
            );
        }
        Ok(Some(table))
    }

    /// Merge `new_records` into `existing` with last-write-wins keys.
    pub fn snapshot(existing: &CheckpointTable, new_records: &[ResultRecord]) -> CheckpointTable {
        existing.merged(new_records)
    }

    /// Atomically replace the stored table.
    pub fn persist(&self, table: &CheckpointTable) -> Result<(), CheckpointError> {
        let bytes = table.to_csv_bytes()?;
        write_atomic(&self.path, &bytes).map_err(|err| CheckpointError::Write {
            path: self.path.clone(),
            reason: format!("{err:#}"),
        })?;
        tracing::debug!(path = %self.path.display(), rows = table.len(), "checkpoint persisted");
        Ok(())
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
