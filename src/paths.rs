//! Typed paths into a run's output directory.
//!
//! Centralizing path construction keeps the checkpoint, the final table and
//! the run records in one predictable layout.
use std::path::{Path, PathBuf};

/// Convenience wrapper for locating run artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    root: PathBuf,
}

impl RunPaths {
    /// Create a new path helper rooted at the output directory.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the rolling `checkpoint_partial.csv` path.
    pub fn checkpoint_path(&self) -> PathBuf {
        self.root.join("checkpoint_partial.csv")
    }

    /// Return the terminal `final_metadata.csv` path.
    pub fn final_path(&self) -> PathBuf {
        self.root.join("final_metadata.csv")
    }

    /// Return the `report.json` path for the latest run.
    pub fn report_path(&self) -> PathBuf {
        self.root.join("report.json")
    }

    /// Return the append-only `history.jsonl` path.
    pub fn history_path(&self) -> PathBuf {
        self.root.join("history.jsonl")
    }

    /// Return the `stage_log.jsonl` path.
    pub fn stage_log_path(&self) -> PathBuf {
        self.root.join("stage_log.jsonl")
    }

    /// Return the default `visual_index.json` path.
    pub fn visual_index_path(&self) -> PathBuf {
        self.root.join("visual_index.json")
    }
}
