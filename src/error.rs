//! Error taxonomy for the batch engine.
//!
//! Stage errors are recoverable per item; checkpoint errors on persist are not.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The two enrichment stages an item passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extraction,
    Generation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extraction => write!(f, "extraction"),
            Self::Generation => write!(f, "generation"),
        }
    }
}

/// Failure of a single collaborator call for one item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    /// Source could not be decoded or the embedding service was unreachable.
    #[error("attribute extraction failed: {0}")]
    Extraction(String),
    /// The LM server was unreachable or replied outside the schema.
    #[error("metadata generation failed: {0}")]
    Generation(String),
}

impl StageError {
    pub fn extraction(err: impl Into<anyhow::Error>) -> Self {
        Self::Extraction(format!("{:#}", err.into()))
    }

    pub fn generation(err: impl Into<anyhow::Error>) -> Self {
        Self::Generation(format!("{:#}", err.into()))
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::Extraction(_) => Stage::Extraction,
            Self::Generation(_) => Stage::Generation,
        }
    }

    pub fn cause(&self) -> &str {
        match self {
            Self::Extraction(cause) | Self::Generation(cause) => cause,
        }
    }
}

/// Checkpoint storage could not be read or written.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("read checkpoint {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("encode checkpoint rows: {0}")]
    Encode(#[source] csv::Error),
    #[error("write checkpoint {}: {reason}", path.display())]
    Write { path: PathBuf, reason: String },
}
