//! Flat visual-similarity index.
//!
//! The index is a JSON list of `(id, embedding)` pairs produced by the same
//! embedding service the extractor uses. Search is an exhaustive cosine scan,
//! which is fine for catalog-sized collections.
use super::embedding::{cosine, EmbeddingClient};
use super::VisualSearch;
use crate::record::WorkItem;
use crate::util::write_json_atomic;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs;
use std::path::Path;

/// Current schema version for `visual_index.json`.
pub const INDEX_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub embedding: Vec<f32>,
}

/// One search result; results are ordered by descending score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualIndex {
    pub schema_version: u32,
    pub entries: Vec<IndexEntry>,
}

impl Default for VisualIndex {
    fn default() -> Self {
        Self {
            schema_version: INDEX_SCHEMA_VERSION,
            entries: Vec::new(),
        }
    }
}

impl VisualIndex {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("read index {}", path.display()))?;
        let index: VisualIndex = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse index JSON {}", path.display()))?;
        if index.schema_version != INDEX_SCHEMA_VERSION {
            return Err(anyhow!(
                "unsupported index schema_version {}",
                index.schema_version
            ));
        }
        Ok(index)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace the embedding for `id`.
    pub fn upsert(&mut self, id: String, embedding: Vec<f32>) {
        match self.entries.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => entry.embedding = embedding,
            None => self.entries.push(IndexEntry { id, embedding }),
        }
    }

    /// Top `top_k` entries by cosine similarity; ties order by id.
    /// Entries whose dimension differs from the query are ignored.
    pub fn nearest(&self, query: &[f32], top_k: usize) -> Vec<SearchHit> {
        let mut hits: Vec<SearchHit> = self
            .entries
            .iter()
            .filter_map(|entry| {
                cosine(query, &entry.embedding).map(|score| SearchHit {
                    id: entry.id.clone(),
                    score,
                })
            })
            .collect();
        hits.sort_by(|a, b| match b.score.total_cmp(&a.score) {
            Ordering::Equal => a.id.cmp(&b.id),
            other => other,
        });
        hits.truncate(top_k);
        hits
    }
}

/// Search backed by a loaded index and a live embedding client.
pub struct IndexedSearch {
    index: VisualIndex,
    client: EmbeddingClient,
}

impl IndexedSearch {
    pub fn new(index: VisualIndex, client: EmbeddingClient) -> Self {
        Self { index, client }
    }
}

impl VisualSearch for IndexedSearch {
    fn search(&self, source: &Path, top_k: usize) -> Result<Vec<SearchHit>> {
        let query = self.client.embed_image_file(source)?;
        Ok(self.index.nearest(&query, top_k))
    }
}

/// Embed every item into `index`, isolating per-item failures.
///
/// Returns `(id, cause)` for each item that could not be embedded.
pub fn build_index(
    client: &EmbeddingClient,
    index: &mut VisualIndex,
    items: &[WorkItem],
) -> Vec<(String, String)> {
    let mut failures = Vec::new();
    for item in items {
        match client.embed_image_file(&item.source) {
            Ok(embedding) => index.upsert(item.id.clone(), embedding),
            Err(err) => {
                tracing::warn!(item = %item.id, error = %format!("{err:#}"), "skip unindexable image");
                failures.push((item.id.clone(), format!("{err:#}")));
            }
        }
    }
    failures
}
