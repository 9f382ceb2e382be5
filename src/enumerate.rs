//! Work enumeration and resumption filtering.
use crate::checkpoint::CheckpointTable;
use crate::record::WorkItem;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// List accepted image files directly inside `source`, sorted by identifier.
pub fn list_candidates(source: &Path, extensions: &[String]) -> Result<Vec<WorkItem>> {
    let mut items = Vec::new();
    for entry in fs::read_dir(source).with_context(|| format!("read {}", source.display()))? {
        let entry = entry.with_context(|| format!("read {}", source.display()))?;
        let path = entry.path();
        if !path.is_file() || !has_accepted_extension(&path, extensions) {
            continue;
        }
        let Some(id) = path.file_name().and_then(|name| name.to_str()) else {
            tracing::warn!(path = %path.display(), "skip non UTF-8 file name");
            continue;
        };
        items.push(WorkItem {
            id: id.to_string(),
            source: path,
        });
    }
    items.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(items)
}

/// Drop candidates already committed to the checkpoint, preserving order.
pub fn filter_pending(candidates: Vec<WorkItem>, checkpoint: &CheckpointTable) -> Vec<WorkItem> {
    candidates
        .into_iter()
        .filter(|item| !checkpoint.contains(&item.id))
        .collect()
}

fn has_accepted_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            extensions
                .iter()
                .any(|accepted| accepted.trim_start_matches('.').eq_ignore_ascii_case(ext))
        })
}
