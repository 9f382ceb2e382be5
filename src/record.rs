//! Typed records flowing through the pipeline.
//!
//! `ResultRecord` is the unit of persistence; `CsvRow` is its flattened,
//! column-per-field form used by both the checkpoint and the final table.
use crate::vocab::AttributeKey;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Separator used when list-valued fields are flattened into one column.
pub const LIST_DELIMITER: &str = "; ";
/// Longest accepted generated title, in characters.
pub const MAX_TITLE_CHARS: usize = 150;
/// Inclusive bounds on the number of bullet points.
pub const BULLET_POINTS_RANGE: (usize, usize) = (1, 8);
/// Inclusive bounds on the number of SEO tags.
pub const SEO_TAGS_RANGE: (usize, usize) = (3, 5);

/// One image to enrich.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// File name inside the source directory; unique within a run.
    pub id: String,
    pub source: PathBuf,
}

/// One vocabulary label per attribute key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AttributeSet {
    labels: BTreeMap<AttributeKey, &'static str>,
}

impl AttributeSet {
    /// Build a set from raw labels, rejecting missing keys and labels outside
    /// the key's vocabulary.
    pub fn from_labels<'a, I>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = (AttributeKey, &'a str)>,
    {
        let mut resolved = BTreeMap::new();
        for (key, label) in labels {
            let canonical = key
                .canonical_label(label)
                .ok_or_else(|| anyhow!("{key} label {label:?} is not in its vocabulary"))?;
            if resolved.insert(key, canonical).is_some() {
                return Err(anyhow!("{key} label given more than once"));
            }
        }
        if let Some(missing) = AttributeKey::ALL
            .into_iter()
            .find(|key| !resolved.contains_key(key))
        {
            return Err(anyhow!("missing {missing} label"));
        }
        Ok(Self { labels: resolved })
    }

    pub fn get(&self, key: AttributeKey) -> &'static str {
        self.labels.get(&key).copied().unwrap_or_default()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = (AttributeKey, &'static str)> + '_ {
        self.labels.iter().map(|(key, label)| (*key, *label))
    }
}

/// Generated product copy for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub title: String,
    pub bullet_points: Vec<String>,
    pub description: String,
    pub style_summary: String,
    pub seo_tags: Vec<String>,
}

impl MetadataRecord {
    /// Trim every field, drop blank list entries and rewrite the list
    /// delimiter so entries survive flattening.
    pub fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            bullet_points: normalize_list(self.bullet_points),
            description: self.description.trim().to_string(),
            style_summary: self.style_summary.trim().to_string(),
            seo_tags: normalize_list(self.seo_tags),
        }
    }

    /// Check the non-empty and cardinality invariants.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("title", &self.title),
            ("description", &self.description),
            ("style_summary", &self.style_summary),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("{name} must be non-empty"));
            }
        }
        let title_chars = self.title.chars().count();
        if title_chars > MAX_TITLE_CHARS {
            return Err(anyhow!(
                "title has {title_chars} characters (max {MAX_TITLE_CHARS})"
            ));
        }
        check_list("bullet_points", &self.bullet_points, BULLET_POINTS_RANGE)?;
        check_list("seo_tags", &self.seo_tags, SEO_TAGS_RANGE)?;
        Ok(())
    }
}

fn normalize_list(entries: Vec<String>) -> Vec<String> {
    entries
        .into_iter()
        .map(|entry| entry.replace(';', ",").trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}

fn check_list(name: &str, entries: &[String], (min, max): (usize, usize)) -> Result<()> {
    if entries.iter().any(|entry| entry.trim().is_empty()) {
        return Err(anyhow!("{name} contains an empty entry"));
    }
    if entries.len() < min || entries.len() > max {
        return Err(anyhow!(
            "{name} has {} entries (expected {min}-{max})",
            entries.len()
        ));
    }
    Ok(())
}

/// A fully enriched item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub id: String,
    pub attributes: AttributeSet,
    pub metadata: MetadataRecord,
}

/// Flattened table row; column order is the output column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvRow {
    pub image: String,
    pub color: String,
    pub neckline: String,
    pub sleeve: String,
    pub pattern: String,
    pub fabric: String,
    pub fit: String,
    pub title: String,
    pub bullet_points: String,
    pub description: String,
    pub style_summary: String,
    pub seo_tags: String,
}

impl From<&ResultRecord> for CsvRow {
    fn from(record: &ResultRecord) -> Self {
        let attrs = &record.attributes;
        let meta = &record.metadata;
        Self {
            image: record.id.clone(),
            color: attrs.get(AttributeKey::Color).to_string(),
            neckline: attrs.get(AttributeKey::Neckline).to_string(),
            sleeve: attrs.get(AttributeKey::Sleeve).to_string(),
            pattern: attrs.get(AttributeKey::Pattern).to_string(),
            fabric: attrs.get(AttributeKey::Fabric).to_string(),
            fit: attrs.get(AttributeKey::Fit).to_string(),
            title: meta.title.clone(),
            bullet_points: meta.bullet_points.join(LIST_DELIMITER),
            description: meta.description.clone(),
            style_summary: meta.style_summary.clone(),
            seo_tags: meta.seo_tags.join(LIST_DELIMITER),
        }
    }
}

impl TryFrom<CsvRow> for ResultRecord {
    type Error = anyhow::Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        if row.image.trim().is_empty() {
            return Err(anyhow!("row has an empty image identifier"));
        }
        let attributes = AttributeSet::from_labels([
            (AttributeKey::Color, row.color.as_str()),
            (AttributeKey::Neckline, row.neckline.as_str()),
            (AttributeKey::Sleeve, row.sleeve.as_str()),
            (AttributeKey::Pattern, row.pattern.as_str()),
            (AttributeKey::Fabric, row.fabric.as_str()),
            (AttributeKey::Fit, row.fit.as_str()),
        ])?;
        let metadata = MetadataRecord {
            title: row.title,
            bullet_points: split_list(&row.bullet_points),
            description: row.description,
            style_summary: row.style_summary,
            seo_tags: split_list(&row.seo_tags),
        };
        metadata.validate()?;
        Ok(Self {
            id: row.image,
            attributes,
            metadata,
        })
    }
}

fn split_list(joined: &str) -> Vec<String> {
    joined
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
