//! Run configuration.
//!
//! Config is resolved from an explicit file, then the user config directory,
//! then built-in defaults; environment variables and CLI flags override the
//! collaborator endpoints afterwards.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Current schema version for config files.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;
/// Environment override for the chat-completions endpoint.
pub const LM_URL_ENV: &str = "CATALOG_ENRICH_LM_URL";
/// Environment override for the embedding service base URL.
pub const EMBED_URL_ENV: &str = "CATALOG_ENRICH_EMBED_URL";

const DEFAULT_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
const DEFAULT_CHECKPOINT_EVERY: usize = 10;
const DEFAULT_EMBED_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_LM_URL: &str = "http://127.0.0.1:1234/v1/chat/completions";
const DEFAULT_LM_MODEL: &str = "phi-3.5-mini-instruct";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnrichConfig {
    pub schema_version: u32,
    /// Accepted file extensions, compared case-insensitively.
    pub extensions: Vec<String>,
    /// Persist the checkpoint after this many newly produced records.
    pub checkpoint_every: usize,
    pub embedding: EmbeddingConfig,
    pub generator: GeneratorConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// Base URL exposing `/embed/image` and `/embed/text`.
    pub endpoint: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    /// OpenAI-compatible chat-completions URL.
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    /// Extra attempts after a reply that fails to parse or validate.
    pub max_retries: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    pub top_k: usize,
}

/// Build the built-in default config.
pub fn default_config() -> EnrichConfig {
    EnrichConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
        checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
        embedding: EmbeddingConfig {
            endpoint: DEFAULT_EMBED_URL.to_string(),
            timeout_secs: 60,
        },
        generator: GeneratorConfig {
            endpoint: DEFAULT_LM_URL.to_string(),
            model: DEFAULT_LM_MODEL.to_string(),
            temperature: 0.0,
            max_retries: 2,
            timeout_secs: 120,
        },
        search: SearchConfig { top_k: 5 },
    }
}

/// Load a config file from disk.
pub fn load_config(path: &Path) -> Result<EnrichConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: EnrichConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    Ok(config)
}

/// Return the per-user config path, if the platform has a config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("catalog-enrich").join("config.json"))
}

/// Endpoint overrides that take precedence over file-based config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub lm_url: Option<String>,
    pub embed_url: Option<String>,
    pub checkpoint_every: Option<usize>,
}

/// Resolve the effective config: explicit file > user config > defaults,
/// then environment, then CLI overrides.
pub fn resolve_config(explicit: Option<&Path>, overrides: &ConfigOverrides) -> Result<EnrichConfig> {
    let mut config = match explicit {
        Some(path) => load_config(path)?,
        None => match user_config_path().filter(|path| path.is_file()) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "using user config");
                load_config(&path)?
            }
            None => default_config(),
        },
    };
    apply_env_overrides(&mut config, |name| env::var(name).ok());
    apply_overrides(&mut config, overrides);
    validate_config(&config)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut EnrichConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup(LM_URL_ENV).filter(|value| !value.trim().is_empty()) {
        config.generator.endpoint = url;
    }
    if let Some(url) = lookup(EMBED_URL_ENV).filter(|value| !value.trim().is_empty()) {
        config.embedding.endpoint = url;
    }
}

fn apply_overrides(config: &mut EnrichConfig, overrides: &ConfigOverrides) {
    if let Some(url) = &overrides.lm_url {
        config.generator.endpoint = url.clone();
    }
    if let Some(url) = &overrides.embed_url {
        config.embedding.endpoint = url.clone();
    }
    if let Some(every) = overrides.checkpoint_every {
        config.checkpoint_every = every;
    }
}

/// Validate config schema and value ranges.
pub fn validate_config(config: &EnrichConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    if config.extensions.iter().all(|ext| ext.trim().is_empty()) {
        return Err(anyhow!("extensions must list at least one extension"));
    }
    if config.checkpoint_every == 0 {
        return Err(anyhow!("checkpoint_every must be at least 1"));
    }
    if config.embedding.endpoint.trim().is_empty() {
        return Err(anyhow!("embedding.endpoint must be non-empty"));
    }
    if config.generator.endpoint.trim().is_empty() {
        return Err(anyhow!("generator.endpoint must be non-empty"));
    }
    if config.generator.model.trim().is_empty() {
        return Err(anyhow!("generator.model must be non-empty"));
    }
    if config.search.top_k == 0 {
        return Err(anyhow!("search.top_k must be at least 1"));
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
