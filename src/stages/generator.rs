//! Metadata generation through a local chat-completions server.
//!
//! The request pins a JSON schema via `response_format`, but local servers do
//! not always honor it, so replies are unwrapped from code fences or leading
//! prose and validated against the record invariants.
//!
//! # Error Recovery
//!
//! 1. **Transport errors** (unreachable server, non-2xx status, reply without
//!    `choices`): fail immediately.
//! 2. **Parse or validation errors**: retry up to `max_retries` times with the
//!    error and the previous reply appended to the prompt.
use super::MetadataGenerator;
use crate::config::GeneratorConfig;
use crate::error::StageError;
use crate::record::{AttributeSet, MetadataRecord};
use crate::util::{read_json_reply, truncate_string};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

const METADATA_PROMPT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/metadata.md"
));

const SYSTEM_PROMPT: &str = "You only output JSON that matches the schema. No explanation or extra text.";

/// Previous replies are clipped to this many bytes inside retry prompts.
const RETRY_SNIPPET_BYTES: usize = 1000;

/// Chat-completions client producing [`MetadataRecord`]s.
pub struct LmGenerator {
    agent: ureq::Agent,
    config: GeneratorConfig,
}

impl LmGenerator {
    pub fn new(config: &GeneratorConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            config: config.clone(),
        }
    }

    /// Send one prompt and return the assistant message content.
    fn complete(&self, prompt: &str) -> Result<String> {
        let request = build_request(&self.config, prompt);
        let start = Instant::now();
        let response = self
            .agent
            .post(&self.config.endpoint)
            .send_json(&request)
            .with_context(|| format!("POST {}", self.config.endpoint))?;
        let reply: Value = read_json_reply(response, &self.config.endpoint)?;
        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            prompt_bytes = prompt.len(),
            "lm completion"
        );
        extract_content(&reply)
    }

    fn generate_with_retries(&self, attributes: &AttributeSet) -> Result<MetadataRecord> {
        let mut last_error: Option<String> = None;
        let mut last_reply: Option<String> = None;

        for attempt in 0..=self.config.max_retries {
            let prompt = match &last_error {
                None => build_prompt(attributes)?,
                Some(error) => {
                    tracing::info!(
                        attempt,
                        max_retries = self.config.max_retries,
                        "retrying LM after rejected reply"
                    );
                    build_retry_prompt(attributes, error, last_reply.as_deref())?
                }
            };
            let content = self.complete(&prompt)?;
            match parse_metadata(&content) {
                Ok(metadata) => return Ok(metadata),
                Err(err) => {
                    last_error = Some(format!("{err:#}"));
                    last_reply = Some(content);
                }
            }
        }

        Err(anyhow!(
            "LM reply rejected after {} attempts: {}",
            self.config.max_retries + 1,
            last_error.unwrap_or_else(|| "unknown".to_string())
        ))
    }
}

impl MetadataGenerator for LmGenerator {
    fn generate(&self, attributes: &AttributeSet) -> Result<MetadataRecord, StageError> {
        self.generate_with_retries(attributes)
            .map_err(StageError::generation)
    }
}

/// JSON schema pinned in `response_format`.
fn metadata_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "title": { "type": "string" },
            "bullet_points": { "type": "array", "items": { "type": "string" } },
            "description": { "type": "string" },
            "style_summary": { "type": "string" },
            "seo_tags": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["title", "bullet_points", "description", "style_summary", "seo_tags"]
    })
}

fn build_request(config: &GeneratorConfig, prompt: &str) -> Value {
    json!({
        "model": config.model,
        "temperature": config.temperature,
        "response_format": {
            "type": "json_schema",
            "json_schema": {
                "name": "product_metadata",
                "schema": metadata_schema()
            }
        },
        "messages": [
            { "role": "system", "content": SYSTEM_PROMPT },
            { "role": "user", "content": prompt }
        ]
    })
}

fn build_prompt(attributes: &AttributeSet) -> Result<String> {
    let rendered = serde_json::to_string_pretty(attributes).context("serialize attributes")?;
    Ok(METADATA_PROMPT.replace("{attributes}", &rendered))
}

fn build_retry_prompt(
    attributes: &AttributeSet,
    error: &str,
    previous_reply: Option<&str>,
) -> Result<String> {
    let mut prompt = build_prompt(attributes)?;
    prompt.push_str("\n## Previous Response Error\n\n");
    prompt.push_str("Your previous response was rejected. Fix the error and answer again.\n\n");
    prompt.push_str(&format!("**Error:** {error}\n"));
    if let Some(reply) = previous_reply {
        let snippet = truncate_string(reply, RETRY_SNIPPET_BYTES);
        prompt.push_str(&format!(
            "\n**Your previous response (may be truncated):**\n```\n{snippet}\n```\n"
        ));
    }
    prompt.push_str("\nRespond ONLY with the corrected JSON object.\n");
    Ok(prompt)
}

/// Pull `choices[0].message.content` out of a chat-completions reply.
fn extract_content(reply: &Value) -> Result<String> {
    let choices = reply
        .get("choices")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            anyhow!(
                "no choices returned from LM: {}",
                truncate_string(&reply.to_string(), 300)
            )
        })?;
    choices
        .first()
        .and_then(|choice| choice.pointer("/message/content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("LM reply has no message content"))
}

/// Parse and validate the assistant content as a metadata record.
fn parse_metadata(content: &str) -> Result<MetadataRecord> {
    let cleaned = strip_code_fences(content);
    let value: Value = match serde_json::from_str(&cleaned) {
        Ok(value) => value,
        Err(err) => extract_json_from_text(&cleaned).ok_or_else(|| {
            anyhow!(
                "parse LM content as JSON: {err}; first 200 bytes: {}",
                truncate_string(&cleaned, 200)
            )
        })?,
    };
    let metadata = MetadataRecord::deserialize(&value)
        .context("LM content does not match the metadata schema")?
        .normalized();
    metadata.validate()?;
    Ok(metadata)
}

fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    if lines
        .first()
        .is_some_and(|first| first.trim_start().starts_with("```"))
    {
        lines.remove(0);
    }
    if lines
        .last()
        .is_some_and(|last| last.trim_start().starts_with("```"))
    {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

fn extract_json_from_text(raw: &str) -> Option<Value> {
    for (idx, ch) in raw.char_indices() {
        if ch != '{' {
            continue;
        }
        let mut deserializer = serde_json::Deserializer::from_str(&raw[idx..]);
        if let Ok(value) = Value::deserialize(&mut deserializer) {
            return Some(value);
        }
    }
    None
}

#[cfg(test)]
#[path = "generator_tests.rs"]
mod tests;
