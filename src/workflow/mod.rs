//! Command handlers.
//!
//! Each handler resolves config, builds the collaborators it needs and hands
//! off to the engine or stage modules; stdout carries command output and
//! logs go to stderr.
mod batch;
mod describe;
mod index;
mod status;

pub use batch::run_batch;
pub use describe::run_describe;
pub use index::run_index;
pub use status::run_status;

use crate::cli::{ConfigArgs, EndpointArgs};
use crate::config::{resolve_config, ConfigOverrides, EnrichConfig};
use anyhow::{Context, Result};

/// Resolve config for a command that talks to collaborators.
fn resolve_with_endpoints(
    endpoints: &EndpointArgs,
    checkpoint_every: Option<usize>,
) -> Result<EnrichConfig> {
    let overrides = ConfigOverrides {
        lm_url: endpoints.lm_url.clone(),
        embed_url: endpoints.embed_url.clone(),
        checkpoint_every,
    };
    resolve_config(endpoints.config.as_deref(), &overrides)
}

/// Print the effective configuration as pretty JSON.
pub fn run_config(args: &ConfigArgs) -> Result<()> {
    let config = resolve_config(args.config.as_deref(), &ConfigOverrides::default())?;
    let text = serde_json::to_string_pretty(&config).context("serialize config")?;
    println!("{text}");
    Ok(())
}
