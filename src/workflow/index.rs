//! Index command: embed a source directory into `visual_index.json`.
use super::resolve_with_endpoints;
use crate::cli::IndexArgs;
use crate::enumerate::list_candidates;
use crate::paths::RunPaths;
use crate::stages::{build_index, EmbeddingClient, VisualIndex};
use anyhow::{anyhow, Result};

pub fn run_index(args: &IndexArgs) -> Result<()> {
    if !args.source.is_dir() {
        return Err(anyhow!("source is not a directory: {}", args.source.display()));
    }
    let config = resolve_with_endpoints(&args.endpoints, None)?;
    let paths = RunPaths::new(args.out.clone());
    let index_path = paths.visual_index_path();

    let items = list_candidates(&args.source, &config.extensions)?;
    let mut index = if index_path.is_file() {
        VisualIndex::load(&index_path)?
    } else {
        VisualIndex::default()
    };
    let client = EmbeddingClient::new(&config.embedding);
    let failures = build_index(&client, &mut index, &items);
    index.save(&index_path)?;

    println!(
        "indexed {} of {} image(s) into {} ({} entries)",
        items.len() - failures.len(),
        items.len(),
        index_path.display(),
        index.len()
    );
    for (id, cause) in &failures {
        println!("  {id}: {cause}");
    }
    Ok(())
}
