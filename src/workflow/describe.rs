//! Describe command: both stages plus similarity search on one image.
use super::resolve_with_endpoints;
use crate::cli::DescribeArgs;
use crate::stages::{
    AttributeExtractor, ClipExtractor, EmbeddingClient, IndexedSearch, LmGenerator,
    MetadataGenerator, SearchHit, VisualIndex, VisualSearch,
};
use anyhow::{anyhow, Context, Result};

const RULE_WIDTH: usize = 70;

pub fn run_describe(args: &DescribeArgs) -> Result<()> {
    if !args.image.is_file() {
        return Err(anyhow!("image not found: {}", args.image.display()));
    }
    let config = resolve_with_endpoints(&args.endpoints, None)?;
    let top_k = args.top_k.unwrap_or(config.search.top_k);
    let client = EmbeddingClient::new(&config.embedding);
    let extractor = ClipExtractor::new(client.clone());
    let generator = LmGenerator::new(&config.generator);

    print_header("STEP 1: Extracting Visual Attributes");
    let attributes = extractor.extract(&args.image)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&attributes).context("serialize attributes")?
    );

    print_header("STEP 2: Generating Product Metadata");
    let metadata = generator.generate(&attributes)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&metadata).context("serialize metadata")?
    );

    print_header("STEP 3: Finding Visually Similar Products");
    if args.index.is_file() {
        let index = VisualIndex::load(&args.index)?;
        if index.is_empty() {
            println!("visual index at {} is empty", args.index.display());
        } else {
            let search = IndexedSearch::new(index, client);
            let hits = search.search(&args.image, top_k)?;
            print!("{}", render_hits(&hits));
        }
    } else {
        println!(
            "no visual index at {}; run `catalog-enrich index` first",
            args.index.display()
        );
    }

    print_header("PIPELINE COMPLETE");
    println!("All steps finished successfully.");
    Ok(())
}

fn print_header(title: &str) {
    let rule = "=".repeat(RULE_WIDTH);
    println!("\n{rule}\n{title}\n{rule}");
}

fn render_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "no similar items found\n".to_string();
    }
    hits.iter()
        .enumerate()
        .map(|(rank, hit)| format!("{}. {}   (score: {:.4})\n", rank + 1, hit.id, hit.score))
        .collect()
}
