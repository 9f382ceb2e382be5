//! CLI argument parsing for the enrichment workflow.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "catalog-enrich",
    version,
    about = "Resumable batch enrichment of product images",
    after_help = "Commands:\n  batch --source <dir>     Enrich every pending image and write final_metadata.csv\n  describe --image <path>  Run both stages (and similarity search) on one image\n  index --source <dir>     Build visual_index.json for similarity search\n  status --source <dir>    Count candidates, checkpointed and pending items\n  config                   Print the effective configuration\n\nExamples:\n  catalog-enrich batch --source ./images --out ./run\n  catalog-enrich describe --image ./images/a.jpg --index ./run/visual_index.json\n  catalog-enrich status --source ./images --out ./run --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Raise log verbosity to debug
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Batch(BatchArgs),
    Describe(DescribeArgs),
    Index(IndexArgs),
    Status(StatusArgs),
    Config(ConfigArgs),
}

/// Collaborator endpoint and config-file flags shared by network commands.
#[derive(Args, Debug, Clone, Default)]
pub struct EndpointArgs {
    /// Config file (defaults to the user config, then built-in defaults)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// OpenAI-compatible chat completions URL
    #[arg(long, value_name = "URL")]
    pub lm_url: Option<String>,

    /// Embedding service base URL
    #[arg(long, value_name = "URL")]
    pub embed_url: Option<String>,
}

#[derive(Parser, Debug)]
#[command(about = "Enrich every pending image in a directory")]
pub struct BatchArgs {
    /// Directory of product images
    #[arg(long, value_name = "DIR")]
    pub source: PathBuf,

    /// Output directory for checkpoint, final table and run records
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub out: PathBuf,

    /// Persist the checkpoint every N new records
    #[arg(long, value_name = "N")]
    pub checkpoint_every: Option<usize>,

    /// Hide the progress bar
    #[arg(long)]
    pub quiet: bool,

    #[command(flatten)]
    pub endpoints: EndpointArgs,
}

#[derive(Parser, Debug)]
#[command(about = "Describe a single image")]
pub struct DescribeArgs {
    /// Image to describe
    #[arg(long, value_name = "PATH")]
    pub image: PathBuf,

    /// Visual index for similarity search
    #[arg(long, value_name = "FILE", default_value = "visual_index.json")]
    pub index: PathBuf,

    /// Number of similar items to show
    #[arg(long, value_name = "N")]
    pub top_k: Option<usize>,

    #[command(flatten)]
    pub endpoints: EndpointArgs,
}

#[derive(Parser, Debug)]
#[command(about = "Build a visual similarity index")]
pub struct IndexArgs {
    /// Directory of product images
    #[arg(long, value_name = "DIR")]
    pub source: PathBuf,

    /// Output directory for visual_index.json
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub out: PathBuf,

    #[command(flatten)]
    pub endpoints: EndpointArgs,
}

#[derive(Parser, Debug)]
#[command(about = "Summarize pending work without calling any collaborator")]
pub struct StatusArgs {
    /// Directory of product images
    #[arg(long, value_name = "DIR")]
    pub source: PathBuf,

    /// Output directory holding the checkpoint
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub out: PathBuf,

    /// Config file (for accepted extensions)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Print the effective configuration as JSON")]
pub struct ConfigArgs {
    /// Config file (defaults to the user config, then built-in defaults)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}
