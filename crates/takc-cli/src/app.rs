//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "takc")]
#[command(
    author,
    version,
    about = "Compress knowledge once per task, answer queries from the right compression rate"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "cli")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (defaults to TAKC_CONFIG or the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compress a document for a task type at one or more rates
    Compress(CompressArgs),

    /// Answer a question from compressed context
    Query(QueryArgs),

    /// Show a cached entry
    Get(GetArgs),

    /// List cached task types and rates
    Ls(LsArgs),

    /// List configured models
    Models(ModelsArgs),

    /// Start MCP server
    Mcp,
}

#[derive(Args)]
pub struct CompressArgs {
    /// Task type the compressed entries are stored under
    pub task_type: String,

    /// Input file ("-" or omitted reads stdin)
    pub input: Option<PathBuf>,

    /// Comma-separated rates (ultra, high, medium, light); all when omitted
    #[arg(short, long, value_delimiter = ',')]
    pub rates: Vec<String>,

    /// Task description used in the compression prompt
    #[arg(short, long)]
    pub description: Option<String>,

    /// File with few-shot examples for the prompt
    #[arg(long)]
    pub examples: Option<PathBuf>,

    /// Compression strategy (single_pass or iterative)
    #[arg(long)]
    pub strategy: Option<String>,

    /// Model name from the catalogue, or a raw model id
    #[arg(short, long)]
    pub model: Option<String>,
}

#[derive(Args)]
pub struct QueryArgs {
    /// Task type to answer from
    pub task_type: String,

    /// Question text
    #[arg(required = true)]
    pub query: Vec<String>,

    /// Force a rate instead of classifying the query
    #[arg(short, long)]
    pub rate: Option<String>,
}

#[derive(Args)]
pub struct GetArgs {
    pub task_type: String,

    pub rate: String,

    /// Print entry metadata along with the text
    #[arg(long)]
    pub metadata: bool,
}

#[derive(Args)]
pub struct LsArgs {
    /// Only this task type
    pub task_type: Option<String>,
}

#[derive(Args)]
pub struct ModelsArgs {
    /// Send a test prompt to the configured model
    #[arg(long)]
    pub check: bool,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Cli,
    Json,
}
