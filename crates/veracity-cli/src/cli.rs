//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use veracity_domain::ChunkStatus;

/// Veracity CLI - Extract and verify facts from documents.
#[derive(Debug, Parser)]
#[command(name = "veracity")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "VERACITY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (one value per line)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract and verify facts from documents
    Run(RunArgs),

    /// Show fact and chunk statistics
    Stats(StatsArgs),

    /// List the chunks of a document
    Chunks(ChunksArgs),

    /// List verified or rejected facts
    Facts(FactsArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Arguments for the run command.
#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Documents to process (.txt, .text, .md, .markdown)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Re-split documents that already have chunks
    #[arg(long)]
    pub force_rechunk: bool,
}

/// Arguments for the stats command.
#[derive(Debug, Parser)]
pub struct StatsArgs {
    /// Limit to one document
    #[arg(short, long)]
    pub document: Option<String>,
}

/// Arguments for the chunks command.
#[derive(Debug, Parser)]
pub struct ChunksArgs {
    /// Document name
    pub document: String,

    /// Only chunks in this state
    #[arg(short, long, value_enum)]
    pub status: Option<StatusArg>,
}

/// Arguments for the facts command.
#[derive(Debug, Parser)]
pub struct FactsArgs {
    /// Limit to one document
    #[arg(short, long)]
    pub document: Option<String>,

    /// List rejected facts instead of verified ones
    #[arg(long)]
    pub rejected: bool,
}

/// Arguments for configuration management.
#[derive(Debug, Parser)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Chunk status argument.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum StatusArg {
    /// Not yet extracted
    Pending,
    /// Extraction in flight (or interrupted)
    Processing,
    /// Extracted
    Processed,
    /// Extraction failed
    Failed,
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
            CliFormat::Quiet => crate::config::OutputFormat::Quiet,
        }
    }
}

impl From<StatusArg> for ChunkStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Pending => ChunkStatus::Pending,
            StatusArg::Processing => ChunkStatus::Processing,
            StatusArg::Processed => ChunkStatus::Processed,
            StatusArg::Failed => ChunkStatus::Failed,
        }
    }
}
