//! Error types for the CLI application.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Repository error
    #[error("Store error: {0}")]
    Store(#[from] veracity_store::StoreError),

    /// Pipeline error
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] veracity_pipeline::PipelineError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The loader does not understand this file
    #[error("Unsupported document format: {} (expected .txt, .text, .md or .markdown)", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Some documents of a run failed
    #[error("{0} document run(s) failed")]
    RunFailed(usize),
}
