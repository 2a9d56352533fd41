//! Veracity CLI library.
//!
//! Configuration, document loading, command execution and output formatting
//! for the `veracity` binary.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod loader;
pub mod output;

pub use cli::{Cli, Command};
pub use config::Config;
pub use error::{CliError, Result};
pub use loader::PlainTextLoader;
pub use output::Formatter;
