//! Veracity CLI - extract and verify facts from documents.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use veracity_cli::commands;
use veracity_cli::{Cli, Command, Config, Formatter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => Config::path()?,
    };
    let config = Config::load_from(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let format = cli
        .format
        .map(Into::into)
        .unwrap_or(config.settings.format);
    let color_enabled = !cli.no_color && config.settings.color;
    let formatter = Formatter::new(format, color_enabled);

    match cli.command {
        Command::Run(args) => commands::execute_run(args, &config, &formatter).await?,
        Command::Config(args) => {
            commands::execute_config(args, &config, &config_path, &formatter)?
        }
        cmd => {
            let store = commands::open_store(&config)?;
            match cmd {
                Command::Stats(args) => commands::execute_stats(args, &store, &formatter)?,
                Command::Chunks(args) => commands::execute_chunks(args, &store, &formatter)?,
                Command::Facts(args) => commands::execute_facts(args, &store, &formatter)?,
                Command::Run(_) | Command::Config(_) => {}
            }
        }
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}
