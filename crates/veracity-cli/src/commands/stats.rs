//! Stats command implementation.

use crate::cli::StatsArgs;
use crate::error::Result;
use crate::output::Formatter;
use veracity_domain::traits::FactRepository;
use veracity_store::SqliteStore;

/// Execute the stats command.
pub fn execute_stats(args: StatsArgs, store: &SqliteStore, formatter: &Formatter) -> Result<()> {
    println!("{}", render_stats(args.document.as_deref(), store, formatter)?);
    Ok(())
}

/// Render repository statistics, optionally for one document.
pub fn render_stats(
    document: Option<&str>,
    store: &SqliteStore,
    formatter: &Formatter,
) -> Result<String> {
    let facts = store.get_stats(document)?;
    let chunks = store.chunk_stats(document)?;
    formatter.format_stats(document, &facts, &chunks)
}
