//! Chunks command implementation.

use crate::cli::ChunksArgs;
use crate::error::Result;
use crate::output::Formatter;
use veracity_domain::traits::FactRepository;
use veracity_domain::ChunkStatus;
use veracity_store::SqliteStore;

/// Execute the chunks command.
pub fn execute_chunks(args: ChunksArgs, store: &SqliteStore, formatter: &Formatter) -> Result<()> {
    let status = args.status.map(ChunkStatus::from);
    println!("{}", render_chunks(&args.document, status, store, formatter)?);
    Ok(())
}

/// Render the chunks of `document`, optionally only those in `status`.
pub fn render_chunks(
    document: &str,
    status: Option<ChunkStatus>,
    store: &SqliteStore,
    formatter: &Formatter,
) -> Result<String> {
    let chunks: Vec<_> = store
        .list_chunks(Some(document))?
        .into_iter()
        .filter(|c| status.map_or(true, |s| c.status == s))
        .collect();
    formatter.format_chunks(&chunks)
}
