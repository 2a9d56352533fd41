//! Facts command implementation.

use crate::cli::FactsArgs;
use crate::error::Result;
use crate::output::Formatter;
use veracity_domain::traits::FactRepository;
use veracity_domain::VerificationStatus;
use veracity_store::SqliteStore;

/// Execute the facts command.
pub fn execute_facts(args: FactsArgs, store: &SqliteStore, formatter: &Formatter) -> Result<()> {
    let status = if args.rejected {
        VerificationStatus::Rejected
    } else {
        VerificationStatus::Verified
    };
    println!("{}", render_facts(args.document.as_deref(), status, store, formatter)?);
    Ok(())
}

/// Render the facts in one store.
pub fn render_facts(
    document: Option<&str>,
    status: VerificationStatus,
    store: &SqliteStore,
    formatter: &Formatter,
) -> Result<String> {
    let facts = store.list_facts(document, status)?;
    formatter.format_facts(&facts)
}
