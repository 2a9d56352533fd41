//! Veracity Domain Layer
//!
//! Core data model for the fact-extraction pipeline. Like any domain layer it
//! carries no infrastructure: the only external crate is `uuid`, used for run
//! identifiers. Storage, LLM transport and document loading are reached
//! through the traits in [`traits`].
//!
//! ## Key Concepts
//!
//! - **Chunk**: an overlapping segment of a document, the unit of extraction work
//! - **Candidate fact**: an unverified statement proposed for one chunk
//! - **Fact**: the append-only verification outcome (verified or rejected)
//! - **Dedup keys**: `(document, chunk_index)` for chunks and
//!   `(document, source_chunk, statement)` for facts
//!
//! ## Data flow
//!
//! ```text
//! Document → Chunks → Candidate Facts → Verified / Rejected Facts
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunk;
pub mod document;
pub mod fact;
pub mod run;
pub mod stats;
pub mod traits;

// Re-exports for convenience
pub use chunk::{Chunk, ChunkStatus};
pub use document::{Document, DocumentContext};
pub use fact::{CandidateFact, Fact, FactKey, Verdict, VerificationStatus};
pub use run::RunId;
pub use stats::{ChunkStats, FactStats};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current timestamp in seconds since the Unix epoch
///
/// Clocks set before 1970 read as 0 rather than failing.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
