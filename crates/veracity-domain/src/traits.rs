//! Trait definitions for external interactions
//!
//! These traits define the boundaries between domain logic and infrastructure.
//! Infrastructure implementations live in other crates.

use crate::{
    CandidateFact, Chunk, ChunkStats, Document, Fact, FactKey, FactStats, VerificationStatus,
};
use std::path::Path;

/// Durable storage for chunks, facts and staged candidates
///
/// Implemented by the infrastructure layer (veracity-store).
///
/// Every mutating call must be durable when it returns: a run is resumed by
/// reading this store back, never from process memory. Methods take `&self`
/// so one store can be shared between concurrent document runs; implementors
/// serialize writers internally, and each dedup check plus the write it
/// guards must form one critical section.
pub trait FactRepository: Send + Sync {
    /// Error type for repository operations
    type Error;

    /// Insert or replace a chunk row by `(document_name, chunk_index)`
    fn upsert_chunk(&self, chunk: &Chunk) -> Result<(), Self::Error>;

    /// Insert or replace a batch of chunk rows as one unit
    ///
    /// Either every row is written or none is, so a document is never left
    /// with a prefix of its chunks.
    fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<(), Self::Error>;

    /// Point lookup of one chunk
    fn get_chunk(&self, document_name: &str, chunk_index: u32)
        -> Result<Option<Chunk>, Self::Error>;

    /// All chunks, optionally for one document, ordered by document then index
    fn list_chunks(&self, document_name: Option<&str>) -> Result<Vec<Chunk>, Self::Error>;

    /// Whether a chunk row exists
    fn chunk_exists(&self, document_name: &str, chunk_index: u32) -> Result<bool, Self::Error>;

    /// Remove every chunk row of a document, returning how many were removed
    ///
    /// Staged candidates of the document go with them. Facts are append-only
    /// and are left in place.
    fn delete_chunks(&self, document_name: &str) -> Result<usize, Self::Error>;

    /// Append a fact to the verified or rejected store, chosen by its status
    ///
    /// Returns `false` without writing when the fact's dedup key is already
    /// present in either store. A successful append also retires the matching
    /// staged candidate.
    fn append_fact(&self, fact: &Fact) -> Result<bool, Self::Error>;

    /// Whether a fact with this dedup key exists in either store
    fn fact_exists(
        &self,
        document_name: &str,
        source_chunk: u32,
        statement: &str,
    ) -> Result<bool, Self::Error>;

    /// The stored fact for a dedup key, from whichever store holds it
    fn find_fact(&self, key: &FactKey) -> Result<Option<Fact>, Self::Error>;

    /// Facts of one outcome, optionally for one document
    fn list_facts(
        &self,
        document_name: Option<&str>,
        status: VerificationStatus,
    ) -> Result<Vec<Fact>, Self::Error>;

    /// Stage a candidate awaiting verification
    ///
    /// Returns `false` when the candidate is already staged or already has a
    /// recorded fact.
    fn stage_candidate(&self, candidate: &CandidateFact) -> Result<bool, Self::Error>;

    /// Staged candidates, ordered by source chunk then staging order
    fn pending_candidates(&self, document_name: Option<&str>)
        -> Result<Vec<CandidateFact>, Self::Error>;

    /// Fact counts, optionally for one document
    fn get_stats(&self, document_name: Option<&str>) -> Result<FactStats, Self::Error>;

    /// Chunk counts by status, optionally for one document
    fn chunk_stats(&self, document_name: Option<&str>) -> Result<ChunkStats, Self::Error>;
}

/// Trait for LLM provider operations
///
/// Implemented by the infrastructure layer (veracity-llm). Calls block; async
/// callers run them on a blocking thread with their own timeout.
pub trait LlmProvider: Send + Sync {
    /// Error type for LLM operations
    type Error;

    /// Generate text completion
    fn generate(&self, prompt: &str) -> Result<String, Self::Error>;

    /// Generate with structured output (if supported)
    fn generate_structured(&self, prompt: &str, schema: &str) -> Result<String, Self::Error>;
}

/// Trait for turning a file into a plain-text document
///
/// Format-specific parsing lives outside the core pipeline.
pub trait DocumentLoader {
    /// Error type for loading
    type Error;

    /// Whether this loader understands the file at `path`
    fn supports(&self, path: &Path) -> bool;

    /// Load the file at `path`
    fn load(&self, path: &Path) -> Result<Document, Self::Error>;
}
