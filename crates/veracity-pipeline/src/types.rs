//! Run reports

use crate::error::CollaboratorError;
use crate::stage::WorkflowStage;
use std::fmt;
use veracity_domain::{ChunkStats, Fact, FactStats, RunId};

/// How a document run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every stage ran to the end (individual units may still have failed)
    Completed,
    /// Stopped early by the cancellation token
    Cancelled,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed => f.write_str("completed"),
            RunOutcome::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// A chunk whose extraction failed in this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFailure {
    /// Index of the failed chunk
    pub chunk_index: u32,
    /// What went wrong
    pub error: CollaboratorError,
}

/// A candidate whose verification failed in this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactFailure {
    /// Chunk the candidate came from
    pub source_chunk: u32,
    /// The candidate statement
    pub statement: String,
    /// What went wrong
    pub error: CollaboratorError,
}

/// Work done during one run, counted in memory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    /// Chunk rows written by the chunking stage
    pub chunks_created: usize,
    /// Chunks already processed by an earlier run
    pub chunks_skipped: usize,
    /// Extraction collaborator invocations
    pub extraction_calls: usize,
    /// Verification collaborator invocations
    pub verification_calls: usize,
    /// Candidates produced by this run's extractions
    pub candidates_extracted: usize,
    /// Facts appended to the verified store
    pub facts_verified: usize,
    /// Facts appended to the rejected store
    pub facts_rejected: usize,
}

/// Summary of one document run
///
/// `stats` and `chunk_stats` are read back from the repository when the run
/// ends; the counters describe only what this run did.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Identifier of this run
    pub run_id: RunId,
    /// Document name
    pub document: String,
    /// Completed or cancelled
    pub outcome: RunOutcome,
    /// Stage the state machine stopped in
    pub final_stage: WorkflowStage,
    /// In-memory tallies for this run
    pub counters: RunCounters,
    /// Chunks that failed extraction
    pub chunk_failures: Vec<ChunkFailure>,
    /// Candidates that failed verification
    pub fact_failures: Vec<FactFailure>,
    /// Facts this run appended, in verification order
    pub facts: Vec<Fact>,
    /// Fact counts for the document
    pub stats: FactStats,
    /// Chunk counts for the document
    pub chunk_stats: ChunkStats,
}

impl RunReport {
    /// Whether the run wrote no chunks and made no collaborator calls
    pub fn is_noop(&self) -> bool {
        self.counters.chunks_created == 0
            && self.counters.extraction_calls == 0
            && self.counters.verification_calls == 0
    }

    /// Whether every unit of work for the document has succeeded
    pub fn is_complete(&self) -> bool {
        self.outcome == RunOutcome::Completed
            && self.chunk_stats.remaining() == 0
            && self.stats.pending == 0
    }
}
