//! Workflow state machine vocabulary
//!
//! ```text
//! start → chunking → extracting → verifying → done
//!              \           \            \
//!               └───────────┴────────────┴──→ failed
//! ```

use crate::cancel::CancellationToken;
use crate::error::PipelineError;
use crate::types::{ChunkFailure, FactFailure, RunCounters};
use std::fmt;
use std::future::Future;
use veracity_domain::{CandidateFact, Chunk, Document, DocumentContext, Fact, RunId};

/// Position of a document run in the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStage {
    /// Nothing done yet
    Start,
    /// Splitting and registering chunks
    Chunking,
    /// Running extraction over unprocessed chunks
    Extracting,
    /// Running verification over staged candidates
    Verifying,
    /// All stages visited
    Done,
    /// Stopped by an unrecoverable error
    Failed,
}

impl WorkflowStage {
    /// Whether the state machine stops here
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStage::Done | WorkflowStage::Failed)
    }

    /// Lowercase stage name
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStage::Start => "start",
            WorkflowStage::Chunking => "chunking",
            WorkflowStage::Extracting => "extracting",
            WorkflowStage::Verifying => "verifying",
            WorkflowStage::Done => "done",
            WorkflowStage::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-document run-time state, owned by one run
///
/// Never persisted: the repository is the durable record and a later run
/// rebuilds everything it needs from there.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    /// Identifier of this run
    pub run_id: RunId,
    /// The document being processed
    pub document: Document,
    /// Current stage
    pub stage: WorkflowStage,
    /// Chunks in index order, as last written
    pub chunks: Vec<Chunk>,
    /// Candidates gathered for the current stage
    pub candidates: Vec<CandidateFact>,
    /// Facts appended during this run
    pub facts: Vec<Fact>,
    /// Next unit (chunk or candidate) the current stage will visit
    pub cursor: usize,
    /// Tallies for the report
    pub counters: RunCounters,
    /// Chunks that failed extraction
    pub chunk_failures: Vec<ChunkFailure>,
    /// Candidates that failed verification
    pub fact_failures: Vec<FactFailure>,
    /// Set when a stage stopped on the cancellation token
    pub cancelled: bool,
}

impl WorkflowState {
    /// Fresh state in `start`
    pub fn new(run_id: RunId, document: Document) -> Self {
        Self {
            run_id,
            document,
            stage: WorkflowStage::Start,
            chunks: Vec::new(),
            candidates: Vec::new(),
            facts: Vec::new(),
            cursor: 0,
            counters: RunCounters::default(),
            chunk_failures: Vec::new(),
            fact_failures: Vec::new(),
            cancelled: false,
        }
    }

    /// Document name
    pub fn document_name(&self) -> &str {
        &self.document.name
    }

    /// Metadata handed to the extraction collaborator
    pub fn context(&self) -> DocumentContext {
        self.document.context()
    }

    /// Move to `stage` and rewind the cursor
    pub(crate) fn advance(&mut self, stage: WorkflowStage) {
        self.stage = stage;
        self.cursor = 0;
    }

    /// Content of a chunk by index
    pub fn chunk_content(&self, chunk_index: u32) -> Option<&str> {
        self.chunks
            .iter()
            .find(|c| c.chunk_index == chunk_index)
            .map(|c| c.content.as_str())
    }
}

/// One step of the state machine
///
/// Each implementation consumes the state, does its work against the
/// repository, and returns the state advanced to the next stage. On
/// cancellation it returns the state unadvanced with `cancelled` set.
pub trait PipelineStage: Send + Sync {
    /// Stage this step runs in
    fn stage(&self) -> WorkflowStage;

    /// Run the step
    fn run(
        &self,
        state: WorkflowState,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<WorkflowState, PipelineError>> + Send;
}
