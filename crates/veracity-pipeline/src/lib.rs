//! Veracity Pipeline
//!
//! Turns documents into verified facts: chunking, LLM extraction, LLM
//! verification, sequenced by a per-document state machine.
//!
//! # Architecture
//!
//! ```text
//! Document → Chunking → Extraction → Verification → Repository
//!                 (pending)   (staged candidates)   (verified / rejected)
//! ```
//!
//! # Key Features
//!
//! - **Resumable runs**: every transition is written to the repository, and
//!   each run starts by reading it back, so a rerun only does missing work
//! - **Exactly-once facts**: dedup keys span the verified and rejected stores
//! - **Contained failures**: a failed chunk or candidate is recorded and
//!   retried next run; only storage failures abort a run
//! - **Bounded calls**: every collaborator call has a timeout and observes
//!   the run's cancellation token
//! - **Bounded concurrency**: extraction fans out per document, and
//!   `run_documents` processes several documents at once
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use veracity_llm::OllamaProvider;
//! use veracity_pipeline::{CancellationToken, LlmExtractor, LlmVerifier, Pipeline, PipelineConfig};
//! use veracity_store::SqliteStore;
//! use veracity_domain::Document;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = Arc::new(OllamaProvider::default_endpoint("llama3"));
//! let store = Arc::new(SqliteStore::new("facts.db")?);
//!
//! let pipeline = Pipeline::new(
//!     store,
//!     LlmExtractor::new(Arc::clone(&provider)),
//!     LlmVerifier::new(provider),
//!     PipelineConfig::default(),
//! )?;
//!
//! let document = Document::new("apollo", "Apollo 11 landed on the moon in 1969.");
//! let report = pipeline.run_document(document, &CancellationToken::new()).await?;
//!
//! println!("Verified: {}", report.stats.verified);
//! println!("Rejected: {}", report.stats.rejected);
//! println!("Pending: {}", report.stats.pending);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod cancel;
mod chunking;
mod collaborator;
mod config;
mod error;
mod extraction;
mod parser;
mod prompt;
mod stage;
mod types;
mod verification;
mod workflow;

#[cfg(test)]
mod tests;

pub use cancel::CancellationToken;
pub use chunking::{ChunkedDocument, ChunkingStage, Span, TextChunker};
pub use collaborator::{
    extraction_fn, verification_fn, ExtractionCollaborator, LlmExtractor, LlmVerifier,
    VerificationCollaborator,
};
pub use config::{ChunkUnit, PipelineConfig};
pub use error::{CollaboratorError, PipelineError};
pub use extraction::{clean_statements, ExtractionStage};
pub use parser::{parse_statements, parse_verdict};
pub use stage::{PipelineStage, WorkflowStage, WorkflowState};
pub use types::{ChunkFailure, FactFailure, RunCounters, RunOutcome, RunReport};
pub use verification::{Verification, VerificationStage};
pub use workflow::Pipeline;
