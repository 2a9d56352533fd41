//! Workflow orchestrator
//!
//! Drives one document through `start → chunking → extracting → verifying
//! → done`. Unit failures (one chunk, one candidate) are recorded and the
//! run carries on; storage failures move the run to `failed` and are
//! returned to the caller. Final statistics always come from the
//! repository.

use crate::cancel::CancellationToken;
use crate::chunking::{ChunkingStage, TextChunker};
use crate::collaborator::{ExtractionCollaborator, VerificationCollaborator};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::extraction::ExtractionStage;
use crate::stage::{PipelineStage, WorkflowStage, WorkflowState};
use crate::types::{RunOutcome, RunReport};
use crate::verification::VerificationStage;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, info_span, Instrument};
use veracity_domain::traits::FactRepository;
use veracity_domain::{Document, RunId};

struct Inner<R, E, V> {
    repository: Arc<R>,
    chunking: ChunkingStage<R>,
    extraction: ExtractionStage<R, E>,
    verification: VerificationStage<R, V>,
    config: PipelineConfig,
}

/// The fact-extraction pipeline
///
/// Cheap to clone; clones share the repository and collaborators.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use veracity_domain::{Document, Verdict};
/// use veracity_pipeline::{
///     extraction_fn, verification_fn, CancellationToken, Pipeline, PipelineConfig,
/// };
/// use veracity_store::SqliteStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(SqliteStore::new("facts.db")?);
/// let extractor = extraction_fn(|content, _| Ok(vec![content.trim().to_string()]));
/// let verifier = verification_fn(|_, _| Ok(Verdict::accept()));
///
/// let pipeline = Pipeline::new(store, extractor, verifier, PipelineConfig::default())?;
/// let report = pipeline
///     .run_document(Document::new("notes", "Water boils at 100C."), &CancellationToken::new())
///     .await?;
///
/// println!("{} verified, {} rejected", report.stats.verified, report.stats.rejected);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<R, E, V> {
    inner: Arc<Inner<R, E, V>>,
}

impl<R, E, V> Clone for Pipeline<R, E, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R, E, V> Pipeline<R, E, V>
where
    R: FactRepository + 'static,
    R::Error: Display,
    E: ExtractionCollaborator + 'static,
    V: VerificationCollaborator + 'static,
{
    /// Create a pipeline, validating the configuration
    pub fn new(
        repository: Arc<R>,
        extractor: E,
        verifier: V,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        config.validate().map_err(PipelineError::Config)?;

        let timeout = config.collaborator_timeout();
        let chunking = ChunkingStage::new(
            Arc::clone(&repository),
            TextChunker::from_config(&config),
            config.force_rechunk,
        );
        let extraction = ExtractionStage::new(
            Arc::clone(&repository),
            Arc::new(extractor),
            timeout,
            config.max_candidates_per_chunk,
            config.max_concurrent_chunks,
        );
        let verification =
            VerificationStage::new(Arc::clone(&repository), Arc::new(verifier), timeout);

        Ok(Self {
            inner: Arc::new(Inner {
                repository,
                chunking,
                extraction,
                verification,
                config,
            }),
        })
    }

    /// Pipeline settings
    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    /// Shared repository
    pub fn repository(&self) -> &Arc<R> {
        &self.inner.repository
    }

    /// Run one document through every stage
    ///
    /// Returns a report even when chunks or candidates failed; only a
    /// storage failure (or a crashed task) is an error. Calling this again
    /// for a fully processed document makes no collaborator calls.
    pub async fn run_document(
        &self,
        document: Document,
        cancel: &CancellationToken,
    ) -> Result<RunReport, PipelineError> {
        let run_id = RunId::new();
        let span = info_span!("document_run", run_id = %run_id, document = %document.name);
        self.drive(WorkflowState::new(run_id, document), cancel)
            .instrument(span)
            .await
    }

    /// Run several documents, at most `max_concurrent_documents` at a time
    ///
    /// Each document is an independent state machine; results are returned
    /// in input order, paired with the document name.
    pub async fn run_documents(
        &self,
        documents: Vec<Document>,
        cancel: &CancellationToken,
    ) -> Vec<(String, Result<RunReport, PipelineError>)> {
        let names: Vec<String> = documents.iter().map(|d| d.name.clone()).collect();
        let semaphore = Arc::new(Semaphore::new(self.inner.config.max_concurrent_documents));
        let mut join_set = JoinSet::new();

        for (slot, document) in documents.into_iter().enumerate() {
            let pipeline = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();

            join_set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (slot, Err(PipelineError::Task("semaphore closed".to_string())));
                };
                // A panicking run surfaces here as its own slot's JoinError
                let run =
                    tokio::spawn(async move { pipeline.run_document(document, &cancel).await });
                let result = run.await.unwrap_or_else(|e| Err(e.into()));
                (slot, result)
            });
        }

        let mut results: Vec<Option<Result<RunReport, PipelineError>>> =
            names.iter().map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((slot, result)) => results[slot] = Some(result),
                Err(e) => error!(error = %e, "Document task lost"),
            }
        }

        names
            .into_iter()
            .zip(results)
            .map(|(name, result)| {
                let result = result.unwrap_or_else(|| {
                    Err(PipelineError::Task(format!("run for '{}' was lost", name)))
                });
                (name, result)
            })
            .collect()
    }

    async fn drive(
        &self,
        mut state: WorkflowState,
        cancel: &CancellationToken,
    ) -> Result<RunReport, PipelineError> {
        let inner = &self.inner;
        info!("Starting document run");

        loop {
            if !state.stage.is_terminal() && cancel.is_cancelled() {
                state.cancelled = true;
            }
            if state.cancelled {
                break;
            }

            let stage = state.stage;
            let result = match stage {
                WorkflowStage::Start => {
                    state.advance(WorkflowStage::Chunking);
                    continue;
                }
                WorkflowStage::Chunking => inner.chunking.run(state, cancel).await,
                WorkflowStage::Extracting => inner.extraction.run(state, cancel).await,
                WorkflowStage::Verifying => inner.verification.run(state, cancel).await,
                WorkflowStage::Done | WorkflowStage::Failed => break,
            };

            state = match result {
                Ok(next) => next,
                Err(e) => {
                    error!(
                        stage = %stage,
                        next = %WorkflowStage::Failed,
                        error = %e,
                        "Document run failed"
                    );
                    return Err(e);
                }
            };
        }

        self.report(state)
    }

    /// Summarize a finished run from the repository
    fn report(&self, state: WorkflowState) -> Result<RunReport, PipelineError> {
        let repo = &self.inner.repository;
        let document = state.document.name;
        let stats = repo
            .get_stats(Some(&document))
            .map_err(PipelineError::storage)?;
        let chunk_stats = repo
            .chunk_stats(Some(&document))
            .map_err(PipelineError::storage)?;

        let outcome = if state.cancelled {
            RunOutcome::Cancelled
        } else {
            RunOutcome::Completed
        };

        info!(
            outcome = %outcome,
            verified = stats.verified,
            rejected = stats.rejected,
            pending = stats.pending,
            chunk_failures = state.chunk_failures.len(),
            fact_failures = state.fact_failures.len(),
            "Document run finished"
        );

        Ok(RunReport {
            run_id: state.run_id,
            document,
            outcome,
            final_stage: state.stage,
            counters: state.counters,
            chunk_failures: state.chunk_failures,
            fact_failures: state.fact_failures,
            facts: state.facts,
            stats,
            chunk_stats,
        })
    }
}
