//! Extraction stage: chunk content in, staged candidate facts out

use crate::cancel::CancellationToken;
use crate::collaborator::{call_blocking, ExtractionCollaborator};
use crate::error::{CollaboratorError, PipelineError};
use crate::stage::{PipelineStage, WorkflowStage, WorkflowState};
use crate::types::ChunkFailure;
use std::collections::HashSet;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use veracity_domain::traits::FactRepository;
use veracity_domain::{current_timestamp, CandidateFact, Chunk, DocumentContext};

/// Runs the extraction collaborator over chunks
///
/// Chunk transitions are written as they happen: `processing` before the
/// call, then `processed` or `failed`. A cancelled call puts the chunk back
/// to `pending`.
pub struct ExtractionStage<R, E> {
    repository: Arc<R>,
    extractor: Arc<E>,
    timeout: Duration,
    max_candidates: usize,
    max_concurrent: usize,
}

impl<R, E> Clone for ExtractionStage<R, E> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            extractor: Arc::clone(&self.extractor),
            timeout: self.timeout,
            max_candidates: self.max_candidates,
            max_concurrent: self.max_concurrent,
        }
    }
}

impl<R, E> ExtractionStage<R, E>
where
    R: FactRepository + 'static,
    R::Error: Display,
    E: ExtractionCollaborator + 'static,
{
    /// Create an extraction stage
    pub fn new(
        repository: Arc<R>,
        extractor: Arc<E>,
        timeout: Duration,
        max_candidates: usize,
        max_concurrent: usize,
    ) -> Self {
        Self {
            repository,
            extractor,
            timeout,
            max_candidates,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Extract candidates from one chunk
    ///
    /// On success the candidates are staged and the chunk is marked
    /// `processed`, with `contains_facts` telling whether any survived
    /// cleanup. A collaborator failure marks the chunk `failed` and is
    /// returned as `PipelineError::Collaborator`.
    pub async fn extract(
        &self,
        chunk: &Chunk,
        context: &DocumentContext,
        cancel: &CancellationToken,
    ) -> Result<Vec<CandidateFact>, PipelineError> {
        let repo = &self.repository;
        let processing = chunk.processing(current_timestamp());
        repo.upsert_chunk(&processing).map_err(PipelineError::storage)?;

        let extractor = Arc::clone(&self.extractor);
        let content = chunk.content.clone();
        let context = context.clone();
        let result = call_blocking(
            move || extractor.extract_statements(&content, &context),
            self.timeout,
            cancel,
        )
        .await;

        let statements = match result {
            Ok(statements) => statements,
            Err(CollaboratorError::Cancelled) => {
                repo.upsert_chunk(&processing.reset(current_timestamp()))
                    .map_err(PipelineError::storage)?;
                debug!(chunk_index = chunk.chunk_index, "Extraction cancelled, chunk reset");
                return Err(PipelineError::Cancelled);
            }
            Err(e) => {
                warn!(chunk_index = chunk.chunk_index, error = %e, "Extraction failed");
                repo.upsert_chunk(&processing.failed(e.to_string(), current_timestamp()))
                    .map_err(PipelineError::storage)?;
                return Err(PipelineError::Collaborator(e));
            }
        };

        let candidates: Vec<CandidateFact> = clean_statements(statements, self.max_candidates)
            .into_iter()
            .map(|statement| {
                CandidateFact::new(chunk.document_name.clone(), chunk.chunk_index, statement)
            })
            .collect();

        // Stage before marking processed so a crash in between re-extracts
        // rather than losing candidates
        for candidate in &candidates {
            repo.stage_candidate(candidate)
                .map_err(PipelineError::storage)?;
        }
        repo.upsert_chunk(&processing.processed(!candidates.is_empty(), current_timestamp()))
            .map_err(PipelineError::storage)?;

        debug!(
            chunk_index = chunk.chunk_index,
            candidates = candidates.len(),
            "Chunk extracted"
        );
        Ok(candidates)
    }
}

impl<R, E> PipelineStage for ExtractionStage<R, E>
where
    R: FactRepository + 'static,
    R::Error: Display,
    E: ExtractionCollaborator + 'static,
{
    fn stage(&self) -> WorkflowStage {
        WorkflowStage::Extracting
    }

    async fn run(
        &self,
        mut state: WorkflowState,
        cancel: &CancellationToken,
    ) -> Result<WorkflowState, PipelineError> {
        let context = state.context();
        let pending: Vec<Chunk> = state
            .chunks
            .iter()
            .filter(|c| c.status.needs_extraction())
            .cloned()
            .collect();
        state.counters.chunks_skipped = state.chunks.len() - pending.len();

        info!(
            remaining = pending.len(),
            skipped = state.counters.chunks_skipped,
            "Extracting chunks"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut join_set = JoinSet::new();

        for (slot, chunk) in pending.iter().cloned().enumerate() {
            let stage = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let context = context.clone();
            let cancel = cancel.clone();

            join_set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (slot, false, Err(PipelineError::Task("semaphore closed".to_string())));
                };
                if cancel.is_cancelled() {
                    return (slot, false, Err(PipelineError::Cancelled));
                }
                let result = stage.extract(&chunk, &context, &cancel).await;
                (slot, true, result)
            });
        }

        let mut results: Vec<Option<Result<Vec<CandidateFact>, PipelineError>>> =
            (0..pending.len()).map(|_| None).collect();
        let mut fatal = None;

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((slot, called, result)) => {
                    if called {
                        state.counters.extraction_calls += 1;
                    }
                    results[slot] = Some(result);
                }
                Err(e) => {
                    fatal.get_or_insert(PipelineError::from(e));
                }
            }
        }

        // Apply outcomes in chunk order
        for (chunk, result) in pending.iter().zip(results) {
            state.cursor += 1;
            match result {
                Some(Ok(candidates)) => {
                    state.counters.candidates_extracted += candidates.len();
                    state.candidates.extend(candidates);
                }
                Some(Err(PipelineError::Collaborator(error))) => {
                    state.chunk_failures.push(ChunkFailure {
                        chunk_index: chunk.chunk_index,
                        error,
                    });
                }
                Some(Err(PipelineError::Cancelled)) => state.cancelled = true,
                Some(Err(e)) => {
                    fatal.get_or_insert(e);
                }
                None => {}
            }
        }

        if let Some(e) = fatal {
            return Err(e);
        }

        // Reload so the state mirrors what was written
        state.chunks = self
            .repository
            .list_chunks(Some(state.document_name()))
            .map_err(PipelineError::storage)?;

        if !state.cancelled {
            info!(
                candidates = state.counters.candidates_extracted,
                failures = state.chunk_failures.len(),
                "Extraction complete"
            );
            state.advance(WorkflowStage::Verifying);
        }
        Ok(state)
    }
}

/// Trim, drop empties, collapse duplicates (first wins) and cap the count
pub fn clean_statements(statements: Vec<String>, max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut cleaned = Vec::new();
    for statement in statements {
        let statement = statement.trim();
        if statement.is_empty() || !seen.insert(statement.to_string()) {
            continue;
        }
        cleaned.push(statement.to_string());
        if cleaned.len() == max {
            break;
        }
    }
    cleaned
}
