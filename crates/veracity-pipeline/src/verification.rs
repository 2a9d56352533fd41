//! Verification stage: staged candidates in, append-only facts out

use crate::cancel::CancellationToken;
use crate::collaborator::{call_blocking, VerificationCollaborator};
use crate::error::{CollaboratorError, PipelineError};
use crate::stage::{PipelineStage, WorkflowStage, WorkflowState};
use crate::types::FactFailure;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use veracity_domain::traits::FactRepository;
use veracity_domain::{current_timestamp, CandidateFact, Fact};

/// Result of verifying one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// The collaborator was asked and the outcome appended
    Recorded(Fact),
    /// A fact with the same dedup key already existed; nothing was called
    AlreadyRecorded(Fact),
}

impl Verification {
    /// The stored fact
    pub fn fact(&self) -> &Fact {
        match self {
            Verification::Recorded(fact) | Verification::AlreadyRecorded(fact) => fact,
        }
    }
}

/// Runs the verification collaborator over staged candidates
pub struct VerificationStage<R, V> {
    repository: Arc<R>,
    verifier: Arc<V>,
    timeout: Duration,
}

impl<R, V> Clone for VerificationStage<R, V> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            verifier: Arc::clone(&self.verifier),
            timeout: self.timeout,
        }
    }
}

impl<R, V> VerificationStage<R, V>
where
    R: FactRepository,
    R::Error: Display,
    V: VerificationCollaborator + 'static,
{
    /// Create a verification stage
    pub fn new(repository: Arc<R>, verifier: Arc<V>, timeout: Duration) -> Self {
        Self {
            repository,
            verifier,
            timeout,
        }
    }

    /// Verify one candidate against its source chunk content
    ///
    /// Skips the collaborator when the dedup key is already recorded in
    /// either store. A collaborator failure leaves the candidate staged for
    /// the next run.
    pub async fn verify(
        &self,
        candidate: &CandidateFact,
        source: &str,
        cancel: &CancellationToken,
    ) -> Result<Verification, PipelineError> {
        let repo = &self.repository;
        let key = candidate.key();

        if let Some(existing) = repo.find_fact(&key).map_err(PipelineError::storage)? {
            debug!(source_chunk = candidate.source_chunk, "Fact already recorded");
            return Ok(Verification::AlreadyRecorded(existing));
        }

        let verifier = Arc::clone(&self.verifier);
        let statement = candidate.statement.clone();
        let source = source.to_string();
        let verdict = call_blocking(
            move || verifier.verify_statement(&statement, &source),
            self.timeout,
            cancel,
        )
        .await
        .map_err(|e| match e {
            CollaboratorError::Cancelled => PipelineError::Cancelled,
            e => PipelineError::Collaborator(e),
        })?;

        let fact = Fact::from_verdict(candidate, verdict, current_timestamp());
        if repo.append_fact(&fact).map_err(PipelineError::storage)? {
            debug!(
                source_chunk = fact.source_chunk,
                status = %fact.verification_status,
                "Fact recorded"
            );
            return Ok(Verification::Recorded(fact));
        }

        // Lost a race with a concurrent run; report the winner
        let existing = repo.find_fact(&key).map_err(PipelineError::storage)?;
        Ok(Verification::AlreadyRecorded(existing.unwrap_or(fact)))
    }
}

impl<R, V> PipelineStage for VerificationStage<R, V>
where
    R: FactRepository,
    R::Error: Display,
    V: VerificationCollaborator + 'static,
{
    fn stage(&self) -> WorkflowStage {
        WorkflowStage::Verifying
    }

    async fn run(
        &self,
        mut state: WorkflowState,
        cancel: &CancellationToken,
    ) -> Result<WorkflowState, PipelineError> {
        // The ledger also holds candidates left over from earlier runs
        state.candidates = self
            .repository
            .pending_candidates(Some(state.document_name()))
            .map_err(PipelineError::storage)?;
        info!(candidates = state.candidates.len(), "Verifying candidates");

        while state.cursor < state.candidates.len() {
            if cancel.is_cancelled() {
                state.cancelled = true;
                return Ok(state);
            }

            let candidate = state.candidates[state.cursor].clone();
            let source = state
                .chunk_content(candidate.source_chunk)
                .map(str::to_string)
                .ok_or_else(|| {
                    PipelineError::Storage(format!(
                        "chunk {} of '{}' missing for staged candidate",
                        candidate.source_chunk, candidate.document_name
                    ))
                })?;

            match self.verify(&candidate, &source, cancel).await {
                Ok(Verification::Recorded(fact)) => {
                    state.counters.verification_calls += 1;
                    if fact.is_rejected() {
                        state.counters.facts_rejected += 1;
                    } else {
                        state.counters.facts_verified += 1;
                    }
                    state.facts.push(fact);
                }
                Ok(Verification::AlreadyRecorded(_)) => {}
                Err(PipelineError::Collaborator(error)) => {
                    state.counters.verification_calls += 1;
                    warn!(
                        source_chunk = candidate.source_chunk,
                        error = %error,
                        "Verification failed, candidate left pending"
                    );
                    state.fact_failures.push(FactFailure {
                        source_chunk: candidate.source_chunk,
                        statement: candidate.statement,
                        error,
                    });
                }
                Err(PipelineError::Cancelled) => {
                    state.cancelled = true;
                    return Ok(state);
                }
                Err(e) => return Err(e),
            }
            state.cursor += 1;
        }

        info!(
            verified = state.counters.facts_verified,
            rejected = state.counters.facts_rejected,
            failures = state.fact_failures.len(),
            "Verification complete"
        );
        state.advance(WorkflowStage::Done);
        Ok(state)
    }
}
