//! Extraction and verification collaborators
//!
//! The pipeline reaches language models only through the two traits here.
//! Calls are blocking; the stages run them on the blocking pool, bounded
//! by a timeout and raced against the run's cancellation token.

use crate::cancel::CancellationToken;
use crate::error::CollaboratorError;
use crate::parser::{parse_statements, parse_verdict};
use crate::prompt::{ExtractionPrompt, VerificationPrompt, STATEMENTS_SCHEMA, VERDICT_SCHEMA};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use veracity_domain::traits::LlmProvider;
use veracity_domain::{DocumentContext, Verdict};

/// Proposes candidate statements for one chunk
pub trait ExtractionCollaborator: Send + Sync {
    /// Return zero or more statements found in `content`
    fn extract_statements(
        &self,
        content: &str,
        context: &DocumentContext,
    ) -> Result<Vec<String>, CollaboratorError>;
}

/// Judges whether a statement is supported by its source chunk
pub trait VerificationCollaborator: Send + Sync {
    /// Accept or reject `statement` against `source`
    fn verify_statement(&self, statement: &str, source: &str)
        -> Result<Verdict, CollaboratorError>;
}

impl<F> ExtractionCollaborator for F
where
    F: Fn(&str, &DocumentContext) -> Result<Vec<String>, CollaboratorError> + Send + Sync,
{
    fn extract_statements(
        &self,
        content: &str,
        context: &DocumentContext,
    ) -> Result<Vec<String>, CollaboratorError> {
        self(content, context)
    }
}

impl<F> VerificationCollaborator for F
where
    F: Fn(&str, &str) -> Result<Verdict, CollaboratorError> + Send + Sync,
{
    fn verify_statement(&self, statement: &str, source: &str) -> Result<Verdict, CollaboratorError> {
        self(statement, source)
    }
}

/// Pin a closure to the extraction signature
pub fn extraction_fn<F>(f: F) -> F
where
    F: Fn(&str, &DocumentContext) -> Result<Vec<String>, CollaboratorError> + Send + Sync,
{
    f
}

/// Pin a closure to the verification signature
pub fn verification_fn<F>(f: F) -> F
where
    F: Fn(&str, &str) -> Result<Verdict, CollaboratorError> + Send + Sync,
{
    f
}

/// Run a blocking collaborator call with a timeout, racing cancellation
///
/// A timed-out call keeps its blocking thread until it returns; its result
/// is discarded.
pub(crate) async fn call_blocking<T, F>(
    call: F,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<T, CollaboratorError>
where
    F: FnOnce() -> Result<T, CollaboratorError> + Send + 'static,
    T: Send + 'static,
{
    if cancel.is_cancelled() {
        return Err(CollaboratorError::Cancelled);
    }

    let handle = tokio::task::spawn_blocking(call);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CollaboratorError::Cancelled),
        outcome = tokio::time::timeout(timeout, handle) => match outcome {
            Err(_) => Err(CollaboratorError::Timeout(timeout)),
            Ok(Err(join_error)) => Err(CollaboratorError::Call(format!(
                "collaborator task failed: {}",
                join_error
            ))),
            Ok(Ok(result)) => result,
        },
    }
}

/// Extraction collaborator backed by an LLM provider
pub struct LlmExtractor<L> {
    provider: Arc<L>,
}

impl<L> LlmExtractor<L> {
    /// Wrap a shared provider
    pub fn new(provider: Arc<L>) -> Self {
        Self { provider }
    }
}

impl<L> ExtractionCollaborator for LlmExtractor<L>
where
    L: LlmProvider,
    L::Error: Display,
{
    fn extract_statements(
        &self,
        content: &str,
        context: &DocumentContext,
    ) -> Result<Vec<String>, CollaboratorError> {
        let prompt = ExtractionPrompt::new(content, context).build();
        debug!("Extraction prompt length: {} chars", prompt.len());

        let response = self
            .provider
            .generate_structured(&prompt, STATEMENTS_SCHEMA)
            .map_err(|e| CollaboratorError::Call(e.to_string()))?;
        debug!("Extraction response length: {} chars", response.len());

        parse_statements(&response)
    }
}

/// Verification collaborator backed by an LLM provider
pub struct LlmVerifier<L> {
    provider: Arc<L>,
}

impl<L> LlmVerifier<L> {
    /// Wrap a shared provider
    pub fn new(provider: Arc<L>) -> Self {
        Self { provider }
    }
}

impl<L> VerificationCollaborator for LlmVerifier<L>
where
    L: LlmProvider,
    L::Error: Display,
{
    fn verify_statement(&self, statement: &str, source: &str) -> Result<Verdict, CollaboratorError> {
        let prompt = VerificationPrompt::new(statement, source).build();

        let response = self
            .provider
            .generate_structured(&prompt, VERDICT_SCHEMA)
            .map_err(|e| CollaboratorError::Call(e.to_string()))?;

        parse_verdict(&response)
    }
}
