//! Veracity LLM Provider Layer
//!
//! Pluggable implementations of the `LlmProvider` trait from `veracity-domain`.
//! The extraction and verification collaborators in `veracity-pipeline` are
//! built on top of any provider from this crate.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic mock for testing, with scripted failures and latency
//! - `OllamaProvider`: Local Ollama API integration
//!
//! # Examples
//!
//! ```
//! use veracity_llm::MockProvider;
//! use veracity_domain::traits::LlmProvider;
//!
//! let provider = MockProvider::new("[]");
//! let result = provider.generate("extract facts").unwrap();
//! assert_eq!(result, "[]");
//! ```

#![warn(missing_docs)]

pub mod ollama;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use veracity_domain::traits::LlmProvider as LlmProviderTrait;

pub use ollama::OllamaProvider;

/// Errors that can occur during LLM operations
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from LLM
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Failure(String),
}

#[derive(Debug, Default)]
struct MockState {
    rules: Vec<(String, Reply)>,
    prompts: Vec<String>,
}

/// Mock LLM provider for deterministic testing
///
/// Replies are chosen by the first registered pattern contained in the
/// prompt, falling back to the default response. No network calls are made.
///
/// # Examples
///
/// ```
/// use veracity_llm::MockProvider;
/// use veracity_domain::traits::LlmProvider;
///
/// let provider = MockProvider::new(r#"["default"]"#)
///     .with_response("tides", r#"["The moon drives the tides."]"#)
///     .with_error("corrupted");
///
/// assert_eq!(provider.generate("text about tides").unwrap(), r#"["The moon drives the tides."]"#);
/// assert!(provider.generate("a corrupted chunk").is_err());
/// assert_eq!(provider.generate("anything else").unwrap(), r#"["default"]"#);
/// assert_eq!(provider.call_count(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    default_response: String,
    delay: Option<Duration>,
    state: Arc<Mutex<MockState>>,
}

impl MockProvider {
    /// Create a new MockProvider with a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            delay: None,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Reply with `response` to prompts containing `pattern`
    pub fn with_response(self, pattern: impl Into<String>, response: impl Into<String>) -> Self {
        self.add_response(pattern, response);
        self
    }

    /// Fail every prompt containing `pattern`
    pub fn with_error(self, pattern: impl Into<String>) -> Self {
        self.add_error(pattern);
        self
    }

    /// Sleep for `delay` before every reply, to exercise timeouts
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Add a reply rule; earlier rules take precedence
    pub fn add_response(&self, pattern: impl Into<String>, response: impl Into<String>) {
        self.state()
            .rules
            .push((pattern.into(), Reply::Text(response.into())));
    }

    /// Add a failure rule; earlier rules take precedence
    pub fn add_error(&self, pattern: impl Into<String>) {
        let pattern = pattern.into();
        let message = format!("Mock failure for pattern '{}'", pattern);
        self.state().rules.push((pattern, Reply::Failure(message)));
    }

    /// Drop every rule so only the default response is used
    pub fn clear_rules(&self) {
        self.state().rules.clear();
    }

    /// Get the number of times generate was called
    pub fn call_count(&self) -> usize {
        self.state().prompts.len()
    }

    /// Every prompt received so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.state().prompts.clone()
    }

    /// Reset the call count
    pub fn reset_call_count(&self) {
        self.state().prompts.clear();
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not wedge the other callers
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("Default mock response")
    }
}

impl LlmProviderTrait for MockProvider {
    type Error = LlmError;

    fn generate(&self, prompt: &str) -> Result<String, Self::Error> {
        let reply = {
            let mut state = self.state();
            state.prompts.push(prompt.to_string());
            state
                .rules
                .iter()
                .find(|(pattern, _)| prompt.contains(pattern.as_str()))
                .map(|(_, reply)| reply.clone())
        };

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Failure(message)) => Err(LlmError::Other(message)),
            None => Ok(self.default_response.clone()),
        }
    }

    fn generate_structured(&self, prompt: &str, _schema: &str) -> Result<String, Self::Error> {
        self.generate(prompt)
    }
}
