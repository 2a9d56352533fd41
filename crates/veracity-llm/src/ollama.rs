//! Ollama Provider Implementation
//!
//! Talks to a local Ollama instance over its `/api/generate` endpoint.
//!
//! # Features
//!
//! - Async HTTP communication with the Ollama API
//! - Configurable endpoint, model and request timeout
//! - Retry logic with exponential backoff
//! - JSON mode for structured generation
//!
//! # Examples
//!
//! ```no_run
//! use veracity_llm::OllamaProvider;
//!
//! let provider = OllamaProvider::new("http://localhost:11434", "llama3")
//!     .with_max_retries(2);
//! ```

use crate::LlmError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};
use veracity_domain::traits::LlmProvider as LlmProviderTrait;

/// Default Ollama API endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Default timeout for a single HTTP request (120 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default number of attempts per generation
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Ollama API provider for local LLM inference
pub struct OllamaProvider {
    endpoint: String,
    model: String,
    client: reqwest::Client,
    request_timeout: Duration,
    max_retries: u32,
}

#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

/// Pause before retry number `attempt` (1s, 2s, 4s, etc.)
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt.saturating_sub(1)))
}

/// Total pause spent between `attempts` attempts
fn total_backoff(attempts: u32) -> Duration {
    (1..attempts)
        .map(backoff_delay)
        .fold(Duration::ZERO, Duration::saturating_add)
}

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

impl OllamaProvider {
    /// Create a new Ollama provider
    ///
    /// # Parameters
    ///
    /// - `endpoint`: Ollama API endpoint (e.g., "http://localhost:11434")
    /// - `model`: Model to use (e.g., "llama3", "mistral")
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client: build_client(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Create a provider against `http://localhost:11434`
    pub fn default_endpoint(model: impl Into<String>) -> Self {
        Self::new(DEFAULT_ENDPOINT, model)
    }

    /// Set the maximum number of attempts (at least one is always made)
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Set the per-request HTTP timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self.request_timeout = timeout;
        self
    }

    /// Fit every attempt and the backoff between them inside `budget`
    ///
    /// Attempts whose backoff alone would exhaust the budget are dropped,
    /// then the remaining time is split evenly into per-request timeouts.
    /// Call after [`with_max_retries`](Self::with_max_retries).
    pub fn within_budget(mut self, budget: Duration) -> Self {
        let mut attempts = self.max_retries;
        while attempts > 1 && total_backoff(attempts) >= budget {
            attempts -= 1;
        }
        let per_request = budget.saturating_sub(total_backoff(attempts)) / attempts;

        debug!(
            attempts,
            per_request_ms = per_request.as_millis() as u64,
            "Fitted retries into time budget"
        );
        self.max_retries = attempts;
        self.with_request_timeout(per_request)
    }

    /// Model name requests are sent with
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Maximum number of attempts per generation
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Timeout applied to each HTTP request
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Generate text using the Ollama API
    ///
    /// # Errors
    ///
    /// - `ModelNotAvailable` when Ollama answers 404 for the model
    /// - `RateLimitExceeded` when every attempt was throttled
    /// - `Communication` when Ollama is unreachable or keeps failing
    /// - `InvalidResponse` when the body is not a generate response
    pub async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.send(prompt, None).await
    }

    /// Generate with Ollama's JSON mode enabled
    pub async fn generate_json(&self, prompt: &str) -> Result<String, LlmError> {
        self.send(prompt, Some("json")).await
    }

    async fn send(&self, prompt: &str, format: Option<&str>) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.endpoint);
        let request_body = OllamaGenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            format,
        };

        let mut attempts = 0;
        let mut last_error = None;

        while attempts < self.max_retries {
            debug!(model = %self.model, attempt = attempts + 1, "Sending generate request");

            match self.client.post(&url).json(&request_body).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<OllamaGenerateResponse>()
                            .await
                            .map(|body| body.response)
                            .map_err(|e| {
                                LlmError::InvalidResponse(format!("Failed to parse response: {}", e))
                            });
                    } else if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(LlmError::ModelNotAvailable(self.model.clone()));
                    } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(LlmError::RateLimitExceeded);
                    } else {
                        let error_text = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "Unknown error".to_string());
                        last_error = Some(LlmError::Communication(format!(
                            "HTTP {}: {}",
                            status, error_text
                        )));
                    }
                }
                Err(e) => {
                    last_error = Some(LlmError::Communication(format!("Request failed: {}", e)));
                }
            }

            attempts += 1;
            if attempts < self.max_retries {
                let delay = backoff_delay(attempts);
                warn!(attempt = attempts, delay_secs = delay.as_secs(), "Retrying generate request");
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error
            .unwrap_or_else(|| LlmError::Communication("Max retries exceeded".to_string())))
    }
}

/// Drive a future to completion from synchronous code
///
/// Inside a runtime this must be called from a blocking thread
/// (`spawn_blocking`), which is how the pipeline invokes providers.
fn block_on<F>(future: F) -> Result<String, LlmError>
where
    F: Future<Output = Result<String, LlmError>>,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => handle.block_on(future),
        Err(_) => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| LlmError::Other(format!("Failed to start runtime: {}", e)))?
            .block_on(future),
    }
}

impl LlmProviderTrait for OllamaProvider {
    type Error = LlmError;

    fn generate(&self, prompt: &str) -> Result<String, Self::Error> {
        block_on(OllamaProvider::generate(self, prompt))
    }

    fn generate_structured(&self, prompt: &str, _schema: &str) -> Result<String, Self::Error> {
        block_on(self.generate_json(prompt))
    }
}
