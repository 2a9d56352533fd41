//! Configuration for the pipeline

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Unit used to measure chunk size and overlap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChunkUnit {
    /// Whitespace-separated words
    #[default]
    Words,
    /// Unicode scalar values
    Characters,
}

/// Configuration for a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Target chunk size, in `chunk_unit`s
    pub chunk_size: usize,

    /// Units shared between consecutive chunks
    pub chunk_overlap: usize,

    /// How chunk size is measured
    pub chunk_unit: ChunkUnit,

    /// Maximum time for a single collaborator call (seconds)
    pub collaborator_timeout_secs: u64,

    /// Extraction calls in flight per document
    pub max_concurrent_chunks: usize,

    /// Documents processed at once by `run_documents`
    pub max_concurrent_documents: usize,

    /// Re-split documents that already have chunk records
    pub force_rechunk: bool,

    /// Candidates kept per chunk after cleanup
    pub max_candidates_per_chunk: usize,
}

impl PipelineConfig {
    /// Get the collaborator timeout as a Duration
    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.collaborator_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than 0".to_string());
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err("chunk_overlap must be smaller than chunk_size".to_string());
        }
        if self.collaborator_timeout_secs == 0 {
            return Err("collaborator_timeout_secs must be greater than 0".to_string());
        }
        if self.max_concurrent_chunks == 0 {
            return Err("max_concurrent_chunks must be greater than 0".to_string());
        }
        if self.max_concurrent_documents == 0 {
            return Err("max_concurrent_documents must be greater than 0".to_string());
        }
        if self.max_candidates_per_chunk == 0 {
            return Err("max_candidates_per_chunk must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 750,
            chunk_overlap: 50,
            chunk_unit: ChunkUnit::Words,
            collaborator_timeout_secs: 120,
            max_concurrent_chunks: 4,
            max_concurrent_documents: 2,
            force_rechunk: false,
            max_candidates_per_chunk: 64,
        }
    }
}
