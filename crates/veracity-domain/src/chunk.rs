//! Chunk module - the unit of extraction work

use std::fmt;

/// Processing status of a chunk
///
/// ```text
/// pending → processing → processed
///                      ↘ failed → (next run) processing …
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkStatus {
    /// Registered by chunking, not yet picked up
    Pending,

    /// Extraction in flight
    Processing,

    /// Extraction succeeded; never reprocessed
    Processed,

    /// Extraction failed; eligible for retry on the next run
    Failed,
}

impl ChunkStatus {
    /// Get the status name as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStatus::Pending => "pending",
            ChunkStatus::Processing => "processing",
            ChunkStatus::Processed => "processed",
            ChunkStatus::Failed => "failed",
        }
    }

    /// Parse a status from its stored name
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(ChunkStatus::Pending),
            "processing" => Some(ChunkStatus::Processing),
            "processed" => Some(ChunkStatus::Processed),
            "failed" => Some(ChunkStatus::Failed),
            _ => None,
        }
    }

    /// Whether extraction still has to run for a chunk in this status
    ///
    /// `Processing` counts as unfinished: a chunk only stays there when the
    /// process died mid-call.
    pub fn needs_extraction(&self) -> bool {
        !matches!(self, ChunkStatus::Processed)
    }
}

impl fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChunkStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid chunk status: {}", s))
    }
}

/// One contiguous, possibly overlapping segment of a document
///
/// `(document_name, chunk_index)` is unique across the chunk store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Owning document
    pub document_name: String,

    /// Ordinal position, starting at 0, stable across reruns
    pub chunk_index: u32,

    /// Segment text
    pub content: String,

    /// Processing status
    pub status: ChunkStatus,

    /// Whether extraction produced at least one candidate
    pub contains_facts: bool,

    /// Last failure, if the chunk is `Failed`
    pub error_message: Option<String>,

    /// Time of the last status change (seconds since epoch)
    pub timestamp: u64,
}

impl Chunk {
    /// Create a new chunk in `Pending`
    pub fn new(
        document_name: impl Into<String>,
        chunk_index: u32,
        content: impl Into<String>,
        timestamp: u64,
    ) -> Self {
        Self {
            document_name: document_name.into(),
            chunk_index,
            content: content.into(),
            status: ChunkStatus::Pending,
            contains_facts: false,
            error_message: None,
            timestamp,
        }
    }

    /// Copy of this chunk moved to `Processing`
    pub fn processing(&self, timestamp: u64) -> Self {
        Self {
            status: ChunkStatus::Processing,
            error_message: None,
            timestamp,
            ..self.clone()
        }
    }

    /// Copy of this chunk moved to `Processed`
    pub fn processed(&self, contains_facts: bool, timestamp: u64) -> Self {
        Self {
            status: ChunkStatus::Processed,
            contains_facts,
            error_message: None,
            timestamp,
            ..self.clone()
        }
    }

    /// Copy of this chunk moved to `Failed` with the error captured
    pub fn failed(&self, error_message: impl Into<String>, timestamp: u64) -> Self {
        Self {
            status: ChunkStatus::Failed,
            error_message: Some(error_message.into()),
            timestamp,
            ..self.clone()
        }
    }

    /// Copy of this chunk returned to `Pending` (used when a run is cancelled mid-call)
    pub fn reset(&self, timestamp: u64) -> Self {
        Self {
            status: ChunkStatus::Pending,
            error_message: None,
            timestamp,
            ..self.clone()
        }
    }
}
