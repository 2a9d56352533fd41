//! Candidate and verified facts

use std::fmt;

/// Outcome of verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationStatus {
    /// Supported by the source
    Verified,

    /// Not supported by the source
    Rejected,
}

impl VerificationStatus {
    /// Get the status name as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Verified => "verified",
            VerificationStatus::Rejected => "rejected",
        }
    }

    /// Parse a status from its stored name
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "verified" => Some(VerificationStatus::Verified),
            "rejected" => Some(VerificationStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dedup key shared by candidates and facts
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactKey {
    /// Owning document
    pub document_name: String,

    /// Originating chunk index
    pub source_chunk: u32,

    /// Statement text
    pub statement: String,
}

/// A statement proposed by extraction, not yet verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFact {
    /// Owning document
    pub document_name: String,

    /// Originating chunk index
    pub source_chunk: u32,

    /// Statement text
    pub statement: String,
}

impl CandidateFact {
    /// Create a new candidate
    pub fn new(
        document_name: impl Into<String>,
        source_chunk: u32,
        statement: impl Into<String>,
    ) -> Self {
        Self {
            document_name: document_name.into(),
            source_chunk,
            statement: statement.into(),
        }
    }

    /// Dedup key of this candidate
    pub fn key(&self) -> FactKey {
        FactKey {
            document_name: self.document_name.clone(),
            source_chunk: self.source_chunk,
            statement: self.statement.clone(),
        }
    }
}

/// Decision returned by a verification collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Whether the statement is supported
    pub accepted: bool,

    /// Explanation, expected on rejection
    pub reason: Option<String>,
}

impl Verdict {
    /// An accepting verdict
    pub fn accept() -> Self {
        Self {
            accepted: true,
            reason: None,
        }
    }

    /// A rejecting verdict with a reason
    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: Some(reason.into()),
        }
    }
}

/// A durable verification outcome
///
/// Facts are append-only. Verified and rejected facts live in separate
/// stores but share this shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fact {
    /// Owning document
    pub document_name: String,

    /// Statement text
    pub statement: String,

    /// Originating chunk index
    pub source_chunk: u32,

    /// Outcome
    pub verification_status: VerificationStatus,

    /// Reason recorded on rejection
    pub verification_reason: Option<String>,

    /// When the outcome was recorded (seconds since epoch)
    pub timestamp: u64,
}

impl Fact {
    /// Build the fact recording `verdict` for `candidate`
    pub fn from_verdict(candidate: &CandidateFact, verdict: Verdict, timestamp: u64) -> Self {
        let verification_status = if verdict.accepted {
            VerificationStatus::Verified
        } else {
            VerificationStatus::Rejected
        };

        Self {
            document_name: candidate.document_name.clone(),
            statement: candidate.statement.clone(),
            source_chunk: candidate.source_chunk,
            verification_status,
            verification_reason: verdict.reason,
            timestamp,
        }
    }

    /// Whether this fact belongs in the rejected store
    pub fn is_rejected(&self) -> bool {
        self.verification_status == VerificationStatus::Rejected
    }

    /// Dedup key of this fact
    pub fn key(&self) -> FactKey {
        FactKey {
            document_name: self.document_name.clone(),
            source_chunk: self.source_chunk,
            statement: self.statement.clone(),
        }
    }
}
