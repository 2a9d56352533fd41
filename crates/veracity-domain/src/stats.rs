//! Aggregate counts read back from the repository

/// Fact counts: `total == verified + rejected + pending`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FactStats {
    /// All known statements
    pub total: usize,

    /// Rows in the verified store
    pub verified: usize,

    /// Rows in the rejected store
    pub rejected: usize,

    /// Staged candidates still awaiting a verdict
    pub pending: usize,
}

impl FactStats {
    /// Build stats from the three stored counts
    pub fn new(verified: usize, rejected: usize, pending: usize) -> Self {
        Self {
            total: verified + rejected + pending,
            verified,
            rejected,
            pending,
        }
    }
}

/// Chunk counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkStats {
    /// All chunk rows
    pub total: usize,

    /// Waiting for extraction
    pub pending: usize,

    /// Left mid-extraction
    pub processing: usize,

    /// Extracted
    pub processed: usize,

    /// Failed extraction
    pub failed: usize,
}

impl ChunkStats {
    /// Chunks still needing extraction on the next run
    pub fn remaining(&self) -> usize {
        self.pending + self.processing + self.failed
    }
}
