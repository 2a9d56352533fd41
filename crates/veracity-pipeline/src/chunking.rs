//! Overlapping text chunking
//!
//! Text is measured in units (words or characters). Each chunk holds about
//! `chunk_size` units and starts `overlap` units before the previous one
//! ended. Within the back half of the size window the cut is placed at the
//! strongest separator available: paragraph, then line, then sentence, then
//! plain whitespace. Only when none exists is a unit run cut mid-way.
//!
//! Chunks are exact byte spans of the input: the first starts at 0, the last
//! ends at `text.len()`, and consecutive spans overlap, so no byte is lost.

use crate::cancel::CancellationToken;
use crate::config::{ChunkUnit, PipelineConfig};
use crate::error::PipelineError;
use crate::stage::{PipelineStage, WorkflowStage, WorkflowState};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, info};
use veracity_domain::traits::FactRepository;
use veracity_domain::{current_timestamp, Chunk};

/// Byte range of one chunk within the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Inclusive start offset
    pub start: usize,
    /// Exclusive end offset
    pub end: usize,
}

/// Strength of the separator preceding a candidate cut, weakest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Boundary {
    Forced,
    Whitespace,
    Sentence,
    Line,
    Paragraph,
}

/// Splits text into overlapping chunks
#[derive(Debug, Clone)]
pub struct TextChunker {
    unit: ChunkUnit,
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a new text chunker
    ///
    /// A zero size is raised to 1 and the overlap is capped below the size.
    pub fn new(unit: ChunkUnit, chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            unit,
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
        }
    }

    /// Build a chunker from pipeline settings
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.chunk_unit, config.chunk_size, config.chunk_overlap)
    }

    /// Compute chunk spans; blank text yields none
    pub fn split(&self, text: &str) -> Vec<Span> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let starts = self.unit_starts(text);
        let units = starts.len();
        let boundary = |i: usize| -> usize {
            if i == 0 {
                0
            } else if i >= units {
                text.len()
            } else {
                starts[i]
            }
        };

        let mut spans = Vec::new();
        let mut start = 0;
        loop {
            if units - start <= self.chunk_size {
                spans.push(Span {
                    start: boundary(start),
                    end: text.len(),
                });
                break;
            }

            let hi = start + self.chunk_size;
            let lo = (start + self.chunk_size / 2)
                .max(start + self.overlap + 1)
                .min(hi);
            let end = self.best_cut(text, &starts, lo, hi);

            spans.push(Span {
                start: boundary(start),
                end: boundary(end),
            });
            start = (end - self.overlap).max(start + 1);
        }

        spans
    }

    /// Chunk the given text
    pub fn chunk(&self, text: &str) -> Vec<String> {
        self.split(text)
            .into_iter()
            .map(|span| text[span.start..span.end].to_string())
            .collect()
    }

    /// Byte offset of the first character of every unit
    fn unit_starts(&self, text: &str) -> Vec<usize> {
        match self.unit {
            ChunkUnit::Characters => text.char_indices().map(|(i, _)| i).collect(),
            ChunkUnit::Words => {
                let mut starts = Vec::new();
                let mut in_word = false;
                for (i, c) in text.char_indices() {
                    if c.is_whitespace() {
                        in_word = false;
                    } else if !in_word {
                        starts.push(i);
                        in_word = true;
                    }
                }
                starts
            }
        }
    }

    /// Latest unit index in `lo..=hi` carrying the strongest boundary
    fn best_cut(&self, text: &str, starts: &[usize], lo: usize, hi: usize) -> usize {
        let mut best = (Boundary::Forced, hi);
        for i in (lo..=hi).rev() {
            let kind = classify(&text[..starts[i]]);
            if kind > best.0 {
                best = (kind, i);
                if kind == Boundary::Paragraph {
                    break;
                }
            }
        }
        best.1
    }
}

/// Chunks returned by the chunking stage
#[derive(Debug, Clone)]
pub struct ChunkedDocument {
    /// Chunks in index order
    pub chunks: Vec<Chunk>,
    /// True when existing records were returned instead of re-splitting
    pub reused: bool,
}

/// Splits documents and registers every chunk as `pending`
pub struct ChunkingStage<R> {
    repository: Arc<R>,
    chunker: TextChunker,
    force: bool,
}

impl<R> Clone for ChunkingStage<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            chunker: self.chunker.clone(),
            force: self.force,
        }
    }
}

impl<R> ChunkingStage<R>
where
    R: FactRepository,
    R::Error: Display,
{
    /// Create a chunking stage; `force` re-splits documents that already
    /// have chunk records
    pub fn new(repository: Arc<R>, chunker: TextChunker, force: bool) -> Self {
        Self {
            repository,
            chunker,
            force,
        }
    }

    /// Split `text` and register the chunks
    ///
    /// A document whose chunk 0 is already recorded is not re-split unless
    /// `force` is set; its stored chunks are returned instead. Forcing
    /// drops the old chunk rows and staged candidates first. The new chunks
    /// are written as one batch, so a failed write leaves none behind.
    pub fn chunk_document(
        &self,
        document_name: &str,
        text: &str,
        force: bool,
    ) -> Result<ChunkedDocument, PipelineError> {
        let repo = &self.repository;

        if !force && repo.chunk_exists(document_name, 0).map_err(PipelineError::storage)? {
            let chunks = repo
                .list_chunks(Some(document_name))
                .map_err(PipelineError::storage)?;
            info!(document = %document_name, chunks = chunks.len(), "Reusing existing chunks");
            return Ok(ChunkedDocument {
                chunks,
                reused: true,
            });
        }

        if force {
            let removed = repo
                .delete_chunks(document_name)
                .map_err(PipelineError::storage)?;
            debug!(document = %document_name, removed, "Dropped chunks before re-splitting");
        }

        let timestamp = current_timestamp();
        let chunks: Vec<Chunk> = self
            .chunker
            .chunk(text)
            .into_iter()
            .enumerate()
            .map(|(index, content)| Chunk::new(document_name, index as u32, content, timestamp))
            .collect();
        repo.upsert_chunks(&chunks).map_err(PipelineError::storage)?;

        info!(document = %document_name, chunks = chunks.len(), "Split document");
        Ok(ChunkedDocument {
            chunks,
            reused: false,
        })
    }
}

impl<R> PipelineStage for ChunkingStage<R>
where
    R: FactRepository,
    R::Error: Display,
{
    fn stage(&self) -> WorkflowStage {
        WorkflowStage::Chunking
    }

    async fn run(
        &self,
        mut state: WorkflowState,
        _cancel: &CancellationToken,
    ) -> Result<WorkflowState, PipelineError> {
        let chunked = self.chunk_document(&state.document.name, &state.document.text, self.force)?;

        if !chunked.reused {
            state.counters.chunks_created = chunked.chunks.len();
        }
        state.chunks = chunked.chunks;
        state.advance(WorkflowStage::Extracting);
        Ok(state)
    }
}

/// Classify a cut by the text that precedes it
fn classify(before: &str) -> Boundary {
    let trimmed = before.trim_end();
    let gap = &before[trimmed.len()..];
    if gap.is_empty() {
        return Boundary::Forced;
    }

    let newlines = gap.matches('\n').count();
    if newlines >= 2 {
        Boundary::Paragraph
    } else if newlines == 1 {
        Boundary::Line
    } else if trimmed
        .trim_end_matches(['"', '\'', ')', '\u{201d}', '\u{2019}'])
        .ends_with(['.', '!', '?'])
    {
        Boundary::Sentence
    } else {
        Boundary::Whitespace
    }
}
