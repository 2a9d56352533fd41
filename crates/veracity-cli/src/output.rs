//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};
use veracity_domain::{Chunk, ChunkStats, Fact, FactStats};
use veracity_pipeline::{PipelineError, RunReport};

/// Longest chunk or statement text shown in a table cell.
const PREVIEW_CHARS: usize = 60;

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Selected output format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Format the summary of one document run.
    pub fn format_report(&self, report: &RunReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&report_json(report))?),
            OutputFormat::Quiet => Ok(format!("{}\t{}", report.document, report.outcome)),
            OutputFormat::Table => Ok(self.format_report_table(report)),
        }
    }

    /// Format the results of a multi-document run, in input order.
    pub fn format_reports(
        &self,
        results: &[(String, std::result::Result<RunReport, PipelineError>)],
    ) -> Result<String> {
        if let OutputFormat::Json = self.format {
            let json: Vec<serde_json::Value> = results
                .iter()
                .map(|(name, result)| match result {
                    Ok(report) => report_json(report),
                    Err(e) => serde_json::json!({
                        "document": name,
                        "error": e.to_string(),
                    }),
                })
                .collect();
            return Ok(serde_json::to_string_pretty(&json)?);
        }

        let mut sections = Vec::with_capacity(results.len());
        for (name, result) in results {
            sections.push(match (result, self.format) {
                (Ok(report), _) => self.format_report(report)?,
                (Err(_), OutputFormat::Quiet) => format!("{}\tfailed", name),
                (Err(e), _) => self.error(&format!("{}: {}", name, e)),
            });
        }
        Ok(sections.join("\n"))
    }

    fn format_report_table(&self, report: &RunReport) -> String {
        let counters = &report.counters;
        let mut builder = Builder::default();
        builder.push_record(["Document", "Outcome", "Chunks", "Calls", "Verified", "Rejected", "Pending"]);
        builder.push_record([
            report.document.clone(),
            report.outcome.to_string(),
            format!(
                "{} ({} new, {} failed)",
                report.chunk_stats.total, counters.chunks_created, report.chunk_stats.failed
            ),
            format!(
                "{} extract / {} verify",
                counters.extraction_calls, counters.verification_calls
            ),
            report.stats.verified.to_string(),
            report.stats.rejected.to_string(),
            report.stats.pending.to_string(),
        ]);

        let mut output = self.table(builder);
        for failure in &report.chunk_failures {
            output.push('\n');
            output.push_str(&self.warning(&format!(
                "chunk {} failed: {}",
                failure.chunk_index, failure.error
            )));
        }
        for failure in &report.fact_failures {
            output.push('\n');
            output.push_str(&self.warning(&format!(
                "verification of \"{}\" (chunk {}) failed: {}",
                preview(&failure.statement),
                failure.source_chunk,
                failure.error
            )));
        }
        if report.is_noop() {
            output.push('\n');
            output.push_str(&self.info("Nothing to do; document already processed"));
        }
        output
    }

    /// Format fact and chunk statistics.
    pub fn format_stats(
        &self,
        document: Option<&str>,
        facts: &FactStats,
        chunks: &ChunkStats,
    ) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&serde_json::json!({
                "document": document,
                "facts": fact_stats_json(facts),
                "chunks": chunk_stats_json(chunks),
            }))?),
            OutputFormat::Quiet => Ok(format!(
                "{} {} {} {}",
                facts.total, facts.verified, facts.rejected, facts.pending
            )),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["", "Total", "Verified", "Rejected", "Pending"]);
                builder.push_record([
                    "Facts".to_string(),
                    facts.total.to_string(),
                    facts.verified.to_string(),
                    facts.rejected.to_string(),
                    facts.pending.to_string(),
                ]);
                let facts_table = self.table(builder);

                let mut builder = Builder::default();
                builder.push_record(["", "Total", "Pending", "Processing", "Processed", "Failed"]);
                builder.push_record([
                    "Chunks".to_string(),
                    chunks.total.to_string(),
                    chunks.pending.to_string(),
                    chunks.processing.to_string(),
                    chunks.processed.to_string(),
                    chunks.failed.to_string(),
                ]);

                let heading = match document {
                    Some(name) => format!("Statistics for '{}'", name),
                    None => "Statistics for all documents".to_string(),
                };
                Ok(format!(
                    "{}\n{}\n{}",
                    self.colorize(&heading, "cyan"),
                    facts_table,
                    self.table(builder)
                ))
            }
        }
    }

    /// Format a chunk listing.
    pub fn format_chunks(&self, chunks: &[Chunk]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let json: Vec<serde_json::Value> = chunks
                    .iter()
                    .map(|c| {
                        serde_json::json!({
                            "document_name": c.document_name,
                            "chunk_index": c.chunk_index,
                            "status": c.status.as_str(),
                            "contains_facts": c.contains_facts,
                            "error_message": c.error_message,
                            "timestamp": c.timestamp,
                            "content": c.content,
                        })
                    })
                    .collect();
                Ok(serde_json::to_string_pretty(&json)?)
            }
            OutputFormat::Quiet => Ok(chunks
                .iter()
                .map(|c| c.chunk_index.to_string())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                if chunks.is_empty() {
                    return Ok(self.colorize("No chunks found.", "yellow"));
                }

                let mut builder = Builder::default();
                builder.push_record(["Index", "Status", "Facts", "Content", "Error"]);
                for chunk in chunks {
                    builder.push_record([
                        chunk.chunk_index.to_string(),
                        self.status_cell(chunk),
                        if chunk.contains_facts { "yes" } else { "no" }.to_string(),
                        preview(&chunk.content),
                        chunk.error_message.clone().unwrap_or_default(),
                    ]);
                }
                Ok(self.table(builder))
            }
        }
    }

    /// Format a fact listing.
    pub fn format_facts(&self, facts: &[Fact]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let json: Vec<serde_json::Value> = facts.iter().map(fact_json).collect();
                Ok(serde_json::to_string_pretty(&json)?)
            }
            OutputFormat::Quiet => Ok(facts
                .iter()
                .map(|f| f.statement.as_str())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                if facts.is_empty() {
                    return Ok(self.colorize("No facts found.", "yellow"));
                }

                let mut builder = Builder::default();
                builder.push_record(["Document", "Chunk", "Statement", "Status", "Reason"]);
                for fact in facts {
                    let status = if fact.is_rejected() {
                        self.colorize(fact.verification_status.as_str(), "red")
                    } else {
                        self.colorize(fact.verification_status.as_str(), "green")
                    };
                    builder.push_record([
                        fact.document_name.clone(),
                        fact.source_chunk.to_string(),
                        preview(&fact.statement),
                        status,
                        fact.verification_reason.clone().unwrap_or_default(),
                    ]);
                }
                Ok(self.table(builder))
            }
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    fn status_cell(&self, chunk: &Chunk) -> String {
        let color = match chunk.status {
            veracity_domain::ChunkStatus::Processed => "green",
            veracity_domain::ChunkStatus::Failed => "red",
            veracity_domain::ChunkStatus::Processing => "magenta",
            veracity_domain::ChunkStatus::Pending => "yellow",
        };
        self.colorize(chunk.status.as_str(), color)
    }

    fn table(&self, builder: Builder) -> String {
        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            "cyan" => text.cyan().to_string(),
            "magenta" => text.magenta().to_string(),
            _ => text.to_string(),
        }
    }
}

/// Single-line prefix of `text`, at most `PREVIEW_CHARS` characters.
fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let mut cut: String = flat.chars().take(PREVIEW_CHARS - 1).collect();
    cut.push('…');
    cut
}

fn fact_json(fact: &Fact) -> serde_json::Value {
    serde_json::json!({
        "document_name": fact.document_name,
        "source_chunk": fact.source_chunk,
        "statement": fact.statement,
        "status": fact.verification_status.as_str(),
        "reason": fact.verification_reason,
        "timestamp": fact.timestamp,
    })
}

fn fact_stats_json(stats: &FactStats) -> serde_json::Value {
    serde_json::json!({
        "total": stats.total,
        "verified": stats.verified,
        "rejected": stats.rejected,
        "pending": stats.pending,
    })
}

fn chunk_stats_json(stats: &ChunkStats) -> serde_json::Value {
    serde_json::json!({
        "total": stats.total,
        "pending": stats.pending,
        "processing": stats.processing,
        "processed": stats.processed,
        "failed": stats.failed,
    })
}

fn report_json(report: &RunReport) -> serde_json::Value {
    let counters = &report.counters;
    serde_json::json!({
        "run_id": report.run_id.to_string(),
        "document": report.document,
        "outcome": report.outcome.to_string(),
        "final_stage": report.final_stage.as_str(),
        "counters": {
            "chunks_created": counters.chunks_created,
            "chunks_skipped": counters.chunks_skipped,
            "extraction_calls": counters.extraction_calls,
            "verification_calls": counters.verification_calls,
            "candidates_extracted": counters.candidates_extracted,
            "facts_verified": counters.facts_verified,
            "facts_rejected": counters.facts_rejected,
        },
        "chunk_failures": report.chunk_failures.iter().map(|f| serde_json::json!({
            "chunk_index": f.chunk_index,
            "error": f.error.to_string(),
        })).collect::<Vec<_>>(),
        "fact_failures": report.fact_failures.iter().map(|f| serde_json::json!({
            "source_chunk": f.source_chunk,
            "statement": f.statement,
            "error": f.error.to_string(),
        })).collect::<Vec<_>>(),
        "facts": report.facts.iter().map(fact_json).collect::<Vec<_>>(),
        "stats": fact_stats_json(&report.stats),
        "chunk_stats": chunk_stats_json(&report.chunk_stats),
    })
}
