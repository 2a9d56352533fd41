//! Plain-text document loading.

use crate::error::{CliError, Result};
use std::fs;
use std::path::Path;
use veracity_domain::traits::DocumentLoader;
use veracity_domain::Document;

const TEXT_EXTENSIONS: &[&str] = &["txt", "text"];
const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Loads `.txt`, `.text`, `.md` and `.markdown` files.
///
/// The document name is the file stem. Markdown files take their title
/// from the first heading.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextLoader;

impl PlainTextLoader {
    /// Create a loader.
    pub fn new() -> Self {
        Self
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
}

fn is_markdown(path: &Path) -> bool {
    extension(path).is_some_and(|e| MARKDOWN_EXTENSIONS.contains(&e.as_str()))
}

/// First non-empty ATX heading, e.g. `## Results` gives `Results`.
pub fn markdown_title(text: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let line = line.trim_start();
        let hashes = line.chars().take_while(|c| *c == '#').count();
        if hashes == 0 || hashes > 6 {
            return None;
        }
        let rest = &line[hashes..];
        if !rest.starts_with(' ') {
            return None;
        }
        let title = rest.trim().trim_end_matches('#').trim();
        (!title.is_empty()).then(|| title.to_string())
    })
}

impl DocumentLoader for PlainTextLoader {
    type Error = CliError;

    fn supports(&self, path: &Path) -> bool {
        extension(path).is_some_and(|e| {
            TEXT_EXTENSIONS.contains(&e.as_str()) || MARKDOWN_EXTENSIONS.contains(&e.as_str())
        })
    }

    fn load(&self, path: &Path) -> Result<Document> {
        if !self.supports(path) {
            return Err(CliError::UnsupportedFormat(path.to_path_buf()));
        }

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                CliError::InvalidInput(format!("No document name in {}", path.display()))
            })?;
        let text = fs::read_to_string(path)?;

        let mut document = Document::new(name, text).with_source(path.display().to_string());
        if is_markdown(path) {
            if let Some(title) = markdown_title(&document.text) {
                document = document.with_title(title);
            }
        }

        Ok(document)
    }
}
