//! Documents as handed to the pipeline

/// A loaded document
///
/// Documents are not persisted; only their chunks and facts are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Unique document name, the first half of every dedup key
    pub name: String,

    /// Where the document came from
    pub source_url: Option<String>,

    /// Human-readable title
    pub title: Option<String>,

    /// Plain text body
    pub text: String,
}

impl Document {
    /// Create a document with no metadata
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_url: None,
            title: None,
            text: text.into(),
        }
    }

    /// Attach a source URL
    pub fn with_source(mut self, source_url: impl Into<String>) -> Self {
        self.source_url = Some(source_url.into());
        self
    }

    /// Attach a title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Metadata passed to the extraction collaborator alongside each chunk
    pub fn context(&self) -> DocumentContext {
        DocumentContext {
            name: self.name.clone(),
            title: self.title.clone(),
            source_url: self.source_url.clone(),
        }
    }
}

/// Document metadata without the body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentContext {
    /// Document name
    pub name: String,

    /// Title, if known
    pub title: Option<String>,

    /// Source URL, if known
    pub source_url: Option<String>,
}
