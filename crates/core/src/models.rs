use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const UNKNOWN_LANGUAGE: &str = "unknown";
pub const UNKNOWN_CATEGORY: &str = "unknown";
pub const OTHER_CATEGORY: &str = "other";

/// Lowercases one char at a time, so every folded char maps back to exactly
/// one original char. Stored chunks, queries and highlighting all use this.
pub fn fold_case(text: &str) -> String {
    text.chars().flat_map(char::to_lowercase).collect()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct DocumentMetadata {
    /// Keyword classification confidence, 0 to 100.
    pub categorization_confidence: f64,
    pub word_count: u64,
}

/// A document as it is handed to the store, before it has an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    pub filename: String,
    pub original_name: String,
    pub file_size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub language: String,
    pub category: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    /// Name of the backing file inside the upload directory.
    pub filename: String,
    /// Name the user uploaded the file under; used for display and result ordering.
    pub original_name: String,
    pub file_size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub language: String,
    pub category: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn from_new(id: impl Into<String>, new: NewDocument) -> Self {
        Self {
            id: id.into(),
            filename: new.filename,
            original_name: new.original_name,
            file_size: new.file_size,
            uploaded_at: new.uploaded_at,
            language: new.language,
            category: new.category,
            metadata: new.metadata,
        }
    }
}

/// Chunker output: text attributed to the 1-based page it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub text: String,
    pub page_number: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub document_id: String,
    pub chunk_index: u64,
    pub page_number: u32,
    pub text: String,
}

/// Store-level chunk filter: case-insensitive substring, optionally scoped to one document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChunkQuery {
    pub needle: String,
    pub document_id: Option<String>,
}

impl ChunkQuery {
    pub fn new(needle: impl Into<String>) -> Self {
        Self {
            needle: needle.into(),
            document_id: None,
        }
    }

    pub fn scoped(mut self, document_id: Option<String>) -> Self {
        self.document_id = document_id;
        self
    }

    pub fn folded_needle(&self) -> String {
        fold_case(&self.needle)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub chunk: DocumentChunk,
    pub document: Document,
    /// Plain-text window around the first match.
    pub context: String,
    /// `context` escaped as HTML with the first match wrapped in a highlight span.
    pub highlighted: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub category: &'static str,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentView {
    pub document: Document,
    pub hits: Vec<SearchHit>,
    /// Distinct pages with at least one hit, ascending.
    pub result_pages: Vec<u32>,
    pub total_pages: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedTable {
    pub name: String,
    pub content: String,
    pub rows: usize,
    pub columns: usize,
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_size: usize,
    pub min_language_chars: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            min_language_chars: 50,
        }
    }
}
