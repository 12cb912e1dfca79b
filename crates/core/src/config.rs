use crate::models::IngestionOptions;
use crate::search::DEFAULT_CONTEXT_CHARS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://database/pdf_search.db";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: u64,
    /// Lowercase extensions accepted by uploads, without the dot.
    pub allowed_extensions: BTreeSet<String>,
    pub chunk_size: usize,
    pub context_chars: usize,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_extensions: BTreeSet::from(["pdf".to_string()]),
            chunk_size: IngestionOptions::default().chunk_size,
            context_chars: DEFAULT_CONTEXT_CHARS,
        }
    }
}

impl LibraryConfig {
    pub fn ingestion_options(&self) -> IngestionOptions {
        IngestionOptions {
            chunk_size: self.chunk_size,
            ..IngestionOptions::default()
        }
    }
}
