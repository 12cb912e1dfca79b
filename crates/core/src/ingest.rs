use crate::chunking::{chunk_text, strip_page_markers, word_count, ChunkingConfig};
use crate::classifier::KeywordClassifier;
use crate::extractor::{extract_marked_text, PdfExtractor};
use crate::language::detect_language;
use crate::models::{Document, DocumentMetadata, IngestionOptions, NewDocument};
use crate::traits::DocumentStore;
use crate::IngestError;
use chrono::Utc;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::info;
use uuid::Uuid;
use walkdir::WalkDir;

const FALLBACK_STORED_NAME: &str = "document.pdf";

/// True when the text after the last `.` of `filename`, lowercased, is an allowed extension.
pub fn allowed_file(filename: &str, allowed_extensions: &BTreeSet<String>) -> bool {
    filename
        .rsplit_once('.')
        .is_some_and(|(_, extension)| allowed_extensions.contains(&extension.to_lowercase()))
}

fn unsafe_filename_chars() -> Result<&'static Regex, IngestError> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    if let Some(pattern) = PATTERN.get() {
        return Ok(pattern);
    }
    let compiled = Regex::new(r"[^A-Za-z0-9._-]+")?;
    Ok(PATTERN.get_or_init(|| compiled))
}

/// Reduces a user-supplied name to a safe ASCII file name.
pub fn secure_filename(original_name: &str) -> Result<String, IngestError> {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned = unsafe_filename_chars()?.replace_all(base, "_");
    let cleaned = cleaned.trim_start_matches(['.', '_']).to_string();

    if cleaned.is_empty() || cleaned.chars().all(|ch| ch == '.' || ch == '_') {
        Ok(FALLBACK_STORED_NAME.to_string())
    } else {
        Ok(cleaned)
    }
}

/// Unique name for an upload inside the upload directory.
pub fn stored_filename(original_name: &str) -> Result<String, IngestError> {
    Ok(format!(
        "{}_{}",
        Uuid::new_v4().simple(),
        secure_filename(original_name)?
    ))
}

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

pub struct IngestionReport {
    pub documents: Vec<Document>,
    pub skipped_files: Vec<SkippedPdf>,
}

/// Extracts, chunks, classifies and stores one PDF that already sits at `path`.
///
/// Nothing is stored unless every step succeeds. The file at `path` is left alone.
pub async fn ingest_document<S, E>(
    store: &S,
    extractor: Arc<E>,
    path: &Path,
    original_name: &str,
    options: &IngestionOptions,
) -> Result<Document, IngestError>
where
    S: DocumentStore + ?Sized,
    E: PdfExtractor + Send + Sync + 'static,
{
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?
        .to_string();
    let file_size = tokio::fs::metadata(path).await?.len();

    let owned_path = path.to_path_buf();
    let marked = tokio::task::spawn_blocking(move || {
        extract_marked_text(extractor.as_ref(), &owned_path)
    })
    .await??;

    let plain = strip_page_markers(&marked);
    if plain.trim().is_empty() {
        return Err(IngestError::ExtractionFailed(format!(
            "no text extracted from {}",
            path.display()
        )));
    }

    let language = detect_language(&plain, options.min_language_chars);
    let classification = KeywordClassifier::default().classify(&plain);
    let chunks = chunk_text(&marked, ChunkingConfig::from(options));

    let new_document = NewDocument {
        filename,
        original_name: original_name.to_string(),
        file_size,
        uploaded_at: Utc::now(),
        language,
        category: classification.category.to_string(),
        metadata: DocumentMetadata {
            categorization_confidence: classification.confidence,
            word_count: word_count(&plain) as u64,
        },
    };

    let document = store.create(new_document, &chunks).await?;
    info!(
        document_id = %document.id,
        original_name = %document.original_name,
        language = %document.language,
        category = %document.category,
        chunks = chunks.len(),
        "document ingested"
    );
    Ok(document)
}
