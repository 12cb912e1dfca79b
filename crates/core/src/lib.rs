pub mod chunking;
pub mod classifier;
pub mod config;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod language;
pub mod library;
pub mod models;
pub mod report;
pub mod search;
pub mod stores;
pub mod tables;
pub mod traits;

pub use chunking::{chunk_text, strip_page_markers, ChunkingConfig};
pub use classifier::{classify, KeywordClassifier, Taxonomy, EN_TAXONOMY, RU_TAXONOMY};
pub use config::LibraryConfig;
pub use error::{ExportError, IngestError, StoreError};
pub use extractor::{
    ensure_pdf, extract_marked_text, sniff_mime, LopdfExtractor, PageText, PdfExtractor,
};
pub use ingest::{
    allowed_file, discover_pdf_files, ingest_document, IngestionReport, SkippedPdf,
};
pub use language::detect_language;
pub use library::Library;
pub use models::{
    fold_case, ChunkQuery, Classification, Document, DocumentChunk, DocumentMetadata,
    DocumentView, ExtractedTable, IngestionOptions, NewDocument, SearchHit, TextChunk,
};
pub use report::{build_report, build_report_at, Report};
pub use search::{highlight, text_context, SearchEngine};
pub use stores::{InMemoryStore, SqliteStore};
pub use tables::{CommandTableExtractor, TableArchive, TableExtractor};
pub use traits::DocumentStore;
