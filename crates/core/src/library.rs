//! The operations the outside world calls: upload, search, report, list,
//! view, delete and table export, over one store and one upload directory.

use crate::config::LibraryConfig;
use crate::error::{ExportError, IngestError, StoreError};
use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::ingest::{allowed_file, discover_pdf_files, ingest_document, stored_filename};
use crate::ingest::{IngestionReport, SkippedPdf};
use crate::models::{Document, DocumentView, SearchHit};
use crate::report::{build_report, Report};
use crate::search::SearchEngine;
use crate::stores::SqliteStore;
use crate::tables::{archive_filename, package_tables, TableArchive, TableExtractor};
use crate::traits::DocumentStore;
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub struct Library<S, E = LopdfExtractor> {
    config: LibraryConfig,
    engine: SearchEngine<S>,
    extractor: Arc<E>,
}

impl Library<SqliteStore, LopdfExtractor> {
    /// Opens the SQLite database and upload directory named by `config`, creating both if needed.
    pub async fn open(config: LibraryConfig) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(&config.upload_dir).await?;
        let store = SqliteStore::connect(&config.database_url).await?;
        Ok(Self::new(config, store, LopdfExtractor))
    }
}

impl<S, E> Library<S, E>
where
    S: DocumentStore,
    E: PdfExtractor + Send + Sync + 'static,
{
    pub fn new(config: LibraryConfig, store: S, extractor: E) -> Self {
        let engine = SearchEngine::new(store).with_context_chars(config.context_chars);
        Self {
            config,
            engine,
            extractor: Arc::new(extractor),
        }
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        self.engine.store()
    }

    pub fn document_path(&self, document: &Document) -> PathBuf {
        self.config.upload_dir.join(&document.filename)
    }

    /// Copies `source` into the upload directory and ingests it. The copy is
    /// removed again when ingestion fails.
    pub async fn upload(&self, source: &Path, original_name: &str) -> Result<Document, IngestError> {
        if !allowed_file(original_name, &self.config.allowed_extensions) {
            return Err(IngestError::UnsupportedFileType(original_name.to_string()));
        }

        let size = tokio::fs::metadata(source)
            .await
            .map_err(IngestError::SaveFailed)?
            .len();
        if size > self.config.max_upload_bytes {
            return Err(IngestError::FileTooLarge {
                size,
                limit: self.config.max_upload_bytes,
            });
        }

        tokio::fs::create_dir_all(&self.config.upload_dir)
            .await
            .map_err(IngestError::SaveFailed)?;
        let target = self.config.upload_dir.join(stored_filename(original_name)?);
        tokio::fs::copy(source, &target)
            .await
            .map_err(IngestError::SaveFailed)?;

        match self.ingest(&target, original_name).await {
            Ok(document) => Ok(document),
            Err(error) => {
                warn!(path = %target.display(), %error, "ingestion failed, removing upload");
                if let Err(remove_error) = tokio::fs::remove_file(&target).await {
                    warn!(path = %target.display(), error = %remove_error, "could not remove upload");
                }
                Err(error)
            }
        }
    }

    /// Ingests a file that already lives in the upload directory.
    pub async fn ingest(&self, path: &Path, original_name: &str) -> Result<Document, IngestError> {
        ingest_document(
            self.store(),
            Arc::clone(&self.extractor),
            path,
            original_name,
            &self.config.ingestion_options(),
        )
        .await
    }

    /// Uploads every PDF below `folder`, skipping the ones that fail.
    pub async fn ingest_folder(&self, folder: &Path) -> Result<IngestionReport, IngestError> {
        let files = discover_pdf_files(folder);

        if files.is_empty() {
            return Err(IngestError::InvalidArgument(format!(
                "no pdf files found in {}",
                folder.display()
            )));
        }

        let mut documents = Vec::new();
        let mut skipped_files = Vec::new();
        for path in files {
            let original_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(str::to_string);
            let result = match original_name {
                Some(name) => self.upload(&path, &name).await,
                None => Err(IngestError::MissingFileName(path.display().to_string())),
            };

            match result {
                Ok(document) => documents.push(document),
                Err(error) => skipped_files.push(SkippedPdf {
                    path,
                    reason: error.to_string(),
                }),
            }
        }

        Ok(IngestionReport {
            documents,
            skipped_files,
        })
    }

    /// Search that never fails: storage errors are logged and yield no hits.
    pub async fn search(&self, query: &str, scope: Option<&str>) -> Vec<SearchHit> {
        match self.try_search(query, scope).await {
            Ok(hits) => hits,
            Err(error) => {
                warn!(query, %error, "search failed, returning no results");
                Vec::new()
            }
        }
    }

    pub async fn try_search(
        &self,
        query: &str,
        scope: Option<&str>,
    ) -> Result<Vec<SearchHit>, StoreError> {
        self.engine.search(query, scope).await
    }

    pub fn build_report(&self, hits: &[SearchHit], query: &str) -> Report {
        build_report(hits, query)
    }

    pub async fn list_documents(&self) -> Result<Vec<Document>, StoreError> {
        self.store().list().await
    }

    pub async fn get_document(&self, id: &str) -> Result<Document, StoreError> {
        self.store().get(id).await
    }

    /// A document with the hits of `query` inside it and its page count.
    pub async fn view_document(
        &self,
        id: &str,
        query: Option<&str>,
    ) -> Result<DocumentView, StoreError> {
        let document = self.store().get(id).await?;

        let hits = match query {
            Some(query) => self.search(query, Some(id)).await,
            None => Vec::new(),
        };
        let result_pages = hits
            .iter()
            .map(|hit| hit.chunk.page_number)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let path = self.document_path(&document);
        let extractor = Arc::clone(&self.extractor);
        let total_pages = tokio::task::spawn_blocking(move || extractor.page_count(&path))
            .await
            .ok()
            .and_then(Result::ok)
            .unwrap_or(1);

        Ok(DocumentView {
            document,
            hits,
            result_pages,
            total_pages,
        })
    }

    /// Deletes the document, its chunks and its backing file.
    pub async fn delete_document(&self, id: &str) -> Result<Document, StoreError> {
        let document = self.store().delete(id).await?;
        let path = self.document_path(&document);

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(error) if error.kind() == ErrorKind::NotFound => {}
            Err(error) => warn!(path = %path.display(), %error, "could not remove document file"),
        }

        info!(document_id = %document.id, original_name = %document.original_name, "document deleted");
        Ok(document)
    }

    /// Runs `extractor` over the document's file and zips up the tables it finds.
    pub async fn export_tables<T>(&self, id: &str, extractor: &T) -> Result<TableArchive, ExportError>
    where
        T: TableExtractor + ?Sized,
    {
        let document = self.store().get(id).await?;
        let tables = extractor
            .extract_tables(&self.document_path(&document))
            .await?;

        if tables.is_empty() {
            return Err(ExportError::NoTables(document.original_name));
        }

        let bytes = package_tables(&tables)?;
        info!(document_id = %document.id, tables = tables.len(), "tables exported");
        Ok(TableArchive {
            filename: archive_filename(&document.original_name),
            bytes,
            table_count: tables.len(),
        })
    }
}
