use chrono::Utc;
use clap::{Parser, Subcommand};
use pdf_index_core::{
    CommandTableExtractor, ExportError, IngestError, Library, LibraryConfig, SearchHit,
    StoreError,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-index", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// SQLite connection string
    #[arg(long, env = "PDF_INDEX_DATABASE_URL", default_value = pdf_index_core::config::DEFAULT_DATABASE_URL)]
    database_url: String,

    /// Directory uploaded PDFs are stored in
    #[arg(long, env = "PDF_INDEX_UPLOAD_DIR", default_value = pdf_index_core::config::DEFAULT_UPLOAD_DIR)]
    upload_dir: PathBuf,

    /// Largest accepted upload in bytes
    #[arg(long, env = "PDF_INDEX_MAX_UPLOAD_BYTES", default_value_t = pdf_index_core::config::DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: u64,

    /// Accepted upload extensions
    #[arg(long, env = "PDF_INDEX_ALLOWED_EXTENSIONS", value_delimiter = ',', default_value = "pdf")]
    allowed_extensions: Vec<String>,

    /// Soft word limit per stored chunk
    #[arg(long, env = "PDF_INDEX_CHUNK_SIZE", default_value = "1000")]
    chunk_size: usize,

    /// Characters of context shown around a match
    #[arg(long, env = "PDF_INDEX_CONTEXT_CHARS", default_value = "50")]
    context_chars: usize,
}

impl Cli {
    fn library_config(&self) -> LibraryConfig {
        LibraryConfig {
            database_url: self.database_url.clone(),
            upload_dir: self.upload_dir.clone(),
            max_upload_bytes: self.max_upload_bytes,
            allowed_extensions: self
                .allowed_extensions
                .iter()
                .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect::<BTreeSet<_>>(),
            chunk_size: self.chunk_size,
            context_chars: self.context_chars,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Upload one PDF: copy it into the library and index it.
    Upload {
        /// PDF to upload
        #[arg(long)]
        file: PathBuf,
        /// Display name; defaults to the file name
        #[arg(long)]
        name: Option<String>,
    },
    /// Upload every PDF found recursively below a folder.
    Ingest {
        #[arg(long)]
        folder: PathBuf,
    },
    /// List documents, newest first.
    List,
    /// Show one document, optionally with the hits of a query inside it.
    Show {
        #[arg(long)]
        id: String,
        #[arg(long)]
        query: Option<String>,
    },
    /// Search all documents, or one with --document.
    Search {
        #[arg(long)]
        query: String,
        #[arg(long)]
        document: Option<String>,
    },
    /// Write an HTML report of a search.
    Report {
        #[arg(long)]
        query: String,
        /// Directory the report is written to
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Delete a document, its chunks and its file.
    Delete {
        #[arg(long)]
        id: String,
    },
    /// Extract a document's tables with an external program and zip them.
    ExportTables {
        #[arg(long)]
        id: String,
        /// Program run as `<program> [args..] <pdf> <out_dir>`, writing CSV files
        #[arg(long, env = "PDF_INDEX_TABLE_EXTRACTOR")]
        extractor: PathBuf,
        /// Extra arguments passed before the pdf path
        #[arg(long = "extractor-arg")]
        extractor_args: Vec<String>,
        /// Directory the archive is written to
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

fn ingest_message(error: &IngestError) -> String {
    match error {
        IngestError::UnsupportedFileType(name) => {
            format!("Unsupported file type: {name}. Only PDF files can be uploaded.")
        }
        IngestError::FileTooLarge { size, limit } => {
            format!("File is too large ({size} bytes, limit {limit} bytes).")
        }
        IngestError::SaveFailed(error) => format!("Could not save the file: {error}"),
        IngestError::NotAPdf(_) => "The file is not a valid PDF.".to_string(),
        IngestError::ExtractionFailed(_) => "Could not extract text from the PDF.".to_string(),
        other => format!("Could not process the file: {other}"),
    }
}

fn store_message(error: &StoreError) -> String {
    match error {
        StoreError::NotFound(id) => format!("Document not found: {id}"),
        other => format!("Storage error: {other}"),
    }
}

fn print_hits(hits: &[SearchHit]) {
    for hit in hits {
        println!(
            "[{}] {} page={} chunk={}",
            hit.document.id, hit.document.original_name, hit.chunk.page_number, hit.chunk.chunk_index
        );
        println!("  {}", hit.context);
    }
}

async fn write_output(dir: &Path, filename: &str, bytes: &[u8]) -> anyhow::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(filename);
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let library = Library::open(cli.library_config())
        .await
        .map_err(|error| anyhow::anyhow!(store_message(&error)))?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-index boot"
    );

    match cli.command {
        Command::Upload { file, name } => {
            let original_name = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map(str::to_string)
                    .ok_or_else(|| anyhow::anyhow!("path has no file name: {}", file.display()))?,
            };

            match library.upload(&file, &original_name).await {
                Ok(document) => println!(
                    "File \"{}\" uploaded and processed: id={} language={} category={} words={}",
                    document.original_name,
                    document.id,
                    document.language,
                    document.category,
                    document.metadata.word_count
                ),
                Err(error) => println!("{}", ingest_message(&error)),
            }
        }
        Command::Ingest { folder } => match library.ingest_folder(&folder).await {
            Ok(report) => {
                for skipped in &report.skipped_files {
                    warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
                }
                println!(
                    "{} documents ingested, {} skipped at {}",
                    report.documents.len(),
                    report.skipped_files.len(),
                    Utc::now().to_rfc3339()
                );
            }
            Err(error) => println!("{}", ingest_message(&error)),
        },
        Command::List => {
            let documents = library
                .list_documents()
                .await
                .map_err(|error| anyhow::anyhow!(store_message(&error)))?;
            if documents.is_empty() {
                println!("No documents.");
            }
            for document in documents {
                println!(
                    "{}  {}  {:.1} KB  {}  {}  {}  confidence={:.1}",
                    document.id,
                    document.uploaded_at.format("%Y-%m-%d %H:%M:%S"),
                    document.file_size as f64 / 1024.0,
                    document.language,
                    document.category,
                    document.original_name,
                    document.metadata.categorization_confidence
                );
            }
        }
        Command::Show { id, query } => {
            match library.view_document(&id, query.as_deref()).await {
                Ok(view) => {
                    let document = &view.document;
                    println!("{} ({})", document.original_name, document.id);
                    println!(
                        "pages={} language={} category={} words={}",
                        view.total_pages,
                        document.language,
                        document.category,
                        document.metadata.word_count
                    );
                    if query.is_some() {
                        println!("result pages: {:?}", view.result_pages);
                        print_hits(&view.hits);
                    }
                }
                Err(error) => println!("{}", store_message(&error)),
            }
        }
        Command::Search { query, document } => {
            let query = query.trim();
            let hits = library.search(query, document.as_deref()).await;
            println!("query: {query}");
            if hits.is_empty() {
                println!("No results.");
            }
            print_hits(&hits);
        }
        Command::Report { query, out } => {
            let query = query.trim();
            if query.is_empty() {
                println!("No search query given.");
                return Ok(());
            }
            let hits = library.search(query, None).await;
            if hits.is_empty() {
                println!("No results to export.");
                return Ok(());
            }
            let report = library.build_report(&hits, query);
            let path = write_output(&out, &report.filename, report.content.as_bytes()).await?;
            println!("Report written to {}", path.display());
        }
        Command::Delete { id } => match library.delete_document(&id).await {
            Ok(document) => println!("Document \"{}\" deleted.", document.original_name),
            Err(error) => println!("{}", store_message(&error)),
        },
        Command::ExportTables {
            id,
            extractor,
            extractor_args,
            out,
        } => {
            let extractor = CommandTableExtractor::new(extractor).with_args(extractor_args);
            match library.export_tables(&id, &extractor).await {
                Ok(archive) => {
                    let path = write_output(&out, &archive.filename, &archive.bytes).await?;
                    println!("{} tables written to {}", archive.table_count, path.display());
                }
                Err(ExportError::Storage(error)) => println!("{}", store_message(&error)),
                Err(ExportError::NoTables(name)) => println!("No tables found in \"{name}\"."),
                Err(error) => println!("Table export failed: {error}"),
            }
        }
    }

    Ok(())
}
