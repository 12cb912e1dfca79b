use crate::error::IngestError;
use lopdf::Document;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

pub const PDF_MIME: &str = "application/pdf";

/// How far into the file the `%PDF-` header may appear.
const SNIFF_WINDOW: usize = 1024;
const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor {
    /// Every page of the document in order, including pages without text.
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;

    fn page_count(&self, path: &Path) -> Result<u32, IngestError> {
        Ok(self.extract_pages(path)?.len() as u32)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let document =
            Document::load(path).map_err(|error| IngestError::ExtractionFailed(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = match document.extract_text(&[page_no]) {
                Ok(text) => text,
                Err(error) => {
                    warn!(path = %path.display(), page = page_no, %error, "page text unreadable");
                    String::new()
                }
            };

            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        Ok(pages)
    }

    fn page_count(&self, path: &Path) -> Result<u32, IngestError> {
        let document =
            Document::load(path).map_err(|error| IngestError::ExtractionFailed(error.to_string()))?;
        Ok(document.get_pages().len() as u32)
    }
}

/// Content sniff: a PDF carries the `%PDF-` header near the start of the file.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(SNIFF_WINDOW)];
    window
        .windows(PDF_MAGIC.len())
        .any(|candidate| candidate == PDF_MAGIC)
}

/// Returns the sniffed MIME type of the file, `application/pdf` or `application/octet-stream`.
pub fn sniff_mime(path: &Path) -> Result<&'static str, IngestError> {
    let mut head = Vec::with_capacity(SNIFF_WINDOW);
    File::open(path)?
        .take(SNIFF_WINDOW as u64)
        .read_to_end(&mut head)?;

    if looks_like_pdf(&head) {
        Ok(PDF_MIME)
    } else {
        Ok("application/octet-stream")
    }
}

pub fn ensure_pdf(path: &Path) -> Result<(), IngestError> {
    match sniff_mime(path)? {
        PDF_MIME => Ok(()),
        other => Err(IngestError::NotAPdf(format!(
            "{} sniffed as {other}",
            path.display()
        ))),
    }
}

pub fn page_marker(page: u32) -> String {
    format!("--- Page {page} ---")
}

/// Joins pages into one stream with a page marker line in front of each page.
pub fn mark_pages(pages: &[PageText]) -> String {
    let mut marked = String::new();
    for page in pages {
        marked.push_str(&page_marker(page.number));
        marked.push('\n');
        marked.push_str(page.text.trim_end());
        marked.push_str("\n\n");
    }
    marked
}

/// Sniffs, extracts and marks a PDF. Fails when no page has any text.
pub fn extract_marked_text<E>(extractor: &E, path: &Path) -> Result<String, IngestError>
where
    E: PdfExtractor + ?Sized,
{
    ensure_pdf(path)?;
    let pages = extractor.extract_pages(path)?;
    debug!(path = %path.display(), pages = pages.len(), "extracted pdf pages");

    if pages.iter().all(|page| page.text.trim().is_empty()) {
        return Err(IngestError::ExtractionFailed(format!(
            "pdf had no readable page text: {}",
            path.display()
        )));
    }

    Ok(mark_pages(&pages))
}
