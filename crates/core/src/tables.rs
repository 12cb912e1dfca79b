//! Table export: an external extractor turns a PDF into CSV tables, which are
//! packaged into a zip archive.

use crate::error::ExportError;
use crate::models::ExtractedTable;
use async_trait::async_trait;
use csv::ReaderBuilder;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[async_trait]
pub trait TableExtractor: Send + Sync {
    async fn extract_tables(&self, pdf: &Path) -> Result<Vec<ExtractedTable>, ExportError>;
}

/// Runs `<program> [args..] <pdf> <out_dir>` and picks up the `*.csv` files it leaves in `out_dir`.
#[derive(Debug, Clone)]
pub struct CommandTableExtractor {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandTableExtractor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args = args.into_iter().collect();
        self
    }
}

#[async_trait]
impl TableExtractor for CommandTableExtractor {
    async fn extract_tables(&self, pdf: &Path) -> Result<Vec<ExtractedTable>, ExportError> {
        let out_dir = std::env::temp_dir().join(format!("pdf-index-tables-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&out_dir).await?;

        let result = run_and_collect(self, pdf, &out_dir).await;

        if let Err(error) = tokio::fs::remove_dir_all(&out_dir).await {
            warn!(dir = %out_dir.display(), %error, "could not remove table scratch dir");
        }
        result
    }
}

async fn run_and_collect(
    extractor: &CommandTableExtractor,
    pdf: &Path,
    out_dir: &Path,
) -> Result<Vec<ExtractedTable>, ExportError> {
    let output = Command::new(&extractor.program)
        .args(&extractor.args)
        .arg(pdf)
        .arg(out_dir)
        .output()
        .await?;

    if !output.status.success() {
        return Err(ExportError::Extractor(format!(
            "{} exited with {}: {}",
            extractor.program.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let mut csv_files = WalkDir::new(out_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect::<Vec<_>>();
    csv_files.sort_unstable();

    let mut contents = Vec::with_capacity(csv_files.len());
    for path in csv_files {
        contents.push(tokio::fs::read_to_string(&path).await?);
    }
    let tables = tables_from_csv(contents);
    debug!(pdf = %pdf.display(), tables = tables.len(), "table extractor finished");
    Ok(tables)
}

/// Names CSV blobs `table_<n>.csv` in order and drops single-column, empty or
/// unparseable ones.
pub fn tables_from_csv(contents: Vec<String>) -> Vec<ExtractedTable> {
    contents
        .into_iter()
        .enumerate()
        .filter_map(|(index, content)| {
            let name = format!("table_{}.csv", index + 1);
            let (rows, columns) = match csv_shape(&content) {
                Ok(shape) => shape,
                Err(error) => {
                    warn!(table = %name, %error, "unreadable csv table");
                    return None;
                }
            };
            if columns < 2 || rows == 0 {
                return None;
            }
            Some(ExtractedTable {
                name,
                content,
                rows,
                columns,
            })
        })
        .collect()
}

/// Data records and header fields of a CSV blob. Quoted fields may span lines.
fn csv_shape(content: &str) -> Result<(usize, usize), csv::Error> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(content.as_bytes());
    let columns = reader.headers()?.len();

    let mut rows = 0;
    for record in reader.records() {
        match record {
            Ok(_) => rows += 1,
            Err(error) => debug!(%error, "skipping malformed csv record"),
        }
    }
    Ok((rows, columns))
}

#[derive(Debug, Clone)]
pub struct TableArchive {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub table_count: usize,
}

pub fn archive_filename(original_name: &str) -> String {
    format!("{original_name}_tables.zip")
}

/// Deflated zip with one entry per table.
pub fn package_tables(tables: &[ExtractedTable]) -> Result<Vec<u8>, ExportError> {
    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for table in tables {
            zip.start_file(table.name.as_str(), options)?;
            zip.write_all(table.content.as_bytes())?;
        }
        zip.finish()?;
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn csv_blobs_become_named_tables() {
        let tables = tables_from_csv(vec![
            "a,b\n1,2\n3,4\n".to_string(),
            "only\n1\n".to_string(),
            "\"x,y\",z\n1,2\n".to_string(),
            "h1,h2\n".to_string(),
        ]);

        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].name, "table_1.csv");
        assert_eq!((tables[0].rows, tables[0].columns), (2, 2));
        assert_eq!(tables[1].name, "table_3.csv");
        assert_eq!(tables[1].columns, 2);
    }

    #[test]
    fn quoted_newlines_stay_inside_their_field() {
        let tables = tables_from_csv(vec![
            "name,notes\n1,\"line one\nline two\"\n".to_string(),
            "\"multi\nline\",b\n1,2\n".to_string(),
        ]);

        assert_eq!(tables.len(), 2);
        assert_eq!((tables[0].rows, tables[0].columns), (1, 2));
        assert_eq!(tables[1].name, "table_2.csv");
        assert_eq!((tables[1].rows, tables[1].columns), (1, 2));
    }

    #[test]
    fn archive_contains_every_table() -> Result<(), Box<dyn std::error::Error>> {
        let tables = tables_from_csv(vec!["a,b\n1,2\n".to_string(), "c,d\n3,4\n".to_string()]);
        let bytes = package_tables(&tables)?;

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        assert_eq!(archive.len(), 2);
        let mut content = String::new();
        archive.by_name("table_2.csv")?.read_to_string(&mut content)?;
        assert_eq!(content, "c,d\n3,4\n");
        Ok(())
    }

    #[test]
    fn archive_name_follows_document() {
        assert_eq!(archive_filename("Отчёт.pdf"), "Отчёт.pdf_tables.zip");
    }
}
