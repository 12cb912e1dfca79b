//! SQLite-backed [`DocumentStore`].
//!
//! Each operation borrows a pooled connection (or opens a transaction) for
//! its own duration only. Writers serialize on the database lock; WAL mode
//! lets searches run next to an ingestion without seeing uncommitted rows.

use crate::models::{
    fold_case, ChunkQuery, Document, DocumentChunk, DocumentMetadata, NewDocument, TextChunk,
};
use crate::traits::DocumentStore;
use crate::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

const DOCUMENT_COLUMNS: &str =
    "d.id, d.filename, d.original_name, d.file_size, d.uploaded_at, d.language, d.category, d.metadata_json";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if missing) the database behind `database_url` and ensures the schema.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let db_path = options.get_filename();
        if db_path.as_os_str() != ":memory:" {
            if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                original_name TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                uploaded_at INTEGER NOT NULL,
                language TEXT NOT NULL,
                category TEXT NOT NULL,
                metadata_json TEXT NOT NULL DEFAULT '{}'
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS document_chunks (
                document_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                page_number INTEGER NOT NULL,
                text TEXT NOT NULL,
                text_folded TEXT NOT NULL,
                PRIMARY KEY (document_id, chunk_index),
                FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_documents_uploaded_at ON documents(uploaded_at DESC)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_documents_original_name ON documents(original_name)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn document_from_row(row: &SqliteRow) -> Result<Document, StoreError> {
    let file_size: i64 = row.try_get("file_size")?;
    let uploaded_at: i64 = row.try_get("uploaded_at")?;
    let metadata_json: String = row.try_get("metadata_json")?;
    let metadata: DocumentMetadata = serde_json::from_str(&metadata_json)?;

    Ok(Document {
        id: row.try_get("id")?,
        filename: row.try_get("filename")?,
        original_name: row.try_get("original_name")?,
        file_size: u64::try_from(file_size)
            .map_err(|_| StoreError::CorruptRow(format!("negative file_size {file_size}")))?,
        uploaded_at: timestamp_from_micros(uploaded_at)?,
        language: row.try_get("language")?,
        category: row.try_get("category")?,
        metadata,
    })
}

fn chunk_from_row(row: &SqliteRow) -> Result<DocumentChunk, StoreError> {
    let chunk_index: i64 = row.try_get("chunk_index")?;
    let page_number: i64 = row.try_get("page_number")?;

    Ok(DocumentChunk {
        document_id: row.try_get("document_id")?,
        chunk_index: u64::try_from(chunk_index)
            .map_err(|_| StoreError::CorruptRow(format!("negative chunk_index {chunk_index}")))?,
        page_number: u32::try_from(page_number)
            .map_err(|_| StoreError::CorruptRow(format!("bad page_number {page_number}")))?,
        text: row.try_get("text")?,
    })
}

fn timestamp_from_micros(micros: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| StoreError::CorruptRow(format!("bad uploaded_at {micros}")))
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn create(
        &self,
        document: NewDocument,
        chunks: &[TextChunk],
    ) -> Result<Document, StoreError> {
        let id = Uuid::new_v4().to_string();
        let uploaded_at = document.uploaded_at.timestamp_micros();
        let metadata_json = serde_json::to_string(&document.metadata)?;
        let file_size = i64::try_from(document.file_size)
            .map_err(|_| StoreError::CorruptRow(format!("file too large: {}", document.file_size)))?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO documents (id, filename, original_name, file_size, uploaded_at,
                                   language, category, metadata_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&document.filename)
        .bind(&document.original_name)
        .bind(file_size)
        .bind(uploaded_at)
        .bind(&document.language)
        .bind(&document.category)
        .bind(&metadata_json)
        .execute(&mut *tx)
        .await?;

        for (index, chunk) in chunks.iter().enumerate() {
            sqlx::query(
                "INSERT INTO document_chunks (document_id, chunk_index, page_number, text, text_folded) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(index as i64)
            .bind(i64::from(chunk.page_number))
            .bind(&chunk.text)
            .bind(fold_case(&chunk.text))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(document_id = %id, chunks = chunks.len(), "document committed");

        let mut created = Document::from_new(id, document);
        created.uploaded_at = timestamp_from_micros(uploaded_at)?;
        Ok(created)
    }

    async fn get(&self, id: &str) -> Result<Document, StoreError> {
        let row = sqlx::query(&format!("SELECT {DOCUMENT_COLUMNS} FROM documents d WHERE d.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        document_from_row(&row)
    }

    async fn list(&self) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents d ORDER BY d.uploaded_at DESC, d.id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(document_from_row).collect()
    }

    async fn delete(&self, id: &str) -> Result<Document, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!("SELECT {DOCUMENT_COLUMNS} FROM documents d WHERE d.id = ?"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let document = document_from_row(&row)?;

        sqlx::query("DELETE FROM document_chunks WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(document)
    }

    async fn chunks_for_document(&self, id: &str) -> Result<Vec<DocumentChunk>, StoreError> {
        let rows = sqlx::query(
            "SELECT document_id, chunk_index, page_number, text FROM document_chunks \
             WHERE document_id = ? ORDER BY chunk_index",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(chunk_from_row).collect()
    }

    async fn search_chunks(
        &self,
        query: &ChunkQuery,
    ) -> Result<Vec<(DocumentChunk, Document)>, StoreError> {
        let needle = query.folded_needle();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        // instr() avoids LIKE wildcard escaping; both sides are already lowercased.
        let base = format!(
            "SELECT c.document_id, c.chunk_index, c.page_number, c.text, {DOCUMENT_COLUMNS} \
             FROM document_chunks c JOIN documents d ON d.id = c.document_id \
             WHERE instr(c.text_folded, ?) > 0"
        );
        let order = "ORDER BY d.original_name, d.id, c.page_number, c.chunk_index";

        let rows = match &query.document_id {
            Some(document_id) => {
                sqlx::query(&format!("{base} AND c.document_id = ? {order}"))
                    .bind(&needle)
                    .bind(document_id)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query(&format!("{base} {order}"))
                    .bind(&needle)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter()
            .map(|row| Ok((chunk_from_row(row)?, document_from_row(row)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentMetadata;
    use chrono::{Duration, TimeZone};
    use tempfile::{tempdir, TempDir};

    async fn open_store() -> Result<(SqliteStore, TempDir), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let url = format!("sqlite://{}", dir.path().join("db").join("test.db").display());
        let store = SqliteStore::connect(&url).await?;
        Ok((store, dir))
    }

    fn new_document(original_name: &str, minutes: i64) -> NewDocument {
        NewDocument {
            filename: format!("stored_{original_name}"),
            original_name: original_name.to_string(),
            file_size: 2048,
            uploaded_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
                + Duration::minutes(minutes),
            language: "ru".to_string(),
            category: "техника".to_string(),
            metadata: DocumentMetadata {
                categorization_confidence: 42.5,
                word_count: 7,
            },
        }
    }

    fn chunks(items: &[(&str, u32)]) -> Vec<TextChunk> {
        items
            .iter()
            .map(|(text, page_number)| TextChunk {
                text: text.to_string(),
                page_number: *page_number,
            })
            .collect()
    }

    #[tokio::test]
    async fn create_then_get_round_trips_fields() -> Result<(), Box<dyn std::error::Error>> {
        let (store, _dir) = open_store().await?;
        let created = store
            .create(new_document("Отчёт.pdf", 0), &chunks(&[("один", 1), ("два", 2)]))
            .await?;

        let loaded = store.get(&created.id).await?;
        assert_eq!(loaded, created);

        let stored_chunks = store.chunks_for_document(&created.id).await?;
        assert_eq!(stored_chunks.len(), 2);
        assert_eq!(stored_chunks[0].chunk_index, 0);
        assert_eq!(stored_chunks[1].chunk_index, 1);
        assert_eq!(stored_chunks[1].page_number, 2);
        Ok(())
    }

    #[tokio::test]
    async fn list_is_newest_first() -> Result<(), Box<dyn std::error::Error>> {
        let (store, _dir) = open_store().await?;
        store.create(new_document("old.pdf", 0), &[]).await?;
        store.create(new_document("new.pdf", 30), &[]).await?;

        let names = store
            .list()
            .await?
            .into_iter()
            .map(|doc| doc.original_name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["new.pdf", "old.pdf"]);
        Ok(())
    }

    #[tokio::test]
    async fn search_matches_cyrillic_case_insensitively() -> Result<(), Box<dyn std::error::Error>> {
        let (store, _dir) = open_store().await?;
        store
            .create(new_document("b.pdf", 0), &chunks(&[("Требования ГОСТ к изделию", 3)]))
            .await?;
        store
            .create(
                new_document("a.pdf", 1),
                &chunks(&[("по гост 2.105", 5), ("ничего", 6), ("Гост снова", 2)]),
            )
            .await?;

        let found = store.search_chunks(&ChunkQuery::new("гОсТ")).await?;
        let order = found
            .iter()
            .map(|(chunk, doc)| (doc.original_name.as_str(), chunk.page_number))
            .collect::<Vec<_>>();
        assert_eq!(order, vec![("a.pdf", 2), ("a.pdf", 5), ("b.pdf", 3)]);
        Ok(())
    }

    #[tokio::test]
    async fn search_can_be_scoped_to_one_document() -> Result<(), Box<dyn std::error::Error>> {
        let (store, _dir) = open_store().await?;
        let first = store
            .create(new_document("a.pdf", 0), &chunks(&[("pump 100%", 1)]))
            .await?;
        store
            .create(new_document("b.pdf", 0), &chunks(&[("pump", 1)]))
            .await?;

        let scoped = store
            .search_chunks(&ChunkQuery::new("PUMP").scoped(Some(first.id.clone())))
            .await?;
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].1.id, first.id);

        // Wildcards in the needle are literal.
        let literal = store.search_chunks(&ChunkQuery::new("%")).await?;
        assert_eq!(literal.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn delete_removes_chunks_and_reports_missing() -> Result<(), Box<dyn std::error::Error>> {
        let (store, _dir) = open_store().await?;
        let created = store
            .create(new_document("a.pdf", 0), &chunks(&[("x", 1), ("y", 1)]))
            .await?;

        let removed = store.delete(&created.id).await?;
        assert_eq!(removed.filename, "stored_a.pdf");
        assert!(store.chunks_for_document(&created.id).await?.is_empty());
        assert!(store.search_chunks(&ChunkQuery::new("x")).await?.is_empty());

        let second = store.delete(&created.id).await;
        assert!(matches!(second, Err(StoreError::NotFound(_))));
        assert!(matches!(store.get(&created.id).await, Err(StoreError::NotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn failed_create_rolls_back_document_and_chunks() -> Result<(), Box<dyn std::error::Error>> {
        let (store, _dir) = open_store().await?;
        sqlx::query(
            "CREATE TRIGGER reject_second_chunk BEFORE INSERT ON document_chunks \
             WHEN NEW.chunk_index = 1 BEGIN SELECT RAISE(ABORT, 'chunk rejected'); END",
        )
        .execute(&store.pool)
        .await?;

        let result = store
            .create(new_document("a.pdf", 0), &chunks(&[("first", 1), ("second", 2)]))
            .await;
        assert!(matches!(result, Err(StoreError::Database(_))));

        assert!(store.list().await?.is_empty());
        assert!(store.search_chunks(&ChunkQuery::new("first")).await?.is_empty());
        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM document_chunks")
            .fetch_one(&store.pool)
            .await?;
        assert_eq!(orphans, 0);
        Ok(())
    }
}
