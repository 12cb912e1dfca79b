use crate::models::{ChunkQuery, Document, DocumentChunk, NewDocument, TextChunk};
use crate::StoreError;
use async_trait::async_trait;

/// Persistent home of documents and their chunks.
///
/// Implementations must make `create` and `delete` all-or-nothing: a
/// document is visible to readers together with all of its chunks or not
/// at all.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Stores the document and its chunks, numbering chunks from 0 in the given order.
    async fn create(&self, document: NewDocument, chunks: &[TextChunk])
        -> Result<Document, StoreError>;

    async fn get(&self, id: &str) -> Result<Document, StoreError>;

    /// All documents, newest upload first.
    async fn list(&self) -> Result<Vec<Document>, StoreError>;

    /// Removes the document and its chunks and returns the removed row so the
    /// caller can delete the backing file.
    async fn delete(&self, id: &str) -> Result<Document, StoreError>;

    async fn chunks_for_document(&self, id: &str) -> Result<Vec<DocumentChunk>, StoreError>;

    /// Chunks containing the query needle (case-insensitive), ordered by document
    /// display name, document id, page number and chunk index.
    async fn search_chunks(
        &self,
        query: &ChunkQuery,
    ) -> Result<Vec<(DocumentChunk, Document)>, StoreError>;
}

#[async_trait]
impl<S> DocumentStore for std::sync::Arc<S>
where
    S: DocumentStore + ?Sized,
{
    async fn create(
        &self,
        document: NewDocument,
        chunks: &[TextChunk],
    ) -> Result<Document, StoreError> {
        (**self).create(document, chunks).await
    }

    async fn get(&self, id: &str) -> Result<Document, StoreError> {
        (**self).get(id).await
    }

    async fn list(&self) -> Result<Vec<Document>, StoreError> {
        (**self).list().await
    }

    async fn delete(&self, id: &str) -> Result<Document, StoreError> {
        (**self).delete(id).await
    }

    async fn chunks_for_document(&self, id: &str) -> Result<Vec<DocumentChunk>, StoreError> {
        (**self).chunks_for_document(id).await
    }

    async fn search_chunks(
        &self,
        query: &ChunkQuery,
    ) -> Result<Vec<(DocumentChunk, Document)>, StoreError> {
        (**self).search_chunks(query).await
    }
}
