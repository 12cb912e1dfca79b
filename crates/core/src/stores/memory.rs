//! In-memory [`DocumentStore`] for tests and throwaway sessions.
//!
//! Documents and chunks sit behind one lock so a document and its chunks
//! appear and disappear together.

use crate::models::{fold_case, ChunkQuery, Document, DocumentChunk, NewDocument, TextChunk};
use crate::traits::DocumentStore;
use crate::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    documents: HashMap<String, Document>,
    chunks: HashMap<String, Vec<DocumentChunk>>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn create(
        &self,
        document: NewDocument,
        chunks: &[TextChunk],
    ) -> Result<Document, StoreError> {
        let id = Uuid::new_v4().to_string();
        let stored_chunks = chunks
            .iter()
            .enumerate()
            .map(|(index, chunk)| DocumentChunk {
                document_id: id.clone(),
                chunk_index: index as u64,
                page_number: chunk.page_number,
                text: chunk.text.clone(),
            })
            .collect();
        let document = Document::from_new(id.clone(), document);

        let mut state = self.state.write().await;
        state.documents.insert(id.clone(), document.clone());
        state.chunks.insert(id, stored_chunks);
        Ok(document)
    }

    async fn get(&self, id: &str) -> Result<Document, StoreError> {
        self.state
            .read()
            .await
            .documents
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list(&self) -> Result<Vec<Document>, StoreError> {
        let mut documents = self
            .state
            .read()
            .await
            .documents
            .values()
            .cloned()
            .collect::<Vec<_>>();
        documents.sort_by(|left, right| {
            right
                .uploaded_at
                .cmp(&left.uploaded_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(documents)
    }

    async fn delete(&self, id: &str) -> Result<Document, StoreError> {
        let mut state = self.state.write().await;
        let document = state
            .documents
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        state.chunks.remove(id);
        Ok(document)
    }

    async fn chunks_for_document(&self, id: &str) -> Result<Vec<DocumentChunk>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .chunks
            .get(id)
            .cloned()
            .unwrap_or_default())
    }

    async fn search_chunks(
        &self,
        query: &ChunkQuery,
    ) -> Result<Vec<(DocumentChunk, Document)>, StoreError> {
        let needle = query.folded_needle();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let state = self.state.read().await;
        let mut found = Vec::new();
        for (document_id, chunks) in &state.chunks {
            if query
                .document_id
                .as_ref()
                .is_some_and(|scope| scope != document_id)
            {
                continue;
            }
            let Some(document) = state.documents.get(document_id) else {
                continue;
            };
            for chunk in chunks {
                if fold_case(&chunk.text).contains(&needle) {
                    found.push((chunk.clone(), document.clone()));
                }
            }
        }

        found.sort_by(|(left_chunk, left_doc), (right_chunk, right_doc)| {
            left_doc
                .original_name
                .cmp(&right_doc.original_name)
                .then_with(|| left_doc.id.cmp(&right_doc.id))
                .then_with(|| left_chunk.page_number.cmp(&right_chunk.page_number))
                .then_with(|| left_chunk.chunk_index.cmp(&right_chunk.chunk_index))
        });
        Ok(found)
    }
}
