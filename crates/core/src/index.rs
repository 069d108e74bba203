use crate::error::{IngestError, SearchError, ServiceError};
use crate::models::SourceSummary;
use crate::traits::{Embedder, VectorSearch};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub content: String,
    pub vector: Vec<f32>,
}

/// Flat vector index over the chunks of one document set, searched by
/// exhaustive Euclidean distance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingIndex {
    pub embedding_model: String,
    pub dimensions: usize,
    pub built_at: DateTime<Utc>,
    pub sources: Vec<SourceSummary>,
    entries: Vec<IndexEntry>,
}

impl EmbeddingIndex {
    pub async fn build<E>(
        chunks: Vec<String>,
        sources: Vec<SourceSummary>,
        embedder: &E,
    ) -> Result<Self, IngestError>
    where
        E: Embedder + ?Sized,
    {
        info!(chunk_count = chunks.len(), model = embedder.model_name(), "embedding chunks");
        let vectors = embedder.embed_documents(&chunks).await?;

        if vectors.len() != chunks.len() {
            return Err(IngestError::Embedding(ServiceError::EmptyResponse {
                backend: embedder.model_name().to_string(),
                details: format!(
                    "embedding count {} doesn't match chunk count {}",
                    vectors.len(),
                    chunks.len()
                ),
            }));
        }

        let dimensions = vectors.first().map(Vec::len).unwrap_or_default();
        if let Some(mismatch) = vectors.iter().find(|vector| vector.len() != dimensions) {
            return Err(IngestError::Embedding(ServiceError::EmptyResponse {
                backend: embedder.model_name().to_string(),
                details: format!("embedding dimension {} != {}", mismatch.len(), dimensions),
            }));
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(content, vector)| IndexEntry { content, vector })
            .collect();

        Ok(Self {
            embedding_model: embedder.model_name().to_string(),
            dimensions,
            built_at: Utc::now(),
            sources,
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.content.as_str())
    }

    /// The `k` entries closest to `query_vector`, nearest first. Equal
    /// distances keep index order.
    pub fn nearest(&self, query_vector: &[f32], k: usize) -> Vec<(&str, f32)> {
        let mut scored = self
            .entries
            .iter()
            .map(|entry| (entry.content.as_str(), squared_l2(&entry.vector, query_vector)))
            .collect::<Vec<_>>();

        scored.sort_by(|left, right| left.1.total_cmp(&right.1));
        scored.truncate(k);
        scored
    }

    /// Checks what deserialization cannot: every vector has the declared size.
    pub(crate) fn validate(&self) -> Result<(), String> {
        for (position, entry) in self.entries.iter().enumerate() {
            if entry.vector.len() != self.dimensions {
                return Err(format!(
                    "entry {position} has {} dimensions, index declares {}",
                    entry.vector.len(),
                    self.dimensions
                ));
            }
        }
        Ok(())
    }
}

fn squared_l2(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .zip(right)
        .map(|(a, b)| {
            let delta = a - b;
            delta * delta
        })
        .sum()
}

/// A loaded index paired with the embedder that produced it.
pub struct IndexSearcher<'a, E: ?Sized> {
    index: Arc<EmbeddingIndex>,
    embedder: &'a E,
}

impl<'a, E> IndexSearcher<'a, E>
where
    E: Embedder + ?Sized,
{
    pub fn new(index: Arc<EmbeddingIndex>, embedder: &'a E) -> Self {
        Self { index, embedder }
    }

    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }
}

#[async_trait]
impl<'a, E> VectorSearch for IndexSearcher<'a, E>
where
    E: Embedder + ?Sized,
{
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<String>, SearchError> {
        if k == 0 || self.index.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self
            .embedder
            .embed_query(query)
            .await
            .map_err(SearchError::Embedding)?;

        if query_vector.len() != self.index.dimensions {
            return Err(SearchError::IndexLoad(format!(
                "query vector has {} dimensions but the index was built with {} ({})",
                query_vector.len(),
                self.index.dimensions,
                self.index.embedding_model
            )));
        }

        let hits = self
            .index
            .nearest(&query_vector, k)
            .into_iter()
            .map(|(content, _)| content.to_string())
            .collect::<Vec<_>>();
        debug!(k, hits = hits.len(), "similarity search");
        Ok(hits)
    }
}
