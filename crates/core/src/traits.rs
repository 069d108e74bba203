use crate::error::{SearchError, ServiceError};
use async_trait::async_trait;

/// Turns text into fixed-dimension vectors.
///
/// Documents and queries are embedded separately because hosted models tune
/// the vector for the retrieval side it will be used on.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ServiceError>;
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str, temperature: f64) -> Result<String, ServiceError>;
}

/// Nearest-neighbour lookup over the chunks of the current document set.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Chunk contents ordered from most to least similar to `query`.
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<String>, SearchError>;
}
