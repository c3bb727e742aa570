use async_trait::async_trait;
use serde::{ Deserialize, Serialize };

use crate::errors::ForgeResult;

/// A chunk of benchmark text returned by similarity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub text: String,
    /// Character offset of the chunk in the source document
    pub start_index: usize,
}

/// Turns text into embedding vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> ForgeResult<Vec<Vec<f32>>>;

    fn model(&self) -> &str;
}

/// Top-k similarity search over benchmark chunks
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn similarity_search(&self, query: &str, k: usize) -> ForgeResult<Vec<DocumentChunk>>;
}
