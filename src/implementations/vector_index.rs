use async_trait::async_trait;
use log::{ debug, info, warn };
use serde::{ Deserialize, Serialize };
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::errors::{ ForgeError, ForgeResult };
use crate::implementations::config::GeneratorConfig;
use crate::traits::vector_store::{ DocumentChunk, Embedder, VectorStore };

pub const CHUNK_SIZE: usize = 2000;
pub const CHUNK_OVERLAP: usize = 500;
const EMBED_BATCH_SIZE: usize = 64;

/// Split text into overlapping chunks of at most `size` characters.
///
/// A chunk boundary is moved back to the last paragraph break, line break or
/// space in the second half of the window, so scripts and sentences are cut
/// as rarely as possible. Offsets are character offsets.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<DocumentChunk> {
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    if chars.is_empty() || size == 0 {
        return chunks;
    }
    let overlap = overlap.min(size.saturating_sub(1));

    let mut start = 0;
    while start < chars.len() {
        let mut end = (start + size).min(chars.len());
        if end < chars.len() {
            let window = &chars[start..end];
            let min_cut = size / 2;
            let cut = [
                find_break(window, &['\n', '\n']),
                window.iter().rposition(|c| *c == '\n'),
                window.iter().rposition(|c| *c == ' '),
            ]
                .into_iter()
                .flatten()
                .find(|pos| *pos >= min_cut);
            if let Some(pos) = cut {
                end = start + pos + 1;
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        if !chunk.trim().is_empty() {
            chunks.push(DocumentChunk { text: chunk, start_index: start });
        }

        if end >= chars.len() {
            break;
        }
        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }

    chunks
}

/// Position of the last character of the last occurrence of `pattern`
fn find_break(window: &[char], pattern: &[char]) -> Option<usize> {
    if window.len() < pattern.len() {
        return None;
    }
    (0..=window.len() - pattern.len())
        .rev()
        .find(|&i| window[i..i + pattern.len()] == *pattern)
        .map(|i| i + pattern.len() - 1)
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: DocumentChunk,
    pub embedding: Vec<f32>,
}

/// Flat embedding index persisted as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedIndex {
    pub model: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub entries: Vec<IndexEntry>,
}

impl PersistedIndex {
    /// Chunk and embed a document
    pub async fn build(text: &str, embedder: &dyn Embedder) -> ForgeResult<Self> {
        let chunks = chunk_text(text, CHUNK_SIZE, CHUNK_OVERLAP);
        info!("Created {} document chunks", chunks.len());

        let mut entries = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch
                .iter()
                .map(|c| c.text.clone())
                .collect();
            let embeddings = embedder.embed(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(
                    ForgeError::RetrievalError(
                        format!(
                            "Embedding service returned {} vectors for {} chunks",
                            embeddings.len(),
                            batch.len()
                        )
                    )
                );
            }
            entries.extend(
                batch
                    .iter()
                    .cloned()
                    .zip(embeddings)
                    .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            );
            debug!("Embedded {}/{} chunks", entries.len(), chunks.len());
        }

        Ok(Self {
            model: embedder.model().to_string(),
            chunk_size: CHUNK_SIZE,
            chunk_overlap: CHUNK_OVERLAP,
            created_at: chrono::Utc::now(),
            entries,
        })
    }

    pub fn load(path: &Path) -> ForgeResult<Self> {
        if !path.exists() {
            return Err(ForgeError::InputNotFound(path.display().to_string()));
        }
        let contents = fs::read_to_string(path)?;
        let index: PersistedIndex = serde_json::from_str(&contents)?;
        if index.entries.is_empty() {
            warn!("Vector index {} has no entries", path.display());
        }
        info!("Vector index loaded with {} chunks", index.entries.len());
        Ok(index)
    }

    pub fn save(&self, path: &Path) -> ForgeResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    /// Entries ranked by similarity to `query_embedding`, best first
    pub fn nearest(&self, query_embedding: &[f32], k: usize) -> Vec<DocumentChunk> {
        let mut scored: Vec<(f32, &IndexEntry)> = self.entries
            .iter()
            .map(|entry| (cosine_similarity(query_embedding, &entry.embedding), entry))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(k)
            .map(|(_, entry)| entry.chunk.clone())
            .collect()
    }
}

/// Vector store backed by a [`PersistedIndex`]
pub struct FlatVectorStore {
    index: PersistedIndex,
    embedder: Box<dyn Embedder>,
}

impl FlatVectorStore {
    pub fn new(index: PersistedIndex, embedder: Box<dyn Embedder>) -> Self {
        if index.model != embedder.model() {
            warn!(
                "Index was built with {} but queries use {}",
                index.model,
                embedder.model()
            );
        }
        Self { index, embedder }
    }
}

#[async_trait]
impl VectorStore for FlatVectorStore {
    async fn similarity_search(&self, query: &str, k: usize) -> ForgeResult<Vec<DocumentChunk>> {
        let mut embeddings = self.embedder.embed(&[query.to_string()]).await?;
        let query_embedding = embeddings
            .pop()
            .ok_or_else(|| ForgeError::RetrievalError("Empty embedding for query".to_string()))?;
        Ok(self.index.nearest(&query_embedding, k))
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint
pub struct HttpEmbedder {
    http_client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpEmbedder {
    pub fn new(config: &GeneratorConfig) -> ForgeResult<Self> {
        let api = &config.embedding_api;
        let endpoint = api.api_endpoint
            .clone()
            .ok_or_else(|| ForgeError::ConfigError("embedding_api.api_endpoint is not set".to_string()))?;
        let model = api.model.clone().unwrap_or_else(|| "all-MiniLM-L6-v2".to_string());
        // Local embedding servers usually need no key.
        let api_key = config
            .get_api_key(api)
            .ok()
            .map(|(_, key)| key);
        let http_client = reqwest::Client
            ::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.unwrap_or(180)))
            .build()
            .map_err(|e| ForgeError::RetrievalError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client, endpoint, model, api_key })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> ForgeResult<Vec<Vec<f32>>> {
        let mut request = self.http_client
            .post(&self.endpoint)
            .json(&(EmbeddingRequest { model: &self.model, input: texts }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send().await
            .map_err(|e| ForgeError::RetrievalError(format!("Embedding request failed: {}", e)))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ForgeError::RetrievalError(format!("Embedding HTTP {}: {}", status, message)));
        }

        let mut body: EmbeddingResponse = response
            .json().await
            .map_err(|e| ForgeError::RetrievalError(format!("Invalid embedding response: {}", e)))?;
        body.data.sort_by_key(|d| d.index);
        Ok(
            body.data
                .into_iter()
                .map(|d| d.embedding)
                .collect()
        )
    }

    fn model(&self) -> &str {
        &self.model
    }
}
