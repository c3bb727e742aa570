pub mod llm_client;
pub mod vector_store;
pub mod playbook_runner;

// Re-export traits
pub use llm_client::LlmClient;
pub use vector_store::{ DocumentChunk, Embedder, VectorStore };
pub use playbook_runner::PlaybookRunner;
