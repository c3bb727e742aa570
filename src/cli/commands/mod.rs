pub mod repair;
pub mod parse;
pub mod index;
pub mod show;
pub mod generate;

use anyhow::{ anyhow, Result };
use std::fs;
use std::path::Path;

/// Read an input document, with a clear message when it is missing
pub fn read_input(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(anyhow!("Input file not found: {}", path.display()));
    }
    fs::read_to_string(path).map_err(|e| anyhow!("Failed to read {}: {}", path.display(), e))
}

use cisforge::config::ForgeConfig;
use cisforge::implementations::vector_index::{ FlatVectorStore, HttpEmbedder, PersistedIndex };
use cisforge::traits::VectorStore;

/// Vector store over a persisted index, querying the configured embedding service
pub fn load_vector_store(config: &ForgeConfig, index: &Path) -> Result<Box<dyn VectorStore>> {
    let index = PersistedIndex::load(index)?;
    let embedder = HttpEmbedder::new(&config.generator)?;
    Ok(Box::new(FlatVectorStore::new(index, Box::new(embedder))))
}
