use anyhow::{ anyhow, Result };
use std::path::Path;

use cisforge::config::ForgeConfig;
use cisforge::errors::ForgeError;
use cisforge::implementations::llm::HttpLlmClient;
use cisforge::implementations::retriever::{ checkpoint_id_of, CheckpointRetriever, CheckpointStore };

use crate::cli::commands::load_vector_store;
use crate::cli::ui;

/// Show command: print the sections of one checkpoint
pub async fn execute(
    config: &ForgeConfig,
    query: &str,
    store_path: Option<&Path>,
    index_path: Option<&Path>
) -> Result<()> {
    if store_path.is_none() && index_path.is_none() {
        return Err(anyhow!("Provide --store and/or --index"));
    }
    let checkpoint_id = checkpoint_id_of(query).ok_or_else(||
        anyhow!("'{}' does not start with a checkpoint id", query)
    )?;

    if let Some(path) = store_path {
        let store = CheckpointStore::from_file(path)?;
        match store.find(&checkpoint_id) {
            Ok(checkpoint) => {
                ui::print_checkpoint(&checkpoint);
                return Ok(());
            }
            Err(ForgeError::CheckpointNotFound(_)) if index_path.is_some() => {
                ui::print_info(&format!("{} is not in the record store, searching the index", checkpoint_id));
            }
            Err(e) => {
                return Err(e.into());
            }
        }
    }

    let Some(index_path) = index_path else {
        return Err(anyhow!("Checkpoint {} not found", checkpoint_id));
    };
    let retriever = CheckpointRetriever::new(None, Some(load_vector_store(config, index_path)?));
    let llm = HttpLlmClient::new(config.generator.clone())?;

    let spinner = ui::spinner_with_message("Retrieving checkpoint...");
    let result = retriever.retrieve(query, &llm, &config.generator).await;
    spinner.finish_and_clear();

    ui::print_checkpoint(&result?);
    Ok(())
}
