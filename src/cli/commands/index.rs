use anyhow::Result;
use std::path::Path;

use cisforge::config::ForgeConfig;
use cisforge::implementations::vector_index::{ HttpEmbedder, PersistedIndex };

use crate::cli::commands::read_input;
use crate::cli::ui;

/// Index command: chunk, embed and persist the benchmark text
pub async fn execute(config: &ForgeConfig, input: &Path, output: &Path) -> Result<()> {
    ui::print_header("Building Embedding Index");

    let text = read_input(input)?;
    let embedder = HttpEmbedder::new(&config.generator)?;

    let spinner = ui::spinner_with_message("Embedding document chunks...");
    let index = match PersistedIndex::build(&text, &embedder).await {
        Ok(index) => index,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e.into());
        }
    };
    spinner.finish_with_message(format!("Embedded {} chunks", index.entries.len()));

    index.save(output)?;
    ui::print_result("Model", &index.model);
    ui::print_success(&format!("Index written to {}", output.display()));
    Ok(())
}
