use anyhow::{ anyhow, Result };
use log::info;
use std::path::Path;
use std::sync::Arc;

use cisforge::config::ForgeConfig;
use cisforge::errors::{ ForgeError, RecoverableError };
use cisforge::implementations::ansible::AnsibleNavigator;
use cisforge::implementations::llm::HttpLlmClient;
use cisforge::implementations::retriever::{ CheckpointRetriever, CheckpointStore };
use cisforge::implementations::workflow::{
    AcceptAll,
    ForgeContext,
    GenerateOptions,
    RequirementReview,
};

use crate::cli::commands::load_vector_store;
use crate::cli::ui::{ self, InteractivePrompt, InteractiveReview };

/// Generate command: process checkpoints one after another, asking for ids
/// interactively when none are given
pub async fn execute(
    config: ForgeConfig,
    checkpoints: &[String],
    all: bool,
    store_path: Option<&Path>,
    index_path: Option<&Path>,
    options: GenerateOptions,
    interactive: bool
) -> Result<()> {
    ui::print_header("Generating Compliance Audit Playbooks");

    if store_path.is_none() && index_path.is_none() {
        return Err(anyhow!("Provide --store and/or --index"));
    }
    let store = store_path.map(CheckpointStore::from_file).transpose()?;

    let ids: Vec<String> = if all {
        store
            .as_ref()
            .map(|s| s.ids())
            .ok_or_else(|| anyhow!("--all needs a record store (--store)"))?
    } else {
        checkpoints.to_vec()
    };
    let prompted = !all && ids.is_empty();
    if (prompted && !interactive) || (all && ids.is_empty()) {
        return Err(anyhow!("No checkpoints to process; pass --checkpoint <id> or --all"));
    }
    if all && interactive && !ui::confirm_action(&format!("Process all {} checkpoints?", ids.len()))? {
        ui::print_info("Cancelled");
        return Ok(());
    }

    let vector_store = index_path.map(|path| load_vector_store(&config, path)).transpose()?;
    let llm = HttpLlmClient::new(config.generator.clone())?;
    let runner = AnsibleNavigator::locate(config.tools.navigator_path.as_deref())?;
    let context = ForgeContext::new(
        Arc::new(llm),
        CheckpointRetriever::new(store, vector_store),
        Arc::new(runner),
        config
    );

    ui::print_result("Target host", &options.target_host);
    ui::print_result("Test host", options.test_host());
    ui::print_result("Output directory", &options.output_dir.display().to_string());

    let reviewer: &dyn RequirementReview = if interactive { &InteractiveReview } else { &AcceptAll };
    let (results, requested) = if prompted {
        let results = context.process_prompted(&InteractivePrompt, &options, reviewer).await;
        let requested = results.len();
        (results, requested)
    } else {
        info!("Processing {} checkpoint(s)", ids.len());
        (context.process_batch(&ids, &options, reviewer).await, ids.len())
    };

    ui::print_header("Summary");
    let mut failed = 0;
    for (id, result) in &results {
        match result {
            // Prompted outcomes were printed as each checkpoint finished
            Ok(outcome) if prompted => ui::print_success(&format!("{} validated", outcome.checkpoint.id)),
            Ok(outcome) => ui::print_outcome(outcome),
            Err(ForgeError::Skipped(_)) => ui::print_info(&format!("{} skipped", id)),
            Err(e) => {
                failed += 1;
                ui::print_error(&format!("{}: {}", id, e));
                if let Some(hint) = e.recovery_strategy().filter(|_| !prompted) {
                    ui::print_info(&hint);
                }
            }
        }
    }
    let not_reached = requested - results.len();
    if not_reached > 0 {
        ui::print_warning(&format!("{} checkpoint(s) not processed", not_reached));
    }

    if failed > 0 || not_reached > 0 {
        return Err(anyhow!("{} of {} checkpoint(s) failed", failed + not_reached, requested));
    }
    ui::print_success(&format!("All {} checkpoint(s) processed", results.len()));
    Ok(())
}
