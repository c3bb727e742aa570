use anyhow::Result;
use log::info;
use std::fs;
use std::path::Path;

use cisforge::implementations::line_repair::clean_document;

use crate::cli::commands::read_input;
use crate::cli::ui;

/// Text repair command
pub async fn execute(input: &Path, output: &Path, no_repair: bool) -> Result<()> {
    ui::print_header("Repairing Benchmark Text");

    let text = read_input(input)?;
    let cleaned = clean_document(&text, !no_repair);
    info!(
        "{} lines in, {} lines out",
        text.lines().count(),
        cleaned.lines().count()
    );

    fs::write(output, &cleaned)?;
    ui::print_success(&format!("Cleaned text written to {}", output.display()));
    Ok(())
}
