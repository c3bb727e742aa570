use anyhow::Result;
use std::fs;
use std::path::Path;

use cisforge::implementations::document_parser::DocumentParser;

use crate::cli::commands::read_input;
use crate::cli::ui;

/// Parse command: benchmark text to checkpoint records or an id listing
pub async fn execute(input: &Path, output: Option<&Path>, id_only: bool) -> Result<()> {
    let text = read_input(input)?;
    let parser = DocumentParser::new();

    let rendered = if id_only {
        let mut listing = parser
            .index(&text)
            .into_iter()
            .map(|(id, title)| format!("{} {}", id, title))
            .collect::<Vec<_>>()
            .join("\n");
        listing.push('\n');
        listing
    } else {
        let checkpoints = parser.parse(&text);
        if checkpoints.is_empty() {
            ui::print_warning("No checkpoints found in the input");
        }
        parser.to_json(&checkpoints)?
    };

    match output {
        Some(path) => {
            fs::write(path, &rendered)?;
            ui::print_success(&format!("Wrote {}", path.display()));
        }
        None => print!("{}", rendered),
    }
    Ok(())
}
