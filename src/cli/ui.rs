use colored::*;
use console::Term;
use dialoguer::{ theme::ColorfulTheme, Confirm, Input };
use indicatif::{ ProgressBar, ProgressStyle };
use std::time::Duration;
use textwrap::wrap;

use cisforge::errors::{ ForgeError, ForgeResult, RecoverableError };
use cisforge::implementations::workflow::{ CheckpointOutcome, CheckpointPrompt, RequirementReview };
use cisforge::models::{
    Checkpoint,
    ComplianceStatus,
    ExecutionReport,
    RequirementSet,
    SectionKind,
    ValidationResult,
};

/// UI theme for consistent appearance
pub fn get_theme() -> ColorfulTheme {
    ColorfulTheme::default()
}

/// Print a section header
pub fn print_header(title: &str) {
    let title = format!(" {} ", title);
    println!("\n{}\n", title.bold().white().on_blue());
}

/// Print text with proper wrapping
pub fn print_text(text: &str) {
    let width = Term::stdout().size().1 as usize;
    for line in text.lines() {
        if line.starts_with('#') || line.starts_with("  ") || line.starts_with('{') {
            // scripts and commands keep their layout
            println!("{}", line);
        } else if line.is_empty() {
            println!();
        } else {
            for wrapped_line in wrap(line, width.saturating_sub(10).max(40)) {
                println!("{}", wrapped_line);
            }
        }
    }
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "ERROR:".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "WARNING:".yellow().bold(), message);
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "SUCCESS:".green().bold(), message);
}

/// Print information
pub fn print_info(message: &str) {
    println!("{} {}", "INFO:".blue().bold(), message);
}

/// Print a formatted result
pub fn print_result(label: &str, value: &str) {
    println!("{}: {}", label.bold(), value);
}

/// Print a compliance status with color
pub fn print_compliance_status(label: &str, status: ComplianceStatus) {
    let text = status.report_label();
    let colored_status = match status {
        ComplianceStatus::Pass => text.green().bold(),
        ComplianceStatus::Fail => text.red().bold(),
        ComplianceStatus::NotApplicable => text.cyan().bold(),
        ComplianceStatus::Unknown => text.yellow().bold(),
    };
    println!("{}: {}", label.bold(), colored_status);
}

/// Print every non-empty section of a checkpoint
pub fn print_checkpoint(checkpoint: &Checkpoint) {
    print_header(&format!("{} {}", checkpoint.id, checkpoint.title));
    for kind in SectionKind::ALL {
        let text = checkpoint.section(kind);
        if text.trim().is_empty() {
            continue;
        }
        println!("{}", kind.label().cyan().bold());
        print_text(text);
        println!();
    }
}

pub fn print_requirements(requirements: &RequirementSet) {
    print_result("Objective", &requirements.objective);
    for (i, requirement) in requirements.requirements.iter().enumerate() {
        let first_line = requirement.lines().next().unwrap_or_default();
        println!("  {} {}", format!("{}.", i + 1).bold(), first_line);
    }
}

/// One line per validation stage that ran
pub fn print_validation_results(results: &[ValidationResult]) {
    for result in results {
        let mark = if result.passed { "✓".green().bold() } else { "✗".red().bold() };
        println!("  {} stage {}: {}", mark, result.stage.number(), result.stage);
    }
}

pub fn print_execution_report(report: &ExecutionReport) {
    print_result("Target host", &report.host);
    for (number, status) in &report.requirements {
        print_compliance_status(&format!("  Requirement {}", number), *status);
    }
    print_compliance_status("Overall compliance", report.overall);
    if !report.success {
        print_warning("The final run reported failed tasks or a non-zero exit code");
    }
}

pub fn print_outcome(outcome: &CheckpointOutcome) {
    print_success(
        &format!(
            "{} validated after {} attempt(s)",
            outcome.checkpoint.id,
            outcome.attempts.len()
        )
    );
    print_result("Playbook", &outcome.playbook_path.display().to_string());
    if let Some(attempt) = outcome.attempts.last() {
        print_validation_results(&attempt.results);
    }
    match &outcome.execution {
        Some(report) => print_execution_report(report),
        None => print_info("Final execution skipped"),
    }
}

/// Confirm an action with the user
pub fn confirm_action(prompt: &str) -> std::io::Result<bool> {
    Confirm::with_theme(&get_theme())
        .with_prompt(prompt)
        .default(true)
        .interact()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
}

/// Display a spinner while waiting for an operation to complete
pub fn spinner_with_message(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.green} {msg}")
            .unwrap()
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn prompt_line(prompt: &str) -> std::io::Result<String> {
    Input::with_theme(&get_theme())
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
}

fn print_review_help() {
    println!("  {}      accept the list and start generating", "ENTER/done".bold());
    println!("  {}            skip this checkpoint", "skip".bold());
    println!("  {}             append a requirement", "add".bold());
    println!("  {}          replace requirement N", "edit N".bold());
    println!("  {}        remove requirement N", "delete N".bold());
}

/// Requirement number from `edit 3` / `delete 3`, checked against the list
fn requirement_index(argument: &str, len: usize) -> Option<usize> {
    argument
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|n| *n >= 1 && *n <= len)
        .map(|n| n - 1)
}

/// Lets the user edit the extracted requirements before generation
pub struct InteractiveReview;

impl RequirementReview for InteractiveReview {
    fn review(
        &self,
        checkpoint: &Checkpoint,
        mut requirements: RequirementSet
    ) -> ForgeResult<Option<RequirementSet>> {
        print_header(&format!("Requirements for {}", checkpoint.id));
        loop {
            print_requirements(&requirements);
            let command = prompt_line("Review (ENTER to accept, help for commands)")?;
            let command = command.trim();
            let (verb, argument) = command.split_once(' ').unwrap_or((command, ""));

            match verb.to_lowercase().as_str() {
                "" | "done" => {
                    return Ok(Some(requirements));
                }
                "skip" => {
                    print_warning(&format!("Skipping {}", checkpoint.id));
                    return Ok(None);
                }
                "add" => {
                    let text = prompt_line("New requirement")?;
                    if !text.trim().is_empty() {
                        requirements.requirements.push(text.trim().to_string());
                    }
                }
                "edit" =>
                    match requirement_index(argument, requirements.len()) {
                        Some(i) => {
                            let text = prompt_line(&format!("Requirement {}", i + 1))?;
                            if !text.trim().is_empty() {
                                requirements.requirements[i] = text.trim().to_string();
                            }
                        }
                        None => print_warning("Usage: edit N, with N a listed requirement"),
                    }
                "delete" =>
                    match requirement_index(argument, requirements.len()) {
                        Some(i) => {
                            requirements.requirements.remove(i);
                            if requirements.is_empty() {
                                print_warning("The list is empty; add a requirement or skip");
                            }
                        }
                        None => print_warning("Usage: delete N, with N a listed requirement"),
                    }
                "help" => print_review_help(),
                other => print_warning(&format!("Unknown command: {}", other)),
            }
        }
    }
}

/// Reads checkpoint ids from the terminal until an empty line or `quit`
pub struct InteractivePrompt;

impl CheckpointPrompt for InteractivePrompt {
    fn next_checkpoint(&self) -> ForgeResult<Option<String>> {
        let answer = prompt_line("Checkpoint id (ENTER or quit to finish)")?;
        let id = answer.trim();
        if id.is_empty() || ["quit", "exit", "q"].iter().any(|w| id.eq_ignore_ascii_case(w)) {
            return Ok(None);
        }
        Ok(Some(id.to_string()))
    }

    fn completed(&self, checkpoint_id: &str, result: &ForgeResult<CheckpointOutcome>) {
        match result {
            Ok(outcome) => print_outcome(outcome),
            Err(ForgeError::Skipped(_)) => print_info(&format!("{} skipped", checkpoint_id)),
            Err(e) => {
                print_error(&format!("{}: {}", checkpoint_id, e));
                if let Some(hint) = e.recovery_strategy() {
                    print_info(&hint);
                }
            }
        }
    }
}
