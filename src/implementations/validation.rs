use log::{ debug, info, warn };
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use crate::config::ForgeConfig;
use crate::errors::{ ForgeError, ForgeResult };
use crate::implementations::ansible::filter_verbose_task_output;
use crate::implementations::config::{ render_template, COMPLIANCE_ANALYSIS_TEMPLATE };
use crate::implementations::report::{ is_unevaluated_status, ComplianceAnalysis, ComplianceReport };
use crate::models::attempt::{ GenerationAttempt, ValidationResult, ValidationStage };
use crate::models::execution::{ RunOptions, ToolOutput };
use crate::models::requirement::RequirementSet;
use crate::models::status::ComplianceStatus;
use crate::traits::llm_client::LlmClient;
use crate::traits::playbook_runner::PlaybookRunner;

/// A known playbook bug, recognized by a substring of the run output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BugRule {
    pub pattern: &'static str,
    pub category: &'static str,
}

const fn rule(pattern: &'static str, category: &'static str) -> BugRule {
    BugRule { pattern, category }
}

/// Evaluated top to bottom; the first match wins.
pub const BUG_RULES: &[BugRule] = &[
    rule("undefined variable", "Undefined variable error"),
    rule("is undefined", "Variable is undefined"),
    rule("'dict object' has no attribute", "Invalid attribute access"),
    rule("Syntax Error while loading YAML", "YAML syntax error"),
    rule("template error while templating string", "Jinja2 template error"),
    rule("Unexpected end of template", "Jinja2 unclosed block"),
    rule("expected token 'end of print statement'", "Jinja2 syntax error"),
    rule("Jinja was looking for the following tags", "Jinja2 missing closing tag"),
    rule(
        "failed at splitting arguments",
        "Argument splitting error - complex script inlined in the shell module"
    ),
    rule("unbalanced jinja2 block", "Jinja2 parsing error - curly braces of a shell script"),
    rule(
        "Missing end of comment tag",
        "Jinja2 parsing error - bash ${#var} read as a Jinja2 comment"
    ),
    rule("Invalid data passed to 'loop'", "Malformed loop input"),
    rule("cannot be converted to", "Type conversion error"),
    rule("undefined method", "Undefined method call"),
    rule("syntax error near unexpected token", "Shell syntax error - bash syntax run by /bin/sh"),
    rule("bad substitution", "Shell bad substitution - bash syntax run by /bin/sh"),
    rule("/bin/sh: -c: line", "Shell script error - command requires bash"),
    rule("unexpected EOF", "Shell unexpected end of file"),
    rule("syntax error:", "Shell syntax error in command")
];

/// Fatal messages that are playbook bugs even when the task ignores errors
const SUPPRESSED_FATAL_PATTERNS: &[&str] = &[
    "Invalid data passed to",
    "is undefined",
    "template error",
    "syntax error",
    "cannot be converted to",
    "has no attribute",
    "Unexpected end of template",
    "expected token",
];

const CONNECTION_PATTERNS: &[&str] = &[
    "UNREACHABLE!",
    "Failed to connect to the host via ssh",
    "Connection timed out",
    "Connection refused",
    "Permission denied (publickey",
    "Could not resolve hostname",
];

/// Window after a fatal block in which `...ignoring` marks it suppressed
const IGNORING_WINDOW: usize = 300;

fn fatal_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)fatal:\s*\[[^\]]+\]:\s*FAILED!\s*=>\s*\{[^}]*"msg":\s*"([^"]+)""#).expect(
            "valid regex"
        )
    })
}

fn recap_failed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"failed=(\d+)").expect("valid regex"))
}

fn quoted_conditional_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"["']\s*'(?:PASS|FAIL|NA)'\s+if\b"#).expect("valid regex"))
}

/// Lines around the first occurrence of `pattern`: 3 before, 8 after
fn excerpt_around(output: &str, pattern: &str) -> String {
    let lines: Vec<&str> = output.lines().collect();
    match lines.iter().position(|l| l.contains(pattern)) {
        Some(i) => {
            let start = i.saturating_sub(3);
            let end = (i + 8).min(lines.len());
            lines[start..end].join("\n")
        }
        None => output.chars().take(500).collect(),
    }
}

/// First bug rule matching the output, with an excerpt of the surrounding lines
pub fn detect_bug(output: &str) -> Option<(BugRule, String)> {
    BUG_RULES.iter()
        .find(|rule| output.contains(rule.pattern))
        .map(|rule| (*rule, excerpt_around(output, rule.pattern)))
}

/// Fatal task errors hidden by `ignore_errors` whose message is a playbook bug
pub fn detect_suppressed_fatal(output: &str) -> Vec<String> {
    let mut details = Vec::new();
    for caps in fatal_block_re().captures_iter(output) {
        let (Some(whole), Some(msg)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let message = msg.as_str();
        let Some(pattern) = SUPPRESSED_FATAL_PATTERNS.iter().find(|p| message.contains(*p)) else {
            continue;
        };
        let ignored = output[whole.end()..]
            .find("...ignoring")
            .map_or(false, |offset| offset < IGNORING_WINDOW);
        if !ignored {
            continue;
        }

        let task = output[..whole.start()]
            .rfind("TASK [")
            .and_then(|start| {
                output[start..whole.start()].find(']').map(|end| &output[start..start + end + 1])
            });
        let mut detail = format!("Suppressed fatal error ({})", pattern);
        if let Some(task) = task {
            detail.push_str(&format!(" in {}", task));
        }
        let shown: String = message.chars().take(300).collect();
        detail.push_str(&format!(": {}", shown));
        details.push(detail);
    }
    details
}

pub fn is_connection_error(output: &ToolOutput) -> bool {
    let text = output.combined();
    output.exit_code == Some(4) || CONNECTION_PATTERNS.iter().any(|p| text.contains(p))
}

/// Sum of `failed=N` over every host line of the PLAY RECAP
pub fn recap_failed_count(output: &str) -> Option<u32> {
    let recap = &output[output.rfind("PLAY RECAP")?..];
    Some(
        recap_failed_re()
            .captures_iter(recap)
            .filter_map(|caps| caps[1].parse::<u32>().ok())
            .sum()
    )
}

fn itemized(issues: &[String]) -> String {
    issues
        .iter()
        .map(|i| format!("- {}", i))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Stage 1: the syntax-check run must exit cleanly
pub fn check_syntax(output: &ToolOutput) -> ValidationResult {
    if output.success() {
        return ValidationResult::pass(ValidationStage::Syntax);
    }
    let reason = if output.timed_out {
        "Syntax check timed out.".to_string()
    } else {
        format!("Syntax check failed with exit code {:?}.", output.exit_code)
    };
    ValidationResult::fail(ValidationStage::Syntax, format!("{}\n{}", reason, output.sectioned()))
}

fn task_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\s*)-\s+name:\s*(.*)$").expect("valid regex"))
}

/// The playbook with every "compliance report" task removed.
///
/// A task ends at the next `- name:` item indented no deeper than its own.
pub fn outside_report_task(playbook: &str) -> String {
    let mut kept = Vec::new();
    let mut report_indent: Option<usize> = None;
    for line in playbook.lines() {
        if let Some(caps) = task_name_re().captures(line) {
            let indent = caps.get(1).map_or(0, |m| m.as_str().len());
            if report_indent.map_or(true, |open| indent <= open) {
                let name = caps.get(2).map_or("", |m| m.as_str()).to_lowercase();
                report_indent = name.contains("compliance report").then_some(indent);
            }
        }
        if report_indent.is_none() {
            kept.push(line);
        }
    }
    kept.join("\n")
}

/// Stage 2: every requirement must be traceable to a task other than the
/// report, and the compliance report must be present and well formed
pub fn check_structure(playbook: &str, requirements: &RequirementSet) -> ValidationResult {
    let mut issues = Vec::new();

    if !playbook.contains("hosts:") {
        issues.push("The document has no play (`hosts:` is missing).".to_string());
    }
    let tasks = outside_report_task(playbook);
    for number in 1..=requirements.len() {
        let marker = Regex::new(&format!(r"(?i)REQUIREMENT\s+{}\b", number)).ok();
        if !marker.map_or(false, |re| re.is_match(&tasks)) {
            issues.push(format!("REQUIREMENT {} has no implementing task.", number));
        }
    }
    if !playbook.to_lowercase().contains("generate compliance report") {
        issues.push("The \"Generate compliance report\" task is missing.".to_string());
    }
    if !playbook.contains("OVERALL COMPLIANCE") {
        issues.push("The compliance report has no OVERALL COMPLIANCE section.".to_string());
    }
    for line in playbook.lines().filter(|l| quoted_conditional_re().is_match(l) && !l.contains("{{")) {
        issues.push(
            format!(
                "Status is a quoted string instead of an evaluated Jinja2 expression: {}",
                line.trim()
            )
        );
    }

    if issues.is_empty() {
        ValidationResult::pass(ValidationStage::Structure)
    } else {
        ValidationResult::fail(ValidationStage::Structure, itemized(&issues))
    }
}

/// Stage 3: classify the test-host run
pub fn check_execution(output: &ToolOutput) -> ValidationResult {
    let stage = ValidationStage::Execution;
    if output.timed_out {
        return ValidationResult::fail(stage, format!("Execution timed out.\n{}", output.sectioned()));
    }

    let text = output.combined();
    if is_connection_error(output) {
        return ValidationResult::fail(
            stage,
            format!("CONNECTION_ERROR: the test host could not be reached.\n{}", output.sectioned())
        );
    }
    if let Some((rule, excerpt)) = detect_bug(&text) {
        return ValidationResult::fail(
            stage,
            format!(
                "PLAYBOOK BUG: {}\n\nError context:\n{}\n\nFull pattern: {}",
                rule.category,
                excerpt,
                rule.pattern
            )
        );
    }
    let suppressed = detect_suppressed_fatal(&text);
    if !suppressed.is_empty() {
        return ValidationResult::fail(
            stage,
            format!("PLAYBOOK BUG: fatal errors in ignored tasks\n{}", itemized(&suppressed))
        );
    }
    let Some(failed) = recap_failed_count(&text) else {
        return ValidationResult::fail(
            stage,
            format!(
                "The run produced no PLAY RECAP (exit code {:?}).\n{}",
                output.exit_code,
                output.sectioned()
            )
        );
    };
    if failed > 0 {
        return ValidationResult::fail(
            stage,
            format!("Playbook had {} failed task(s).\n\n{}", failed, filter_verbose_task_output(&text))
        );
    }
    if output.exit_code != Some(0) {
        return ValidationResult::fail(
            stage,
            format!("ansible-navigator exited with code {:?}.\n{}", output.exit_code, output.sectioned())
        );
    }
    ValidationResult::pass(stage)
}

/// Whether a report entry's collected data supports a verdict
pub fn entry_has_sufficient_data(exit_code: Option<i32>, data: &str) -> bool {
    let data = data.trim();
    let empty = data.is_empty() || data.eq_ignore_ascii_case("no output");
    if data.contains("command not found") || data.contains("VARIABLE IS NOT DEFINED") {
        return false;
    }
    match exit_code {
        Some(0) => true,
        // grep-style "nothing matched"
        Some(1) => empty,
        _ => false,
    }
}

/// Stage 4: every requirement must report usable data
pub fn check_data_sufficiency(report: &ComplianceReport, requirement_count: usize) -> ValidationResult {
    let mut issues = Vec::new();

    for number in 1..=requirement_count {
        let Some(entry) = report.entries.get(&number) else {
            issues.push(format!("REQUIREMENT {}: missing from the compliance report.", number));
            continue;
        };
        let status = entry.status.as_deref().unwrap_or("");
        if status.is_empty() {
            issues.push(format!("REQUIREMENT {}: no Status line.", number));
            continue;
        }
        if is_unevaluated_status(status) {
            issues.push(
                format!(
                    "REQUIREMENT {}: status '{}' is not an evaluated PASS/FAIL/NA/UNKNOWN value.",
                    number,
                    status
                )
            );
            continue;
        }
        if entry.compliance_status() == Some(ComplianceStatus::NotApplicable) {
            continue;
        }
        let data = entry.data.as_deref().unwrap_or("");
        match entry.exit_code() {
            None =>
                issues.push(
                    format!(
                        "REQUIREMENT {}: exit code was not captured ({}).",
                        number,
                        entry.exit_code.as_deref().unwrap_or("missing")
                    )
                ),
            Some(code) if !entry_has_sufficient_data(Some(code), data) =>
                issues.push(
                    format!(
                        "REQUIREMENT {}: the command failed to run (exit code {}). Data: {}",
                        number,
                        code,
                        if data.is_empty() { "<empty>" } else { data }
                    )
                ),
            Some(_) => {}
        }
    }

    match report.overall.as_deref() {
        None => issues.push("OVERALL COMPLIANCE result is missing.".to_string()),
        Some(value) if is_unevaluated_status(value) =>
            issues.push(format!("OVERALL COMPLIANCE result '{}' is not evaluated.", value)),
        Some(_) => {}
    }

    if issues.is_empty() {
        ValidationResult::pass(ValidationStage::DataSufficiency)
    } else {
        ValidationResult::fail(ValidationStage::DataSufficiency, itemized(&issues))
    }
}

/// Stage 5: the playbook's statuses must agree with the independent analysis
pub fn check_alignment(report: &ComplianceReport, analysis: &ComplianceAnalysis) -> ValidationResult {
    let mut issues = Vec::new();

    match analysis.logic_verdict {
        Some(true) => {}
        Some(false) =>
            issues.push(
                format!(
                    "The compliance analysis judged the playbook logic incorrect: {}",
                    if analysis.explanation.is_empty() { "no explanation given" } else { &analysis.explanation }
                )
            ),
        None => issues.push("The compliance analysis gave no PASS/FAIL verdict.".to_string()),
    }

    for (number, status) in report.statuses() {
        match analysis.requirements.get(&number) {
            Some(expected) if *expected == status => {}
            Some(expected) =>
                issues.push(
                    format!(
                        "REQUIREMENT {}: playbook reports {} but the collected data shows {}.",
                        number,
                        status.report_label(),
                        expected.analysis_label()
                    )
                ),
            None =>
                issues.push(format!("REQUIREMENT {}: the analysis did not assess it.", number)),
        }
    }

    match (report.overall_status(), analysis.overall) {
        (Some(actual), Some(expected)) if actual != expected =>
            issues.push(
                format!(
                    "OVERALL COMPLIANCE: playbook reports {} but the collected data shows {}.",
                    actual.report_label(),
                    expected.analysis_label()
                )
            ),
        (Some(_), None) => issues.push("The analysis gave no overall status.".to_string()),
        _ => {}
    }

    if issues.is_empty() {
        ValidationResult::pass(ValidationStage::ComplianceAlignment)
    } else {
        ValidationResult::fail(ValidationStage::ComplianceAlignment, itemized(&issues))
    }
}

/// Runs the five validation stages in order, stopping at the first failure
pub struct ValidationPipeline<'a> {
    runner: &'a dyn PlaybookRunner,
    llm: &'a dyn LlmClient,
    config: &'a ForgeConfig,
    test_host: &'a str,
}

impl<'a> ValidationPipeline<'a> {
    pub fn new(
        runner: &'a dyn PlaybookRunner,
        llm: &'a dyn LlmClient,
        config: &'a ForgeConfig,
        test_host: &'a str
    ) -> Self {
        Self { runner, llm, config, test_host }
    }

    fn run_options(&self, syntax_only: bool) -> RunOptions {
        let tools = &self.config.tools;
        RunOptions {
            host: self.test_host.to_string(),
            remote_user: tools.remote_user.clone(),
            timeout: if syntax_only {
                tools.syntax_timeout()
            } else {
                tools.execution_timeout()
            },
            syntax_only,
            skip_tags: if syntax_only {
                Vec::new()
            } else {
                vec!["debug".to_string()]
            },
        }
    }

    /// Tool start-up failures count as a failed stage, not an error
    async fn run_tool(&self, playbook: &Path, syntax_only: bool) -> ToolOutput {
        match self.runner.run(playbook, &self.run_options(syntax_only)).await {
            Ok(output) => output,
            Err(e) => {
                warn!("{} failed: {}", self.runner.name(), e);
                ToolOutput {
                    exit_code: None,
                    stdout: String::new(),
                    stderr: e.to_string(),
                    timed_out: false,
                }
            }
        }
    }

    fn record(attempt: &mut GenerationAttempt, result: ValidationResult) -> bool {
        let passed = result.passed;
        if passed {
            info!("Attempt {}: {} check passed", attempt.index, result.stage);
        } else {
            warn!("Attempt {}: {} check failed", attempt.index, result.stage);
            debug!("{}", result.feedback.as_deref().unwrap_or_default());
        }
        attempt.results.push(result);
        passed
    }

    pub async fn validate(
        &self,
        attempt: &mut GenerationAttempt,
        playbook_path: &Path,
        requirements: &RequirementSet
    ) -> ForgeResult<()> {
        let syntax = self.run_tool(playbook_path, true).await;
        if !Self::record(attempt, check_syntax(&syntax)) {
            return Ok(());
        }

        if !Self::record(attempt, check_structure(&attempt.playbook, requirements)) {
            return Ok(());
        }

        let execution = self.run_tool(playbook_path, false).await;
        if !Self::record(attempt, check_execution(&execution)) {
            return Ok(());
        }
        let raw_output = execution.combined();
        let filtered = filter_verbose_task_output(&raw_output);
        attempt.execution_output = Some(filtered.clone());

        let report = ComplianceReport::parse(&raw_output);
        if !Self::record(attempt, check_data_sufficiency(&report, requirements.len())) {
            return Ok(());
        }

        let analysis = self.analyze(requirements, &filtered).await?;
        Self::record(attempt, check_alignment(&report, &analysis));
        Ok(())
    }

    async fn analyze(&self, requirements: &RequirementSet, output: &str) -> ForgeResult<ComplianceAnalysis> {
        let template = self.config.generator
            .get_template(COMPLIANCE_ANALYSIS_TEMPLATE)
            .ok_or_else(|| ForgeError::ConfigError("Missing compliance_analysis template".to_string()))?;
        let mut params = HashMap::new();
        params.insert("checkpoint_id", requirements.checkpoint_id.clone());
        params.insert("requirements", requirements.for_attempt(&[]).numbered());
        params.insert("execution_output", output.to_string());
        let prompt = render_template(&template, &params);

        let answer = self.llm.complete(
            "You are a meticulous Linux compliance auditor. Follow the answer format exactly.",
            &prompt
        ).await?;
        Ok(ComplianceAnalysis::parse(&answer))
    }
}
