use log::{ debug, info, warn };
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::errors::{ ForgeError, ForgeResult };
use crate::implementations::config::{
    render_template,
    GeneratorConfig,
    REQUIREMENT_DECOMPOSITION_TEMPLATE,
};
use crate::implementations::llm::{ extract_json_object, strip_code_fences };
use crate::models::checkpoint::{ Checkpoint, SectionKind };
use crate::models::requirement::{ AuditProcedure, RequirementSet };
use crate::traits::llm_client::LlmClient;

const DEFAULT_RATIONALE: &str =
    "Rationale: PASS when the collected data matches the expected value from the audit procedure, FAIL otherwise.";

fn numbering_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:\d+[.)]|[-*•])\s+").expect("valid regex"))
}

/// Strip a leading `"3. "`, `"3) "` or bullet from a requirement line
pub fn strip_numbering(line: &str) -> String {
    numbering_re().replace(line, "").trim().to_string()
}

fn is_script_start(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with("#!") || trimmed == "{"
}

/// Decide whether an audit procedure is an embedded script or prose.
///
/// A script has a shebang, or a standalone `{` line with balanced braces.
pub fn classify_audit(audit: &str) -> AuditProcedure {
    let has_shebang = audit.lines().any(|l| l.trim_start().starts_with("#!"));
    let opens = audit.matches('{').count();
    let closes = audit.matches('}').count();
    let has_block = audit.lines().any(|l| l.trim() == "{") && opens > 0 && opens == closes;

    if !has_shebang && !has_block {
        return AuditProcedure::Prose;
    }

    let lines: Vec<&str> = audit.lines().collect();
    let start = lines
        .iter()
        .position(|l| is_script_start(l))
        .unwrap_or(0);
    let end = lines
        .iter()
        .rposition(|l| l.trim() == "}")
        .filter(|end| *end >= start)
        .unwrap_or(lines.len().saturating_sub(1));

    AuditProcedure::Script(lines[start..=end].join("\n"))
}

/// Structural rules every generated playbook must follow
pub fn standard_directives(checkpoint: &Checkpoint) -> Vec<String> {
    vec![
        format!(
            "Start the playbook with a comment referencing CIS checkpoint {}: {}.",
            checkpoint.id,
            checkpoint.title
        ),
        "Set `ignore_errors: true` or `failed_when: false` on every audit task so that all requirements are reported.".to_string(),
        "When a command legitimately exits non-zero because nothing matched (grep, find), append `|| true` so the registered exit code is 0 and the output stays empty.".to_string(),
        concat!(
            "End with a task named \"Generate compliance report\" that prints, for every requirement N:\n",
            "  REQUIREMENT N - <short description>:\n",
            "    Task: <task name>\n",
            "    Command: <command that was run>\n",
            "    Exit code: <registered rc>\n",
            "    Data: <registered stdout, or 'No output'>\n",
            "    Status: PASS | FAIL | NA | UNKNOWN\n",
            "    Rationale: <why this status>\n",
            "followed by:\n",
            "  OVERALL COMPLIANCE:\n",
            "    Result: PASS | FAIL\n",
            "Overall is PASS only when every applicable requirement is PASS."
        ).to_string()
    ]
}

/// Single requirement for an audit procedure that is a complete script
pub fn script_requirement(checkpoint: &Checkpoint, script: &str) -> String {
    format!(
        concat!(
            "Copy the audit script below to the remote host as /tmp/cis_audit_{}.sh with mode 0700, ",
            "run it with bash, register its output and exit code, and remove the script afterwards. ",
            "Rationale: PASS when the script reports '** PASS **', FAIL when it reports '** FAIL **'.\n\n",
            "Script (embed verbatim):\n{}"
        ),
        checkpoint.id.replace('.', "_"),
        script
    )
}

/// Generic requirements used when the decomposition answer cannot be parsed
pub fn fallback_requirements(checkpoint: &Checkpoint) -> Vec<String> {
    vec![
        format!(
            "Run every command of the CIS {} audit procedure and register its output and exit code. {}",
            checkpoint.id,
            DEFAULT_RATIONALE
        ),
        format!(
            "Compare each captured output with the expected result stated in the audit procedure. {}",
            DEFAULT_RATIONALE
        ),
        format!(
            "Report whether the system satisfies \"{}\". Rationale: PASS when every previous requirement is PASS, FAIL when any is FAIL.",
            checkpoint.title
        )
    ]
}

fn with_rationale(requirement: String) -> String {
    if requirement.contains("Rationale:") {
        requirement
    } else {
        format!("{} {}", requirement.trim_end(), DEFAULT_RATIONALE)
    }
}

/// Parse `{"objective": ..., "requirements": [...]}` from an LLM answer
pub fn parse_decomposition(answer: &str) -> Option<(String, Vec<String>)> {
    let cleaned = strip_code_fences(answer);
    let json = extract_json_object(&cleaned)?;
    let value: serde_json::Value = serde_json::from_str(json).ok()?;

    let objective = value["objective"].as_str().unwrap_or_default().trim().to_string();
    let requirements: Vec<String> = value["requirements"]
        .as_array()?
        .iter()
        .filter_map(|item| {
            item.as_str()
                .or_else(|| item["description"].as_str())
                .or_else(|| item["requirement"].as_str())
        })
        .map(strip_numbering)
        .filter(|r| !r.is_empty())
        .map(with_rationale)
        .collect();

    if requirements.is_empty() {
        None
    } else {
        Some((objective, requirements))
    }
}

/// Derives the ordered requirement list for a checkpoint
pub struct RequirementExtractor<'a> {
    llm: &'a dyn LlmClient,
    config: &'a GeneratorConfig,
}

impl<'a> RequirementExtractor<'a> {
    pub fn new(llm: &'a dyn LlmClient, config: &'a GeneratorConfig) -> Self {
        Self { llm, config }
    }

    pub async fn extract(&self, checkpoint: &Checkpoint) -> ForgeResult<RequirementSet> {
        let audit = checkpoint.section(SectionKind::Audit);
        if audit.trim().is_empty() {
            return Err(
                ForgeError::InvalidInput(format!("Checkpoint {} has no audit procedure", checkpoint.id))
            );
        }

        let (objective, requirements) = match classify_audit(audit) {
            AuditProcedure::Script(script) => {
                info!("Checkpoint {} audit is a script ({} lines)", checkpoint.id, script.lines().count());
                (
                    format!("Run the CIS audit script for {}", checkpoint.title),
                    vec![script_requirement(checkpoint, &script)],
                )
            }
            AuditProcedure::Prose => self.decompose(checkpoint, audit).await?,
        };

        info!("Extracted {} requirements for {}", requirements.len(), checkpoint.id);
        for (i, req) in requirements.iter().enumerate() {
            debug!("  Requirement {}: {}", i + 1, req);
        }

        Ok(RequirementSet {
            checkpoint_id: checkpoint.id.clone(),
            objective,
            requirements,
            directives: standard_directives(checkpoint),
        })
    }

    async fn decompose(&self, checkpoint: &Checkpoint, audit: &str) -> ForgeResult<(String, Vec<String>)> {
        let template = self.config
            .get_template(REQUIREMENT_DECOMPOSITION_TEMPLATE)
            .ok_or_else(||
                ForgeError::ConfigError("Missing requirement_decomposition template".to_string())
            )?;
        let mut params = HashMap::new();
        params.insert("checkpoint_id", checkpoint.id.clone());
        params.insert("title", checkpoint.title.clone());
        params.insert("description", checkpoint.section(SectionKind::Description).to_string());
        params.insert("audit", audit.to_string());
        let prompt = render_template(&template, &params);

        let answer = self.llm.complete(
            "You are a Linux security compliance expert. Answer with JSON only.",
            &prompt
        ).await?;

        match parse_decomposition(&answer) {
            Some(parsed) => Ok(parsed),
            None => {
                warn!("Could not parse requirements for {}, using fallback list", checkpoint.id);
                Ok((
                    format!("Audit compliance with {}", checkpoint.title),
                    fallback_requirements(checkpoint),
                ))
            }
        }
    }
}
