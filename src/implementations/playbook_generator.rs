use log::{ debug, info };
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{ Path, PathBuf };
use std::sync::OnceLock;

use crate::config::WorkflowOptions;
use crate::errors::{ ForgeError, ForgeResult };
use crate::implementations::config::{ render_template, GeneratorConfig, PLAYBOOK_GENERATION_TEMPLATE };
use crate::implementations::llm::strip_code_fences;
use crate::models::checkpoint::{ Checkpoint, SectionKind };
use crate::models::requirement::RequirementList;
use crate::traits::llm_client::LlmClient;

const SYSTEM_PROMPT: &str =
    "You are an Ansible automation expert who writes correct, read-only compliance audit playbooks. Output YAML only.";

fn quoted_backslash_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^(\s*)(-\s+)?([A-Za-z_][\w.]*):\s*"(.*\\.*)"\s*$"#).expect("valid regex")
    })
}

fn block_scalar_start_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":\s*[|>][-+0-9]*\s*$").expect("valid regex"))
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Escapes a YAML double-quoted scalar understands
const YAML_ESCAPES: &str = "0abtnvfre \"/\\N_LPxuU";

fn has_invalid_escape(value: &str) -> bool {
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) if YAML_ESCAPES.contains(next) => {}
                _ => {
                    return true;
                }
            }
        }
    }
    false
}

fn has_unescaped_quote(value: &str) -> bool {
    let mut prev = '\0';
    for c in value.chars() {
        if c == '"' && prev != '\\' {
            return true;
        }
        prev = c;
    }
    false
}

/// Rewrite double-quoted values holding regex backslashes (`\s`, `\|`, `\.`)
/// as literal block scalars, where backslashes need no escaping.
///
/// Lines inside existing block scalars and `{% raw %}` bodies are shell text
/// and pass through untouched.
pub fn fix_yaml_special_chars(content: &str) -> String {
    let mut fixed = Vec::new();
    let mut fixes = 0;
    // Indent of the key that opened the block scalar being skipped
    let mut block_indent: Option<usize> = None;
    let mut in_raw = false;

    for line in content.lines() {
        if in_raw {
            in_raw = !line.contains("{% endraw %}");
            fixed.push(line.to_string());
            continue;
        }
        if let Some(open) = block_indent {
            if line.trim().is_empty() || indent_of(line) > open {
                fixed.push(line.to_string());
                continue;
            }
            block_indent = None;
        }
        if line.contains("{% raw %}") && !line.contains("{% endraw %}") {
            in_raw = true;
            fixed.push(line.to_string());
            continue;
        }
        if block_scalar_start_re().is_match(line) {
            block_indent = Some(indent_of(line));
            fixed.push(line.to_string());
            continue;
        }

        let Some(caps) = quoted_backslash_re().captures(line) else {
            fixed.push(line.to_string());
            continue;
        };
        let value = &caps[4];
        if !has_invalid_escape(value) || has_unescaped_quote(value) {
            fixed.push(line.to_string());
            continue;
        }

        let indent = &caps[1];
        let dash = caps.get(2).map_or("", |m| m.as_str());
        let key = &caps[3];
        let body_indent = " ".repeat(indent.len() + dash.len() + 2);
        fixed.push(format!("{}{}{}: |", indent, dash, key));
        fixed.push(format!("{}{}", body_indent, value.replace("\\\"", "\"")));
        fixes += 1;
    }

    if fixes > 0 {
        info!("Auto-fixed {} YAML special character issue(s)", fixes);
    }
    let mut result = fixed.join("\n");
    result.push('\n');
    result
}

/// Clean an LLM answer into playbook text
pub fn postprocess_playbook(answer: &str) -> String {
    let body = strip_code_fences(answer);
    fix_yaml_special_chars(&body)
}

fn render_feedback(feedback: &[String]) -> String {
    if feedback.is_empty() {
        return String::new();
    }
    let items = feedback
        .iter()
        .enumerate()
        .map(|(i, f)| format!("--- Attempt {} ---\n{}", i + 1, f))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "\nThe previous attempts failed validation. Fix ALL of the following issues:\n{}\n",
        items
    )
}

fn render_requirements(list: &RequirementList) -> String {
    let mut text = list.numbered();
    if !list.directives.is_empty() {
        text.push_str("\n\nPlaybook rules:\n");
        text.push_str(
            &list.directives
                .iter()
                .map(|d| format!("- {}", d))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }
    text
}

/// Stateless prompt-based playbook generation
pub struct PlaybookGenerator<'a> {
    llm: &'a dyn LlmClient,
    config: &'a GeneratorConfig,
    options: &'a WorkflowOptions,
}

impl<'a> PlaybookGenerator<'a> {
    pub fn new(
        llm: &'a dyn LlmClient,
        config: &'a GeneratorConfig,
        options: &'a WorkflowOptions
    ) -> Self {
        Self { llm, config, options }
    }

    /// Build the generation prompt for one attempt
    pub fn build_prompt(
        &self,
        checkpoint: &Checkpoint,
        list: &RequirementList,
        previous_playbook: Option<&str>
    ) -> ForgeResult<String> {
        let template = self.config
            .get_template(PLAYBOOK_GENERATION_TEMPLATE)
            .ok_or_else(|| ForgeError::ConfigError("Missing playbook_generation template".to_string()))?;

        let previous = match previous_playbook {
            Some(playbook) if !list.feedback.is_empty() =>
                format!("\nPrevious playbook:\n```yaml\n{}\n```\n", playbook.trim_end()),
            _ => String::new(),
        };

        let mut params = HashMap::new();
        params.insert("benchmark", self.options.benchmark.clone());
        params.insert("checkpoint_id", checkpoint.id.clone());
        params.insert("title", checkpoint.title.clone());
        params.insert("objective", list.objective.clone());
        params.insert("requirements", render_requirements(list));
        params.insert("audit", checkpoint.section(SectionKind::Audit).to_string());
        params.insert("remediation", checkpoint.section(SectionKind::Remediation).to_string());
        params.insert("become_user", self.options.become_user.clone());
        params.insert("feedback", render_feedback(&list.feedback));
        params.insert("previous_playbook", previous);
        Ok(render_template(&template, &params))
    }

    pub async fn generate(
        &self,
        checkpoint: &Checkpoint,
        list: &RequirementList,
        previous_playbook: Option<&str>
    ) -> ForgeResult<String> {
        let prompt = self.build_prompt(checkpoint, list, previous_playbook)?;
        debug!("Playbook prompt: {} characters", prompt.len());

        let answer = self.llm.complete(SYSTEM_PROMPT, &prompt).await?;
        let playbook = postprocess_playbook(&answer);
        if playbook.trim().is_empty() {
            return Err(ForgeError::LlmError("Generated playbook is empty".to_string()));
        }
        info!("Generated playbook for {} ({} lines)", checkpoint.id, playbook.lines().count());
        Ok(playbook)
    }
}

/// Write the playbook into the output directory
pub fn save_playbook(output_dir: &Path, file_name: &str, content: &str) -> ForgeResult<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(file_name);
    fs::write(&path, content)?;
    debug!("Playbook saved to {}", path.display());
    Ok(path)
}
