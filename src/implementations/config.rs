use regex::Regex;
use serde::{ Deserialize, Serialize };
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

use crate::errors::ForgeError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Missing required API key: {0}")]
    MissingApiKey(String),
}

impl From<ConfigError> for ForgeError {
    fn from(err: ConfigError) -> Self {
        ForgeError::ConfigError(err.to_string())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ApiConfig {
    /// API key for the service
    pub api_key: Option<String>,

    /// Provider name (deepseek, openai, anthropic)
    pub provider: Option<String>,

    /// API endpoint for the service
    pub api_endpoint: Option<String>,

    /// Model to use
    pub model: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Chat-completion service used for extraction, generation and analysis
    pub llm_api: ApiConfig,

    /// Embedding service used to build and query the vector index
    pub embedding_api: ApiConfig,

    /// Prompt templates with `{{placeholder}}` parameters
    pub prompt_templates: HashMap<String, String>,

    /// Maximum tokens for API calls
    pub max_tokens: Option<usize>,

    /// Temperature for generation (0.0-1.0)
    pub temperature: Option<f32>,

    /// HTTP timeout for one API call, in seconds
    pub request_timeout_secs: Option<u64>,
}

const PROVIDERS: [(&str, &str); 3] = [
    ("deepseek", "DEEPSEEK_API_KEY"),
    ("openai", "OPENAI_API_KEY"),
    ("anthropic", "ANTHROPIC_API_KEY"),
];

impl GeneratorConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: GeneratorConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Get the API key, checking environment variables if not in config.
    /// If the preferred provider has no key, the other known providers are tried.
    pub fn get_api_key(&self, api: &ApiConfig) -> Result<(String, String), ConfigError> {
        use log::{ debug, info };

        let preferred_provider = api.provider.clone().unwrap_or_else(|| "deepseek".to_string());

        if let Some(api_key) = &api.api_key {
            debug!("Using API key from config");
            return Ok((preferred_provider, api_key.clone()));
        }

        if let Some((_, env_var)) = PROVIDERS.iter().find(|(p, _)| *p == preferred_provider) {
            match std::env::var(env_var) {
                Ok(key) => {
                    info!("Using preferred provider: {}", preferred_provider);
                    return Ok((preferred_provider, key));
                }
                Err(_) => {
                    debug!("Preferred provider {} not available, trying others", preferred_provider);
                }
            }
        } else {
            debug!("Unknown provider: {}, will try known providers", preferred_provider);
        }

        for (provider, env_var) in PROVIDERS {
            if provider == preferred_provider {
                continue;
            }
            if let Ok(key) = std::env::var(env_var) {
                info!(
                    "Using alternative provider: {} (preferred was {})",
                    provider,
                    preferred_provider
                );
                return Ok((provider.to_string(), key));
            }
            debug!("Provider {} not available", provider);
        }

        Err(ConfigError::MissingApiKey("No API keys found for any provider".to_string()))
    }

    /// Get the template for a specific task
    pub fn get_template(&self, template_name: &str) -> Option<String> {
        self.prompt_templates.get(template_name).cloned()
    }
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("valid regex"))
}

/// Render a template by substituting every `{{key}}` placeholder in one pass.
///
/// Substituted values are not scanned again, so playbook text or audit
/// scripts that contain `{{...}}` survive unchanged. Unknown keys are kept.
pub fn render_template(template: &str, params: &HashMap<&str, String>) -> String {
    placeholder_re()
        .replace_all(template, |caps: &regex::Captures| {
            params
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

pub const CHECKPOINT_EXTRACTION_TEMPLATE: &str = "checkpoint_extraction";
pub const REQUIREMENT_DECOMPOSITION_TEMPLATE: &str = "requirement_decomposition";
pub const PLAYBOOK_GENERATION_TEMPLATE: &str = "playbook_generation";
pub const COMPLIANCE_ANALYSIS_TEMPLATE: &str = "compliance_analysis";

/// Default configuration
impl Default for GeneratorConfig {
    fn default() -> Self {
        let mut prompt_templates = HashMap::new();
        prompt_templates.insert(
            CHECKPOINT_EXTRACTION_TEMPLATE.to_string(),
            r#"
You are reading excerpts of the CIS Red Hat Enterprise Linux Benchmark.
Extract checkpoint {{checkpoint_id}} from the context below.

Context:
{{context}}

Return ONLY a JSON object with these string fields:
"id", "name", "profile_applicability", "description", "rationale", "impact",
"audit", "remediation", "default_value", "references".

Rules:
- Copy the text verbatim. Do not summarize.
- The audit and remediation procedures often embed complete shell scripts.
  Keep every script COMPLETE, from the shebang or opening brace to the final
  closing brace. If a script is split across two excerpts, join the parts in order.
- Use an empty string for any field the context does not contain.
"#.to_string(),
        );
        prompt_templates.insert(
            REQUIREMENT_DECOMPOSITION_TEMPLATE.to_string(),
            r#"
You are a Linux compliance auditor. Break the audit procedure of CIS checkpoint
{{checkpoint_id}} ({{title}}) into discrete, independently checkable requirements.

Description:
{{description}}

Audit procedure:
{{audit}}

Return ONLY a JSON object of the form:
{"objective": "<one sentence>", "requirements": ["<requirement>", ...]}

Rules:
- Keep the order of the audit procedure.
- Each requirement names the exact command to run and the expected result.
- End each requirement with "Rationale: PASS when <condition>, FAIL when <condition>."
- Do not add remediation steps. The playbook only audits.
"#.to_string(),
        );
        prompt_templates.insert(
            PLAYBOOK_GENERATION_TEMPLATE.to_string(),
            r#"
You are an Ansible expert writing a read-only compliance audit playbook for
{{benchmark}} checkpoint {{checkpoint_id}}: {{title}}.

Objective: {{objective}}

Requirements:
{{requirements}}

Original audit procedure:
{{audit}}

Remediation (for reference only, never execute it):
{{remediation}}

Rules:
- Output one complete playbook in YAML, nothing else.
- Target `hosts: all`, `become: true`, `become_user: {{become_user}}`, `gather_facts: true`.
- Implement each numbered requirement as one or more tasks whose names start with
  "REQUIREMENT N - " where N is the requirement number.
- Register every command result and never let an audit task abort the play.
- Embed scripts verbatim inside {% raw %} ... {% endraw %} so shell syntax such as
  ${var} or {# is not interpreted as a Jinja2 template.
- Compute each requirement status with a Jinja2 expression that evaluates to
  PASS, FAIL, NA or UNKNOWN. Never quote the expression as a string literal.
- Tag purely informational debug tasks with `debug`.
{{feedback}}{{previous_playbook}}"#.to_string(),
        );
        prompt_templates.insert(
            COMPLIANCE_ANALYSIS_TEMPLATE.to_string(),
            r#"
You are a Linux compliance auditor reviewing the output of an audit playbook for
CIS checkpoint {{checkpoint_id}}.

Requirements:
{{requirements}}

Playbook execution output:
{{execution_output}}

Independently decide, from the collected data only, whether each requirement is met.
Then judge whether the playbook's own status logic is correct.

Answer in exactly this format:
Requirement 1: <short summary>
Compliance Status: COMPLIANT | NON-COMPLIANT | NA | UNKNOWN
(repeat for every requirement)
COMPLIANCE STATUS: COMPLIANT | NON-COMPLIANT | NA | UNKNOWN
COMPLIANCE ANALYSIS: PASS | FAIL
Explanation: <what is wrong with the playbook logic, if anything>
"#.to_string(),
        );

        GeneratorConfig {
            llm_api: ApiConfig {
                api_key: None,
                provider: Some("deepseek".to_string()),
                api_endpoint: Some("https://api.deepseek.com/v1/chat/completions".to_string()),
                model: Some("deepseek-chat".to_string()),
            },
            embedding_api: ApiConfig {
                api_key: None,
                provider: Some("openai".to_string()),
                api_endpoint: Some("http://localhost:8080/v1/embeddings".to_string()),
                model: Some("all-MiniLM-L6-v2".to_string()),
            },
            prompt_templates,
            max_tokens: Some(8192),
            temperature: Some(0.1),
            request_timeout_secs: Some(180),
        }
    }
}
