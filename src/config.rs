use serde::{ Deserialize, Serialize };
use std::fs;
use std::path::{ Path, PathBuf };
use std::time::Duration;

use crate::implementations::config::{ ConfigError, GeneratorConfig };

/// Configuration for the whole cisforge run, loaded from YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub generator: GeneratorConfig,
    pub tools: ExternalToolsConfig,
    pub workflow: WorkflowOptions,
}

/// Configuration for external tools
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalToolsConfig {
    /// Explicit path to ansible-navigator; searched for when unset
    pub navigator_path: Option<PathBuf>,
    pub syntax_timeout_secs: u64,
    pub execution_timeout_secs: u64,
    /// Remote user passed with `-u`
    pub remote_user: String,
}

/// Options for the generate-and-validate workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowOptions {
    /// Attempt bound; `None` means max(requirement count, 3)
    pub max_retries: Option<u32>,
    pub output_dir: PathBuf,
    pub benchmark: String,
    pub become_user: String,
}

impl Default for ExternalToolsConfig {
    fn default() -> Self {
        Self {
            navigator_path: None,
            syntax_timeout_secs: 30,
            execution_timeout_secs: 120,
            remote_user: "root".to_string(),
        }
    }
}

impl ExternalToolsConfig {
    pub fn syntax_timeout(&self) -> Duration {
        Duration::from_secs(self.syntax_timeout_secs)
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            max_retries: None,
            output_dir: PathBuf::from("playbooks"),
            benchmark: "CIS Red Hat Enterprise Linux 9 Benchmark".to_string(),
            become_user: "root".to_string(),
        }
    }
}

impl ForgeConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: ForgeConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load from the given path, or fall back to defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}
