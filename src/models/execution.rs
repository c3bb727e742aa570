use std::time::Duration;

use crate::models::status::ComplianceStatus;

/// Captured result of an external tool invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Stdout and stderr in one text, stdout first
    pub fn combined(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
            (true, false) => self.stderr.clone(),
            _ => self.stdout.clone(),
        }
    }

    /// Sectioned form used as validation feedback
    pub fn sectioned(&self) -> String {
        let mut text = String::new();
        if !self.stdout.trim().is_empty() {
            text.push_str("=== STDOUT ===\n");
            text.push_str(self.stdout.trim_end());
            text.push('\n');
        }
        if !self.stderr.trim().is_empty() {
            text.push_str("=== STDERR ===\n");
            text.push_str(self.stderr.trim_end());
            text.push('\n');
        }
        text
    }
}

/// Options for one playbook run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub host: String,
    pub remote_user: String,
    pub timeout: Duration,
    pub syntax_only: bool,
    pub skip_tags: Vec<String>,
}

/// Final execution of a validated playbook on the target host
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub host: String,
    pub overall: ComplianceStatus,
    /// `(requirement number, status)` pairs read from the compliance report
    pub requirements: Vec<(usize, ComplianceStatus)>,
    pub output: String,
    pub success: bool,
}
