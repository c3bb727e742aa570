use chrono::{ DateTime, Utc };
use std::fmt;

use crate::errors::ForgeError;

/// Ordered stages of the validation pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValidationStage {
    Syntax,
    Structure,
    Execution,
    DataSufficiency,
    ComplianceAlignment,
}

impl ValidationStage {
    pub const ALL: [ValidationStage; 5] = [
        ValidationStage::Syntax,
        ValidationStage::Structure,
        ValidationStage::Execution,
        ValidationStage::DataSufficiency,
        ValidationStage::ComplianceAlignment,
    ];

    pub fn number(&self) -> usize {
        match self {
            ValidationStage::Syntax => 1,
            ValidationStage::Structure => 2,
            ValidationStage::Execution => 3,
            ValidationStage::DataSufficiency => 4,
            ValidationStage::ComplianceAlignment => 5,
        }
    }
}

impl fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValidationStage::Syntax => "syntax",
            ValidationStage::Structure => "structure",
            ValidationStage::Execution => "execution",
            ValidationStage::DataSufficiency => "data sufficiency",
            ValidationStage::ComplianceAlignment => "compliance alignment",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of one validation stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub stage: ValidationStage,
    pub passed: bool,
    pub feedback: Option<String>,
}

impl ValidationResult {
    pub fn pass(stage: ValidationStage) -> Self {
        Self { stage, passed: true, feedback: None }
    }

    pub fn fail(stage: ValidationStage, feedback: impl Into<String>) -> Self {
        Self { stage, passed: false, feedback: Some(feedback.into()) }
    }

    /// The failure as an error, `None` when the stage passed
    pub fn to_error(&self) -> Option<ForgeError> {
        if self.passed {
            return None;
        }
        Some(ForgeError::ValidationFailure {
            stage: self.stage.to_string(),
            feedback: self.feedback.clone().unwrap_or_default(),
        })
    }

    /// Feedback prefixed for the next generation prompt
    pub fn prompt_feedback(&self) -> Option<String> {
        self.feedback.as_ref().map(|f| {
            format!(
                "CRITICAL FIX REQUIRED ({} check, stage {}):\n{}",
                self.stage,
                self.stage.number(),
                f
            )
        })
    }
}

/// One full generate-and-validate cycle
#[derive(Debug, Clone)]
pub struct GenerationAttempt {
    pub index: u32,
    pub playbook: String,
    pub results: Vec<ValidationResult>,
    pub started_at: DateTime<Utc>,
    /// Filtered execution output, present once stage 3 passed
    pub execution_output: Option<String>,
}

impl GenerationAttempt {
    pub fn new(index: u32, playbook: String) -> Self {
        Self {
            index,
            playbook,
            results: Vec::new(),
            started_at: Utc::now(),
            execution_output: None,
        }
    }

    pub fn passed(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(|r| r.passed)
    }

    pub fn failure(&self) -> Option<&ValidationResult> {
        self.results.iter().find(|r| !r.passed)
    }
}
