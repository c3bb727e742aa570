use thiserror::Error;

/// Custom error types for the cisforge pipeline
#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("Input not found: {0}")]
    InputNotFound(String),

    #[error("Ambiguous document content: {0}")]
    ParseAmbiguity(String),

    #[error("Checkpoint not found: {0}")]
    CheckpointNotFound(String),

    /// Error form of a failed `ValidationResult`
    #[error("Validation failed at {stage} stage: {feedback}")]
    ValidationFailure { stage: String, feedback: String },

    #[error("Checkpoint {checkpoint} failed after {attempts} attempts. Last feedback: {last_feedback}")]
    RetryExhausted { checkpoint: String, attempts: u32, last_feedback: String },

    #[error("Error in external tool {tool}: {message}")]
    ExternalToolFailure { tool: String, message: String },

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Retrieval error: {0}")]
    RetrievalError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Checkpoint skipped by user: {0}")]
    Skipped(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// Result type specific to cisforge operations
pub type ForgeResult<T> = Result<T, ForgeError>;

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Fatal,
    Error,
    Warning,
}

/// Recoverable vs. non-recoverable errors
pub trait RecoverableError {
    fn is_recoverable(&self) -> bool;
    fn recovery_strategy(&self) -> Option<String>;
}

impl ForgeError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ForgeError::InputNotFound(_) | ForgeError::ConfigError(_) | ForgeError::Io(_) =>
                ErrorSeverity::Fatal,
            ForgeError::ParseAmbiguity(_) | ForgeError::Skipped(_) => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }
}

impl RecoverableError for ForgeError {
    /// Recoverable errors stay inside one checkpoint; a batch run keeps going after them.
    fn is_recoverable(&self) -> bool {
        !matches!(self.severity(), ErrorSeverity::Fatal)
    }

    fn recovery_strategy(&self) -> Option<String> {
        match self {
            ForgeError::ValidationFailure { .. } =>
                Some("Regenerate the playbook with the stage feedback".to_string()),
            ForgeError::ExternalToolFailure { tool, .. } =>
                Some(format!("Check that {} is installed and the test host is reachable", tool)),
            ForgeError::CheckpointNotFound(_) =>
                Some("Verify the checkpoint id against `cisforge parse --id-only`".to_string()),
            ForgeError::RetryExhausted { .. } =>
                Some("Increase --max-retries or review the requirements interactively".to_string()),
            ForgeError::LlmError(_) => Some("Check the API key and endpoint configuration".to_string()),
            _ => None,
        }
    }
}
