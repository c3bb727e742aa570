pub mod models;
pub mod traits;
pub mod errors;
pub mod config;
pub mod implementations;
#[cfg(test)]
pub mod tests;

// Re-export core components
pub use config::{ ExternalToolsConfig, ForgeConfig, WorkflowOptions };
pub use errors::{ ErrorSeverity, ForgeError, ForgeResult, RecoverableError };
pub use implementations::ansible::AnsibleNavigator;
pub use implementations::document_parser::DocumentParser;
pub use implementations::llm::HttpLlmClient;
pub use implementations::retriever::{ CheckpointRetriever, CheckpointStore };
pub use implementations::validation::ValidationPipeline;
pub use implementations::workflow::{
    AcceptAll,
    CheckpointOutcome,
    ForgeContext,
    GenerateOptions,
    RequirementReview,
};
pub use models::{
    checkpoint::{ Automation, Checkpoint, CheckpointRecord, SectionKind },
    requirement::{ RequirementList, RequirementSet },
    attempt::{ GenerationAttempt, ValidationResult, ValidationStage },
    execution::{ ExecutionReport, RunOptions, ToolOutput },
    status::ComplianceStatus,
};
pub use traits::{ DocumentChunk, Embedder, LlmClient, PlaybookRunner, VectorStore };
