pub mod checkpoint;
pub mod requirement;
pub mod attempt;
pub mod execution;
pub mod status;

// Re-export common model types
pub use checkpoint::{ Automation, Checkpoint, CheckpointRecord, SectionKind };
pub use requirement::{ AuditProcedure, RequirementList, RequirementSet };
pub use attempt::{ GenerationAttempt, ValidationResult, ValidationStage };
pub use execution::{ ExecutionReport, RunOptions, ToolOutput };
pub use status::ComplianceStatus;
