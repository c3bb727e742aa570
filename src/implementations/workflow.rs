use log::{ error, info, warn };
use std::path::{ Path, PathBuf };
use std::sync::Arc;

use crate::config::ForgeConfig;
use crate::errors::{ ForgeError, ForgeResult, RecoverableError };
use crate::implementations::playbook_generator::{ save_playbook, PlaybookGenerator };
use crate::implementations::report::ComplianceReport;
use crate::implementations::requirement_extractor::RequirementExtractor;
use crate::implementations::retriever::CheckpointRetriever;
use crate::implementations::retry::{ default_max_retries, RetryController, RetryDecision };
use crate::implementations::validation::{ recap_failed_count, ValidationPipeline };
use crate::models::attempt::GenerationAttempt;
use crate::models::checkpoint::Checkpoint;
use crate::models::execution::{ ExecutionReport, RunOptions, ToolOutput };
use crate::models::requirement::RequirementSet;
use crate::models::status::ComplianceStatus;
use crate::traits::llm_client::LlmClient;
use crate::traits::playbook_runner::PlaybookRunner;

/// Chance to adjust the requirement list before generation starts
pub trait RequirementReview {
    /// `Ok(None)` skips the checkpoint
    fn review(
        &self,
        checkpoint: &Checkpoint,
        requirements: RequirementSet
    ) -> ForgeResult<Option<RequirementSet>>;
}

/// Accepts every requirement list unchanged (`--no-interactive`)
pub struct AcceptAll;

impl RequirementReview for AcceptAll {
    fn review(
        &self,
        _checkpoint: &Checkpoint,
        requirements: RequirementSet
    ) -> ForgeResult<Option<RequirementSet>> {
        Ok(Some(requirements))
    }
}

/// Source of checkpoint ids when none were given up front
pub trait CheckpointPrompt {
    /// `Ok(None)` ends the session
    fn next_checkpoint(&self) -> ForgeResult<Option<String>>;

    /// Called after each checkpoint finishes
    fn completed(&self, _checkpoint_id: &str, _result: &ForgeResult<CheckpointOutcome>) {}
}

/// Per-run settings that come from the command line
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub target_host: String,
    /// Host for the validation run; the target host when unset
    pub test_host: Option<String>,
    /// Overrides the configured attempt budget
    pub max_retries: Option<u32>,
    pub skip_execution: bool,
    pub output_dir: PathBuf,
    /// Overrides `cis_audit_<id>.yml`; only honoured for a single checkpoint
    pub file_name: Option<String>,
}

impl GenerateOptions {
    pub fn test_host(&self) -> &str {
        self.test_host.as_deref().unwrap_or(&self.target_host)
    }
}

/// Result of one successfully generated checkpoint
#[derive(Debug, Clone)]
pub struct CheckpointOutcome {
    pub checkpoint: Checkpoint,
    pub requirements: RequirementSet,
    pub playbook_path: PathBuf,
    /// Every attempt, the passing one last
    pub attempts: Vec<GenerationAttempt>,
    /// Absent when the final execution was skipped
    pub execution: Option<ExecutionReport>,
}

/// Everything one run needs, built once and passed down
pub struct ForgeContext {
    pub llm: Arc<dyn LlmClient>,
    pub retriever: CheckpointRetriever,
    pub runner: Arc<dyn PlaybookRunner>,
    pub config: ForgeConfig,
}

impl ForgeContext {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        retriever: CheckpointRetriever,
        runner: Arc<dyn PlaybookRunner>,
        config: ForgeConfig
    ) -> Self {
        Self { llm, retriever, runner, config }
    }

    /// Retrieve, extract, review, then generate and validate until an attempt
    /// passes or the attempt budget is spent
    pub async fn process_checkpoint(
        &self,
        checkpoint_id: &str,
        options: &GenerateOptions,
        reviewer: &dyn RequirementReview
    ) -> ForgeResult<CheckpointOutcome> {
        let llm = self.llm.as_ref();
        let checkpoint = self.retriever.retrieve(checkpoint_id, llm, &self.config.generator).await?;
        info!("Processing checkpoint {}: {}", checkpoint.id, checkpoint.title);

        let extracted = RequirementExtractor::new(llm, &self.config.generator).extract(&checkpoint).await?;
        let requirements = reviewer
            .review(&checkpoint, extracted)?
            .ok_or_else(|| ForgeError::Skipped(checkpoint.id.clone()))?;
        if requirements.is_empty() {
            return Err(ForgeError::InvalidInput(format!("No requirements left for {}", checkpoint.id)));
        }

        let max_retries = options.max_retries
            .or(self.config.workflow.max_retries)
            .unwrap_or_else(|| default_max_retries(requirements.len()));
        let mut retry = RetryController::new(max_retries);

        let generator = PlaybookGenerator::new(llm, &self.config.generator, &self.config.workflow);
        let pipeline = ValidationPipeline::new(
            self.runner.as_ref(),
            llm,
            &self.config,
            options.test_host()
        );
        let file_name = options.file_name.clone().unwrap_or_else(|| checkpoint.playbook_file_name());

        let mut attempts: Vec<GenerationAttempt> = Vec::new();
        while let Some(index) = retry.begin_attempt() {
            let list = requirements.for_attempt(retry.feedback());
            let previous = attempts.last().map(|a| a.playbook.as_str());
            let playbook = generator.generate(&checkpoint, &list, previous).await?;
            let path = save_playbook(&options.output_dir, &file_name, &playbook)?;

            let mut attempt = GenerationAttempt::new(index, playbook);
            pipeline.validate(&mut attempt, &path, &requirements).await?;

            if attempt.passed() {
                info!("Checkpoint {} passed validation on attempt {}", checkpoint.id, index);
                let execution = if options.skip_execution {
                    info!("Skipping final execution on {}", options.target_host);
                    None
                } else {
                    Some(self.final_execution(&path, &options.target_host).await)
                };
                attempts.push(attempt);
                return Ok(CheckpointOutcome {
                    checkpoint,
                    requirements,
                    playbook_path: path,
                    attempts,
                    execution,
                });
            }

            let failure = attempt.failure();
            if let Some(err) = failure.and_then(|r| r.to_error()) {
                warn!("Attempt {} for {} superseded: {}", index, checkpoint.id, err);
            }
            let feedback = failure
                .and_then(|r| r.prompt_feedback())
                .unwrap_or_else(|| "Validation failed without feedback".to_string());
            attempts.push(attempt);
            if retry.record_failure(feedback) == RetryDecision::Exhausted {
                break;
            }
        }

        error!("Checkpoint {} failed after {} attempts", checkpoint.id, retry.attempts());
        Err(ForgeError::RetryExhausted {
            checkpoint: checkpoint.id,
            attempts: retry.attempts(),
            last_feedback: retry.last_feedback().unwrap_or_default().to_string(),
        })
    }

    /// Run the validated playbook on the target host and read its verdict
    pub async fn final_execution(&self, playbook: &Path, host: &str) -> ExecutionReport {
        let tools = &self.config.tools;
        let options = RunOptions {
            host: host.to_string(),
            remote_user: tools.remote_user.clone(),
            timeout: tools.execution_timeout(),
            syntax_only: false,
            skip_tags: vec!["debug".to_string()],
        };
        info!("Running {} on {}", playbook.display(), host);

        let output = match self.runner.run(playbook, &options).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Final execution failed to start: {}", e);
                ToolOutput {
                    stderr: e.to_string(),
                    ..ToolOutput::default()
                }
            }
        };
        execution_report(host, &output)
    }

    /// Process checkpoints one after another. Recoverable failures are
    /// recorded and the batch continues; a fatal error ends it.
    pub async fn process_batch(
        &self,
        checkpoint_ids: &[String],
        options: &GenerateOptions,
        reviewer: &dyn RequirementReview
    ) -> Vec<(String, ForgeResult<CheckpointOutcome>)> {
        let mut results = Vec::new();
        for (i, id) in checkpoint_ids.iter().enumerate() {
            info!("Checkpoint {} of {}: {}", i + 1, checkpoint_ids.len(), id);
            let mut per_checkpoint = options.clone();
            if checkpoint_ids.len() > 1 {
                per_checkpoint.file_name = None;
            }
            let result = self.process_checkpoint(id, &per_checkpoint, reviewer).await;
            let fatal = matches!(&result, Err(e) if !e.is_recoverable());
            if let Err(e) = &result {
                warn!("Checkpoint {} did not complete: {}", id, e);
            }
            results.push((id.clone(), result));
            if fatal {
                error!("Stopping batch after fatal error");
                break;
            }
        }
        results
    }

    /// Ask for checkpoint ids one at a time until the prompt ends the session.
    ///
    /// Like a batch, a fatal error stops the loop; a failing prompt ends it
    /// with the results gathered so far.
    pub async fn process_prompted(
        &self,
        prompt: &dyn CheckpointPrompt,
        options: &GenerateOptions,
        reviewer: &dyn RequirementReview
    ) -> Vec<(String, ForgeResult<CheckpointOutcome>)> {
        let mut per_checkpoint = options.clone();
        per_checkpoint.file_name = None;

        let mut results = Vec::new();
        loop {
            let id = match prompt.next_checkpoint() {
                Ok(Some(id)) => id,
                Ok(None) => break,
                Err(e) => {
                    warn!("Checkpoint prompt failed: {}", e);
                    break;
                }
            };
            let result = self.process_checkpoint(&id, &per_checkpoint, reviewer).await;
            prompt.completed(&id, &result);
            let fatal = matches!(&result, Err(e) if !e.is_recoverable());
            results.push((id, result));
            if fatal {
                error!("Stopping interactive session after fatal error");
                break;
            }
        }
        info!("Interactive session processed {} checkpoint(s)", results.len());
        results
    }
}

/// Summarize a target-host run from its compliance report
pub fn execution_report(host: &str, output: &ToolOutput) -> ExecutionReport {
    let text = output.combined();
    let report = ComplianceReport::parse(&text);
    let failed_tasks = recap_failed_count(&text);
    ExecutionReport {
        host: host.to_string(),
        overall: report.overall_status().unwrap_or(ComplianceStatus::Unknown),
        requirements: report.statuses(),
        success: output.success() && failed_tasks == Some(0),
        output: text,
    }
}
