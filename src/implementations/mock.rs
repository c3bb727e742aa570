use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{ Path, PathBuf };
use std::sync::Mutex;

use crate::errors::{ ForgeError, ForgeResult };
use crate::models::execution::{ RunOptions, ToolOutput };
use crate::traits::llm_client::LlmClient;
use crate::traits::playbook_runner::PlaybookRunner;
use crate::traits::vector_store::{ DocumentChunk, Embedder, VectorStore };

/// Scripted LLM: answers from a queue, then from the default answer if set
pub struct MockLlmClient {
    responses: Mutex<VecDeque<ForgeResult<String>>>,
    default_response: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            default_response: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_default(response: impl Into<String>) -> Self {
        Self {
            default_response: Some(response.into()),
            ..Self::new()
        }
    }

    pub fn add_response(&self, response: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Ok(response.into()));
    }

    pub fn add_responses<S: Into<String>>(&self, responses: impl IntoIterator<Item = S>) {
        let mut queue = self.responses.lock().unwrap();
        for response in responses {
            queue.push_back(Ok(response.into()));
        }
    }

    pub fn add_error(&self, message: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Err(ForgeError::LlmError(message.into())));
    }

    /// User prompts received so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, _system: &str, prompt: &str) -> ForgeResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.responses.lock().unwrap().pop_front() {
            Some(response) => response,
            None =>
                self.default_response
                    .clone()
                    .ok_or_else(|| ForgeError::LlmError("MockLlmClient: no more responses".to_string())),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Scripted playbook runner with separate answers for syntax checks and runs
pub struct MockPlaybookRunner {
    syntax_outputs: Mutex<VecDeque<ToolOutput>>,
    run_outputs: Mutex<VecDeque<ToolOutput>>,
    default_syntax: ToolOutput,
    default_run: ToolOutput,
    calls: Mutex<Vec<(PathBuf, RunOptions)>>,
}

impl MockPlaybookRunner {
    pub fn new(default_syntax: ToolOutput, default_run: ToolOutput) -> Self {
        Self {
            syntax_outputs: Mutex::new(VecDeque::new()),
            run_outputs: Mutex::new(VecDeque::new()),
            default_syntax,
            default_run,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn add_syntax_output(&self, output: ToolOutput) {
        self.syntax_outputs.lock().unwrap().push_back(output);
    }

    pub fn add_run_output(&self, output: ToolOutput) {
        self.run_outputs.lock().unwrap().push_back(output);
    }

    pub fn calls(&self) -> Vec<(PathBuf, RunOptions)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn syntax_calls(&self) -> usize {
        self.calls().iter().filter(|(_, o)| o.syntax_only).count()
    }

    pub fn execution_calls(&self) -> usize {
        self.calls().iter().filter(|(_, o)| !o.syntax_only).count()
    }
}

/// Tool output with exit code and stdout only
pub fn tool_output(exit_code: i32, stdout: &str) -> ToolOutput {
    ToolOutput {
        exit_code: Some(exit_code),
        stdout: stdout.to_string(),
        stderr: String::new(),
        timed_out: false,
    }
}

#[async_trait]
impl PlaybookRunner for MockPlaybookRunner {
    async fn run(&self, playbook: &Path, options: &RunOptions) -> ForgeResult<ToolOutput> {
        self.calls.lock().unwrap().push((playbook.to_path_buf(), options.clone()));
        let output = if options.syntax_only {
            self.syntax_outputs.lock().unwrap().pop_front().unwrap_or_else(|| self.default_syntax.clone())
        } else {
            self.run_outputs.lock().unwrap().pop_front().unwrap_or_else(|| self.default_run.clone())
        };
        Ok(output)
    }

    fn name(&self) -> &str {
        "mock-runner"
    }
}

/// Returns the same chunks for every query, cut to `k`
pub struct MockVectorStore {
    chunks: Vec<DocumentChunk>,
    queries: Mutex<Vec<String>>,
}

impl MockVectorStore {
    pub fn new(texts: &[&str]) -> Self {
        let chunks = texts
            .iter()
            .enumerate()
            .map(|(i, t)| DocumentChunk { text: t.to_string(), start_index: i * 1000 })
            .collect();
        Self { chunks, queries: Mutex::new(Vec::new()) }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorStore for MockVectorStore {
    async fn similarity_search(&self, query: &str, k: usize) -> ForgeResult<Vec<DocumentChunk>> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.chunks.iter().take(k).cloned().collect())
    }
}

/// Letter-frequency embedding, deterministic and good enough for ranking tests
pub struct MockEmbedder;

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, texts: &[String]) -> ForgeResult<Vec<Vec<f32>>> {
        Ok(
            texts
                .iter()
                .map(|text| {
                    let mut counts = vec![0.0f32; 26];
                    for c in text.to_lowercase().chars().filter(|c| c.is_ascii_lowercase()) {
                        counts[(c as u8 - b'a') as usize] += 1.0;
                    }
                    counts
                })
                .collect()
        )
    }

    fn model(&self) -> &str {
        "mock-embedding"
    }
}
