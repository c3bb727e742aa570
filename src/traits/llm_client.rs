use async_trait::async_trait;

use crate::errors::ForgeResult;

/// A chat-completion backend
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send one system + user prompt pair and return the assistant text
    async fn complete(&self, system: &str, prompt: &str) -> ForgeResult<String>;

    /// Backend name for logging
    fn name(&self) -> &str;
}
