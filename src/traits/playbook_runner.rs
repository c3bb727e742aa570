use async_trait::async_trait;
use std::path::Path;

use crate::errors::ForgeResult;
use crate::models::execution::{ RunOptions, ToolOutput };

/// Runs an Ansible playbook against a host.
///
/// A run that exceeds its timeout returns `Ok` with `timed_out` set; `Err`
/// is reserved for a runner that could not be started at all.
#[async_trait]
pub trait PlaybookRunner: Send + Sync {
    async fn run(&self, playbook: &Path, options: &RunOptions) -> ForgeResult<ToolOutput>;

    fn name(&self) -> &str;
}
