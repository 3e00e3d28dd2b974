pub mod github;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use types::*;

/// Source of workflow runs for a commit.
///
/// Implementations must be side-effect free from the monitor's point of view:
/// calling this twice with the same arguments is always safe.
#[async_trait]
pub trait WorkflowRunProvider: Send + Sync {
    /// List the workflow runs triggered for `commit_sha`.
    ///
    /// Authentication problems are reported as `AppError::Authentication`,
    /// everything else as `AppError::ApiRequest`.
    async fn workflow_runs(&self, repo: &Repository, commit_sha: &str) -> Result<Vec<WorkflowRun>>;
}
