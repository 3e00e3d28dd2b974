use async_trait::async_trait;
use octocrab::Octocrab;
use serde::Serialize;

use crate::config::GitHubConfig;
use crate::error::{AppError, Result};
use crate::platform::types::*;
use crate::platform::WorkflowRunProvider;

use super::auth::resolve_token;
use super::mapper::{self, WorkflowRunsPage};

/// GitHub caps `per_page` at 100; a single commit rarely has more runs than that.
const RUNS_PER_PAGE: u8 = 100;

#[derive(Serialize)]
struct RunsQuery<'a> {
    head_sha: &'a str,
    per_page: u8,
}

pub struct GitHubProvider {
    client: Octocrab,
}

impl GitHubProvider {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let mut builder = Octocrab::builder();

        if let Some(base_url) = &config.api_url {
            builder = builder
                .base_uri(base_url.as_str())
                .map_err(|e| AppError::Config(format!("Invalid GitHub API URL {base_url}: {e}")))?;
        }

        match resolve_token(config.token.as_deref()) {
            Some(token) => builder = builder.personal_token(token),
            None => tracing::info!("No GitHub token found, using anonymous API access"),
        }

        let client = builder
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build octocrab client: {e}")))?;

        Ok(Self { client })
    }

    fn runs_route(repo: &Repository) -> String {
        format!(
            "/repos/{}/{}/actions/runs",
            urlencoding::encode(&repo.owner),
            urlencoding::encode(&repo.name)
        )
    }
}

#[async_trait]
impl WorkflowRunProvider for GitHubProvider {
    async fn workflow_runs(&self, repo: &Repository, commit_sha: &str) -> Result<Vec<WorkflowRun>> {
        let route = Self::runs_route(repo);
        let query = RunsQuery {
            head_sha: commit_sha,
            per_page: RUNS_PER_PAGE,
        };

        let page: WorkflowRunsPage = self.client.get(&route, Some(&query)).await?;

        if page.total_count > page.workflow_runs.len() as u64 {
            tracing::debug!(
                total = page.total_count,
                fetched = page.workflow_runs.len(),
                "Commit has more workflow runs than a single page"
            );
        }

        let runs: Vec<WorkflowRun> = page
            .workflow_runs
            .into_iter()
            .map(mapper::map_workflow_run)
            .collect();

        tracing::debug!(
            repo = %repo,
            commit = commit_sha,
            count = runs.len(),
            "Fetched workflow runs"
        );

        Ok(runs)
    }
}
