use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::platform::types::{Conclusion, RunStatus, WorkflowRun};

/// Response of `GET /repos/{owner}/{repo}/actions/runs`.
#[derive(Debug, Deserialize)]
pub struct WorkflowRunsPage {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub workflow_runs: Vec<WorkflowRunPayload>,
}

#[derive(Debug, Deserialize)]
pub struct WorkflowRunPayload {
    pub id: u64,
    pub name: Option<String>,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    #[serde(default)]
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Map a GitHub run payload to our run type.
pub fn map_workflow_run(run: WorkflowRunPayload) -> WorkflowRun {
    let status = RunStatus::parse(run.status.as_deref().unwrap_or("queued"));

    // GitHub sometimes reports a stale conclusion on re-runs; only trust it once completed.
    let conclusion = if status == RunStatus::Completed {
        run.conclusion.as_deref().map(Conclusion::parse)
    } else {
        None
    };

    WorkflowRun {
        id: run.id,
        name: run.name.unwrap_or_else(|| format!("run {}", run.id)),
        status,
        conclusion,
        url: run.html_url,
        created_at: run.created_at,
        updated_at: run.updated_at,
    }
}
