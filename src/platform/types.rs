use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A GitHub repository identified by owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Repository {
    pub owner: String,
    pub name: String,
}

impl Repository {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    /// Any status GitHub reports that we do not model (`waiting`, `requested`, ...).
    Other(String),
}

impl RunStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "queued" => RunStatus::Queued,
            "in_progress" => RunStatus::InProgress,
            "completed" => RunStatus::Completed,
            other => RunStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::Completed => "completed",
            RunStatus::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Conclusion {
    Success,
    Failure,
    Cancelled,
    Skipped,
    TimedOut,
    Other(String),
}

impl Conclusion {
    pub fn parse(conclusion: &str) -> Self {
        match conclusion {
            "success" => Conclusion::Success,
            "failure" => Conclusion::Failure,
            "cancelled" => Conclusion::Cancelled,
            "skipped" => Conclusion::Skipped,
            "timed_out" => Conclusion::TimedOut,
            other => Conclusion::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Conclusion::Success => "success",
            Conclusion::Failure => "failure",
            Conclusion::Cancelled => "cancelled",
            Conclusion::Skipped => "skipped",
            Conclusion::TimedOut => "timed_out",
            Conclusion::Other(s) => s,
        }
    }
}

/// One execution of a workflow for the monitored commit.
///
/// `conclusion` is only `Some` when `status` is [`RunStatus::Completed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    pub name: String,
    pub status: RunStatus,
    pub conclusion: Option<Conclusion>,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowRun {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// Final tally, built once when every run has completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub total_runs: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub other_count: usize,
    pub duration: Duration,
}

impl Summary {
    pub fn from_runs(runs: &[WorkflowRun], elapsed: Duration) -> Self {
        let mut summary = Summary {
            total_runs: runs.len(),
            success_count: 0,
            failure_count: 0,
            other_count: 0,
            // Whole seconds, so the summary line stays readable.
            duration: Duration::from_secs(elapsed.as_secs_f64().round() as u64),
        };

        for run in runs {
            match run.conclusion {
                Some(Conclusion::Success) => summary.success_count += 1,
                Some(Conclusion::Failure) => summary.failure_count += 1,
                _ => summary.other_count += 1,
            }
        }

        summary
    }

    pub fn has_failures(&self) -> bool {
        self.failure_count > 0
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn run(id: u64, name: &str, status: RunStatus, conclusion: Option<Conclusion>) -> WorkflowRun {
        let now = Utc::now();
        WorkflowRun {
            id,
            name: name.to_string(),
            status,
            conclusion,
            url: format!("https://github.com/octo/repo/actions/runs/{id}"),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn queued(id: u64, name: &str) -> WorkflowRun {
        run(id, name, RunStatus::Queued, None)
    }

    pub fn in_progress(id: u64, name: &str) -> WorkflowRun {
        run(id, name, RunStatus::InProgress, None)
    }

    pub fn completed(id: u64, name: &str, conclusion: Conclusion) -> WorkflowRun {
        run(id, name, RunStatus::Completed, Some(conclusion))
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_full_name() {
        assert_eq!(Repository::new("m-mizutani", "octap").full_name(), "m-mizutani/octap");
        assert_eq!(Repository::new("", "").full_name(), "/");
    }

    #[test]
    fn test_unknown_status_is_preserved() {
        assert_eq!(RunStatus::parse("waiting"), RunStatus::Other("waiting".into()));
        assert_eq!(RunStatus::parse("waiting").as_str(), "waiting");
        assert_eq!(Conclusion::parse("action_required").as_str(), "action_required");
    }

    #[test]
    fn test_summary_counts() {
        let runs = vec![
            completed(1, "build", Conclusion::Success),
            completed(2, "test", Conclusion::Failure),
            completed(3, "lint", Conclusion::Skipped),
            completed(4, "deploy", Conclusion::TimedOut),
        ];

        let summary = Summary::from_runs(&runs, Duration::from_millis(61_400));
        assert_eq!(summary.total_runs, 4);
        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.failure_count, 1);
        assert_eq!(summary.other_count, 2);
        assert_eq!(summary.duration, Duration::from_secs(61));
        assert!(summary.has_failures());
    }
}
