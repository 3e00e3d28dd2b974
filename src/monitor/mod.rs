//! The poll loop.
//!
//! The monitor polls the provider once immediately and then on a fixed
//! interval, feeds every snapshot through the [`RunStateTracker`], and stops
//! after the poll that observes the last run completing. Every wait races
//! against the cancellation token.

pub mod tracker;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

use crate::display::Display;
use crate::error::{AppError, Result};
use crate::notifier::{notify_run, Notifier};
use crate::platform::types::{Repository, Summary};
use crate::platform::WorkflowRunProvider;

pub use tracker::{Reconciliation, RunStateTracker};

/// How often the countdown on the status line is refreshed.
const COUNTDOWN_TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub repo: Repository,
    pub commit_sha: String,
    pub interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// Every run completed; the summary has been dispatched.
    Completed(Summary),
    Cancelled,
}

pub struct Monitor {
    config: MonitorConfig,
    provider: Arc<dyn WorkflowRunProvider>,
    notifier: Arc<dyn Notifier>,
    display: Box<dyn Display + Send>,
    tracker: RunStateTracker,
    last_update: Option<Instant>,
    span: Span,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        provider: Arc<dyn WorkflowRunProvider>,
        notifier: Arc<dyn Notifier>,
        display: Box<dyn Display + Send>,
    ) -> Self {
        Self {
            config,
            provider,
            notifier,
            display,
            tracker: RunStateTracker::new(),
            last_update: None,
            span: Span::none(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Poll until every run has completed or `cancel` fires.
    ///
    /// Only fatal provider errors and a zero interval are returned. Hook
    /// actions launched by the notifier may still be running when this returns.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<MonitorOutcome> {
        if self.config.interval.is_zero() {
            return Err(AppError::Config("polling interval must be greater than zero".into()));
        }
        let span = self.span.clone();
        self.run_loop(cancel).instrument(span).await
    }

    async fn run_loop(&mut self, cancel: CancellationToken) -> Result<MonitorOutcome> {
        let started = Instant::now();
        let interval = self.config.interval;

        tracing::info!(
            repo = %self.config.repo,
            commit = %self.config.commit_sha,
            interval = ?interval,
            "Starting monitor"
        );

        if let Some(outcome) = self.poll(true, started, &cancel).await? {
            return Ok(outcome);
        }

        let mut poll_timer = tokio::time::interval_at(Instant::now() + interval, interval);
        poll_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut countdown = tokio::time::interval(COUNTDOWN_TICK);
        countdown.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::info!("Monitor cancelled");
                    return Ok(MonitorOutcome::Cancelled);
                }

                _ = poll_timer.tick() => {
                    if let Some(outcome) = self.poll(false, started, &cancel).await? {
                        return Ok(outcome);
                    }
                }

                _ = countdown.tick() => {
                    if let Some(last) = self.last_update {
                        let remaining = interval.saturating_sub(last.elapsed());
                        if !remaining.is_zero() {
                            self.display.show_countdown(remaining);
                        }
                    }
                }
            }
        }
    }

    /// One poll. `Some` means the loop is over.
    async fn poll(&mut self, is_initial: bool, started: Instant, cancel: &CancellationToken) -> Result<Option<MonitorOutcome>> {
        let fetched = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Monitor cancelled during poll");
                return Ok(Some(MonitorOutcome::Cancelled));
            }
            result = self.provider.workflow_runs(&self.config.repo, &self.config.commit_sha) => result,
        };

        let runs = match fetched {
            Ok(runs) => runs,
            Err(e) if e.is_fatal() => {
                tracing::error!(error = %e, "Failed to get workflow runs");
                return Err(e);
            }
            Err(e) => {
                // State stays as it was; the next tick retries.
                tracing::warn!(error = %e, "Failed to get workflow runs");
                return Ok(None);
            }
        };

        let now = Instant::now();
        self.last_update = Some(now);

        let result = self.tracker.reconcile(&runs, is_initial);
        tracing::debug!(
            runs = runs.len(),
            newly_completed = result.newly_completed.len(),
            all_completed = result.all_completed,
            is_initial,
            "Reconciled workflow runs"
        );

        self.display.update(&runs, now.into_std(), self.config.interval);

        for run in &result.newly_completed {
            if let Err(e) = notify_run(self.notifier.as_ref(), run).await {
                tracing::warn!(workflow = %run.name, run_id = run.id, error = %e, "Failed to notify run result");
            }
        }

        if result.should_finish() {
            let summary = Summary::from_runs(&runs, started.elapsed());
            self.display.show_final_summary(&summary);
            if let Err(e) = self.notifier.notify_complete(&summary).await {
                tracing::warn!(error = %e, "Failed to notify completion");
            }
            return Ok(Some(MonitorOutcome::Completed(summary)));
        }

        if runs.is_empty() && !is_initial {
            self.display
                .show_waiting(&self.config.commit_sha, &self.config.repo.full_name());
        }

        Ok(None)
    }
}
