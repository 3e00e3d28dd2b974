//! Hook dispatch.
//!
//! Each lifecycle event maps to an ordered list of actions. Every action runs
//! as its own task on a [`TaskTracker`] that lives as long as the executor:
//! per-run events return once their tasks are launched, terminal events wait
//! for the tasks of that call, and [`HookExecutor::wait_for_completion`]
//! drains everything ever launched.

pub mod action;
pub mod actions;
pub mod template;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio_util::task::TaskTracker;
use tracing::{Instrument, Span};

use crate::config::HooksConfig;
use crate::error::{AppError, Result};

use action::{Action, ActionConfig};
use actions::ActionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    CheckSuccess,
    CheckFailure,
    CompleteSuccess,
    CompleteFailure,
}

impl HookEvent {
    pub const ALL: [HookEvent; 4] = [
        HookEvent::CheckSuccess,
        HookEvent::CheckFailure,
        HookEvent::CompleteSuccess,
        HookEvent::CompleteFailure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::CheckSuccess => "check_success",
            HookEvent::CheckFailure => "check_failure",
            HookEvent::CompleteSuccess => "complete_success",
            HookEvent::CompleteFailure => "complete_failure",
        }
    }

    /// Terminal events block `execute` until their actions finish.
    pub fn is_terminal(&self) -> bool {
        matches!(self, HookEvent::CompleteSuccess | HookEvent::CompleteFailure)
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a hook is told about the event that fired it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowEvent {
    pub kind: HookEvent,
    pub repository: String,
    pub workflow: String,
    pub run_id: u64,
    pub url: String,
}

impl WorkflowEvent {
    pub fn new(
        kind: HookEvent,
        repository: impl Into<String>,
        workflow: impl Into<String>,
        run_id: u64,
        url: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            repository: repository.into(),
            workflow: workflow.into(),
            run_id,
            url: url.into(),
        }
    }
}

/// Validated actions per event.
pub type HookTable = HashMap<HookEvent, Vec<Action>>;

/// A configured action that failed validation.
#[derive(Debug)]
pub struct InvalidAction {
    pub event: HookEvent,
    pub index: usize,
    pub error: AppError,
}

impl fmt::Display for InvalidAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hooks.{}[{}]: {}", self.event, self.index, self.error)
    }
}

/// Validate every configured action, keeping the valid ones in order.
pub fn build_hook_table(config: &HooksConfig) -> (HookTable, Vec<InvalidAction>) {
    let mut table = HookTable::new();
    let mut invalid = Vec::new();

    for event in HookEvent::ALL {
        let entries: &[ActionConfig] = config.actions(event);
        let mut valid = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            match Action::from_config(entry) {
                Ok(action) => valid.push(action),
                Err(error) => invalid.push(InvalidAction { event, index, error }),
            }
        }
        if !valid.is_empty() {
            table.insert(event, valid);
        }
    }

    (table, invalid)
}

/// Like [`build_hook_table`], logging and dropping invalid actions.
pub fn load_hook_table(config: &HooksConfig) -> HookTable {
    let (table, invalid) = build_hook_table(config);
    for entry in &invalid {
        tracing::warn!(
            event = %entry.event,
            index = entry.index,
            error = %entry.error,
            "Skipping invalid hook action"
        );
    }
    table
}

/// Dispatches hook actions and tracks them until shutdown.
pub struct HookExecutor {
    hooks: Arc<HookTable>,
    registry: ActionRegistry,
    tracker: TaskTracker,
    span: Span,
}

impl HookExecutor {
    pub fn new(hooks: HookTable) -> Self {
        Self::with_registry(hooks, ActionRegistry::new())
    }

    pub fn with_registry(hooks: HookTable, registry: ActionRegistry) -> Self {
        Self {
            hooks: Arc::new(hooks),
            registry,
            tracker: TaskTracker::new(),
            span: Span::none(),
        }
    }

    /// Span that every action task is instrumented with.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn has_hooks(&self) -> bool {
        self.hooks.values().any(|actions| !actions.is_empty())
    }

    /// Launch the actions configured for `event.kind`.
    ///
    /// Action failures are logged inside their task and never returned.
    pub async fn execute(&self, event: &WorkflowEvent) -> Result<()> {
        let Some(actions) = self.hooks.get(&event.kind).filter(|a| !a.is_empty()) else {
            tracing::debug!(parent: &self.span, event = %event.kind, "No hooks configured");
            return Ok(());
        };

        tracing::debug!(
            parent: &self.span,
            event = %event.kind,
            repository = %event.repository,
            workflow = %event.workflow,
            actions = actions.len(),
            "Executing hooks"
        );

        // Terminal events also register their tasks on a per-call tracker so
        // this call can wait for exactly its own actions.
        let local = event.kind.is_terminal().then(TaskTracker::new);

        for (index, action) in actions.iter().enumerate() {
            let Some(executor) = self.registry.get(action.kind()) else {
                tracing::warn!(
                    parent: &self.span,
                    event = %event.kind,
                    index,
                    action = action.kind(),
                    "No executor registered for action type"
                );
                continue;
            };

            let action = action.clone();
            let event = event.clone();
            let task = async move {
                if let Err(e) = executor.execute(&action, &event).await {
                    if e.is_timeout() {
                        tracing::warn!(event = %event.kind, index, action = action.kind(), error = %e, "Hook action timed out");
                    } else {
                        tracing::warn!(event = %event.kind, index, action = action.kind(), error = %e, "Hook action failed");
                    }
                } else {
                    tracing::debug!(event = %event.kind, index, action = action.kind(), "Hook action finished");
                }
            }
            .instrument(self.span.clone());

            match &local {
                Some(local) => self.tracker.spawn(local.track_future(task)),
                None => self.tracker.spawn(task),
            };
        }

        if let Some(local) = local {
            local.close();
            local.wait().await;
        }

        Ok(())
    }

    /// Block until every action launched so far has finished.
    pub async fn wait_for_completion(&self) {
        tracing::debug!(parent: &self.span, pending = self.tracker.len(), "Waiting for hook actions");
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.tracker.len()
    }
}
