use async_trait::async_trait;
use tracing::Span;

use crate::error::Result;
use crate::hooks::action::{Action, SoundAction};
use crate::hooks::actions::ActionRegistry;
use crate::hooks::{HookEvent, HookExecutor, HookTable, WorkflowEvent};
use crate::platform::types::{Conclusion, Summary, WorkflowRun};

/// Workflow name used for events that summarise every run of the commit.
pub const ALL_WORKFLOWS: &str = "All workflows";

/// Turns monitor outcomes into notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_success(&self, run: &WorkflowRun) -> Result<()>;

    async fn notify_failure(&self, run: &WorkflowRun) -> Result<()>;

    /// Fired once every run of the commit has completed. Blocks until the
    /// configured terminal actions have finished.
    async fn notify_complete(&self, summary: &Summary) -> Result<()>;

    /// Drain background actions. Call once before the process exits.
    async fn wait_for_pending_actions(&self);
}

/// Notifier backed by the configured hooks.
pub struct HookNotifier {
    repository: String,
    executor: HookExecutor,
}

impl HookNotifier {
    /// Falls back to the built-in system sounds when `hooks` is empty.
    pub fn new(repository: impl Into<String>, hooks: HookTable) -> Self {
        Self::with_registry(repository, hooks, ActionRegistry::new())
    }

    pub fn with_registry(repository: impl Into<String>, hooks: HookTable, registry: ActionRegistry) -> Self {
        let repository = repository.into();
        let hooks = if hooks.values().all(Vec::is_empty) {
            tracing::debug!("No hooks configured, using built-in sounds");
            builtin_sound_hooks()
        } else {
            hooks
        };

        Self {
            executor: HookExecutor::with_registry(hooks, registry),
            repository,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.executor = self.executor.with_span(span);
        self
    }

    async fn fire_run_event(&self, kind: HookEvent, run: &WorkflowRun) -> Result<()> {
        let event = WorkflowEvent::new(kind, self.repository.as_str(), run.name.as_str(), run.id, run.url.as_str());
        self.executor.execute(&event).await
    }
}

#[async_trait]
impl Notifier for HookNotifier {
    async fn notify_success(&self, run: &WorkflowRun) -> Result<()> {
        tracing::info!(workflow = %run.name, run_id = run.id, "Workflow succeeded");
        self.fire_run_event(HookEvent::CheckSuccess, run).await
    }

    async fn notify_failure(&self, run: &WorkflowRun) -> Result<()> {
        tracing::info!(workflow = %run.name, run_id = run.id, "Workflow failed");
        self.fire_run_event(HookEvent::CheckFailure, run).await
    }

    async fn notify_complete(&self, summary: &Summary) -> Result<()> {
        let kind = if summary.has_failures() {
            HookEvent::CompleteFailure
        } else {
            HookEvent::CompleteSuccess
        };
        tracing::info!(
            event = %kind,
            total = summary.total_runs,
            success = summary.success_count,
            failure = summary.failure_count,
            other = summary.other_count,
            "All workflows completed"
        );

        let event = WorkflowEvent::new(kind, self.repository.as_str(), ALL_WORKFLOWS, 0, "");
        self.executor.execute(&event).await
    }

    async fn wait_for_pending_actions(&self) {
        self.executor.wait_for_completion().await;
    }
}

/// Notifier that does nothing; used with `--silent`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentNotifier;

#[async_trait]
impl Notifier for SilentNotifier {
    async fn notify_success(&self, _run: &WorkflowRun) -> Result<()> {
        Ok(())
    }

    async fn notify_failure(&self, _run: &WorkflowRun) -> Result<()> {
        Ok(())
    }

    async fn notify_complete(&self, _summary: &Summary) -> Result<()> {
        Ok(())
    }

    async fn wait_for_pending_actions(&self) {}
}

/// Dispatch the per-run notification for a newly completed run.
///
/// Only success and failure are announced; other conclusions are counted in
/// the summary alone.
pub async fn notify_run(notifier: &dyn Notifier, run: &WorkflowRun) -> Result<()> {
    match run.conclusion {
        Some(Conclusion::Success) => notifier.notify_success(run).await,
        Some(Conclusion::Failure) => notifier.notify_failure(run).await,
        _ => {
            tracing::debug!(
                workflow = %run.name,
                conclusion = run.conclusion.as_ref().map(|c| c.as_str()).unwrap_or("none"),
                "No notification for conclusion"
            );
            Ok(())
        }
    }
}

/// System sounds played when no hooks are configured.
pub fn builtin_sound_hooks() -> HookTable {
    let Some((success, failure)) = system_sounds() else {
        return HookTable::new();
    };

    let sound = |path: &str| {
        vec![Action::Sound(SoundAction {
            path: path.to_string(),
        })]
    };

    HookTable::from([
        (HookEvent::CheckSuccess, sound(success)),
        (HookEvent::CheckFailure, sound(failure)),
        (HookEvent::CompleteSuccess, sound(success)),
        (HookEvent::CompleteFailure, sound(failure)),
    ])
}

fn system_sounds() -> Option<(&'static str, &'static str)> {
    if cfg!(target_os = "macos") {
        Some(("/System/Library/Sounds/Glass.aiff", "/System/Library/Sounds/Basso.aiff"))
    } else if cfg!(target_os = "linux") {
        Some((
            "/usr/share/sounds/freedesktop/stereo/complete.oga",
            "/usr/share/sounds/freedesktop/stereo/dialog-error.oga",
        ))
    } else {
        None
    }
}
