pub mod command;
pub mod notify;
pub mod slack;
pub mod sound;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::hooks::action::Action;
use crate::hooks::WorkflowEvent;

/// Runs one kind of hook action.
///
/// Executors own their side effect and report failure through the returned
/// error; the hook executor logs it and never propagates it further.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// The `type` discriminant this executor handles.
    fn kind(&self) -> &'static str;

    async fn execute(&self, action: &Action, event: &WorkflowEvent) -> Result<()>;
}

/// Executors keyed by action type.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    executors: HashMap<&'static str, Arc<dyn ActionExecutor>>,
}

impl ActionRegistry {
    /// Registry with the four built-in executors.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(sound::SoundExecutor::new()));
        registry.register(Arc::new(command::CommandExecutor::new()));
        registry.register(Arc::new(slack::SlackExecutor::new()));
        registry.register(Arc::new(notify::NotifyExecutor::new()));
        registry
    }

    pub fn empty() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    pub fn register(&mut self, executor: Arc<dyn ActionExecutor>) {
        self.executors.insert(executor.kind(), executor);
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn ActionExecutor>> {
        self.executors.get(kind).cloned()
    }
}

/// Expand `~` and `$VAR`/`${VAR}` against the host environment.
pub fn expand_path(path: &str) -> String {
    expand_env(&shellexpand::tilde(path))
}

/// Expand `$VAR`/`${VAR}` against the host environment.
///
/// Unset variables are left as written so a child shell can still resolve
/// them, e.g. the `OCTAP_*` variables injected into command actions.
pub fn expand_env(value: &str) -> String {
    shellexpand::env_with_context_no_errors(value, |name| std::env::var(name).ok()).into_owned()
}
