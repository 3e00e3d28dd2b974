use std::collections::{HashMap, HashSet};

use crate::platform::types::WorkflowRun;

/// Outcome of reconciling one poll against everything seen before.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Runs whose transition into `completed` was observed by this poll.
    pub newly_completed: Vec<WorkflowRun>,
    /// Every run is completed and there is at least one run.
    pub all_completed: bool,
    pub has_transition: bool,
    pub is_initial: bool,
}

impl Reconciliation {
    /// Whether the monitor should emit the summary and stop.
    ///
    /// On later polls this requires a transition, so a steady all-completed
    /// snapshot only ends the loop once.
    pub fn should_finish(&self) -> bool {
        self.all_completed && (self.is_initial || self.has_transition)
    }
}

/// Run state across polls for one monitored commit.
#[derive(Debug, Default)]
pub struct RunStateTracker {
    registry: HashMap<u64, WorkflowRun>,
    completed: HashSet<u64>,
}

impl RunStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reconcile(&mut self, runs: &[WorkflowRun], is_initial: bool) -> Reconciliation {
        let mut result = Reconciliation {
            is_initial,
            ..Default::default()
        };
        let mut all_completed = true;

        for run in runs {
            let previous = self.registry.insert(run.id, run.clone());

            if !run.is_completed() {
                all_completed = false;
                continue;
            }

            // First sighting of this run as completed.
            if self.completed.insert(run.id) {
                let was_running = previous.as_ref().is_some_and(|p| !p.is_completed());
                if was_running {
                    result.has_transition = true;
                    result.newly_completed.push(run.clone());
                }
            }
        }

        result.all_completed = all_completed && !runs.is_empty();
        result
    }

    #[cfg(test)]
    pub fn get(&self, id: u64) -> Option<&WorkflowRun> {
        self.registry.get(&id)
    }

    #[cfg(test)]
    pub fn known_runs(&self) -> usize {
        self.registry.len()
    }

    #[cfg(test)]
    pub fn is_completed(&self, id: u64) -> bool {
        self.completed.contains(&id)
    }
}
