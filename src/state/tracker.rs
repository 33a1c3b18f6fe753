use crate::state::TaskState;
use crate::HarvestError;

/// Tracks one task's state and rejects illegal transitions
#[derive(Debug, Clone)]
pub struct TaskTracker {
    url: String,
    state: TaskState,
}

impl TaskTracker {
    /// Starts tracking a freshly queued task
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: TaskState::Queued,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Moves the task to `next`
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The transition was legal and applied
    /// * `Err(HarvestError::InvalidTransition)` - The state is left unchanged
    pub fn transition(&mut self, next: TaskState) -> Result<(), HarvestError> {
        if !self.state.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        tracing::trace!("{}: {} -> {}", self.url, self.state, next);
        self.state = next;
        Ok(())
    }
}
