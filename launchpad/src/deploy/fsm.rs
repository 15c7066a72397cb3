//! Finite state machine for deployment status
//!
//! `RUNNING` moves to exactly one terminal status. Terminal statuses are
//! sticky, which is what keeps an out-of-band `CANCELLED` from being
//! overwritten by a late `FAILED`.

use crate::models::deployment::DeploymentStatus;

/// Deployment event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentEvent {
    /// Every fatal step succeeded
    Succeeded,

    /// A fatal step failed
    Failed(String),

    /// Stopped by the operator
    Cancelled,
}

impl DeploymentEvent {
    /// Event that would lead to `status`, if any
    pub fn for_status(status: DeploymentStatus) -> Option<Self> {
        match status {
            DeploymentStatus::Running => None,
            DeploymentStatus::Success => Some(DeploymentEvent::Succeeded),
            DeploymentStatus::Failed => Some(DeploymentEvent::Failed(String::new())),
            DeploymentStatus::Cancelled => Some(DeploymentEvent::Cancelled),
        }
    }
}

/// Deployment FSM
#[derive(Debug, Clone)]
pub struct DeploymentFsm {
    state: DeploymentStatus,
    error: Option<String>,
}

impl DeploymentFsm {
    /// Create a new FSM in the running state
    pub fn new() -> Self {
        Self::resume(DeploymentStatus::Running)
    }

    /// Rebuild the FSM from a persisted status
    pub fn resume(state: DeploymentStatus) -> Self {
        Self { state, error: None }
    }

    /// Get current state
    pub fn state(&self) -> DeploymentStatus {
        self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: DeploymentEvent) -> Result<(), String> {
        let new_state = match (self.state, &event) {
            (DeploymentStatus::Running, DeploymentEvent::Succeeded) => DeploymentStatus::Success,
            (DeploymentStatus::Running, DeploymentEvent::Failed(err)) => {
                self.error = Some(err.clone());
                DeploymentStatus::Failed
            }
            (DeploymentStatus::Running, DeploymentEvent::Cancelled) => DeploymentStatus::Cancelled,

            // Repeating the terminal event is harmless
            (DeploymentStatus::Success, DeploymentEvent::Succeeded) => DeploymentStatus::Success,
            (DeploymentStatus::Failed, DeploymentEvent::Failed(_)) => DeploymentStatus::Failed,
            (DeploymentStatus::Cancelled, DeploymentEvent::Cancelled) => {
                DeploymentStatus::Cancelled
            }

            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }

    /// Check whether a persisted status may be replaced by `next`
    pub fn check(current: DeploymentStatus, next: DeploymentStatus) -> Result<(), String> {
        if current == next {
            return Ok(());
        }
        match DeploymentEvent::for_status(next) {
            Some(event) => DeploymentFsm::resume(current).process(event),
            None => Err(format!("Invalid transition: {:?} -> {:?}", current, next)),
        }
    }
}

impl Default for DeploymentFsm {
    fn default() -> Self {
        Self::new()
    }
}
