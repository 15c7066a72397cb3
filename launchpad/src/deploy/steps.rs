//! Step tracking for one pipeline run

use crate::models::deployment::{Step, StepName, StepStatus};

/// The seven steps of a run and their status.
///
/// Only a pending step can start, only the running step can finish, and at
/// most one step is running at a time.
#[derive(Debug, Clone)]
pub struct StepBoard {
    steps: Vec<Step>,
}

impl StepBoard {
    pub fn new() -> Self {
        Self {
            steps: StepName::ALL.iter().copied().map(Step::pending).collect(),
        }
    }

    pub fn get(&self, name: StepName) -> &Step {
        &self.steps[name.index()]
    }

    /// The step currently running, found by linear scan
    pub fn running(&self) -> Option<StepName> {
        self.steps
            .iter()
            .find(|s| s.status == StepStatus::Running)
            .map(|s| s.name)
    }

    /// Mark `name` as running
    pub fn start(&mut self, name: StepName) -> Result<(), String> {
        if let Some(running) = self.running() {
            return Err(format!("cannot start {} while {} is running", name, running));
        }
        let step = &mut self.steps[name.index()];
        if step.status != StepStatus::Pending {
            return Err(format!("cannot start {} from {:?}", name, step.status));
        }
        step.status = StepStatus::Running;
        Ok(())
    }

    /// Move the running step `name` to a finished status
    pub fn finish(
        &mut self,
        name: StepName,
        status: StepStatus,
        details: Option<String>,
    ) -> Result<(), String> {
        if !status.is_finished() {
            return Err(format!("{:?} is not a finished status", status));
        }
        let step = &mut self.steps[name.index()];
        if step.status != StepStatus::Running {
            return Err(format!("cannot finish {} from {:?}", name, step.status));
        }
        step.status = status;
        step.details = details;
        Ok(())
    }

    /// Fail whichever step is running; returns it
    pub fn fail_running(&mut self, details: &str) -> Option<StepName> {
        let name = self.running()?;
        let step = &mut self.steps[name.index()];
        step.status = StepStatus::Failure;
        step.details = Some(details.to_string());
        Some(name)
    }

    pub fn snapshot(&self) -> Vec<Step> {
        self.steps.clone()
    }
}

impl Default for StepBoard {
    fn default() -> Self {
        Self::new()
    }
}
