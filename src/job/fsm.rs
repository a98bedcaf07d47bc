use crate::{Error, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

// Submission states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Idle,
    Validating,
    Submitting,
    Polling,
    Succeeded,
    Failed,
    Errored,
}

// Submission events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionEvent {
    Submit,
    InputAccepted,
    InputRejected,
    JobCreated,
    CreationFailed,
    StatusPending,
    JobSucceeded,
    JobFailed,
    RetriesExhausted,
    Reset,
}

/// One submission cycle. Framework-free so it can be driven from tests.
pub struct SubmissionStateMachine {
    state: SubmissionState,
    history: Vec<SubmissionState>,
}

impl SubmissionStateMachine {
    pub fn new() -> Self {
        Self {
            state: SubmissionState::Idle,
            history: vec![SubmissionState::Idle],
        }
    }

    pub fn current_state(&self) -> SubmissionState {
        self.state
    }

    /// Every state visited so far, starting with `Idle`.
    pub fn history(&self) -> &[SubmissionState] {
        &self.history
    }

    pub fn transition(&mut self, event: SubmissionEvent) -> Result<SubmissionState> {
        let old_state = self.state;
        debug!("Submission FSM processing {:?} in {:?}", event, old_state);

        let new_state = match (old_state, event) {
            (SubmissionState::Idle, SubmissionEvent::Submit) => SubmissionState::Validating,
            (SubmissionState::Validating, SubmissionEvent::InputAccepted) => {
                SubmissionState::Submitting
            }
            (SubmissionState::Validating, SubmissionEvent::InputRejected) => {
                SubmissionState::Errored
            }
            (SubmissionState::Submitting, SubmissionEvent::JobCreated) => SubmissionState::Polling,
            (SubmissionState::Submitting, SubmissionEvent::CreationFailed) => {
                SubmissionState::Errored
            }
            (SubmissionState::Polling, SubmissionEvent::StatusPending) => SubmissionState::Polling,
            (SubmissionState::Polling, SubmissionEvent::JobSucceeded) => {
                SubmissionState::Succeeded
            }
            (SubmissionState::Polling, SubmissionEvent::JobFailed) => SubmissionState::Failed,
            (SubmissionState::Polling, SubmissionEvent::RetriesExhausted) => {
                SubmissionState::Errored
            }
            (
                SubmissionState::Succeeded | SubmissionState::Failed | SubmissionState::Errored,
                SubmissionEvent::Reset,
            ) => SubmissionState::Idle,
            _ => {
                warn!(
                    "Invalid submission transition from {:?} with event {:?}",
                    old_state, event
                );
                return Err(Error::InvalidTransition {
                    current: format!("{:?}", old_state),
                    requested: format!("{:?}", event),
                });
            }
        };

        if old_state != new_state {
            info!(
                "Submission state transition: {:?} -> {:?} (event: {:?})",
                old_state, new_state, event
            );
            self.history.push(new_state);
        }

        self.state = new_state;
        Ok(new_state)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            SubmissionState::Succeeded | SubmissionState::Failed | SubmissionState::Errored
        )
    }

    /// True while the trigger must stay disabled.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self.state,
            SubmissionState::Submitting | SubmissionState::Polling
        )
    }
}

impl Default for SubmissionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
