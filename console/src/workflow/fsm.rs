//! Finite state machine for package transfers

use serde::{Deserialize, Serialize};

/// Highest percentage shown while a transfer has not been confirmed
pub const IN_FLIGHT_CAP: u8 = 99;

/// Transfer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TransferState {
    /// Nothing submitted
    Idle,

    /// Pre-flight checks, no network yet
    Validating,

    /// Bytes on the wire
    Uploading { percent: u8 },

    /// Package accepted; waiting for the replaced service to answer
    Recovering { attempt: u32 },

    /// Finished successfully
    Completed,

    /// Finished with an error
    Failed,
}

/// Transfer event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    /// Operator submitted the form
    Submit,

    /// Pre-flight check failed
    Rejected,

    /// Pre-flight checks passed
    Validated,

    /// Transport progress, as a percentage
    Progress(u8),

    /// Server answered 2xx and nothing else needs confirming
    Succeeded,

    /// Server answered 2xx but the outcome is confirmed later
    Accepted,

    /// One more recovery check went out
    PollAttempt,

    /// The service answered a recovery check
    Recovered,

    /// Recovery ceiling reached without an answer
    RecoveryExhausted,

    /// Non-2xx answer or no answer at all
    Failed(String),

    /// Back to idle after a finished run
    Reset,
}

/// Tracks one upload-like run from submission to its final state.
///
/// Progress is monotonic and capped at [`IN_FLIGHT_CAP`] while uploading;
/// only [`TransferEvent::Succeeded`] or [`TransferEvent::Accepted`] report 100.
#[derive(Debug, Clone)]
pub struct TransferFsm {
    state: TransferState,
    error: Option<String>,
}

impl TransferFsm {
    pub fn new() -> Self {
        Self {
            state: TransferState::Idle,
            error: None,
        }
    }

    pub fn state(&self) -> &TransferState {
        &self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Percentage to display for the current state, if any
    pub fn percent(&self) -> Option<u8> {
        match self.state {
            TransferState::Uploading { percent } => Some(percent),
            TransferState::Recovering { .. } | TransferState::Completed => Some(100),
            _ => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self.state,
            TransferState::Validating
                | TransferState::Uploading { .. }
                | TransferState::Recovering { .. }
        )
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: TransferEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            // From Idle
            (TransferState::Idle, TransferEvent::Submit) => {
                self.error = None;
                TransferState::Validating
            }

            // From Validating
            (TransferState::Validating, TransferEvent::Rejected) => TransferState::Idle,
            (TransferState::Validating, TransferEvent::Validated) => {
                TransferState::Uploading { percent: 0 }
            }

            // From Uploading
            (TransferState::Uploading { percent }, TransferEvent::Progress(next)) => {
                TransferState::Uploading {
                    percent: (*percent).max((*next).min(IN_FLIGHT_CAP)),
                }
            }
            (TransferState::Uploading { .. }, TransferEvent::Succeeded) => TransferState::Completed,
            (TransferState::Uploading { .. }, TransferEvent::Accepted) => {
                TransferState::Recovering { attempt: 0 }
            }
            (TransferState::Uploading { .. }, TransferEvent::Failed(err)) => {
                self.error = Some(err.clone());
                TransferState::Failed
            }

            // From Recovering
            (TransferState::Recovering { attempt }, TransferEvent::PollAttempt) => {
                TransferState::Recovering {
                    attempt: attempt.saturating_add(1),
                }
            }
            (TransferState::Recovering { .. }, TransferEvent::Recovered) => TransferState::Completed,
            (TransferState::Recovering { .. }, TransferEvent::RecoveryExhausted) => {
                TransferState::Idle
            }

            // From a final state
            (TransferState::Completed | TransferState::Failed, TransferEvent::Reset) => {
                TransferState::Idle
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for TransferFsm {
    fn default() -> Self {
        Self::new()
    }
}
