//! Push-to-talk state machine with validated transitions.
//!
//! - Uninitialized -> Waiting (permission granted)
//! - Waiting -> Starting (button pressed)
//! - Starting -> Recording (recorder running)
//! - Recording -> Processing (button released, minimum length reached)
//! - Processing -> Waiting (upload answered)
//! - Starting / Recording / Processing -> Waiting (failure, after teardown)

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::ClientError;

/// Capture state of the microphone button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureState {
    /// Recording permission not granted (yet). No button is offered.
    Uninitialized,
    /// Ready for a new recording.
    Waiting,
    /// Pressed; the recorder is being prepared.
    Starting,
    /// Recorder is running.
    Recording,
    /// Recording stopped; upload in flight.
    Processing,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureState::Uninitialized => "Uninitialized",
            CaptureState::Waiting => "Waiting",
            CaptureState::Starting => "Starting",
            CaptureState::Recording => "Recording",
            CaptureState::Processing => "Processing",
        };
        f.write_str(name)
    }
}

impl CaptureState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &CaptureState) -> bool {
        matches!(
            (self, target),
            (CaptureState::Uninitialized, CaptureState::Waiting)
                | (CaptureState::Waiting, CaptureState::Starting)
                | (CaptureState::Starting, CaptureState::Recording)
                | (CaptureState::Recording, CaptureState::Processing)
                | (CaptureState::Processing, CaptureState::Waiting)
                // Recovery
                | (CaptureState::Starting, CaptureState::Waiting)
                | (CaptureState::Recording, CaptureState::Waiting)
        )
    }

    /// Whether the button accepts a press.
    pub fn accepts_press(&self) -> bool {
        *self == CaptureState::Waiting
    }
}

/// Shared capture state. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: Arc<Mutex<CaptureState>>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a state machine in `Uninitialized`.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(CaptureState::Uninitialized)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CaptureState> {
        // The guarded value is a plain Copy enum, a poisoned lock still holds a valid state.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn current(&self) -> CaptureState {
        *self.lock()
    }

    /// Attempt to transition to `target`.
    pub fn transition(&self, target: CaptureState) -> Result<(), ClientError> {
        let mut state = self.lock();
        if state.can_transition_to(&target) {
            tracing::debug!("Capture state: {} -> {}", *state, target);
            *state = target;
            Ok(())
        } else {
            Err(ClientError::InvalidState(format!(
                "{} -> {}",
                *state, target
            )))
        }
    }

    /// Return to `Waiting` after a failed recording. A machine that never got
    /// permission stays `Uninitialized`.
    pub fn recover(&self) {
        let mut state = self.lock();
        if *state != CaptureState::Uninitialized {
            tracing::warn!("Capture state reset to Waiting from {}", *state);
            *state = CaptureState::Waiting;
        }
    }
}
