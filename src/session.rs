//! Single-user session lifecycle.
//!
//! `SessionState` is a closed enum and `transition` is the only way to move
//! between states, so a finished session always carries a non-empty table.

use std::sync::Mutex;

use serde::Serialize;

use crate::grid::GridError;
use crate::pipeline::ExtractedTable;

// ═══════════════════════════════════════════════════════════
// States and events
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Processing { progress: String },
    Success { table: ExtractedTable },
    Failed { message: String },
}

impl SessionState {
    pub fn table(&self) -> Option<&ExtractedTable> {
        match self {
            Self::Success { table } => Some(table),
            _ => None,
        }
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, Self::Processing { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Processing { .. } => "processing",
            Self::Success { .. } => "success",
            Self::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    UploadStarted,
    Progress(String),
    Extracted(ExtractedTable),
    Failed(String),
    CellEdited { row: usize, col: usize, value: String },
    Reset,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("An extraction is already in progress.")]
    Busy,
    #[error("There is no table to edit.")]
    NoTable,
    #[error("No extraction is in progress.")]
    NotProcessing,
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// First progress message of every upload.
pub const UPLOAD_STARTED_PROGRESS: &str = "Optimizing image...";

/// Compute the state that follows `state` after `event`.
///
/// Progress updates outside `Processing` are dropped without error; every
/// other illegal combination is rejected and leaves the caller's state as is.
pub fn transition(state: &SessionState, event: SessionEvent) -> Result<SessionState, TransitionError> {
    use SessionEvent as E;
    use SessionState as S;

    match (state, event) {
        (S::Processing { .. }, E::UploadStarted | E::Reset) => Err(TransitionError::Busy),
        (_, E::UploadStarted) => Ok(S::Processing {
            progress: UPLOAD_STARTED_PROGRESS.to_string(),
        }),

        (S::Processing { .. }, E::Progress(progress)) => Ok(S::Processing { progress }),
        (other, E::Progress(_)) => Ok(other.clone()),

        (S::Processing { .. }, E::Extracted(table)) => Ok(S::Success { table }),
        (S::Processing { .. }, E::Failed(message)) => Ok(S::Failed { message }),
        (_, E::Extracted(_) | E::Failed(_)) => Err(TransitionError::NotProcessing),

        (S::Success { table }, E::CellEdited { row, col, value }) => Ok(S::Success {
            table: table.set_cell(row, col, value)?,
        }),
        (_, E::CellEdited { .. }) => Err(TransitionError::NoTable),

        (_, E::Reset) => Ok(S::Idle),
    }
}

// ═══════════════════════════════════════════════════════════
// Shared store
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("Internal lock error")]
    LockPoisoned,
}

/// The one session, shared between request handlers and the pipeline task.
#[derive(Debug, Default)]
pub struct SessionStore {
    state: Mutex<SessionState>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Result<SessionState, SessionError> {
        let guard = self.state.lock().map_err(|_| SessionError::LockPoisoned)?;
        Ok(guard.clone())
    }

    /// Apply one event atomically and return the resulting state.
    pub fn apply(&self, event: SessionEvent) -> Result<SessionState, SessionError> {
        let mut guard = self.state.lock().map_err(|_| SessionError::LockPoisoned)?;
        let from = guard.name();
        let next = transition(&guard, event)?;
        if next.name() != from {
            tracing::info!(from, to = next.name(), "Session transition");
        }
        *guard = next.clone();
        Ok(next)
    }
}
