//! Shared multiplayer sessions and their reconciliation.
//!
//! # Responsibility
//! - Capture each participant's baseline before the shared board is cleared.
//! - Apply in-session task events to transient working copies.
//! - Merge session gains back into authoritative records exactly once.
//!
//! # Invariants
//! - Session working copies are never persisted directly, except a guest's
//!   first save.
//! - A participant is reconciled at most once per session; a failed write
//!   leaves it retryable.
//! - Live-bound records are assigned absolute totals, never reloaded.
//!
//! # See also
//! - `service::record_service` for single-player edits outside a session.

use crate::model::record::ParticipantId;
use crate::model::task::TaskValidationError;
use crate::repo::record_repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod baseline;
pub mod binding;
pub mod mutator;
pub mod reconcile;
pub mod report;
pub mod state;

/// Errors raised while starting or mutating a session.
#[derive(Debug)]
pub enum SessionError {
    NoParticipants,
    UnknownParticipant(ParticipantId),
    AlreadyReconciled(ParticipantId),
    InvalidTask(TaskValidationError),
    /// Baseline capture hit a store failure other than "not found".
    Store(RepoError),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoParticipants => write!(f, "a session needs at least one participant"),
            Self::UnknownParticipant(id) => write!(f, "participant not in session: {id}"),
            Self::AlreadyReconciled(id) => {
                write!(f, "participant already reconciled: {id}")
            }
            Self::InvalidTask(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidTask(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TaskValidationError> for SessionError {
    fn from(value: TaskValidationError) -> Self {
        Self::InvalidTask(value)
    }
}

impl From<RepoError> for SessionError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}
