//! Per-participant outcomes of session reconciliation.

use crate::model::record::ParticipantId;
use crate::repo::record_repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Why one participant's sync did not complete.
#[derive(Debug)]
pub enum ReconcileError {
    /// The participant joined as a guest but a stored record exists now.
    MissingBaseline,
    /// The record existed at session start but `load` reported not found.
    Toctou,
    /// `exists`/`load` failed for a reason other than "not found".
    Store(RepoError),
    /// `save` failed; the session gains were not persisted.
    Write(RepoError),
}

impl ReconcileError {
    /// Whether the participant stays un-reconciled so a re-run retries it.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Write(_))
    }
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingBaseline => write!(f, "no baseline captured for a stored participant"),
            Self::Toctou => write!(f, "record disappeared after session start"),
            Self::Store(err) => write!(f, "store read failed: {err}"),
            Self::Write(err) => write!(f, "store write failed: {err}"),
        }
    }
}

impl Error for ReconcileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) | Self::Write(err) => Some(err),
            Self::MissingBaseline | Self::Toctou => None,
        }
    }
}

/// Totals actually applied to the authoritative record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncGains {
    pub xp: i64,
    pub levels: i64,
    pub coins: i64,
    /// Tasks newly credited to the lifetime completed counter.
    pub tasks: i64,
}

#[derive(Debug)]
pub enum ParticipantOutcome {
    /// A guest's session record was saved as a new record.
    GuestSaved,
    /// Skip guard: nothing gained, nothing written.
    NoGains,
    /// The primary view's record was updated in place.
    LiveUpdated(SyncGains),
    /// A freshly loaded record was updated and saved.
    OfflineSaved(SyncGains),
    /// Reconciled by an earlier `end_session` call.
    AlreadyReconciled,
    Failed(ReconcileError),
}

#[derive(Debug)]
pub struct ParticipantReport {
    pub participant: ParticipantId,
    pub outcome: ParticipantOutcome,
}

impl ParticipantReport {
    /// User-facing "progress saved" text, or `None` when nothing was merged.
    ///
    /// Only non-zero gain lines are included.
    pub fn progress_message(&self) -> Option<String> {
        let gains = match &self.outcome {
            ParticipantOutcome::LiveUpdated(gains) | ParticipantOutcome::OfflineSaved(gains) => {
                gains
            }
            _ => return None,
        };

        let mut message = format!(
            "Progress for {} has been saved to main account!",
            self.participant
        );
        for (label, value) in [
            ("XP gained", gains.xp),
            ("Levels gained", gains.levels),
            ("Coins gained", gains.coins),
            ("Tasks completed", gains.tasks),
        ] {
            if value > 0 {
                message.push_str(&format!("\n{label}: {value}"));
            }
        }
        Some(message)
    }
}

/// Result of one `end_session` call, in session participant order.
#[derive(Debug, Default)]
pub struct SessionReport {
    pub participants: Vec<ParticipantReport>,
}

impl SessionReport {
    pub fn outcome_for(&self, id: &ParticipantId) -> Option<&ParticipantOutcome> {
        self.participants
            .iter()
            .find(|report| &report.participant == id)
            .map(|report| &report.outcome)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ParticipantReport> {
        self.participants
            .iter()
            .filter(|report| matches!(report.outcome, ParticipantOutcome::Failed(_)))
    }

    /// True when at least one participant still needs a retry.
    pub fn has_retryable_failures(&self) -> bool {
        self.failures().any(|report| {
            matches!(&report.outcome, ParticipantOutcome::Failed(err) if err.is_retryable())
        })
    }
}
