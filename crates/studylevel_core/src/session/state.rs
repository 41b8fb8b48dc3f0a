//! In-memory session working copies.
//!
//! # Responsibility
//! - Hold each participant's baseline and session record for one shared session.
//! - Track the per-participant lifecycle phase.
//!
//! # Invariants
//! - Session records start with an empty task board.
//! - A `Reconciled` participant rejects further mutation.
//! - Participant order is the join order, with duplicates collapsed.

use crate::model::record::{ParticipantId, Record};
use crate::session::baseline::BaselineSnapshot;
use crate::session::SessionError;

/// Lifecycle of one participant inside a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantPhase {
    /// Joined; baseline captured (or confirmed absent for guests).
    BaselineCaptured,
    /// At least one task mutation has been applied.
    InSession,
    /// Gains merged (or deliberately skipped). Terminal.
    Reconciled,
}

/// One participant's state inside a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParticipant {
    baseline: Option<BaselineSnapshot>,
    record: Record,
    phase: ParticipantPhase,
}

impl SessionParticipant {
    /// Builds a participant from an optional baseline and its working record.
    ///
    /// The working record's task board is cleared; guests pass `None`.
    pub fn new(baseline: Option<BaselineSnapshot>, mut record: Record) -> Self {
        record.tasks.clear();
        Self {
            baseline,
            record,
            phase: ParticipantPhase::BaselineCaptured,
        }
    }

    pub fn id(&self) -> &ParticipantId {
        &self.record.id
    }

    pub fn baseline(&self) -> Option<&BaselineSnapshot> {
        self.baseline.as_ref()
    }

    pub fn is_guest(&self) -> bool {
        self.baseline.is_none()
    }

    /// The session working record.
    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn phase(&self) -> ParticipantPhase {
        self.phase
    }

    pub(crate) fn record_for_mutation(&mut self) -> Result<&mut Record, SessionError> {
        if self.phase == ParticipantPhase::Reconciled {
            return Err(SessionError::AlreadyReconciled(self.record.id.clone()));
        }
        self.phase = ParticipantPhase::InSession;
        Ok(&mut self.record)
    }

    pub(crate) fn mark_reconciled(&mut self) {
        self.phase = ParticipantPhase::Reconciled;
    }
}

/// A shared multiplayer session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    participants: Vec<SessionParticipant>,
}

impl Session {
    /// Assembles a session from prepared participants.
    ///
    /// Later entries with an id already present are dropped.
    ///
    /// # Errors
    /// - `SessionError::NoParticipants` when nothing remains.
    pub fn from_participants(
        participants: impl IntoIterator<Item = SessionParticipant>,
    ) -> Result<Self, SessionError> {
        let mut unique: Vec<SessionParticipant> = Vec::new();
        for participant in participants {
            if unique.iter().any(|known| known.id() == participant.id()) {
                continue;
            }
            unique.push(participant);
        }
        if unique.is_empty() {
            return Err(SessionError::NoParticipants);
        }
        Ok(Self {
            participants: unique,
        })
    }

    pub fn participants(&self) -> &[SessionParticipant] {
        &self.participants
    }

    pub fn participant(&self, id: &ParticipantId) -> Option<&SessionParticipant> {
        self.participants
            .iter()
            .find(|participant| participant.id() == id)
    }

    /// True once every participant is `Reconciled`.
    pub fn is_finished(&self) -> bool {
        self.participants
            .iter()
            .all(|participant| participant.phase == ParticipantPhase::Reconciled)
    }

    pub(crate) fn participant_mut(
        &mut self,
        id: &ParticipantId,
    ) -> Result<&mut SessionParticipant, SessionError> {
        self.participants
            .iter_mut()
            .find(|participant| participant.id() == id)
            .ok_or_else(|| SessionError::UnknownParticipant(id.clone()))
    }

    pub(crate) fn participants_mut(&mut self) -> impl Iterator<Item = &mut SessionParticipant> {
        self.participants.iter_mut()
    }
}
