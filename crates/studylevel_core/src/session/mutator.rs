//! In-session task mutations.
//!
//! # Responsibility
//! - Apply task completion events to a participant's session record.
//! - Edit the shared session board (add/remove) without touching rewards.
//!
//! # Invariants
//! - Completion is the only path that changes session reward totals.
//! - Completing an already-completed or unknown task is a silent no-op.
//! - Nothing here writes to the record store.

use crate::model::record::{ParticipantId, TaskCompletion};
use crate::model::task::{same_task_identity, TaskRecord};
use crate::session::state::Session;
use crate::session::SessionError;
use log::debug;

impl Session {
    /// Marks the participant's session task `description` completed and credits it.
    ///
    /// # Errors
    /// - `UnknownParticipant` / `AlreadyReconciled` for invalid targets.
    pub fn complete_task(
        &mut self,
        participant: &ParticipantId,
        description: &str,
    ) -> Result<TaskCompletion, SessionError> {
        let record = self.participant_mut(participant)?.record_for_mutation()?;
        let completion = record.complete_task(description);
        match completion {
            TaskCompletion::Completed {
                xp,
                coins,
                levels_gained,
            } => debug!(
                "event=session_task_complete module=session status=ok participant={participant} xp={xp} coins={coins} levels_gained={levels_gained}"
            ),
            TaskCompletion::AlreadyCompleted => debug!(
                "event=session_task_complete module=session status=skip participant={participant} reason=already_completed"
            ),
            TaskCompletion::NotFound => debug!(
                "event=session_task_complete module=session status=skip participant={participant} reason=not_found"
            ),
        }
        Ok(completion)
    }

    /// Appends a new, not-yet-completed task to the participant's session board.
    pub fn add_task(
        &mut self,
        participant: &ParticipantId,
        mut task: TaskRecord,
    ) -> Result<(), SessionError> {
        task.validate()?;
        task.completed = false;
        let record = self.participant_mut(participant)?.record_for_mutation()?;
        record.tasks.push(task);
        Ok(())
    }

    /// Removes the first session task matching `description`.
    ///
    /// Returns whether a task was removed. Rewards already credited stay.
    pub fn remove_task(
        &mut self,
        participant: &ParticipantId,
        description: &str,
    ) -> Result<bool, SessionError> {
        let record = self.participant_mut(participant)?.record_for_mutation()?;
        let position = record
            .tasks
            .iter()
            .position(|task| same_task_identity(task, description));
        match position {
            Some(index) => {
                record.tasks.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::record::{ParticipantId, Record, TaskCompletion};
    use crate::model::task::{Difficulty, TaskRecord};
    use crate::session::state::{ParticipantPhase, Session, SessionParticipant};
    use crate::session::SessionError;

    fn id(value: &str) -> ParticipantId {
        ParticipantId::new(value).expect("valid id")
    }

    fn guest_session(name: &str) -> Session {
        Session::from_participants(vec![SessionParticipant::new(None, Record::new(id(name)))])
            .expect("session should build")
    }

    #[test]
    fn complete_task_credits_rewards_once() {
        let mut session = guest_session("ana");
        let ana = id("ana");
        session
            .add_task(&ana, TaskRecord::new("flashcards", 120, 15, Difficulty::Hard))
            .expect("task should be added");

        let first = session
            .complete_task(&ana, "flashcards")
            .expect("completion should apply");
        assert_eq!(
            first,
            TaskCompletion::Completed {
                xp: 120,
                coins: 15,
                levels_gained: 1
            }
        );

        let second = session
            .complete_task(&ana, "flashcards")
            .expect("repeat completion is a no-op");
        assert_eq!(second, TaskCompletion::AlreadyCompleted);

        let record = session.participant(&ana).expect("ana joined").record();
        assert_eq!(record.xp, 120);
        assert_eq!(record.level, 2);
        assert_eq!(record.coins, 15);
        assert_eq!(record.completed_task_count, 1);
        assert!(record.tasks[0].completed);
    }

    #[test]
    fn complete_unknown_task_is_silent_noop() {
        let mut session = guest_session("ana");
        let ana = id("ana");
        let result = session
            .complete_task(&ana, "missing")
            .expect("unknown task is not an error");
        assert_eq!(result, TaskCompletion::NotFound);
        let participant = session.participant(&ana).expect("ana joined");
        assert_eq!(participant.record().xp, 0);
        assert_eq!(participant.phase(), ParticipantPhase::InSession);
    }

    #[test]
    fn add_task_resets_completed_flag_and_validates() {
        let mut session = guest_session("ana");
        let ana = id("ana");
        let mut pre_done = TaskRecord::new("essay", 10, 5, Difficulty::Medium);
        pre_done.completed = true;
        session.add_task(&ana, pre_done).expect("task should be added");
        assert!(!session.participant(&ana).expect("joined").record().tasks[0].completed);

        let err = session
            .add_task(&ana, TaskRecord::new(" ", 10, 5, Difficulty::Easy))
            .expect_err("blank description must be rejected");
        assert!(matches!(err, SessionError::InvalidTask(_)));
    }

    #[test]
    fn remove_task_keeps_credited_rewards() {
        let mut session = guest_session("ana");
        let ana = id("ana");
        session
            .add_task(&ana, TaskRecord::new("quiz", 30, 10, Difficulty::Easy))
            .expect("task should be added");
        session.complete_task(&ana, "quiz").expect("completion");

        assert!(session.remove_task(&ana, "quiz").expect("remove"));
        assert!(!session.remove_task(&ana, "quiz").expect("second remove"));

        let record = session.participant(&ana).expect("joined").record();
        assert!(record.tasks.is_empty());
        assert_eq!(record.xp, 30);
        assert_eq!(record.coins, 10);
    }

    #[test]
    fn mutations_reject_unknown_participant() {
        let mut session = guest_session("ana");
        let err = session
            .complete_task(&id("zed"), "quiz")
            .expect_err("zed is not in the session");
        assert!(matches!(err, SessionError::UnknownParticipant(ref who) if who.as_str() == "zed"));
    }
}
