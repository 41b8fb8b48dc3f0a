//! Session start/end orchestration and the gain merge rules.
//!
//! # Responsibility
//! - Start sessions by capturing baselines and seeding working copies.
//! - At session end, merge each participant's gains into its authoritative
//!   record, sequentially and in join order.
//!
//! # Invariants
//! - Participants without gains cause no store write.
//! - Live-bound records are assigned absolute totals and never reloaded.
//! - Offline records are reloaded right before the additive merge.
//! - Failures are isolated per participant.

use crate::model::record::{ParticipantId, Record};
use crate::model::task::{find_task_mut, TaskRecord};
use crate::publish::StatsPublisher;
use crate::repo::record_repo::{RecordStore, RepoError};
use crate::session::baseline::{capture_baseline, BaselineSnapshot};
use crate::session::binding::{LiveBinding, SyncTarget};
use crate::session::report::{
    ParticipantOutcome, ParticipantReport, ReconcileError, SessionReport, SyncGains,
};
use crate::session::state::{ParticipantPhase, Session, SessionParticipant};
use crate::session::SessionError;
use log::{error, info, warn};

/// Gains accumulated during a session, relative to the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delta {
    pub xp_gained: i64,
    pub coins_gained: i64,
    pub tasks_completed_in_session: i64,
}

impl Delta {
    pub fn between(baseline: &BaselineSnapshot, session_record: &Record) -> Self {
        Self {
            xp_gained: session_record.xp - baseline.record().xp,
            coins_gained: session_record.coins - baseline.record().coins,
            tasks_completed_in_session: session_record.completed_tasks_on_board(),
        }
    }

    /// Skip guard: false when nothing was gained and no task was completed.
    pub fn has_gains(&self) -> bool {
        self.xp_gained > 0 || self.coins_gained > 0 || self.tasks_completed_in_session != 0
    }
}

/// Counts produced by [`merge_completed_tasks`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Completed session tasks not already completed at baseline.
    pub credited: i64,
    /// Completed session tasks skipped because the baseline had them completed.
    pub already_credited: i64,
    /// Credited tasks that had no match in the target and were appended.
    pub appended: i64,
}

/// Merges completed session tasks into `target`.
///
/// For each completed session task: skip it when the baseline already had it
/// completed; otherwise mark the first matching target task completed, or
/// append a completed copy when there is none.
pub fn merge_completed_tasks(
    session_tasks: &[TaskRecord],
    baseline: &BaselineSnapshot,
    target: &mut Vec<TaskRecord>,
) -> MergeSummary {
    let mut summary = MergeSummary::default();

    for task in session_tasks.iter().filter(|task| task.completed) {
        if baseline.was_completed(&task.description) {
            summary.already_credited += 1;
            continue;
        }

        summary.credited += 1;
        match find_task_mut(target, &task.description) {
            Some(existing) => existing.completed = true,
            None => {
                target.push(task.completed_copy());
                summary.appended += 1;
            }
        }
    }

    summary
}

/// Starts and reconciles sessions against one store and publisher.
pub struct SessionEngine<S: RecordStore, P: StatsPublisher> {
    store: S,
    publisher: P,
}

impl<S: RecordStore, P: StatsPublisher> SessionEngine<S, P> {
    pub fn new(store: S, publisher: P) -> Self {
        Self { store, publisher }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Captures baselines and builds the session working copies.
    ///
    /// Stored participants get a baseline and a working copy with an empty
    /// board; the participant bound to `live` is seeded from the view's
    /// record instead of the stored one. Unknown ids join as guests.
    ///
    /// # Errors
    /// - `NoParticipants` when `ids` is empty.
    /// - `Store` when a baseline read fails for a reason other than not-found.
    pub fn begin_session(
        &self,
        ids: impl IntoIterator<Item = ParticipantId>,
        live: Option<&dyn LiveBinding>,
    ) -> Result<Session, SessionError> {
        let mut participants: Vec<SessionParticipant> = Vec::new();

        for id in ids {
            if participants.iter().any(|joined| joined.id() == &id) {
                continue;
            }

            let baseline = capture_baseline(&self.store, &id)?;
            let seed = match (&baseline, live) {
                (Some(_), Some(binding)) if binding.bound_id() == &id => binding.record().clone(),
                (Some(snapshot), _) => snapshot.record().clone(),
                (None, _) => Record::new(id),
            };
            participants.push(SessionParticipant::new(baseline, seed));
        }

        let session = Session::from_participants(participants)?;
        info!(
            "event=session_begin module=session status=ok participants={} guests={}",
            session.participants().len(),
            session
                .participants()
                .iter()
                .filter(|participant| participant.is_guest())
                .count()
        );
        Ok(session)
    }

    /// Reconciles every participant not yet reconciled.
    ///
    /// Safe to call again: reconciled participants are reported as
    /// `AlreadyReconciled`, participants whose store access failed are retried.
    pub fn end_session<'b>(
        &self,
        session: &mut Session,
        mut live: Option<&mut (dyn LiveBinding + 'b)>,
    ) -> SessionReport {
        let mut report = SessionReport::default();

        for participant in session.participants_mut() {
            let id = participant.id().clone();
            if participant.phase() == ParticipantPhase::Reconciled {
                report.participants.push(ParticipantReport {
                    participant: id,
                    outcome: ParticipantOutcome::AlreadyReconciled,
                });
                continue;
            }

            let outcome = match self.reconcile_participant(participant, live.as_deref_mut()) {
                Ok(outcome) => {
                    participant.mark_reconciled();
                    outcome
                }
                Err(err) => {
                    if err.is_retryable() {
                        error!(
                            "event=session_sync module=session status=error participant={id} retryable=true error={err}"
                        );
                    } else {
                        warn!(
                            "event=session_sync module=session status=skip participant={id} reason={err}"
                        );
                        participant.mark_reconciled();
                    }
                    ParticipantOutcome::Failed(err)
                }
            };

            report.participants.push(ParticipantReport {
                participant: id,
                outcome,
            });
        }

        info!(
            "event=session_end module=session status={} participants={} failures={}",
            if session.is_finished() { "ok" } else { "partial" },
            report.participants.len(),
            report.failures().count()
        );
        report
    }

    fn reconcile_participant(
        &self,
        participant: &SessionParticipant,
        live: Option<&mut (dyn LiveBinding + '_)>,
    ) -> Result<ParticipantOutcome, ReconcileError> {
        let Some(baseline) = participant.baseline() else {
            return self.sync_guest(participant);
        };

        let delta = Delta::between(baseline, participant.record());
        if !delta.has_gains() {
            info!(
                "event=session_sync module=session status=skip participant={} reason=no_gains",
                participant.id()
            );
            return Ok(ParticipantOutcome::NoGains);
        }

        match SyncTarget::resolve(participant.id(), live) {
            SyncTarget::LiveBound(binding) => Ok(self.sync_live(participant, baseline, binding)),
            SyncTarget::Offline => self.sync_offline(participant, baseline, delta),
        }
    }

    fn sync_guest(
        &self,
        participant: &SessionParticipant,
    ) -> Result<ParticipantOutcome, ReconcileError> {
        let id = participant.id();
        if self.store.exists(id).map_err(ReconcileError::Store)? {
            return Err(ReconcileError::MissingBaseline);
        }

        self.store
            .save(participant.record())
            .map_err(ReconcileError::Write)?;
        info!("event=session_sync module=session status=ok participant={id} branch=guest");
        Ok(ParticipantOutcome::GuestSaved)
    }

    fn sync_live(
        &self,
        participant: &SessionParticipant,
        baseline: &BaselineSnapshot,
        binding: &mut (dyn LiveBinding + '_),
    ) -> ParticipantOutcome {
        let session_record = participant.record();
        let bound = binding.record_mut();
        let (xp_before, level_before, coins_before) = (bound.xp, bound.level, bound.coins);

        // Session totals already include everything this participant owns.
        bound.xp = session_record.xp;
        bound.level = session_record.level;
        bound.coins = session_record.coins;
        let merge = merge_completed_tasks(&session_record.tasks, baseline, &mut bound.tasks);
        bound.increment_completed_tasks(merge.credited);

        let gains = SyncGains {
            xp: bound.xp - xp_before,
            levels: bound.level - level_before,
            coins: bound.coins - coins_before,
            tasks: merge.credited,
        };

        binding.notify_stats_changed();
        self.publisher.publish(binding.record());
        info!(
            "event=session_sync module=session status=ok participant={} branch=live xp={} coins={} tasks={} appended={}",
            participant.id(),
            gains.xp,
            gains.coins,
            gains.tasks,
            merge.appended
        );
        ParticipantOutcome::LiveUpdated(gains)
    }

    fn sync_offline(
        &self,
        participant: &SessionParticipant,
        baseline: &BaselineSnapshot,
        delta: Delta,
    ) -> Result<ParticipantOutcome, ReconcileError> {
        let id = participant.id();
        let mut record = match self.store.load(id) {
            Ok(record) => record,
            Err(RepoError::NotFound(_)) => return Err(ReconcileError::Toctou),
            Err(err) => return Err(ReconcileError::Store(err)),
        };
        let (xp_before, coins_before) = (record.xp, record.coins);

        // Negative components are ignored by the reward helpers.
        let levels = record.add_xp(delta.xp_gained);
        record.add_coins(delta.coins_gained);
        let merge = merge_completed_tasks(&participant.record().tasks, baseline, &mut record.tasks);
        record.increment_completed_tasks(merge.credited);

        self.store.save(&record).map_err(ReconcileError::Write)?;
        self.publisher.publish(&record);

        let gains = SyncGains {
            xp: record.xp - xp_before,
            levels,
            coins: record.coins - coins_before,
            tasks: merge.credited,
        };
        info!(
            "event=session_sync module=session status=ok participant={id} branch=offline xp={} coins={} tasks={} appended={}",
            gains.xp, gains.coins, gains.tasks, merge.appended
        );
        Ok(ParticipantOutcome::OfflineSaved(gains))
    }
}
