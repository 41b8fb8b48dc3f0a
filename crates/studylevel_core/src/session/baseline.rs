//! Pre-session baseline snapshots.
//!
//! # Invariants
//! - A snapshot is taken from the store before the session board is cleared.
//! - Snapshots are never mutated or persisted.

use crate::model::record::{ParticipantId, Record};
use crate::model::task::same_task_identity;
use crate::repo::record_repo::{RecordStore, RepoError, RepoResult};
use log::{info, warn};

/// Immutable copy of a participant's authoritative record at session start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineSnapshot {
    record: Record,
}

impl BaselineSnapshot {
    pub fn new(record: Record) -> Self {
        Self { record }
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn id(&self) -> &ParticipantId {
        &self.record.id
    }

    /// Whether any baseline task with this description was already completed.
    pub fn was_completed(&self, description: &str) -> bool {
        self.record
            .tasks
            .iter()
            .any(|task| task.completed && same_task_identity(task, description))
    }
}

/// Captures the baseline for one participant.
///
/// Returns `Ok(None)` for guests (no stored record). A record that vanishes
/// between `exists` and `load` is also treated as a guest.
pub fn capture_baseline<S>(store: &S, id: &ParticipantId) -> RepoResult<Option<BaselineSnapshot>>
where
    S: RecordStore + ?Sized,
{
    if !store.exists(id)? {
        info!("event=baseline_capture module=session status=guest participant={id}");
        return Ok(None);
    }

    match store.load(id) {
        Ok(record) => {
            info!(
                "event=baseline_capture module=session status=ok participant={id} xp={} coins={} tasks={}",
                record.xp,
                record.coins,
                record.tasks.len()
            );
            Ok(Some(BaselineSnapshot::new(record)))
        }
        Err(RepoError::NotFound(_)) => {
            warn!(
                "event=baseline_capture module=session status=skip participant={id} reason=vanished_after_exists"
            );
            Ok(None)
        }
        Err(err) => Err(err),
    }
}
