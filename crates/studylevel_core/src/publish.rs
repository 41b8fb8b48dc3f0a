//! Leaderboard stats side channel.
//!
//! # Responsibility
//! - Define the fire-and-forget publisher contract called after records change.
//! - Provide the wire snapshot uploaded to the external leaderboard.
//!
//! # Invariants
//! - Publishing never fails from the caller's point of view.
//! - Snapshots carry totals only, never task descriptions.

use crate::model::record::Record;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Leaderboard payload derived from one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub participant_id: String,
    pub xp: i64,
    pub level: i64,
    pub coins: i64,
    pub completed_task_count: i64,
}

impl StatsSnapshot {
    pub fn from_record(record: &Record) -> Self {
        Self {
            participant_id: record.id.as_str().to_string(),
            xp: record.xp,
            level: record.level,
            coins: record.coins,
            completed_task_count: record.completed_task_count,
        }
    }
}

/// Best-effort sink for leaderboard updates.
///
/// Implementations swallow their own transport errors.
pub trait StatsPublisher {
    fn publish(&self, record: &Record);
}

impl<P: StatsPublisher + ?Sized> StatsPublisher for &P {
    fn publish(&self, record: &Record) {
        (**self).publish(record)
    }
}

/// Publisher that drops every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStatsPublisher;

impl StatsPublisher for NoopStatsPublisher {
    fn publish(&self, _record: &Record) {}
}

/// Publisher that serializes the snapshot and records a metadata-only log event.
///
/// Stands in for the remote upload when the host has not wired a transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogStatsPublisher;

impl StatsPublisher for LogStatsPublisher {
    fn publish(&self, record: &Record) {
        let snapshot = StatsSnapshot::from_record(record);
        match serde_json::to_vec(&snapshot) {
            Ok(payload) => debug!(
                "event=stats_publish module=publish status=ok participant={} level={} payload_bytes={}",
                snapshot.participant_id,
                snapshot.level,
                payload.len()
            ),
            Err(err) => warn!(
                "event=stats_publish module=publish status=error participant={} error={}",
                snapshot.participant_id, err
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LogStatsPublisher, StatsPublisher, StatsSnapshot};
    use crate::model::record::{ParticipantId, Record};
    use crate::model::task::{Difficulty, TaskRecord};

    #[test]
    fn snapshot_carries_totals_without_tasks() {
        let mut record = Record::new(ParticipantId::new("mia").expect("valid id"));
        record.xp = 340;
        record.level = 4;
        record.coins = 75;
        record.completed_task_count = 9;
        record
            .tasks
            .push(TaskRecord::new("secret plans", 10, 10, Difficulty::Hard));

        let json = serde_json::to_value(StatsSnapshot::from_record(&record))
            .expect("snapshot should serialize");
        assert_eq!(json["participant_id"], "mia");
        assert_eq!(json["xp"], 340);
        assert_eq!(json["level"], 4);
        assert_eq!(json["coins"], 75);
        assert_eq!(json["completed_task_count"], 9);
        assert!(!json.to_string().contains("secret plans"));
    }

    #[test]
    fn log_publisher_accepts_any_record() {
        let record = Record::new(ParticipantId::new("mia").expect("valid id"));
        LogStatsPublisher.publish(&record);
    }
}
