//! Participant record model.
//!
//! # Responsibility
//! - Define the authoritative per-participant progress record.
//! - Apply reward helpers (`add_xp`, `add_coins`) with the leveling rule.
//!
//! # Invariants
//! - `level` starts at 1 and never decreases through `add_xp`.
//! - `validate()` must pass before a record is persisted.
//!
//! # See also
//! - `model::task` for task identity and reward validation.

use crate::model::task::{find_task_mut, TaskRecord, TaskValidationError};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// XP needed per level step: level `n` is left once `xp >= n * XP_PER_LEVEL`.
pub const XP_PER_LEVEL: i64 = 100;

/// Case-sensitive identifier of one authoritative record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Wraps a participant name, rejecting blank input.
    ///
    /// The value is stored verbatim; no trimming or case folding happens,
    /// so `"Ana"` and `"ana"` are different participants.
    pub fn new(value: impl Into<String>) -> Result<Self, RecordValidationError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(RecordValidationError::BlankParticipantId);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ParticipantId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validation failures for participant records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValidationError {
    BlankParticipantId,
    NegativeXp(i64),
    InvalidLevel(i64),
    NegativeCoins(i64),
    NegativeCompletedCount(i64),
    Task {
        index: usize,
        source: TaskValidationError,
    },
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankParticipantId => write!(f, "participant id must not be blank"),
            Self::NegativeXp(value) => write!(f, "xp must be >= 0, got {value}"),
            Self::InvalidLevel(value) => write!(f, "level must be >= 1, got {value}"),
            Self::NegativeCoins(value) => write!(f, "coins must be >= 0, got {value}"),
            Self::NegativeCompletedCount(value) => {
                write!(f, "completed_task_count must be >= 0, got {value}")
            }
            Self::Task { index, source } => write!(f, "task #{index}: {source}"),
        }
    }
}

impl Error for RecordValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Task { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result of applying one completion event to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCompletion {
    Completed {
        xp: i64,
        coins: i64,
        levels_gained: i64,
    },
    AlreadyCompleted,
    NotFound,
}

/// Authoritative progress record for one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: ParticipantId,
    pub xp: i64,
    pub level: i64,
    pub coins: i64,
    /// Lifetime counter; survives task deletion and session board resets.
    pub completed_task_count: i64,
    pub tasks: Vec<TaskRecord>,
}

impl Record {
    /// Creates the default record for a first-time participant.
    pub fn new(id: ParticipantId) -> Self {
        Self {
            id,
            xp: 0,
            level: 1,
            coins: 0,
            completed_task_count: 0,
            tasks: Vec::new(),
        }
    }

    /// Adds XP and raises `level` past every threshold crossed.
    ///
    /// The level after the call is the smallest `L >= level` with
    /// `xp < L * XP_PER_LEVEL`. Returns the number of levels gained.
    /// Non-positive amounts are ignored.
    pub fn add_xp(&mut self, amount: i64) -> i64 {
        if amount <= 0 {
            return 0;
        }
        self.xp = self.xp.saturating_add(amount);
        let before = self.level;
        self.level = self.level.max((self.xp / XP_PER_LEVEL).saturating_add(1));
        self.level - before
    }

    /// Adds coins; non-positive amounts are ignored.
    pub fn add_coins(&mut self, amount: i64) {
        if amount > 0 {
            self.coins = self.coins.saturating_add(amount);
        }
    }

    pub fn increment_completed_tasks(&mut self, count: i64) {
        if count > 0 {
            self.completed_task_count = self.completed_task_count.saturating_add(count);
        }
    }

    /// Marks the first task matching `description` completed and credits it.
    ///
    /// Unknown and already-completed tasks leave the record untouched.
    pub fn complete_task(&mut self, description: &str) -> TaskCompletion {
        let Some(task) = find_task_mut(&mut self.tasks, description) else {
            return TaskCompletion::NotFound;
        };
        if task.completed {
            return TaskCompletion::AlreadyCompleted;
        }

        task.completed = true;
        let (xp, coins) = (task.xp_reward, task.coin_reward);
        let levels_gained = self.add_xp(xp);
        self.add_coins(coins);
        self.increment_completed_tasks(1);
        TaskCompletion::Completed {
            xp,
            coins,
            levels_gained,
        }
    }

    /// Number of tasks on this record's board currently marked completed.
    pub fn completed_tasks_on_board(&self) -> i64 {
        self.tasks.iter().filter(|task| task.completed).count() as i64
    }

    pub fn validate(&self) -> Result<(), RecordValidationError> {
        if self.id.as_str().trim().is_empty() {
            return Err(RecordValidationError::BlankParticipantId);
        }
        if self.xp < 0 {
            return Err(RecordValidationError::NegativeXp(self.xp));
        }
        if self.level < 1 {
            return Err(RecordValidationError::InvalidLevel(self.level));
        }
        if self.coins < 0 {
            return Err(RecordValidationError::NegativeCoins(self.coins));
        }
        if self.completed_task_count < 0 {
            return Err(RecordValidationError::NegativeCompletedCount(
                self.completed_task_count,
            ));
        }
        for (index, task) in self.tasks.iter().enumerate() {
            task.validate()
                .map_err(|source| RecordValidationError::Task { index, source })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ParticipantId, Record, RecordValidationError, TaskCompletion, XP_PER_LEVEL};
    use crate::model::task::{Difficulty, TaskRecord, TaskValidationError};

    fn id(value: &str) -> ParticipantId {
        ParticipantId::new(value).expect("participant id should be valid")
    }

    #[test]
    fn participant_id_is_verbatim_and_rejects_blank() {
        assert_eq!(id("Ana").as_str(), "Ana");
        assert_ne!(id("Ana"), id("ana"));
        assert_eq!(
            ParticipantId::new("   "),
            Err(RecordValidationError::BlankParticipantId)
        );
    }

    #[test]
    fn new_record_uses_defaults() {
        let record = Record::new(id("ana"));
        assert_eq!(record.xp, 0);
        assert_eq!(record.level, 1);
        assert_eq!(record.coins, 0);
        assert_eq!(record.completed_task_count, 0);
        assert!(record.tasks.is_empty());
        assert!(record.validate().is_ok());
    }

    #[test]
    fn add_xp_levels_up_across_multiple_thresholds() {
        let mut record = Record::new(id("ana"));
        assert_eq!(record.add_xp(XP_PER_LEVEL - 1), 0);
        assert_eq!(record.level, 1);

        assert_eq!(record.add_xp(1), 1);
        assert_eq!(record.level, 2);

        // 100 -> 350 crosses 200 and 300.
        assert_eq!(record.add_xp(250), 2);
        assert_eq!(record.level, 4);
        assert_eq!(record.xp, 350);
    }

    #[test]
    fn add_xp_never_lowers_an_assigned_level() {
        let mut record = Record::new(id("ana"));
        record.level = 7;
        record.xp = 10;
        assert_eq!(record.add_xp(5), 0);
        assert_eq!(record.level, 7);
    }

    #[test]
    fn add_xp_handles_huge_rewards_without_stepping() {
        let mut record = Record::new(id("ana"));
        assert_eq!(record.add_xp(20_000_000_000), 200_000_000);
        assert_eq!(record.level, 200_000_001);

        let mut capped = Record::new(id("ben"));
        capped.xp = 50;
        capped.add_xp(i64::MAX);
        assert_eq!(capped.xp, i64::MAX);
        assert_eq!(capped.level, i64::MAX / XP_PER_LEVEL + 1);
    }

    #[test]
    fn non_positive_rewards_are_ignored() {
        let mut record = Record::new(id("ana"));
        record.add_xp(-10);
        record.add_coins(0);
        record.add_coins(-5);
        record.increment_completed_tasks(-1);
        assert_eq!(record, Record::new(id("ana")));
    }

    #[test]
    fn complete_task_credits_first_match_only_once() {
        let mut record = Record::new(id("ana"));
        record
            .tasks
            .push(TaskRecord::new("essay", 40, 12, Difficulty::Hard));

        assert_eq!(
            record.complete_task("essay"),
            TaskCompletion::Completed {
                xp: 40,
                coins: 12,
                levels_gained: 0
            }
        );
        assert_eq!(record.complete_task("essay"), TaskCompletion::AlreadyCompleted);
        assert_eq!(record.complete_task("nope"), TaskCompletion::NotFound);
        assert_eq!(record.xp, 40);
        assert_eq!(record.coins, 12);
        assert_eq!(record.completed_task_count, 1);
    }

    #[test]
    fn validate_reports_task_index() {
        let mut record = Record::new(id("ana"));
        record
            .tasks
            .push(TaskRecord::new("ok", 1, 1, Difficulty::Easy));
        record
            .tasks
            .push(TaskRecord::new("", 1, 1, Difficulty::Easy));
        assert_eq!(
            record.validate(),
            Err(RecordValidationError::Task {
                index: 1,
                source: TaskValidationError::EmptyDescription,
            })
        );
    }

    #[test]
    fn validate_rejects_level_zero() {
        let mut record = Record::new(id("ana"));
        record.level = 0;
        assert_eq!(record.validate(), Err(RecordValidationError::InvalidLevel(0)));
    }
}
