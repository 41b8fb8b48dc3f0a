//! Task domain model.
//!
//! # Responsibility
//! - Define the reward-carrying task shape stored inside a participant record.
//! - Provide the single identity comparison used by every merge path.
//!
//! # Invariants
//! - Task identity inside one list is the `description` string.
//! - Rewards are non-negative.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Effort tier chosen when a task is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Stable string used in storage and FFI payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "EASY",
            Self::Medium => "MEDIUM",
            Self::Hard => "HARD",
        }
    }

    /// Parses a stored/FFI difficulty label (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "EASY" => Some(Self::Easy),
            "MEDIUM" => Some(Self::Medium),
            "HARD" => Some(Self::Hard),
            _ => None,
        }
    }
}

/// Validation failures for task payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    EmptyDescription,
    NegativeXpReward(i64),
    NegativeCoinReward(i64),
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyDescription => write!(f, "task description must not be blank"),
            Self::NegativeXpReward(value) => {
                write!(f, "task xp_reward must be >= 0, got {value}")
            }
            Self::NegativeCoinReward(value) => {
                write!(f, "task coin_reward must be >= 0, got {value}")
            }
        }
    }
}

impl Error for TaskValidationError {}

/// One task on a participant's board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub description: String,
    pub xp_reward: i64,
    pub coin_reward: i64,
    /// Older payloads may omit difficulty; it falls back to `Easy`.
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub completed: bool,
}

impl TaskRecord {
    /// Creates a not-yet-completed task.
    pub fn new(
        description: impl Into<String>,
        xp_reward: i64,
        coin_reward: i64,
        difficulty: Difficulty,
    ) -> Self {
        Self {
            description: description.into(),
            xp_reward,
            coin_reward,
            difficulty,
            completed: false,
        }
    }

    /// Returns a copy carrying the same rewards and difficulty, marked completed.
    pub fn completed_copy(&self) -> Self {
        Self {
            completed: true,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.description.trim().is_empty() {
            return Err(TaskValidationError::EmptyDescription);
        }
        if self.xp_reward < 0 {
            return Err(TaskValidationError::NegativeXpReward(self.xp_reward));
        }
        if self.coin_reward < 0 {
            return Err(TaskValidationError::NegativeCoinReward(self.coin_reward));
        }
        Ok(())
    }
}

/// Decides whether `task` refers to the task identified by `description`.
///
/// Every lookup and merge goes through here so a stable-id scheme can replace
/// description matching in one place. Two tasks sharing a description are
/// indistinguishable.
pub fn same_task_identity(task: &TaskRecord, description: &str) -> bool {
    task.description == description
}

/// Returns the first task in `tasks` matching `description`.
pub fn find_task<'a>(tasks: &'a [TaskRecord], description: &str) -> Option<&'a TaskRecord> {
    tasks
        .iter()
        .find(|task| same_task_identity(task, description))
}

/// Mutable counterpart of [`find_task`].
pub fn find_task_mut<'a>(
    tasks: &'a mut [TaskRecord],
    description: &str,
) -> Option<&'a mut TaskRecord> {
    tasks
        .iter_mut()
        .find(|task| same_task_identity(task, description))
}
