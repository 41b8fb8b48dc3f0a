//! Progress domain model for participants and their tasks.
//!
//! # Responsibility
//! - Define the canonical record shape shared by single-player and session flows.
//! - Own the leveling rule and task identity matching.
//!
//! # Invariants
//! - Every record is identified by a case-sensitive `ParticipantId`.
//! - `xp`, `coins` and `completed_task_count` never go negative; `level >= 1`.

pub mod record;
pub mod task;
