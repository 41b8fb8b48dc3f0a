//! Participant record store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide the narrow `exists/load/save` contract the session engine relies on.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths call `Record::validate()` before any SQL mutation.
//! - `save` replaces the participant's task rows atomically, preserving order.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::ensure_latest;
use crate::db::DbError;
use crate::model::record::{ParticipantId, Record, RecordValidationError};
use crate::model::task::{Difficulty, TaskRecord};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Store error for participant persistence and queries.
#[derive(Debug)]
pub enum RepoError {
    Validation(RecordValidationError),
    Db(DbError),
    NotFound(ParticipantId),
    InvalidData(String),
}

impl RepoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "participant not found: {id}"),
            Self::InvalidData(message) => {
                write!(f, "invalid persisted participant data: {message}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<RecordValidationError> for RepoError {
    fn from(value: RecordValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Authoritative storage for participant records.
///
/// Kept deliberately narrow so a versioned-write scheme can be added behind it
/// without touching session reconciliation.
pub trait RecordStore {
    fn exists(&self, id: &ParticipantId) -> RepoResult<bool>;
    /// Returns `RepoError::NotFound` when no record is stored for `id`.
    fn load(&self, id: &ParticipantId) -> RepoResult<Record>;
    /// Inserts or fully replaces the record for `record.id` (last write wins).
    fn save(&self, record: &Record) -> RepoResult<()>;
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn exists(&self, id: &ParticipantId) -> RepoResult<bool> {
        (**self).exists(id)
    }

    fn load(&self, id: &ParticipantId) -> RepoResult<Record> {
        (**self).load(id)
    }

    fn save(&self, record: &Record) -> RepoResult<()> {
        (**self).save(record)
    }
}

/// SQLite-backed record store.
pub struct SqliteRecordStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRecordStore<'conn> {
    /// Wraps a connection returned by `open_db`/`open_db_in_memory`.
    ///
    /// # Errors
    /// - `RepoError::Db(DbError::SchemaNotReady)` when migrations were not applied.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_latest(conn)?;
        Ok(Self { conn })
    }

    /// Returns up to `limit` records ordered by xp (desc), then id.
    pub fn leaderboard(&self, limit: u32) -> RepoResult<Vec<Record>> {
        let mut stmt = self.conn.prepare(
            "SELECT id
             FROM participants
             ORDER BY xp DESC, id ASC
             LIMIT ?1;",
        )?;
        let ids = stmt
            .query_map([i64::from(limit)], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        ids.into_iter()
            .map(|raw| {
                let id = ParticipantId::new(raw)?;
                self.load(&id)
            })
            .collect()
    }
}

impl RecordStore for SqliteRecordStore<'_> {
    fn exists(&self, id: &ParticipantId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM participants WHERE id = ?1);",
            [id.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn load(&self, id: &ParticipantId) -> RepoResult<Record> {
        let header = self
            .conn
            .query_row(
                "SELECT xp, level, coins, completed_task_count
                 FROM participants
                 WHERE id = ?1;",
                [id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, i64>("xp")?,
                        row.get::<_, i64>("level")?,
                        row.get::<_, i64>("coins")?,
                        row.get::<_, i64>("completed_task_count")?,
                    ))
                },
            )
            .optional()?;

        let Some((xp, level, coins, completed_task_count)) = header else {
            return Err(RepoError::NotFound(id.clone()));
        };

        let mut stmt = self.conn.prepare(
            "SELECT description, xp_reward, coin_reward, difficulty, completed
             FROM participant_tasks
             WHERE participant_id = ?1
             ORDER BY position ASC;",
        )?;
        let mut rows = stmt.query([id.as_str()])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }

        let record = Record {
            id: id.clone(),
            xp,
            level,
            coins,
            completed_task_count,
            tasks,
        };
        record.validate()?;
        Ok(record)
    }

    fn save(&self, record: &Record) -> RepoResult<()> {
        record.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO participants (id, xp, level, coins, completed_task_count)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                xp = excluded.xp,
                level = excluded.level,
                coins = excluded.coins,
                completed_task_count = excluded.completed_task_count,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                record.id.as_str(),
                record.xp,
                record.level,
                record.coins,
                record.completed_task_count,
            ],
        )?;
        tx.execute(
            "DELETE FROM participant_tasks WHERE participant_id = ?1;",
            [record.id.as_str()],
        )?;
        for (position, task) in record.tasks.iter().enumerate() {
            tx.execute(
                "INSERT INTO participant_tasks (
                    participant_id,
                    position,
                    description,
                    xp_reward,
                    coin_reward,
                    difficulty,
                    completed
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    record.id.as_str(),
                    position as i64,
                    task.description.as_str(),
                    task.xp_reward,
                    task.coin_reward,
                    task.difficulty.as_str(),
                    bool_to_int(task.completed),
                ],
            )?;
        }
        tx.commit()?;

        Ok(())
    }
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<TaskRecord> {
    let difficulty_text: String = row.get("difficulty")?;
    let difficulty = Difficulty::parse(&difficulty_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid difficulty `{difficulty_text}` in participant_tasks.difficulty"
        ))
    })?;

    let completed = match row.get::<_, i64>("completed")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid completed value `{other}` in participant_tasks.completed"
            )));
        }
    };

    Ok(TaskRecord {
        description: row.get("description")?,
        xp_reward: row.get("xp_reward")?,
        coin_reward: row.get("coin_reward")?,
        difficulty,
        completed,
    })
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
