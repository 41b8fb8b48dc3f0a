//! Single-player record use-case service.
//!
//! # Responsibility
//! - Load (or create) the signed-in participant's record.
//! - Apply solo task edits to the primary view's record and persist them.
//! - Persist live records that a session merged gains into.
//!
//! # Invariants
//! - Every successful mutation is saved before the call returns.
//! - Completions notify the view and publish stats; plain edits only save.
//! - The service never swaps the view's record, it mutates it in place.

use crate::model::record::{ParticipantId, Record, TaskCompletion};
use crate::model::task::{same_task_identity, TaskRecord, TaskValidationError};
use crate::publish::StatsPublisher;
use crate::repo::record_repo::{RecordStore, RepoError};
use crate::session::binding::LiveBinding;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for single-player record use-cases.
#[derive(Debug)]
pub enum RecordServiceError {
    InvalidTask(TaskValidationError),
    Repo(RepoError),
}

impl Display for RecordServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTask(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RecordServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidTask(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<TaskValidationError> for RecordServiceError {
    fn from(value: TaskValidationError) -> Self {
        Self::InvalidTask(value)
    }
}

impl From<RepoError> for RecordServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Record service facade over a store and a stats publisher.
pub struct RecordService<S: RecordStore, P: StatsPublisher> {
    store: S,
    publisher: P,
}

impl<S: RecordStore, P: StatsPublisher> RecordService<S, P> {
    pub fn new(store: S, publisher: P) -> Self {
        Self { store, publisher }
    }

    /// Loads the participant's record, creating and saving a default one for
    /// first-time participants. Publishes the loaded stats.
    pub fn load_or_create(&self, id: &ParticipantId) -> Result<Record, RecordServiceError> {
        let record = match self.store.load(id) {
            Ok(record) => record,
            Err(RepoError::NotFound(_)) => {
                let record = Record::new(id.clone());
                self.store.save(&record)?;
                info!("event=record_create module=service status=ok participant={id}");
                record
            }
            Err(err) => return Err(err.into()),
        };
        self.publisher.publish(&record);
        Ok(record)
    }

    /// Adds a new task to the bound record and saves it.
    pub fn add_task(
        &self,
        binding: &mut dyn LiveBinding,
        mut task: TaskRecord,
    ) -> Result<(), RecordServiceError> {
        task.validate()?;
        task.completed = false;
        let record = binding.record_mut();
        record.tasks.push(task);
        self.store.save(record)?;
        Ok(())
    }

    /// Completes a task on the bound record.
    ///
    /// On an actual completion: refreshes the view, saves, and publishes.
    /// No-op outcomes write nothing.
    pub fn complete_task(
        &self,
        binding: &mut dyn LiveBinding,
        description: &str,
    ) -> Result<TaskCompletion, RecordServiceError> {
        let completion = binding.record_mut().complete_task(description);
        if let TaskCompletion::Completed {
            xp,
            coins,
            levels_gained,
        } = completion
        {
            binding.notify_stats_changed();
            self.store.save(binding.record())?;
            self.publisher.publish(binding.record());
            info!(
                "event=task_complete module=service status=ok participant={} xp={xp} coins={coins} levels_gained={levels_gained}",
                binding.bound_id()
            );
        }
        Ok(completion)
    }

    /// Deletes the first task matching `description` and saves.
    ///
    /// Returns whether a task was removed; credited rewards stay.
    pub fn delete_task(
        &self,
        binding: &mut dyn LiveBinding,
        description: &str,
    ) -> Result<bool, RecordServiceError> {
        let record = binding.record_mut();
        let Some(index) = record
            .tasks
            .iter()
            .position(|task| same_task_identity(task, description))
        else {
            return Ok(false);
        };
        record.tasks.remove(index);
        self.store.save(record)?;
        Ok(true)
    }

    /// Saves the bound record as-is.
    ///
    /// Hosts call this after a session merged gains into the live record.
    pub fn persist(&self, binding: &dyn LiveBinding) -> Result<(), RecordServiceError> {
        self.store.save(binding.record())?;
        Ok(())
    }
}
