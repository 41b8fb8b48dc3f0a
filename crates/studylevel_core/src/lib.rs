//! Core domain logic for StudyLevel.
//! Records, solo task progress, and shared-session reconciliation live here;
//! hosts only bind views and pass events in.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod publish;
pub mod repo;
pub mod service;
pub mod session;

pub use config::{ConfigError, CoreConfig};
pub use logging::{
    default_log_level, init_logging, logging_status, LogLevel, LogSettings, LoggingError,
};
pub use model::record::{
    ParticipantId, Record, RecordValidationError, TaskCompletion, XP_PER_LEVEL,
};
pub use model::task::{Difficulty, TaskRecord, TaskValidationError};
pub use publish::{LogStatsPublisher, NoopStatsPublisher, StatsPublisher, StatsSnapshot};
pub use repo::record_repo::{RecordStore, RepoError, RepoResult, SqliteRecordStore};
pub use service::record_service::{RecordService, RecordServiceError};
pub use session::binding::LiveBinding;
pub use session::reconcile::SessionEngine;
pub use session::report::{
    ParticipantOutcome, ParticipantReport, ReconcileError, SessionReport, SyncGains,
};
pub use session::state::{ParticipantPhase, Session, SessionParticipant};
pub use session::SessionError;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
