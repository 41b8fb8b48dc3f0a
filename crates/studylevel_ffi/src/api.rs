//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose sign-in, solo task, and shared-session calls to Dart via FRB.
//! - Own the primary view binding: the signed-in participant's live record.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - All calls are serialized through one process-wide state lock.
//! - Failures surface as envelope messages, never as Dart exceptions.

use log::{info, warn};
use studylevel_core::db::open_db;
use studylevel_core::{
    core_version as core_version_inner, init_logging as init_logging_inner,
    ping as ping_inner, CoreConfig, Difficulty, LiveBinding,
    LogStatsPublisher, ParticipantId, ParticipantOutcome, Record, RecordService,
    RecordServiceError, Session, SessionEngine, SqliteRecordStore, TaskCompletion, TaskRecord,
};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

const DB_PATH_ENV: &str = "STUDYLEVEL_DB_PATH";
const ENTRY_DB_FILE_NAME: &str = "studylevel_entry.sqlite3";

static FFI_STATE: Mutex<FfiState> = Mutex::new(FfiState::new());

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    let config = CoreConfig {
        log_level: level,
        log_dir: Some(PathBuf::from(log_dir.trim())),
        ..CoreConfig::default()
    };
    match init_logging_inner(&config) {
        Ok(_) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Applies host JSON config (`db_path`, `log_level`, `log_dir`).
///
/// Starts logging when `log_dir` is present and points the store at
/// `db_path`. Signs out the current participant.
///
/// # FFI contract
/// - Rejected while a session is still being reconciled.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn configure_store(config_json: String) -> String {
    let config = match CoreConfig::from_json_str(&config_json) {
        Ok(config) => config,
        Err(err) => return err.to_string(),
    };
    if let Err(err) = init_logging_inner(&config) {
        return err.to_string();
    }
    match with_state(|state| state.configure(config.db_path)) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// One task row as shown by the task board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskItem {
    pub description: String,
    pub xp_reward: i64,
    pub coin_reward: i64,
    /// `EASY|MEDIUM|HARD`.
    pub difficulty: String,
    pub completed: bool,
}

/// Primary view projection of the signed-in record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsView {
    pub participant_id: String,
    pub xp: i64,
    pub level: i64,
    pub coins: i64,
    pub completed_task_count: i64,
    pub tasks: Vec<TaskItem>,
    /// Bumped on every stats-changed notification; Dart re-renders on change.
    pub stats_revision: u64,
}

/// Response envelope for calls returning the signed-in record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsResponse {
    pub ok: bool,
    pub stats: Option<StatsView>,
    pub message: String,
}

impl StatsResponse {
    fn from_result(result: Result<StatsView, String>, message: &str) -> Self {
        match result {
            Ok(stats) => Self {
                ok: true,
                stats: Some(stats),
                message: message.to_string(),
            },
            Err(err) => Self {
                ok: false,
                stats: None,
                message: err,
            },
        }
    }
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    /// Whether operation succeeded.
    pub ok: bool,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl ActionResponse {
    fn from_result(result: Result<String, String>) -> Self {
        match result {
            Ok(message) => Self { ok: true, message },
            Err(message) => Self { ok: false, message },
        }
    }
}

/// Response envelope for `session_end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEndResponse {
    pub ok: bool,
    /// False while some participant still needs a retry.
    pub finished: bool,
    /// One "progress saved" message per participant with merged gains.
    pub progress_messages: Vec<String>,
    /// `participant: reason` lines for failed or skipped participants.
    pub failures: Vec<String>,
    pub message: String,
}

/// Loads (or creates) the participant and binds it as the primary view.
///
/// # FFI contract
/// - Rejected while a session is active.
#[flutter_rust_bridge::frb(sync)]
pub fn sign_in(participant_id: String) -> StatsResponse {
    StatsResponse::from_result(
        with_state(|state| state.sign_in(&participant_id)),
        "Signed in.",
    )
}

/// Returns the bound record as currently shown.
#[flutter_rust_bridge::frb(sync)]
pub fn current_stats() -> StatsResponse {
    StatsResponse::from_result(with_state(|state| state.current_stats()), "")
}

/// Adds a task to the signed-in participant's board and saves it.
///
/// # FFI contract
/// - Rejected while a session is active; session gains would overwrite
///   solo gains at `session_end`. The same holds for `task_complete` and
///   `task_delete`.
#[flutter_rust_bridge::frb(sync)]
pub fn task_add(
    description: String,
    xp_reward: i64,
    coin_reward: i64,
    difficulty: String,
) -> ActionResponse {
    ActionResponse::from_result(with_state(|state| {
        let task = parse_task(description, xp_reward, coin_reward, &difficulty)?;
        state.add_task(task)?;
        Ok("Task added.".to_string())
    }))
}

/// Completes a task on the signed-in participant's board.
///
/// Completing an unknown or already-completed task succeeds as a no-op.
#[flutter_rust_bridge::frb(sync)]
pub fn task_complete(description: String) -> ActionResponse {
    ActionResponse::from_result(with_state(|state| {
        state
            .complete_task(&description)
            .map(completion_message)
    }))
}

/// Deletes the first matching task from the signed-in participant's board.
#[flutter_rust_bridge::frb(sync)]
pub fn task_delete(description: String) -> ActionResponse {
    ActionResponse::from_result(with_state(|state| {
        if state.delete_task(&description)? {
            Ok("Task deleted.".to_string())
        } else {
            Ok("Task not found.".to_string())
        }
    }))
}

/// Starts a shared session for the given participant ids.
///
/// Unknown ids join as guests; duplicates are collapsed.
#[flutter_rust_bridge::frb(sync)]
pub fn session_begin(participant_ids: Vec<String>) -> ActionResponse {
    ActionResponse::from_result(with_state(|state| {
        let joined = state.begin_session(&participant_ids)?;
        Ok(format!("Session started with {joined} participant(s)."))
    }))
}

/// Adds a task to one participant's session board.
#[flutter_rust_bridge::frb(sync)]
pub fn session_add_task(
    participant_id: String,
    description: String,
    xp_reward: i64,
    coin_reward: i64,
    difficulty: String,
) -> ActionResponse {
    ActionResponse::from_result(with_state(|state| {
        let id = parse_participant(&participant_id)?;
        let task = parse_task(description, xp_reward, coin_reward, &difficulty)?;
        state
            .session_mut()?
            .add_task(&id, task)
            .map_err(|err| err.to_string())?;
        Ok("Task added.".to_string())
    }))
}

/// Completes a task on one participant's session board.
#[flutter_rust_bridge::frb(sync)]
pub fn session_complete_task(participant_id: String, description: String) -> ActionResponse {
    ActionResponse::from_result(with_state(|state| {
        let id = parse_participant(&participant_id)?;
        state
            .session_mut()?
            .complete_task(&id, &description)
            .map(completion_message)
            .map_err(|err| err.to_string())
    }))
}

/// Removes the first matching task from one participant's session board.
///
/// Rewards already credited for it stay.
#[flutter_rust_bridge::frb(sync)]
pub fn session_remove_task(participant_id: String, description: String) -> ActionResponse {
    ActionResponse::from_result(with_state(|state| {
        if state.remove_session_task(&participant_id, &description)? {
            Ok("Task removed.".to_string())
        } else {
            Ok("Task not found.".to_string())
        }
    }))
}

/// Reconciles the active session into authoritative records.
///
/// # FFI contract
/// - Safe to call again after a partial failure; finished participants are
///   not merged twice.
/// - The session is released once every participant is reconciled.
#[flutter_rust_bridge::frb(sync)]
pub fn session_end() -> SessionEndResponse {
    match with_state(|state| state.end_session()) {
        Ok(response) => response,
        Err(err) => SessionEndResponse {
            ok: false,
            finished: false,
            progress_messages: Vec::new(),
            failures: Vec::new(),
            message: err,
        },
    }
}

/// The signed-in participant's live record.
struct BoundView {
    record: Record,
    stats_revision: u64,
}

impl LiveBinding for BoundView {
    fn record(&self) -> &Record {
        &self.record
    }

    fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    fn notify_stats_changed(&mut self) {
        self.stats_revision = self.stats_revision.wrapping_add(1);
    }
}

impl BoundView {
    fn to_stats_view(&self) -> StatsView {
        StatsView {
            participant_id: self.record.id.to_string(),
            xp: self.record.xp,
            level: self.record.level,
            coins: self.record.coins,
            completed_task_count: self.record.completed_task_count,
            tasks: self.record.tasks.iter().map(to_task_item).collect(),
            stats_revision: self.stats_revision,
        }
    }
}

struct FfiState {
    db_path: Option<PathBuf>,
    bound: Option<BoundView>,
    session: Option<Session>,
}

impl FfiState {
    const fn new() -> Self {
        Self {
            db_path: None,
            bound: None,
            session: None,
        }
    }

    fn db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(default_db_path)
    }

    fn ensure_no_session(&self, action: &str) -> Result<(), String> {
        match &self.session {
            Some(_) => Err(format!("cannot {action} while a session is active")),
            None => Ok(()),
        }
    }

    fn configure(&mut self, db_path: PathBuf) -> Result<(), String> {
        self.ensure_no_session("switch stores")?;
        info!(
            "event=store_configure module=ffi status=ok db_path={}",
            db_path.display()
        );
        self.db_path = Some(db_path);
        self.bound = None;
        Ok(())
    }

    fn sign_in(&mut self, participant_id: &str) -> Result<StatsView, String> {
        self.ensure_no_session("switch participants")?;
        let id = parse_participant(participant_id)?;
        let record = with_service(&self.db_path(), |service| service.load_or_create(&id))?;
        let bound = BoundView {
            record,
            stats_revision: 0,
        };
        let view = bound.to_stats_view();
        self.bound = Some(bound);
        Ok(view)
    }

    fn bound(&self) -> Result<&BoundView, String> {
        self.bound
            .as_ref()
            .ok_or_else(|| "no participant signed in".to_string())
    }

    fn bound_mut(&mut self) -> Result<&mut BoundView, String> {
        self.bound
            .as_mut()
            .ok_or_else(|| "no participant signed in".to_string())
    }

    fn current_stats(&self) -> Result<StatsView, String> {
        Ok(self.bound()?.to_stats_view())
    }

    fn add_task(&mut self, task: TaskRecord) -> Result<(), String> {
        self.ensure_no_session("edit solo tasks")?;
        let path = self.db_path();
        let bound = self.bound_mut()?;
        with_service(&path, |service| service.add_task(bound, task))
    }

    fn complete_task(&mut self, description: &str) -> Result<TaskCompletion, String> {
        self.ensure_no_session("edit solo tasks")?;
        let path = self.db_path();
        let bound = self.bound_mut()?;
        with_service(&path, |service| service.complete_task(bound, description))
    }

    fn delete_task(&mut self, description: &str) -> Result<bool, String> {
        self.ensure_no_session("edit solo tasks")?;
        let path = self.db_path();
        let bound = self.bound_mut()?;
        with_service(&path, |service| service.delete_task(bound, description))
    }

    fn session_mut(&mut self) -> Result<&mut Session, String> {
        self.session
            .as_mut()
            .ok_or_else(|| "no active session".to_string())
    }

    fn remove_session_task(
        &mut self,
        participant_id: &str,
        description: &str,
    ) -> Result<bool, String> {
        let id = parse_participant(participant_id)?;
        self.session_mut()?
            .remove_task(&id, description)
            .map_err(|err| err.to_string())
    }

    fn begin_session(&mut self, participant_ids: &[String]) -> Result<usize, String> {
        self.ensure_no_session("start a session")?;
        let ids = participant_ids
            .iter()
            .map(|raw| parse_participant(raw))
            .collect::<Result<Vec<_>, _>>()?;
        let path = self.db_path();
        let live = self.bound.as_ref().map(|bound| bound as &dyn LiveBinding);
        let session = with_engine(&path, |engine| {
            engine
                .begin_session(ids, live)
                .map_err(|err| err.to_string())
        })?;
        let joined = session.participants().len();
        self.session = Some(session);
        Ok(joined)
    }

    fn end_session(&mut self) -> Result<SessionEndResponse, String> {
        let path = self.db_path();
        let Some(session) = self.session.as_mut() else {
            return Err("no active session".to_string());
        };
        let bound = &mut self.bound;
        let report = with_engine(&path, |engine| {
            let live = bound.as_mut().map(|view| view as &mut dyn LiveBinding);
            Ok(engine.end_session(&mut *session, live))
        })?;
        let finished = session.is_finished();

        let mut failures = report
            .failures()
            .filter_map(|entry| match &entry.outcome {
                ParticipantOutcome::Failed(err) => Some(format!("{}: {err}", entry.participant)),
                _ => None,
            })
            .collect::<Vec<_>>();

        if let Some(view) = self.bound.as_ref() {
            let merged_live = matches!(
                report.outcome_for(&view.record.id),
                Some(ParticipantOutcome::LiveUpdated(_))
            );
            if merged_live {
                if let Err(err) = with_service(&path, |service| service.persist(view)) {
                    warn!(
                        "event=live_persist module=ffi status=error participant={} error={err}",
                        view.record.id
                    );
                    failures.push(format!("{}: {err}", view.record.id));
                }
            }
        }

        if finished {
            self.session = None;
        }

        let progress_messages = report
            .participants
            .iter()
            .filter_map(|entry| entry.progress_message())
            .collect::<Vec<_>>();
        let message = if finished {
            "Session ended.".to_string()
        } else {
            "Session partially saved; call session_end again to retry.".to_string()
        };
        Ok(SessionEndResponse {
            ok: failures.is_empty(),
            finished,
            progress_messages,
            failures,
            message,
        })
    }
}

fn with_state<T>(f: impl FnOnce(&mut FfiState) -> T) -> T {
    // Poisoned state is reused; every FfiState method leaves it consistent.
    let mut state = FFI_STATE.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut state)
}

fn default_db_path() -> PathBuf {
    if let Ok(raw) = std::env::var(DB_PATH_ENV) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    std::env::temp_dir().join(ENTRY_DB_FILE_NAME)
}

fn with_service<T>(
    db_path: &Path,
    f: impl FnOnce(
        &RecordService<SqliteRecordStore<'_>, LogStatsPublisher>,
    ) -> Result<T, RecordServiceError>,
) -> Result<T, String> {
    let conn = open_db(db_path).map_err(|err| format!("store open failed: {err}"))?;
    let store =
        SqliteRecordStore::try_new(&conn).map_err(|err| format!("store init failed: {err}"))?;
    let service = RecordService::new(store, LogStatsPublisher);
    f(&service).map_err(|err| err.to_string())
}

fn with_engine<T>(
    db_path: &Path,
    f: impl FnOnce(&SessionEngine<SqliteRecordStore<'_>, LogStatsPublisher>) -> Result<T, String>,
) -> Result<T, String> {
    let conn = open_db(db_path).map_err(|err| format!("store open failed: {err}"))?;
    let store =
        SqliteRecordStore::try_new(&conn).map_err(|err| format!("store init failed: {err}"))?;
    let engine = SessionEngine::new(store, LogStatsPublisher);
    f(&engine)
}

fn parse_participant(raw: &str) -> Result<ParticipantId, String> {
    ParticipantId::new(raw).map_err(|err| err.to_string())
}

fn parse_task(
    description: String,
    xp_reward: i64,
    coin_reward: i64,
    difficulty: &str,
) -> Result<TaskRecord, String> {
    let difficulty = Difficulty::parse(difficulty)
        .ok_or_else(|| format!("unsupported difficulty `{difficulty}`; expected EASY|MEDIUM|HARD"))?;
    Ok(TaskRecord::new(description, xp_reward, coin_reward, difficulty))
}

fn completion_message(completion: TaskCompletion) -> String {
    match completion {
        TaskCompletion::Completed {
            xp,
            coins,
            levels_gained: 0,
        } => format!("Task completed: +{xp} XP, +{coins} coins."),
        TaskCompletion::Completed {
            xp,
            coins,
            levels_gained,
        } => format!("Task completed: +{xp} XP, +{coins} coins, +{levels_gained} level(s)."),
        TaskCompletion::AlreadyCompleted => "Task already completed.".to_string(),
        TaskCompletion::NotFound => "Task not found.".to_string(),
    }
}

fn to_task_item(task: &TaskRecord) -> TaskItem {
    TaskItem {
        description: task.description.clone(),
        xp_reward: task.xp_reward,
        coin_reward: task.coin_reward,
        difficulty: task.difficulty.as_str().to_string(),
        completed: task.completed,
    }
}
