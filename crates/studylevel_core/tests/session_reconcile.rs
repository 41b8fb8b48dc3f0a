use rusqlite::Connection;
use std::cell::{Cell, RefCell};
use studylevel_core::db::open_db_in_memory;
use studylevel_core::session::baseline::BaselineSnapshot;
use studylevel_core::{
    Difficulty, LiveBinding, ParticipantId, ParticipantOutcome, ParticipantPhase,
    ReconcileError, Record, RecordStore, RepoError, RepoResult, Session, SessionEngine,
    SessionError, SessionParticipant, SqliteRecordStore, StatsPublisher, SyncGains, TaskRecord,
};

/// SQLite store that counts writes and can be told to fail saves per participant.
struct ScriptedStore<'conn> {
    inner: SqliteRecordStore<'conn>,
    saves: Cell<usize>,
    failing_saves: RefCell<Vec<String>>,
}

impl<'conn> ScriptedStore<'conn> {
    fn new(conn: &'conn Connection) -> Self {
        Self {
            inner: SqliteRecordStore::try_new(conn).unwrap(),
            saves: Cell::new(0),
            failing_saves: RefCell::new(Vec::new()),
        }
    }

    fn fail_saves_for(&self, name: &str) {
        self.failing_saves.borrow_mut().push(name.to_string());
    }

    fn heal(&self) {
        self.failing_saves.borrow_mut().clear();
    }
}

impl RecordStore for ScriptedStore<'_> {
    fn exists(&self, id: &ParticipantId) -> RepoResult<bool> {
        self.inner.exists(id)
    }

    fn load(&self, id: &ParticipantId) -> RepoResult<Record> {
        self.inner.load(id)
    }

    fn save(&self, record: &Record) -> RepoResult<()> {
        if self
            .failing_saves
            .borrow()
            .iter()
            .any(|name| name == record.id.as_str())
        {
            return Err(RepoError::InvalidData("disk full".to_string()));
        }
        self.saves.set(self.saves.get() + 1);
        self.inner.save(record)
    }
}

#[derive(Default)]
struct RecordingPublisher {
    published: RefCell<Vec<String>>,
}

impl StatsPublisher for RecordingPublisher {
    fn publish(&self, record: &Record) {
        self.published
            .borrow_mut()
            .push(record.id.as_str().to_string());
    }
}

struct View {
    record: Record,
    refreshes: usize,
}

impl View {
    fn new(record: Record) -> Self {
        Self {
            record,
            refreshes: 0,
        }
    }
}

impl LiveBinding for View {
    fn record(&self) -> &Record {
        &self.record
    }

    fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    fn notify_stats_changed(&mut self) {
        self.refreshes += 1;
    }
}

fn id(value: &str) -> ParticipantId {
    ParticipantId::new(value).unwrap()
}

fn stored(name: &str, xp: i64, coins: i64) -> Record {
    let mut record = Record::new(id(name));
    record.add_xp(xp);
    record.add_coins(coins);
    record
}

fn earn(session: &mut Session, name: &str, description: &str, xp: i64, coins: i64) {
    session
        .add_task(
            &id(name),
            TaskRecord::new(description, xp, coins, Difficulty::Medium),
        )
        .unwrap();
    session.complete_task(&id(name), description).unwrap();
}

#[test]
fn participants_without_gains_cause_no_store_write() {
    let conn = open_db_in_memory().unwrap();
    let store = ScriptedStore::new(&conn);
    store.inner.save(&stored("ana", 100, 50)).unwrap();
    store.inner.save(&stored("ben", 10, 5)).unwrap();
    let publisher = RecordingPublisher::default();
    let engine = SessionEngine::new(&store, &publisher);

    let mut session = engine
        .begin_session([id("ana"), id("ben")], None)
        .unwrap();
    let report = engine.end_session(&mut session, None);

    assert!(matches!(
        report.outcome_for(&id("ana")),
        Some(ParticipantOutcome::NoGains)
    ));
    assert!(matches!(
        report.outcome_for(&id("ben")),
        Some(ParticipantOutcome::NoGains)
    ));
    assert_eq!(store.saves.get(), 0);
    assert!(publisher.published.borrow().is_empty());
    assert!(session.is_finished());
}

#[test]
fn offline_merge_adds_delta_to_freshly_loaded_record() {
    let conn = open_db_in_memory().unwrap();
    let store = ScriptedStore::new(&conn);
    store.inner.save(&stored("ana", 100, 50)).unwrap();
    let engine = SessionEngine::new(&store, studylevel_core::NoopStatsPublisher);

    let mut session = engine.begin_session([id("ana")], None).unwrap();
    earn(&mut session, "ana", "Essay draft", 80, 0);
    assert_eq!(session.participant(&id("ana")).unwrap().record().xp, 180);

    // Another writer moved the stored record after the baseline was taken.
    store.inner.save(&stored("ana", 130, 60)).unwrap();

    let report = engine.end_session(&mut session, None);
    match report.outcome_for(&id("ana")) {
        Some(ParticipantOutcome::OfflineSaved(gains)) => assert_eq!(
            *gains,
            SyncGains {
                xp: 80,
                levels: 1,
                coins: 0,
                tasks: 1,
            }
        ),
        other => panic!("unexpected outcome: {other:?}"),
    }

    let record = store.load(&id("ana")).unwrap();
    assert_eq!(record.xp, 210);
    assert_eq!(record.coins, 60);
    assert_eq!(record.completed_task_count, 1);
}

#[test]
fn ending_twice_matches_ending_once() {
    let conn = open_db_in_memory().unwrap();
    let store = ScriptedStore::new(&conn);
    store.inner.save(&stored("ana", 100, 50)).unwrap();
    let engine = SessionEngine::new(&store, studylevel_core::NoopStatsPublisher);

    let mut session = engine.begin_session([id("ana")], None).unwrap();
    earn(&mut session, "ana", "Essay draft", 80, 10);

    engine.end_session(&mut session, None);
    let after_first = store.load(&id("ana")).unwrap();

    let second = engine.end_session(&mut session, None);
    assert!(matches!(
        second.outcome_for(&id("ana")),
        Some(ParticipantOutcome::AlreadyReconciled)
    ));
    assert_eq!(store.load(&id("ana")).unwrap(), after_first);
    assert_eq!(store.saves.get(), 1);
}

#[test]
fn live_bound_participant_receives_absolute_totals() {
    let conn = open_db_in_memory().unwrap();
    let store = ScriptedStore::new(&conn);
    let publisher = RecordingPublisher::default();
    let engine = SessionEngine::new(&store, &publisher);

    let mut baseline = Record::new(id("ana"));
    baseline.xp = 100;
    baseline.level = 3;
    baseline.coins = 20;
    let mut working = baseline.clone();
    working.xp = 220;
    working.level = 4;
    working.coins = 45;

    let mut session = Session::from_participants([SessionParticipant::new(
        Some(BaselineSnapshot::new(baseline.clone())),
        working,
    )])
    .unwrap();
    let mut view = View::new(baseline);

    let report = engine.end_session(&mut session, Some(&mut view));

    assert_eq!(
        (view.record.xp, view.record.level, view.record.coins),
        (220, 4, 45)
    );
    assert_eq!(view.refreshes, 1);
    assert!(matches!(
        report.outcome_for(&id("ana")),
        Some(ParticipantOutcome::LiveUpdated(SyncGains {
            xp: 120,
            levels: 1,
            coins: 25,
            tasks: 0,
        }))
    ));
    assert_eq!(store.saves.get(), 0);
    assert_eq!(*publisher.published.borrow(), vec!["ana".to_string()]);
}

#[test]
fn live_binding_only_applies_to_the_bound_participant() {
    let conn = open_db_in_memory().unwrap();
    let store = ScriptedStore::new(&conn);
    store.inner.save(&stored("ana", 0, 0)).unwrap();
    store.inner.save(&stored("ben", 0, 0)).unwrap();
    let engine = SessionEngine::new(&store, studylevel_core::NoopStatsPublisher);

    let mut view = View::new(store.load(&id("ana")).unwrap());
    let mut session = engine
        .begin_session([id("ana"), id("ben")], Some(&view))
        .unwrap();
    earn(&mut session, "ana", "Quiz", 30, 5);
    earn(&mut session, "ben", "Quiz", 40, 5);

    let report = engine.end_session(&mut session, Some(&mut view));

    assert!(matches!(
        report.outcome_for(&id("ana")),
        Some(ParticipantOutcome::LiveUpdated(_))
    ));
    assert!(matches!(
        report.outcome_for(&id("ben")),
        Some(ParticipantOutcome::OfflineSaved(_))
    ));
    assert_eq!(view.record.xp, 30);
    assert_eq!(view.record.completed_task_count, 1);
    assert_eq!(
        view.record.tasks,
        vec![TaskRecord::new("Quiz", 30, 5, Difficulty::Medium).completed_copy()]
    );
    // Only ben was written; ana's gains live in the view.
    assert_eq!(store.saves.get(), 1);
    assert_eq!(store.load(&id("ana")).unwrap().xp, 0);
    assert_eq!(store.load(&id("ben")).unwrap().xp, 40);
}

#[test]
fn baseline_completed_task_is_not_credited_again() {
    let conn = open_db_in_memory().unwrap();
    let store = ScriptedStore::new(&conn);
    let mut ana = stored("ana", 50, 20);
    ana.completed_task_count = 1;
    ana.tasks = vec![TaskRecord::new("Read Ch.1", 50, 20, Difficulty::Easy).completed_copy()];
    store.inner.save(&ana).unwrap();
    let engine = SessionEngine::new(&store, studylevel_core::NoopStatsPublisher);

    let mut session = engine.begin_session([id("ana")], None).unwrap();
    assert!(session.participant(&id("ana")).unwrap().record().tasks.is_empty());
    earn(&mut session, "ana", "Read Ch.1", 50, 20);
    session
        .add_task(
            &id("ana"),
            TaskRecord::new("Lab report", 90, 30, Difficulty::Hard),
        )
        .unwrap();
    session.complete_task(&id("ana"), "Lab report").unwrap();

    let report = engine.end_session(&mut session, None);
    let record = store.load(&id("ana")).unwrap();

    assert_eq!(record.completed_task_count, 2);
    assert_eq!(record.tasks.len(), 2);
    assert_eq!(
        record
            .tasks
            .iter()
            .filter(|task| task.description == "Read Ch.1")
            .count(),
        1
    );
    assert_eq!(
        record.tasks[1],
        TaskRecord {
            description: "Lab report".to_string(),
            xp_reward: 90,
            coin_reward: 30,
            difficulty: Difficulty::Hard,
            completed: true,
        }
    );
    assert_eq!(
        report.participants[0].progress_message().as_deref(),
        Some(
            "Progress for ana has been saved to main account!\n\
             XP gained: 140\nLevels gained: 1\nCoins gained: 50\nTasks completed: 1"
        )
    );
}

#[test]
fn guest_with_progress_is_saved_as_new_record() {
    let conn = open_db_in_memory().unwrap();
    let store = ScriptedStore::new(&conn);
    let engine = SessionEngine::new(&store, studylevel_core::NoopStatsPublisher);

    let mut session = engine.begin_session([id("newbie")], None).unwrap();
    assert!(session.participant(&id("newbie")).unwrap().is_guest());
    earn(&mut session, "newbie", "Flashcards", 120, 15);

    let report = engine.end_session(&mut session, None);

    assert!(matches!(
        report.outcome_for(&id("newbie")),
        Some(ParticipantOutcome::GuestSaved)
    ));
    let record = store.load(&id("newbie")).unwrap();
    assert_eq!(record.xp, 120);
    assert_eq!(record.level, 2);
    assert_eq!(record.coins, 15);
    assert_eq!(record.completed_task_count, 1);
    assert_eq!(store.saves.get(), 1);
}

#[test]
fn write_failure_is_isolated_and_retryable() {
    let conn = open_db_in_memory().unwrap();
    let store = ScriptedStore::new(&conn);
    store.inner.save(&stored("ana", 0, 0)).unwrap();
    store.inner.save(&stored("ben", 0, 0)).unwrap();
    let engine = SessionEngine::new(&store, studylevel_core::NoopStatsPublisher);

    let mut session = engine
        .begin_session([id("ana"), id("ben")], None)
        .unwrap();
    earn(&mut session, "ana", "Quiz", 30, 5);
    earn(&mut session, "ben", "Quiz", 40, 5);

    store.fail_saves_for("ana");
    let first = engine.end_session(&mut session, None);

    assert!(matches!(
        first.outcome_for(&id("ana")),
        Some(ParticipantOutcome::Failed(ReconcileError::Write(_)))
    ));
    assert!(matches!(
        first.outcome_for(&id("ben")),
        Some(ParticipantOutcome::OfflineSaved(_))
    ));
    assert!(first.has_retryable_failures());
    assert!(!session.is_finished());
    assert_eq!(
        session.participant(&id("ana")).unwrap().phase(),
        ParticipantPhase::InSession
    );
    assert_eq!(store.load(&id("ana")).unwrap().xp, 0);

    store.heal();
    let retry = engine.end_session(&mut session, None);

    assert!(matches!(
        retry.outcome_for(&id("ana")),
        Some(ParticipantOutcome::OfflineSaved(_))
    ));
    assert!(matches!(
        retry.outcome_for(&id("ben")),
        Some(ParticipantOutcome::AlreadyReconciled)
    ));
    assert!(session.is_finished());
    assert_eq!(store.load(&id("ana")).unwrap().xp, 30);
    assert_eq!(store.load(&id("ben")).unwrap().xp, 40);
}

#[test]
fn record_removed_mid_session_is_reported_as_toctou() {
    let conn = open_db_in_memory().unwrap();
    let store = ScriptedStore::new(&conn);
    store.inner.save(&stored("ana", 0, 0)).unwrap();
    let engine = SessionEngine::new(&store, studylevel_core::NoopStatsPublisher);

    let mut session = engine.begin_session([id("ana")], None).unwrap();
    earn(&mut session, "ana", "Quiz", 30, 5);
    conn.execute("DELETE FROM participants WHERE id = 'ana';", [])
        .unwrap();

    let report = engine.end_session(&mut session, None);

    assert!(matches!(
        report.outcome_for(&id("ana")),
        Some(ParticipantOutcome::Failed(ReconcileError::Toctou))
    ));
    assert!(!report.has_retryable_failures());
    assert!(session.is_finished());
    assert!(!store.exists(&id("ana")).unwrap());
    assert_eq!(store.saves.get(), 0);
}

#[test]
fn guest_that_gained_a_record_is_skipped_as_missing_baseline() {
    let conn = open_db_in_memory().unwrap();
    let store = ScriptedStore::new(&conn);
    let engine = SessionEngine::new(&store, studylevel_core::NoopStatsPublisher);

    let mut session = engine.begin_session([id("zed")], None).unwrap();
    earn(&mut session, "zed", "Quiz", 30, 5);
    store.inner.save(&stored("zed", 500, 500)).unwrap();

    let report = engine.end_session(&mut session, None);

    assert!(matches!(
        report.outcome_for(&id("zed")),
        Some(ParticipantOutcome::Failed(ReconcileError::MissingBaseline))
    ));
    assert_eq!(store.load(&id("zed")).unwrap().xp, 500);
    assert_eq!(store.saves.get(), 0);
}

#[test]
fn reconciled_participant_rejects_further_mutation() {
    let conn = open_db_in_memory().unwrap();
    let store = ScriptedStore::new(&conn);
    let engine = SessionEngine::new(&store, studylevel_core::NoopStatsPublisher);

    let mut session = engine.begin_session([id("ana")], None).unwrap();
    engine.end_session(&mut session, None);

    let err = session
        .complete_task(&id("ana"), "Quiz")
        .unwrap_err();
    assert!(matches!(err, SessionError::AlreadyReconciled(_)));
}

#[test]
fn begin_session_collapses_duplicates_and_rejects_empty_input() {
    let conn = open_db_in_memory().unwrap();
    let store = ScriptedStore::new(&conn);
    let engine = SessionEngine::new(&store, studylevel_core::NoopStatsPublisher);

    let session = engine
        .begin_session([id("ana"), id("ben"), id("ana")], None)
        .unwrap();
    let order = session
        .participants()
        .iter()
        .map(|participant| participant.id().as_str())
        .collect::<Vec<_>>();
    assert_eq!(order, vec!["ana", "ben"]);

    let err = engine
        .begin_session(Vec::<ParticipantId>::new(), None)
        .unwrap_err();
    assert!(matches!(err, SessionError::NoParticipants));
}
