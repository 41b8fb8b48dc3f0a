//! CLI smoke and inspection entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `studylevel_core` linkage.
//! - Print leaderboard snapshots from a record database as JSON.
//!
//! Usage:
//! - `studylevel` prints ping and version.
//! - `studylevel stats <db_path> <participant_id>`
//! - `studylevel leaderboard <db_path> [limit]`

use studylevel_core::db::open_db;
use studylevel_core::{ParticipantId, RecordStore, SqliteRecordStore, StatsSnapshot};
use std::process::ExitCode;

const DEFAULT_LEADERBOARD_LIMIT: u32 = 10;

fn main() -> ExitCode {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    match run(&args) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("studylevel: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<String, String> {
    match args {
        [] => Ok(format!(
            "studylevel_core ping={}\nstudylevel_core version={}",
            studylevel_core::ping(),
            studylevel_core::core_version()
        )),
        [command, db_path, participant] if command == "stats" => {
            let id = ParticipantId::new(participant.as_str()).map_err(|err| err.to_string())?;
            let conn = open_db(db_path).map_err(|err| err.to_string())?;
            let store = SqliteRecordStore::try_new(&conn).map_err(|err| err.to_string())?;
            let record = store.load(&id).map_err(|err| err.to_string())?;
            serde_json::to_string_pretty(&StatsSnapshot::from_record(&record))
                .map_err(|err| err.to_string())
        }
        [command, db_path, rest @ ..] if command == "leaderboard" && rest.len() <= 1 => {
            let limit = match rest.first() {
                Some(raw) => raw
                    .parse::<u32>()
                    .map_err(|err| format!("invalid limit `{raw}`: {err}"))?,
                None => DEFAULT_LEADERBOARD_LIMIT,
            };
            let conn = open_db(db_path).map_err(|err| err.to_string())?;
            let store = SqliteRecordStore::try_new(&conn).map_err(|err| err.to_string())?;
            let snapshots = store
                .leaderboard(limit)
                .map_err(|err| err.to_string())?
                .iter()
                .map(StatsSnapshot::from_record)
                .collect::<Vec<_>>();
            serde_json::to_string_pretty(&snapshots).map_err(|err| err.to_string())
        }
        _ => Err(
            "usage: studylevel [stats <db_path> <participant_id> | leaderboard <db_path> [limit]]"
                .to_string(),
        ),
    }
}
