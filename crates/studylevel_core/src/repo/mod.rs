//! Repository layer for participant records.
//!
//! # Responsibility
//! - Define the record store contract used by services and the session engine.
//! - Isolate SQLite query details from business orchestration.
//!
//! # Invariants
//! - Store writes enforce `Record::validate()` before persistence.
//! - Missing records surface as `RepoError::NotFound`, not as defaults.

pub mod record_repo;
