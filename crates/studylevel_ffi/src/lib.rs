//! Flutter bridge crate for StudyLevel core.

pub mod api;
