//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store and publisher calls into use-case level APIs.
//! - Keep UI/FFI layers decoupled from storage details.

pub mod record_service;
