//! Spaced-repetition review of markers
//!
//! This module provides:
//! - Review models (ratings, queue options, scopes, statistics)
//! - A pluggable scheduling policy with an SM-2 default
//! - Pure due-queue derivation
//! - The review session facade over a persistence backend
//! - JSON file storage implementing that backend

pub mod algorithm;
pub mod backend;
pub mod models;
pub mod queue;
pub mod session;
pub mod storage;

pub use algorithm::{format_interval, preview_intervals, SchedulingPolicy, Sm2Policy};
pub use backend::{ReviewBackend, ReviewError};
pub use models::*;
pub use session::{ReviewSession, ReviewSessionOptions, SessionEvent, SessionHandle, SessionState};
pub use storage::{CardStorage, StorageError};
