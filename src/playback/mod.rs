//! Playback loop synchronization
//!
//! The media player itself lives outside this crate; it is reached through
//! the [`PlaybackSource`] trait.

pub mod engine;
pub mod source;

pub use engine::{evaluate, Bounds, LoopAction, LoopEngine, LoopEngineOptions, PlaybackTarget};
pub use source::{PlaybackError, PlaybackSource};
