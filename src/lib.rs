//! Listening-practice engine: mark confusing moments in media, loop them,
//! and review them with spaced repetition.

pub mod config;
pub mod markers;
pub mod playback;
pub mod review;

pub use config::{ConfigError, EngineConfig};
pub use markers::{Marker, MarkerError, MarkerStore};
pub use playback::{LoopEngine, PlaybackError, PlaybackSource};
pub use review::{CardStorage, ReviewBackend, ReviewError, ReviewSession};
