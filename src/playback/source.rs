//! Media player seam

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    #[error("No player available")]
    Unavailable,

    #[error("Player command failed: {0}")]
    Command(String),

    #[error("Invalid playback rate: {0}")]
    InvalidRate(f64),
}

pub type Result<T> = std::result::Result<T, PlaybackError>;

/// A media player that can be polled and commanded.
///
/// Implementations must tolerate polling several times per second.
#[async_trait]
pub trait PlaybackSource: Send + Sync {
    /// Current position in seconds
    async fn get_current_time(&self) -> Result<f64>;

    async fn seek_to(&self, seconds: f64) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn set_rate(&self, multiplier: f64) -> Result<()>;

    async fn is_playing(&self) -> Result<bool>;
}
