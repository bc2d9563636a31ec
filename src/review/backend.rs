//! Persistence and scheduling seam for review sessions
//!
//! The session facade never computes or stores scheduling state itself; it
//! asks a [`ReviewBackend`] for due cards and hands ratings back to it.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::models::{DeckStats, LearningStatus, QueueOptions, Rating, ReviewScope};
use crate::markers::Marker;

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Card not found: {0}")]
    CardNotFound(Uuid),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Review session was closed")]
    SessionClosed,
}

pub type Result<T> = std::result::Result<T, ReviewError>;

#[async_trait]
pub trait ReviewBackend: Send + Sync {
    /// Ordered due cards for `scope`. With `include_pending`, learning cards
    /// that are not due yet are included too.
    async fn fetch_due_cards(
        &self,
        scope: &ReviewScope,
        options: &QueueOptions,
        include_pending: bool,
    ) -> Result<Vec<Marker>>;

    async fn fetch_learning_status(&self, scope: &ReviewScope) -> Result<LearningStatus>;

    /// Record a rating and return the card with its new review state
    async fn submit_review(&self, scope: &ReviewScope, card_id: Uuid, rating: Rating) -> Result<Marker>;

    async fn fetch_stats(&self, scope: &ReviewScope) -> Result<DeckStats>;
}
