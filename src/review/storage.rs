//! JSON file storage for markers and their review state
//!
//! Directory structure:
//! ```text
//! {data_dir}/
//! └── cards/
//!     └── {marker-id}.json   # One marker with its review fields
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::algorithm::{apply_review, SchedulingPolicy, Sm2Policy};
use super::backend::{ReviewBackend, ReviewError};
use super::models::{DeckStats, LearningStatus, QueueOptions, Rating, ReviewScope};
use super::queue::{deck_stats, derive_due_queue, learning_status};
use crate::markers::{Marker, MarkerStore, MarkerStoreOptions};

const DEFAULT_MASTERED_INTERVAL_DAYS: i32 = 21;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Marker not found: {0}")]
    MarkerNotFound(Uuid),
}

pub type Result<T> = std::result::Result<T, StorageError>;

impl From<StorageError> for ReviewError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::MarkerNotFound(id) => ReviewError::CardNotFound(id),
            other => ReviewError::Storage(other.to_string()),
        }
    }
}

/// Default data directory (e.g. ~/.local/share/echoloop)
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("echoloop"))
}

pub struct CardStorage {
    data_dir: PathBuf,
    policy: Box<dyn SchedulingPolicy>,
    mastered_interval_days: i32,
}

impl CardStorage {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            policy: Box::new(Sm2Policy::default()),
            mastered_interval_days: DEFAULT_MASTERED_INTERVAL_DAYS,
        }
    }

    pub fn with_policy(mut self, policy: impl SchedulingPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn with_mastered_interval(mut self, days: i32) -> Self {
        self.mastered_interval_days = days;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn policy(&self) -> &dyn SchedulingPolicy {
        self.policy.as_ref()
    }

    fn cards_dir(&self) -> PathBuf {
        self.data_dir.join("cards")
    }

    fn card_path(&self, id: Uuid) -> PathBuf {
        self.cards_dir().join(format!("{}.json", id))
    }

    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(self.cards_dir())?;
        Ok(())
    }

    // ==================== Marker Operations ====================

    /// All markers in `scope`, oldest first
    pub fn list_markers(&self, scope: &ReviewScope) -> Result<Vec<Marker>> {
        let cards_dir = self.cards_dir();
        if !cards_dir.exists() {
            return Ok(Vec::new());
        }

        let mut markers = Vec::new();
        for entry in fs::read_dir(&cards_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                let content = fs::read_to_string(&path)?;
                let marker: Marker = serde_json::from_str(&content)?;
                if scope.includes(&marker) {
                    markers.push(marker);
                }
            }
        }

        markers.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(markers)
    }

    pub fn get_marker(&self, id: Uuid) -> Result<Marker> {
        let path = self.card_path(id);
        if !path.exists() {
            return Err(StorageError::MarkerNotFound(id));
        }

        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save_marker(&self, marker: &Marker) -> Result<()> {
        self.init()?;
        fs::write(self.card_path(marker.id), serde_json::to_string_pretty(marker)?)?;
        Ok(())
    }

    pub fn delete_marker(&self, id: Uuid) -> Result<()> {
        let path = self.card_path(id);
        if !path.exists() {
            return Err(StorageError::MarkerNotFound(id));
        }
        fs::remove_file(path)?;
        Ok(())
    }

    // ==================== Store Operations ====================

    pub fn load_store(&self, media_id: &str, options: MarkerStoreOptions) -> Result<MarkerStore> {
        let markers = self.list_markers(&ReviewScope::Media(media_id.to_string()))?;
        log::debug!("Loaded {} marker(s) for {}", markers.len(), media_id);
        Ok(MarkerStore::from_markers(media_id, markers, options))
    }

    /// Write every marker in the store and delete files of markers of the
    /// same media item that are no longer in it
    pub fn save_store(&self, store: &MarkerStore) -> Result<()> {
        self.init()?;

        let scope = ReviewScope::Media(store.media_id().to_string());
        for existing in self.list_markers(&scope)? {
            if store.get(existing.id).is_none() {
                log::info!("Deleting removed marker {}", existing.id);
                fs::remove_file(self.card_path(existing.id))?;
            }
        }

        for marker in store.markers() {
            self.save_marker(marker)?;
        }
        Ok(())
    }

    // ==================== Review Operations ====================

    /// Schedule a rating and persist the card's new review state
    pub fn review_marker(&self, id: Uuid, rating: Rating, now: DateTime<Utc>) -> Result<Marker> {
        let mut marker = self.get_marker(id)?;
        let result = self.policy.schedule(&marker.srs, rating, now);
        apply_review(&mut marker.srs, &result, rating, now);
        self.save_marker(&marker)?;

        log::info!(
            "Reviewed {} as {:?}: {:?}, next review {}",
            id,
            rating,
            marker.srs.card_state,
            result.due_date
        );
        Ok(marker)
    }

    pub fn due_markers(
        &self,
        scope: &ReviewScope,
        options: &QueueOptions,
        include_pending: bool,
    ) -> Result<Vec<Marker>> {
        let markers = self.list_markers(scope)?;
        Ok(derive_due_queue(&markers, options, Utc::now(), include_pending))
    }

    pub fn learning_status(&self, scope: &ReviewScope) -> Result<LearningStatus> {
        Ok(learning_status(&self.list_markers(scope)?, Utc::now()))
    }

    pub fn stats(&self, scope: &ReviewScope) -> Result<DeckStats> {
        Ok(deck_stats(
            &self.list_markers(scope)?,
            Utc::now(),
            self.mastered_interval_days,
        ))
    }
}

#[async_trait]
impl ReviewBackend for CardStorage {
    async fn fetch_due_cards(
        &self,
        scope: &ReviewScope,
        options: &QueueOptions,
        include_pending: bool,
    ) -> super::backend::Result<Vec<Marker>> {
        Ok(self.due_markers(scope, options, include_pending)?)
    }

    async fn fetch_learning_status(&self, scope: &ReviewScope) -> super::backend::Result<LearningStatus> {
        Ok(self.learning_status(scope)?)
    }

    async fn submit_review(
        &self,
        scope: &ReviewScope,
        card_id: Uuid,
        rating: Rating,
    ) -> super::backend::Result<Marker> {
        let marker = self.get_marker(card_id)?;
        if !scope.includes(&marker) {
            return Err(ReviewError::CardNotFound(card_id));
        }
        Ok(self.review_marker(card_id, rating, Utc::now())?)
    }

    async fn fetch_stats(&self, scope: &ReviewScope) -> super::backend::Result<DeckStats> {
        Ok(self.stats(scope)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    use crate::markers::{CardState, MarkerSource, Segment};
    use crate::review::session::{ReviewSession, ReviewSessionOptions, SessionState};

    fn create_test_storage() -> (TempDir, CardStorage) {
        let temp_dir = TempDir::new().unwrap();
        let storage = CardStorage::new(temp_dir.path().to_path_buf());
        (temp_dir, storage)
    }

    fn marked(media_id: &str, text: &str) -> Marker {
        let mut marker = Marker::new(media_id.to_string(), 0.0, 2.0, Some(text.to_string()));
        marker.misunderstood_indices.insert(0);
        marker
    }

    #[test]
    fn test_save_and_get_marker() {
        let (_temp, storage) = create_test_storage();
        let mut marker = marked("vid", "bonjour tout le monde");
        marker.vocab_data.insert(
            0,
            crate::markers::VocabEntry {
                definition: "hello".to_string(),
                notes: String::new(),
            },
        );

        storage.save_marker(&marker).unwrap();
        let loaded = storage.get_marker(marker.id).unwrap();
        assert_eq!(loaded.id, marker.id);
        assert_eq!(loaded.vocab_data[&0].definition, "hello");
        assert!(loaded.misunderstood_indices.contains(&0));
    }

    #[test]
    fn test_missing_marker() {
        let (_temp, storage) = create_test_storage();
        let id = Uuid::new_v4();
        assert!(matches!(storage.get_marker(id), Err(StorageError::MarkerNotFound(_))));
        assert!(matches!(storage.delete_marker(id), Err(StorageError::MarkerNotFound(_))));
        assert!(storage.list_markers(&ReviewScope::All).unwrap().is_empty());
    }

    #[test]
    fn test_list_by_scope() {
        let (_temp, storage) = create_test_storage();
        storage.save_marker(&marked("a", "one")).unwrap();
        storage.save_marker(&marked("a", "two")).unwrap();
        storage.save_marker(&marked("b", "three")).unwrap();

        assert_eq!(storage.list_markers(&ReviewScope::All).unwrap().len(), 3);
        assert_eq!(
            storage
                .list_markers(&ReviewScope::Media("a".to_string()))
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn test_store_round_trip_deletes_removed() {
        let (_temp, storage) = create_test_storage();
        let segments = vec![
            Segment::new(0.0, 2.0, "first line"),
            Segment::new(2.0, 4.0, "second line"),
        ];

        let mut store = storage.load_store("vid", MarkerStoreOptions::default()).unwrap();
        let first = store.add_marker(Some(1.0), &segments, MarkerSource::Loop).unwrap().marker_id();
        let second = store.add_marker(Some(3.0), &segments, MarkerSource::Loop).unwrap().marker_id();
        store.toggle_word(first, 1);
        storage.save_store(&store).unwrap();
        storage.save_marker(&marked("other", "untouched")).unwrap();

        let mut reloaded = storage.load_store("vid", MarkerStoreOptions::default()).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.get(first).unwrap().misunderstood_indices.contains(&1));

        reloaded.remove_marker(second);
        storage.save_store(&reloaded).unwrap();

        assert!(matches!(storage.get_marker(second), Err(StorageError::MarkerNotFound(_))));
        assert_eq!(storage.list_markers(&ReviewScope::All).unwrap().len(), 2);
    }

    #[test]
    fn test_review_marker_persists_state() {
        let (_temp, storage) = create_test_storage();
        let marker = marked("vid", "hola");
        storage.save_marker(&marker).unwrap();

        let reviewed = storage.review_marker(marker.id, Rating::Easy, Utc::now()).unwrap();
        assert_eq!(reviewed.srs.card_state, CardState::Review);

        let loaded = storage.get_marker(marker.id).unwrap();
        assert_eq!(loaded.srs.card_state, CardState::Review);
        assert_eq!(loaded.srs.review_count, 1);
        assert!(loaded.srs.next_review_date.is_some());
    }

    #[test]
    fn test_due_and_stats() {
        let (_temp, storage) = create_test_storage();
        let due = marked("vid", "one");
        let unmarked = Marker::new("vid".to_string(), 0.0, 1.0, Some("two".to_string()));
        storage.save_marker(&due).unwrap();
        storage.save_marker(&unmarked).unwrap();

        let queue = storage
            .due_markers(&ReviewScope::All, &QueueOptions::default(), false)
            .unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, due.id);

        storage.review_marker(due.id, Rating::Good, Utc::now()).unwrap();
        let status = storage.learning_status(&ReviewScope::All).unwrap();
        assert_eq!(status.pending_count, 1);
        assert_eq!(status.next_due_in, Some(600));

        let stats = storage.stats(&ReviewScope::All).unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.learning, 1);
    }

    #[tokio::test]
    async fn test_submit_outside_scope() {
        let (_temp, storage) = create_test_storage();
        let marker = marked("a", "one");
        storage.save_marker(&marker).unwrap();

        let result = storage
            .submit_review(&ReviewScope::Media("b".to_string()), marker.id, Rating::Good)
            .await;
        assert!(matches!(result, Err(ReviewError::CardNotFound(_))));
    }

    #[tokio::test]
    async fn test_session_over_storage() {
        let (_temp, storage) = create_test_storage();
        let a = marked("vid", "one");
        let b = marked("vid", "two");
        storage.save_marker(&a).unwrap();
        storage.save_marker(&b).unwrap();

        let storage = Arc::new(storage);
        let mut session = ReviewSession::new(
            storage.clone(),
            ReviewScope::Media("vid".to_string()),
            ReviewSessionOptions::default(),
        );
        session.start().await.unwrap();

        while let Some(card) = session.current_card().map(|c| c.id) {
            session.submit_review(card, Rating::Easy).await.unwrap();
        }

        assert_eq!(session.state(), SessionState::Complete);
        assert_eq!(session.stats().easy, 2);
        let stats = storage.stats(&ReviewScope::All).unwrap();
        assert_eq!(stats.review, 2);
        session.teardown();
    }
}
