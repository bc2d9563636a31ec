//! Review session facade
//!
//! Drives one review session over a [`ReviewBackend`]:
//! - derives the due queue and walks it card by card
//! - counts ratings for this session only
//! - when the queue runs dry but learning cards are still waiting, enters a
//!   waiting state with a live countdown and re-derives the queue when it
//!   reaches zero
//!
//! The countdown runs as a tokio task that reports through a channel; the
//! session applies its events in [`ReviewSession::next_event`]. Every
//! countdown start, refresh and teardown bumps a generation counter, and
//! events or backend responses from an older generation are dropped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use super::backend::{Result, ReviewBackend, ReviewError};
use super::models::{DeckStats, LearningStatus, QueueOptions, Rating, ReviewScope, SessionStats};
use crate::markers::Marker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No queue loaded: not started yet, or the check for pending
    /// learning cards failed. Call `refresh` to continue.
    Idle,
    Reviewing,
    /// Queue empty, learning cards pending
    Waiting(LearningStatus),
    /// Queue empty, nothing pending
    Complete,
    Closed,
}

/// Countdown progress reported by the timer task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Tick { generation: u64, remaining: u64 },
    Elapsed { generation: u64 },
}

impl SessionEvent {
    fn generation(&self) -> u64 {
        match self {
            Self::Tick { generation, .. } => *generation,
            Self::Elapsed { generation } => *generation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewSessionOptions {
    pub queue: QueueOptions,
    pub countdown_tick: Duration,
}

impl Default for ReviewSessionOptions {
    fn default() -> Self {
        Self {
            queue: QueueOptions::default(),
            countdown_tick: Duration::from_secs(1),
        }
    }
}

/// Cloneable handle that can close a session from elsewhere, e.g. when the
/// review view is unmounted while a request is in flight.
#[derive(Clone)]
pub struct SessionHandle {
    generation: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

impl SessionHandle {
    pub fn cancel(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub struct ReviewSession {
    backend: Arc<dyn ReviewBackend>,
    scope: ReviewScope,
    options: ReviewSessionOptions,
    queue: Vec<Marker>,
    position: usize,
    stats: SessionStats,
    state: SessionState,
    generation: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
    countdown: Option<JoinHandle<()>>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl ReviewSession {
    pub fn new(backend: Arc<dyn ReviewBackend>, scope: ReviewScope, options: ReviewSessionOptions) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            scope,
            options,
            queue: Vec::new(),
            position: 0,
            stats: SessionStats::default(),
            state: SessionState::Idle,
            generation: Arc::new(AtomicU64::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
            countdown: None,
            events_tx,
            events_rx,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            generation: Arc::clone(&self.generation),
            closed: Arc::clone(&self.closed),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn scope(&self) -> &ReviewScope {
        &self.scope
    }

    pub fn current_card(&self) -> Option<&Marker> {
        match self.state {
            SessionState::Reviewing => self.queue.get(self.position),
            _ => None,
        }
    }

    /// (cards done, queue length)
    pub fn progress(&self) -> (usize, usize) {
        (self.position.min(self.queue.len()), self.queue.len())
    }

    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn ensure_open(&mut self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            self.close_locally();
            return Err(ReviewError::SessionClosed);
        }
        Ok(())
    }

    /// A response that arrives after the generation moved on is discarded
    fn ensure_current(&mut self, generation: u64) -> Result<()> {
        self.ensure_open()?;
        if self.current_generation() != generation {
            log::warn!("Discarding stale review response (generation {})", generation);
            return Err(ReviewError::SessionClosed);
        }
        Ok(())
    }

    // ==================== Queue ====================

    /// Load the first queue
    pub async fn start(&mut self) -> Result<()> {
        log::info!("Starting review session for {:?}", self.scope);
        self.refresh(false).await
    }

    /// Re-derive the queue, including not-yet-due learning cards
    pub async fn check_now(&mut self) -> Result<()> {
        self.refresh(true).await
    }

    /// Re-derive the queue from the backend. On failure the current queue
    /// and position are left as they were.
    pub async fn refresh(&mut self, include_pending: bool) -> Result<()> {
        self.ensure_open()?;
        self.stop_countdown();
        let generation = self.current_generation();

        let cards = self
            .backend
            .fetch_due_cards(&self.scope, &self.options.queue, include_pending)
            .await
            .map_err(|e| {
                log::error!("Failed to fetch due cards: {}", e);
                e
            })?;
        self.ensure_current(generation)?;

        self.queue = cards.into_iter().filter(Marker::is_reviewable).collect();
        self.position = 0;
        log::info!("Review queue derived: {} card(s)", self.queue.len());

        if self.queue.is_empty() {
            self.settle().await
        } else {
            self.state = SessionState::Reviewing;
            Ok(())
        }
    }

    /// Queue exhausted: wait on pending learning cards or finish
    async fn settle(&mut self) -> Result<()> {
        let generation = self.current_generation();
        let status = match self.backend.fetch_learning_status(&self.scope).await {
            Ok(status) => status,
            Err(e) => {
                log::error!("Failed to fetch learning status: {}", e);
                if self.current_generation() == generation {
                    self.state = SessionState::Idle;
                }
                return Err(e);
            }
        };
        self.ensure_current(generation)?;

        if status.has_pending() {
            let seconds = status.next_due_in.unwrap_or(1);
            log::info!(
                "{} learning card(s) pending, next due in {}s",
                status.pending_count,
                seconds
            );
            self.state = SessionState::Waiting(LearningStatus {
                pending_count: status.pending_count,
                next_due_in: Some(seconds),
            });
            self.start_countdown(seconds);
        } else {
            log::info!("Review session complete: {} reviewed", self.stats.reviewed);
            self.state = SessionState::Complete;
        }
        Ok(())
    }

    // ==================== Reviews ====================

    /// Rate the current card.
    ///
    /// Returns `Ok(None)` without doing anything when `card_id` is not the
    /// current card. If the backend fails, the session stays on this card
    /// and the error is returned so the rating can be retried. Once the
    /// rating is saved, a failure while checking for pending learning cards
    /// is still reported as an error and leaves the session `Idle`.
    pub async fn submit_review(&mut self, card_id: Uuid, rating: Rating) -> Result<Option<Marker>> {
        self.ensure_open()?;

        match self.current_card() {
            Some(card) if card.id == card_id => {}
            _ => {
                log::warn!("Ignoring rating for {}: not the current card", card_id);
                return Ok(None);
            }
        }

        let generation = self.current_generation();
        let updated = self
            .backend
            .submit_review(&self.scope, card_id, rating)
            .await
            .map_err(|e| {
                log::error!("Failed to submit review for {}: {}", card_id, e);
                e
            })?;
        self.ensure_current(generation)?;

        self.stats.record(rating);
        self.queue[self.position] = updated.clone();
        self.advance().await?;
        Ok(Some(updated))
    }

    /// Move past the current card without rating it
    pub async fn skip(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.current_card().is_none() {
            return Ok(());
        }
        self.advance().await
    }

    async fn advance(&mut self) -> Result<()> {
        self.position += 1;
        if self.position >= self.queue.len() {
            self.settle().await?;
        }
        Ok(())
    }

    pub async fn deck_stats(&self) -> Result<DeckStats> {
        self.backend.fetch_stats(&self.scope).await
    }

    // ==================== Countdown ====================

    fn start_countdown(&mut self, seconds: u64) {
        self.stop_countdown();
        let generation = self.current_generation();
        let shared = Arc::clone(&self.generation);
        let tx = self.events_tx.clone();
        let tick = self.options.countdown_tick;
        let deadline = Instant::now() + Duration::from_secs(seconds);

        self.countdown = Some(tokio::spawn(async move {
            let mut reported = seconds;
            loop {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    break;
                }
                tokio::time::sleep(tick.min(left)).await;
                if shared.load(Ordering::SeqCst) != generation {
                    return;
                }

                // Whole seconds left, rounded up; only report changes
                let left = deadline.saturating_duration_since(Instant::now());
                let remaining = (left.as_millis() as u64).div_ceil(1000);
                if remaining > 0 && remaining != reported {
                    reported = remaining;
                    if tx.send(SessionEvent::Tick { generation, remaining }).is_err() {
                        return;
                    }
                }
            }
            let _ = tx.send(SessionEvent::Elapsed { generation });
        }));
    }

    /// Abort the timer task and invalidate anything it already queued
    fn stop_countdown(&mut self) {
        if let Some(handle) = self.countdown.take() {
            handle.abort();
        }
        self.bump_generation();
    }

    /// Wait for the next countdown event and apply it.
    ///
    /// Returns `None` right away unless the session is waiting on learning
    /// cards. Stale events are returned but have no effect.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        if !matches!(self.state, SessionState::Waiting(_)) {
            return None;
        }
        let event = self.events_rx.recv().await?;
        if let Err(e) = self.handle_event(event).await {
            log::error!("Countdown refresh failed: {}", e);
        }
        Some(event)
    }

    async fn handle_event(&mut self, event: SessionEvent) -> Result<()> {
        if event.generation() != self.current_generation() || self.closed.load(Ordering::SeqCst) {
            log::debug!("Dropping stale countdown event {:?}", event);
            return Ok(());
        }

        let SessionState::Waiting(status) = self.state else {
            return Ok(());
        };

        match event {
            SessionEvent::Tick { remaining, .. } => {
                self.state = SessionState::Waiting(LearningStatus {
                    next_due_in: Some(remaining),
                    ..status
                });
                Ok(())
            }
            SessionEvent::Elapsed { .. } => {
                log::info!("Learning cards due, re-deriving queue");
                self.countdown = None;
                self.refresh(false).await
            }
        }
    }

    // ==================== Teardown ====================

    fn close_locally(&mut self) {
        if let Some(handle) = self.countdown.take() {
            handle.abort();
        }
        self.queue.clear();
        self.position = 0;
        self.state = SessionState::Closed;
    }

    /// Close the session: cancel the countdown and ignore any response
    /// still in flight
    pub fn teardown(&mut self) {
        self.handle().cancel();
        self.close_locally();
        log::info!("Review session closed after {} review(s)", self.stats.reviewed);
    }
}

impl Drop for ReviewSession {
    fn drop(&mut self) {
        if let Some(handle) = self.countdown.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::markers::CardState;

    #[derive(Default)]
    struct FakeBackend {
        cards: Mutex<HashMap<Uuid, Marker>>,
        due_script: Mutex<VecDeque<Vec<Uuid>>>,
        pending: Mutex<LearningStatus>,
        due_calls: AtomicUsize,
        last_include_pending: AtomicBool,
        fail_submit: AtomicBool,
        fail_status: AtomicBool,
        delay: Mutex<Duration>,
    }

    impl FakeBackend {
        fn add_card(&self, marked: bool) -> Uuid {
            let mut card = Marker::new("vid".to_string(), 0.0, 2.0, Some("one two three".to_string()));
            if marked {
                card.misunderstood_indices.insert(1);
            }
            let id = card.id;
            self.cards.lock().unwrap().insert(id, card);
            id
        }

        fn script(&self, ids: Vec<Uuid>) {
            self.due_script.lock().unwrap().push_back(ids);
        }

        fn set_pending(&self, pending_count: usize, next_due_in: Option<u64>) {
            *self.pending.lock().unwrap() = LearningStatus {
                pending_count,
                next_due_in,
            };
        }

        fn due_calls(&self) -> usize {
            self.due_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReviewBackend for FakeBackend {
        async fn fetch_due_cards(
            &self,
            _scope: &ReviewScope,
            _options: &QueueOptions,
            include_pending: bool,
        ) -> Result<Vec<Marker>> {
            let delay = *self.delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.due_calls.fetch_add(1, Ordering::SeqCst);
            self.last_include_pending.store(include_pending, Ordering::SeqCst);

            let ids = self.due_script.lock().unwrap().pop_front().unwrap_or_default();
            let cards = self.cards.lock().unwrap();
            Ok(ids.iter().filter_map(|id| cards.get(id).cloned()).collect())
        }

        async fn fetch_learning_status(&self, _scope: &ReviewScope) -> Result<LearningStatus> {
            if self.fail_status.load(Ordering::SeqCst) {
                return Err(ReviewError::Unavailable("offline".to_string()));
            }
            Ok(*self.pending.lock().unwrap())
        }

        async fn submit_review(&self, _scope: &ReviewScope, card_id: Uuid, _rating: Rating) -> Result<Marker> {
            if self.fail_submit.load(Ordering::SeqCst) {
                return Err(ReviewError::Unavailable("offline".to_string()));
            }
            let mut cards = self.cards.lock().unwrap();
            let card = cards.get_mut(&card_id).ok_or(ReviewError::CardNotFound(card_id))?;
            card.srs.card_state = CardState::Review;
            card.srs.review_count += 1;
            Ok(card.clone())
        }

        async fn fetch_stats(&self, _scope: &ReviewScope) -> Result<DeckStats> {
            Ok(DeckStats::default())
        }
    }

    fn session(backend: &Arc<FakeBackend>) -> ReviewSession {
        ReviewSession::new(backend.clone(), ReviewScope::All, ReviewSessionOptions::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_walks_queue_to_completion() {
        let backend = Arc::new(FakeBackend::default());
        let a = backend.add_card(true);
        let b = backend.add_card(true);
        backend.script(vec![a, b]);

        let mut session = session(&backend);
        session.start().await.unwrap();
        assert_eq!(session.state(), SessionState::Reviewing);
        assert_eq!(session.current_card().unwrap().id, a);

        let updated = session.submit_review(a, Rating::Good).await.unwrap().unwrap();
        assert_eq!(updated.srs.card_state, CardState::Review);
        assert_eq!(session.current_card().unwrap().id, b);

        session.submit_review(b, Rating::Again).await.unwrap();
        assert_eq!(session.state(), SessionState::Complete);
        assert_eq!(session.stats().reviewed, 2);
        assert_eq!(session.stats().good, 1);
        assert_eq!(session.stats().again, 1);
        assert_eq!(session.progress(), (2, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmarked_cards_are_dropped() {
        let backend = Arc::new(FakeBackend::default());
        let unmarked = backend.add_card(false);
        let marked = backend.add_card(true);
        backend.script(vec![unmarked, marked]);

        let mut session = session(&backend);
        session.start().await.unwrap();
        assert_eq!(session.progress(), (0, 1));
        assert_eq!(session.current_card().unwrap().id, marked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_submit_does_not_advance() {
        let backend = Arc::new(FakeBackend::default());
        let a = backend.add_card(true);
        backend.script(vec![a]);

        let mut session = session(&backend);
        session.start().await.unwrap();

        backend.fail_submit.store(true, Ordering::SeqCst);
        assert!(session.submit_review(a, Rating::Good).await.is_err());
        assert_eq!(session.current_card().unwrap().id, a);
        assert_eq!(session.stats().reviewed, 0);

        backend.fail_submit.store(false, Ordering::SeqCst);
        session.submit_review(a, Rating::Good).await.unwrap();
        assert_eq!(session.state(), SessionState::Complete);
        assert_eq!(session.stats().reviewed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rating_other_card_is_noop() {
        let backend = Arc::new(FakeBackend::default());
        let a = backend.add_card(true);
        let b = backend.add_card(true);
        backend.script(vec![a, b]);

        let mut session = session(&backend);
        session.start().await.unwrap();

        assert!(session.submit_review(b, Rating::Easy).await.unwrap().is_none());
        assert_eq!(session.current_card().unwrap().id, a);
        assert_eq!(session.stats().reviewed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_advances_without_stats() {
        let backend = Arc::new(FakeBackend::default());
        let a = backend.add_card(true);
        backend.script(vec![a]);

        let mut session = session(&backend);
        session.start().await.unwrap();
        session.skip().await.unwrap();
        assert_eq!(session.state(), SessionState::Complete);
        assert_eq!(session.stats().reviewed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_countdown_rederives_once() {
        let backend = Arc::new(FakeBackend::default());
        let a = backend.add_card(true);
        backend.script(vec![]);
        backend.script(vec![a]);
        backend.set_pending(3, Some(5));

        let mut session = session(&backend);
        session.start().await.unwrap();
        assert_eq!(
            session.state(),
            SessionState::Waiting(LearningStatus {
                pending_count: 3,
                next_due_in: Some(5)
            })
        );

        let mut remaining = Vec::new();
        while let Some(event) = session.next_event().await {
            if let SessionEvent::Tick { remaining: r, .. } = event {
                remaining.push(r);
                assert_eq!(
                    session.state(),
                    SessionState::Waiting(LearningStatus {
                        pending_count: 3,
                        next_due_in: Some(r)
                    })
                );
            }
        }

        assert_eq!(remaining, vec![4, 3, 2, 1]);
        assert_eq!(session.state(), SessionState::Reviewing);
        assert_eq!(session.current_card().unwrap().id, a);
        assert_eq!(backend.due_calls(), 2);

        // Nothing left that could fire again
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.due_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_ticks_wait_until_cards_are_due() {
        let backend = Arc::new(FakeBackend::default());
        let a = backend.add_card(true);
        backend.script(vec![]);
        backend.script(vec![a]);
        backend.set_pending(3, Some(5));

        let options = ReviewSessionOptions {
            countdown_tick: Duration::from_millis(250),
            ..ReviewSessionOptions::default()
        };
        let mut session = ReviewSession::new(backend.clone(), ReviewScope::All, options);
        let started = tokio::time::Instant::now();
        session.start().await.unwrap();

        let mut remaining = Vec::new();
        let mut elapsed_at = None;
        while let Some(event) = session.next_event().await {
            match event {
                SessionEvent::Tick { remaining: r, .. } => remaining.push(r),
                SessionEvent::Elapsed { .. } => elapsed_at = Some(started.elapsed()),
            }
        }

        assert_eq!(remaining, vec![4, 3, 2, 1]);
        assert!(elapsed_at.unwrap() >= Duration::from_secs(5));
        assert_eq!(session.state(), SessionState::Reviewing);
        assert_eq!(backend.due_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_status_check_leaves_session_idle() {
        let backend = Arc::new(FakeBackend::default());
        let a = backend.add_card(true);
        backend.script(vec![a]);

        let mut session = session(&backend);
        session.start().await.unwrap();

        backend.fail_status.store(true, Ordering::SeqCst);
        assert!(session.submit_review(a, Rating::Good).await.is_err());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.current_card().is_none());
        // The rating itself was saved
        assert_eq!(session.stats().reviewed, 1);

        backend.fail_status.store(false, Ordering::SeqCst);
        session.refresh(false).await.unwrap();
        assert_eq!(session.state(), SessionState::Complete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_countdowns_fire_once() {
        let backend = Arc::new(FakeBackend::default());
        let a = backend.add_card(true);
        backend.script(vec![]);
        backend.script(vec![]);
        backend.script(vec![a]);
        backend.set_pending(1, Some(3));

        let mut session = session(&backend);
        session.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        // Second refresh while the first countdown is running
        session.refresh(false).await.unwrap();
        assert!(matches!(session.state(), SessionState::Waiting(_)));

        while session.next_event().await.is_some() {}

        assert_eq!(session.state(), SessionState::Reviewing);
        assert_eq!(backend.due_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_now_includes_pending() {
        let backend = Arc::new(FakeBackend::default());
        let a = backend.add_card(true);
        backend.script(vec![]);
        backend.script(vec![a]);
        backend.set_pending(1, Some(600));

        let mut session = session(&backend);
        session.start().await.unwrap();
        assert!(!backend.last_include_pending.load(Ordering::SeqCst));

        session.check_now().await.unwrap();
        assert!(backend.last_include_pending.load(Ordering::SeqCst));
        assert_eq!(session.state(), SessionState::Reviewing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_without_pending() {
        let backend = Arc::new(FakeBackend::default());
        let mut session = session(&backend);
        session.start().await.unwrap();
        assert_eq!(session.state(), SessionState::Complete);
        assert!(session.next_event().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_discards_everything() {
        let backend = Arc::new(FakeBackend::default());
        let a = backend.add_card(true);
        backend.script(vec![]);
        backend.script(vec![a]);
        backend.set_pending(2, Some(2));

        let mut session = session(&backend);
        session.start().await.unwrap();
        session.teardown();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(backend.due_calls(), 1);
        assert!(matches!(session.start().await, Err(ReviewError::SessionClosed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_after_cancel_is_ignored() {
        let backend = Arc::new(FakeBackend::default());
        let a = backend.add_card(true);
        backend.script(vec![a]);
        *backend.delay.lock().unwrap() = Duration::from_millis(100);

        let mut session = session(&backend);
        let handle = session.handle();

        let (result, _) = tokio::join!(session.start(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.cancel();
        });

        assert!(matches!(result, Err(ReviewError::SessionClosed)));
        assert_eq!(backend.due_calls(), 1);
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.current_card().is_none());
    }
}
