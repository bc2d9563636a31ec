//! Loop synchronization engine
//!
//! Keeps a continuously playing media source inside a marker's bounds
//! (loop mode) or stops it at the end of a one-off audition (one-shot mode).
//! A single tokio task polls the source; every start/stop bumps a
//! generation counter and aborts the previous task, so a poller left over
//! from an earlier target can never issue commands.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use super::source::{PlaybackError, PlaybackSource, Result};
use crate::markers::Marker;

const MIN_RATE: f64 = 0.25;
const MAX_RATE: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub start: f64,
    pub end: f64,
}

/// What the engine is currently holding playback to. Loop and one-shot
/// are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackTarget {
    Loop { marker_id: Uuid, bounds: Bounds },
    OneShot(Bounds),
}

impl PlaybackTarget {
    pub fn bounds(&self) -> Bounds {
        match self {
            Self::Loop { bounds, .. } => *bounds,
            Self::OneShot(bounds) => *bounds,
        }
    }
}

/// Correction decided for one poll tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoopAction {
    Continue,
    SeekTo(f64),
    /// One-shot reached its end: pause and clear
    Stop,
}

/// Decide what to do with the player at `position`.
///
/// In loop mode, a small backward scrub (within `exit_tolerance` of the
/// start) is left alone.
pub fn evaluate(target: &PlaybackTarget, position: f64, exit_tolerance: f64) -> LoopAction {
    match target {
        PlaybackTarget::OneShot(bounds) => {
            if position >= bounds.end {
                LoopAction::Stop
            } else {
                LoopAction::Continue
            }
        }
        PlaybackTarget::Loop { bounds, .. } => {
            if position >= bounds.end || position < bounds.start - exit_tolerance {
                LoopAction::SeekTo(bounds.start)
            } else {
                LoopAction::Continue
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopEngineOptions {
    pub poll_interval: Duration,
    pub loop_exit_tolerance: f64,
}

impl Default for LoopEngineOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            loop_exit_tolerance: 1.0,
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    target: Option<PlaybackTarget>,
    generation: u64,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Decrements the live poller count when a poll task ends or is aborted
struct PollerGuard(Arc<AtomicUsize>);

impl PollerGuard {
    fn new(count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(count)
    }
}

impl Drop for PollerGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct LoopEngine {
    source: Arc<dyn PlaybackSource>,
    shared: Arc<Mutex<Shared>>,
    poller: Option<JoinHandle<()>>,
    live_pollers: Arc<AtomicUsize>,
    options: LoopEngineOptions,
}

impl LoopEngine {
    pub fn new(source: Arc<dyn PlaybackSource>, options: LoopEngineOptions) -> Self {
        Self {
            source,
            shared: Arc::new(Mutex::new(Shared::default())),
            poller: None,
            live_pollers: Arc::new(AtomicUsize::new(0)),
            options,
        }
    }

    pub fn active_target(&self) -> Option<PlaybackTarget> {
        lock(&self.shared).target
    }

    /// Number of poll tasks still running; never more than one
    pub fn live_pollers(&self) -> usize {
        self.live_pollers.load(Ordering::SeqCst)
    }

    /// Repeat `marker`'s segment until stopped
    pub async fn play_loop(&mut self, marker: &Marker) -> Result<()> {
        let bounds = Bounds {
            start: marker.start,
            end: marker.end,
        };
        log::info!("Looping marker {} ({:.2}-{:.2})", marker.id, bounds.start, bounds.end);
        self.start_target(PlaybackTarget::Loop {
            marker_id: marker.id,
            bounds,
        })
        .await
    }

    /// Play `start..end` once, pausing at the end
    pub async fn play_one_shot(&mut self, start: f64, end: f64) -> Result<()> {
        log::debug!("One-shot playback {:.2}-{:.2}", start, end);
        self.start_target(PlaybackTarget::OneShot(Bounds { start, end })).await
    }

    async fn start_target(&mut self, target: PlaybackTarget) -> Result<()> {
        let generation = self.replace_target(Some(target));

        let start = target.bounds().start;
        let started = match self.source.seek_to(start).await {
            Ok(()) => self.source.play().await,
            Err(e) => Err(e),
        };
        if let Err(e) = started {
            log::warn!("Could not start playback at {:.2}: {}", start, e);
            if lock(&self.shared).generation == generation {
                self.replace_target(None);
            }
            return Err(e);
        }

        // A newer start may have superseded this one while we awaited
        if lock(&self.shared).generation == generation {
            self.spawn_poller(generation);
        }
        Ok(())
    }

    /// Clear the loop, leaving the playback position where it is.
    /// An active one-shot is left alone.
    pub fn stop_loop(&mut self) {
        let is_loop = matches!(self.active_target(), Some(PlaybackTarget::Loop { .. }));
        if is_loop {
            log::info!("Loop stopped");
            self.replace_target(None);
        }
    }

    /// Clear any loop or one-shot
    pub fn stop(&mut self) {
        self.replace_target(None);
    }

    /// Playback was paused by the user; stop polling but keep the target
    pub fn on_playback_paused(&mut self) {
        let mut shared = lock(&self.shared);
        shared.generation += 1;
        drop(shared);
        self.abort_poller();
    }

    /// Playback resumed; restart polling if a target is still set
    pub fn on_playback_resumed(&mut self) {
        let generation = {
            let mut shared = lock(&self.shared);
            if shared.target.is_none() {
                return;
            }
            shared.generation += 1;
            shared.generation
        };
        self.abort_poller();
        self.spawn_poller(generation);
    }

    pub async fn set_rate(&self, multiplier: f64) -> Result<()> {
        if !(MIN_RATE..=MAX_RATE).contains(&multiplier) {
            return Err(PlaybackError::InvalidRate(multiplier));
        }
        self.source.set_rate(multiplier).await
    }

    /// Tear down: clear the target and cancel the poller
    pub fn shutdown(&mut self) {
        self.replace_target(None);
    }

    fn replace_target(&mut self, target: Option<PlaybackTarget>) -> u64 {
        let generation = {
            let mut shared = lock(&self.shared);
            shared.target = target;
            shared.generation += 1;
            shared.generation
        };
        self.abort_poller();
        generation
    }

    fn abort_poller(&mut self) {
        if let Some(handle) = self.poller.take() {
            handle.abort();
        }
    }

    fn spawn_poller(&mut self, generation: u64) {
        self.abort_poller();

        let source = Arc::clone(&self.source);
        let shared = Arc::clone(&self.shared);
        let guard = PollerGuard::new(Arc::clone(&self.live_pollers));
        let options = self.options;

        self.poller = Some(tokio::spawn(async move {
            let _guard = guard;
            poll_loop(source, shared, generation, options).await;
        }));
    }
}

impl Drop for LoopEngine {
    fn drop(&mut self) {
        self.abort_poller();
    }
}

/// Target for `generation`, or `None` once superseded or cleared
fn current_target(shared: &Mutex<Shared>, generation: u64) -> Option<PlaybackTarget> {
    let shared = lock(shared);
    if shared.generation != generation {
        return None;
    }
    shared.target
}

async fn poll_loop(
    source: Arc<dyn PlaybackSource>,
    shared: Arc<Mutex<Shared>>,
    generation: u64,
    options: LoopEngineOptions,
) {
    let mut ticker = tokio::time::interval(options.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        if current_target(&shared, generation).is_none() {
            log::debug!("Poller {} superseded, exiting", generation);
            return;
        }

        match source.is_playing().await {
            Ok(true) => {}
            Ok(false) => {
                log::debug!("Playback paused, poller {} exiting", generation);
                return;
            }
            Err(e) => {
                log::warn!("Could not read play state: {}", e);
                continue;
            }
        }

        let position = match source.get_current_time().await {
            Ok(position) => position,
            Err(e) => {
                log::warn!("Could not read playback position: {}", e);
                continue;
            }
        };

        // Re-check after the await so a stale reading is discarded
        let Some(target) = current_target(&shared, generation) else {
            return;
        };

        match evaluate(&target, position, options.loop_exit_tolerance) {
            LoopAction::Continue => {}
            LoopAction::SeekTo(start) => {
                log::debug!("Position {:.2} outside loop, seeking to {:.2}", position, start);
                if let Err(e) = source.seek_to(start).await {
                    log::warn!("Loop seek failed: {}", e);
                }
            }
            LoopAction::Stop => {
                {
                    let mut shared = lock(&shared);
                    if shared.generation != generation {
                        return;
                    }
                    shared.target = None;
                    shared.generation += 1;
                }
                log::debug!("One-shot reached {:.2}, pausing", position);
                if let Err(e) = source.pause().await {
                    log::warn!("One-shot pause failed: {}", e);
                }
                return;
            }
        }
    }
}
