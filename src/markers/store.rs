//! Marker store for the active media item
//!
//! All mutations follow "transform if found, else leave unchanged": an
//! unknown marker id is a silent no-op, never an error. Mutating methods
//! return whether the marker was found so callers can log stale ids.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::grouping::{anchor_of, group_indices, ConceptualGroup};
use super::models::{Marker, MarkerSource, VocabEntry, VocabField};
use super::segments::{resolve_segment, ResolveOptions, Segment};
use crate::playback::PlaybackSource;

#[derive(Error, Debug)]
pub enum MarkerError {
    #[error("No playback position available: {0}")]
    NoPlaybackPosition(String),

    #[error("Invalid segment bounds: start {start}, end {end}")]
    InvalidBounds { start: f64, end: f64 },
}

pub type Result<T> = std::result::Result<T, MarkerError>;

/// Tolerances used when creating markers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerStoreOptions {
    /// Max boundary difference (start and end) for a re-mark to merge
    pub merge_tolerance: f64,
    pub resolve: ResolveOptions,
}

impl Default for MarkerStoreOptions {
    fn default() -> Self {
        Self {
            merge_tolerance: 0.1,
            resolve: ResolveOptions::default(),
        }
    }
}

/// Result of marking the current moment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Created(Uuid),
    /// Same segment as the most recent marker; its press count was bumped
    Merged { id: Uuid, press_count: u32 },
}

impl AddOutcome {
    pub fn marker_id(&self) -> Uuid {
        match self {
            Self::Created(id) => *id,
            Self::Merged { id, .. } => *id,
        }
    }
}

/// A conceptual group with its display text and annotation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupView {
    #[serde(flatten)]
    pub group: ConceptualGroup,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocab: Option<VocabEntry>,
}

pub struct MarkerStore {
    media_id: String,
    /// Creation order; the merge check only looks at the tail
    markers: Vec<Marker>,
    options: MarkerStoreOptions,
}

impl MarkerStore {
    pub fn new(media_id: impl Into<String>, options: MarkerStoreOptions) -> Self {
        Self {
            media_id: media_id.into(),
            markers: Vec::new(),
            options,
        }
    }

    /// Rebuild a store from persisted markers, oldest first
    pub fn from_markers(
        media_id: impl Into<String>,
        mut markers: Vec<Marker>,
        options: MarkerStoreOptions,
    ) -> Self {
        markers.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Self {
            media_id: media_id.into(),
            markers,
            options,
        }
    }

    pub fn media_id(&self) -> &str {
        &self.media_id
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn get(&self, id: Uuid) -> Option<&Marker> {
        self.markers.iter().find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    fn update<F>(&mut self, id: Uuid, f: F) -> bool
    where
        F: FnOnce(&mut Marker),
    {
        match self.markers.iter_mut().find(|m| m.id == id) {
            Some(marker) => {
                f(marker);
                true
            }
            None => {
                log::debug!("Marker {} not found, ignoring update", id);
                false
            }
        }
    }

    // ==================== Creation ====================

    /// Mark the moment at `current_time`.
    ///
    /// `None` means no player was available; the operation is abandoned.
    /// Re-marking the segment of the most recent marker increments its
    /// press count instead of appending a duplicate.
    pub fn add_marker(
        &mut self,
        current_time: Option<f64>,
        segments: &[Segment],
        source: MarkerSource,
    ) -> Result<AddOutcome> {
        let t = match current_time {
            Some(t) if t.is_finite() => t,
            Some(t) => {
                log::warn!("Abandoning marker: invalid playback position {}", t);
                return Err(MarkerError::NoPlaybackPosition(format!("non-finite position {}", t)));
            }
            None => {
                log::warn!("Abandoning marker: no playback source for {}", self.media_id);
                return Err(MarkerError::NoPlaybackPosition("no player".to_string()));
            }
        };

        let resolved = resolve_segment(segments, t, &self.options.resolve);
        if !(resolved.end > resolved.start) {
            log::warn!(
                "Abandoning marker: empty bounds {:.2}-{:.2} at {:.2}s",
                resolved.start,
                resolved.end,
                t
            );
            return Err(MarkerError::InvalidBounds {
                start: resolved.start,
                end: resolved.end,
            });
        }
        let tolerance = self.options.merge_tolerance;

        if let Some(last) = self.markers.last_mut() {
            if (last.start - resolved.start).abs() <= tolerance
                && (last.end - resolved.end).abs() <= tolerance
            {
                last.press_count += 1;
                log::info!(
                    "Re-marked segment {:.2}-{:.2} (press count {})",
                    last.start,
                    last.end,
                    last.press_count
                );
                return Ok(AddOutcome::Merged {
                    id: last.id,
                    press_count: last.press_count,
                });
            }
        }

        if resolved.is_fallback() {
            log::debug!("No segment near {:.2}s, using time window", t);
        }

        let mut marker = Marker::new(self.media_id.clone(), resolved.start, resolved.end, resolved.text);
        marker.source = source;
        let id = marker.id;
        self.markers.push(marker);

        log::info!("Created marker {} at {:.2}-{:.2}", id, resolved.start, resolved.end);
        Ok(AddOutcome::Created(id))
    }

    /// Poll the player for its position, then [`add_marker`](Self::add_marker)
    pub async fn add_marker_from_source(
        &mut self,
        source: &dyn PlaybackSource,
        segments: &[Segment],
        marker_source: MarkerSource,
    ) -> Result<AddOutcome> {
        let current_time = match source.get_current_time().await {
            Ok(t) => Some(t),
            Err(e) => {
                log::warn!("Could not read playback position: {}", e);
                None
            }
        };
        self.add_marker(current_time, segments, marker_source)
    }

    /// Create a marker from a word or phrase selected in a text view.
    /// The inclusive range `a..=b` is marked up front.
    pub fn add_selection_marker(
        &mut self,
        segment: &Segment,
        a: usize,
        b: usize,
        source: MarkerSource,
    ) -> Result<Uuid> {
        if !(segment.end > segment.start) {
            return Err(MarkerError::InvalidBounds {
                start: segment.start,
                end: segment.end,
            });
        }

        let mut marker = Marker::new(
            self.media_id.clone(),
            segment.start,
            segment.end,
            Some(segment.text.clone()),
        );
        marker.source = source;

        let token_count = marker.tokens().len();
        let (lo, hi) = (a.min(b), a.max(b));
        marker
            .misunderstood_indices
            .extend((lo..=hi).filter(|&i| i < token_count));

        let id = marker.id;
        self.markers.push(marker);
        Ok(id)
    }

    pub fn remove_marker(&mut self, id: Uuid) -> bool {
        let before = self.markers.len();
        self.markers.retain(|m| m.id != id);
        before != self.markers.len()
    }

    // ==================== Word Marking ====================

    /// Flip membership of a single word index
    pub fn toggle_word(&mut self, id: Uuid, index: usize) -> bool {
        self.update(id, |marker| {
            if index >= marker.tokens().len() {
                log::debug!("Index {} out of range for marker {}", index, marker.id);
                return;
            }
            if !marker.misunderstood_indices.remove(&index) {
                marker.misunderstood_indices.insert(index);
            }
            reconcile_vocab(marker);
        })
    }

    /// Toggle the inclusive range between `a` and `b` as a unit: if every
    /// index is already marked the range is cleared, otherwise all of it
    /// is marked.
    pub fn toggle_range(&mut self, id: Uuid, a: usize, b: usize) -> bool {
        self.update(id, |marker| {
            let token_count = marker.tokens().len();
            let (lo, hi) = (a.min(b), a.max(b));
            if hi >= token_count {
                log::debug!("Range {}-{} out of range for marker {}", lo, hi, marker.id);
                return;
            }

            let all_marked = (lo..=hi).all(|i| marker.misunderstood_indices.contains(&i));
            if all_marked {
                for i in lo..=hi {
                    marker.misunderstood_indices.remove(&i);
                }
            } else {
                marker.misunderstood_indices.extend(lo..=hi);
            }
            reconcile_vocab(marker);
        })
    }

    /// Unmark every index whose token is exactly `word`, across all markers.
    /// Returns the number of indices removed.
    pub fn remove_word_by_text(&mut self, word: &str) -> usize {
        let mut removed = 0;
        for marker in &mut self.markers {
            let matching: Vec<usize> = {
                let tokens = marker.tokens();
                marker
                    .misunderstood_indices
                    .iter()
                    .copied()
                    .filter(|&i| tokens.get(i) == Some(&word))
                    .collect()
            };
            if matching.is_empty() {
                continue;
            }
            for i in &matching {
                marker.misunderstood_indices.remove(i);
            }
            reconcile_vocab(marker);
            removed += matching.len();
        }
        removed
    }

    // ==================== Tags & Notes ====================

    pub fn add_tag(&mut self, id: Uuid, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() {
            return false;
        }
        self.update(id, |marker| {
            marker.tags.insert(tag.to_string());
        })
    }

    pub fn remove_tag(&mut self, id: Uuid, tag: &str) -> bool {
        self.update(id, |marker| {
            marker.tags.remove(tag.trim());
        })
    }

    pub fn set_note(&mut self, id: Uuid, note: impl Into<String>) -> bool {
        let note = note.into();
        self.update(id, |marker| marker.note = note)
    }

    // ==================== Vocabulary ====================

    /// Upsert one field of the vocabulary entry for the group containing
    /// `anchor_index`, keeping the other field. Unmarked indices are ignored.
    pub fn update_vocab_data(
        &mut self,
        id: Uuid,
        anchor_index: usize,
        field: VocabField,
        value: impl Into<String>,
    ) -> bool {
        let value = value.into();
        self.update(id, |marker| {
            let groups = group_indices(marker.misunderstood_indices.iter().copied());
            let Some(anchor) = anchor_of(&groups, anchor_index) else {
                log::debug!("Index {} is not marked on {}, skipping vocab edit", anchor_index, marker.id);
                return;
            };

            let entry = marker.vocab_data.entry(anchor).or_default();
            match field {
                VocabField::Definition => entry.definition = value,
                VocabField::Notes => entry.notes = value,
            }
        })
    }

    /// Conceptual groups of a marker with display text and annotations
    pub fn groups(&self, id: Uuid) -> Vec<GroupView> {
        self.get(id).map(group_views).unwrap_or_default()
    }
}

/// Groups of a single marker, in index order
pub fn group_views(marker: &Marker) -> Vec<GroupView> {
    let tokens = marker.tokens();
    group_indices(marker.misunderstood_indices.iter().copied())
        .into_iter()
        .map(|group| GroupView {
            text: group.text(&tokens),
            vocab: marker.vocab_data.get(&group.main_index).cloned(),
            group,
        })
        .collect()
}

/// Keep vocabulary keys on group anchors after the marked set changed.
/// An entry whose key is no longer an anchor moves to the anchor of the
/// group now containing it, unless that anchor already has one.
fn reconcile_vocab(marker: &mut Marker) {
    let groups = group_indices(marker.misunderstood_indices.iter().copied());
    let stale: Vec<usize> = marker
        .vocab_data
        .keys()
        .copied()
        .filter(|k| !groups.iter().any(|g| g.main_index == *k))
        .collect();

    for key in stale {
        let Some(entry) = marker.vocab_data.remove(&key) else {
            continue;
        };
        if let Some(anchor) = anchor_of(&groups, key) {
            marker.vocab_data.entry(anchor).or_insert(entry);
        }
    }
}
