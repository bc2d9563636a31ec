//! Data models for markers and their review state

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::grouping::tokenize;

/// Tag names offered by the marking UI. Tags are free-form, these are just
/// the ones with a fixed meaning.
pub mod tags {
    pub const TOO_FAST: &str = "too-fast";
    pub const UNCLEAR: &str = "unclear";
    pub const ACCENT: &str = "accent";
    pub const GRAMMAR: &str = "grammar";
    pub const VOCABULARY: &str = "vocabulary";
    pub const SHADOW: &str = "shadow";
}

/// Where a marker was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerSource {
    /// "I didn't understand this" while listening
    Loop,
    /// Shadowing practice
    Shadow,
    /// Word or phrase selected in a static text view
    Reading,
}

impl Default for MarkerSource {
    fn default() -> Self {
        Self::Loop
    }
}

impl std::str::FromStr for MarkerSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "loop" => Ok(Self::Loop),
            "shadow" => Ok(Self::Shadow),
            "reading" => Ok(Self::Reading),
            other => Err(format!("Unknown marker source: {}", other)),
        }
    }
}

/// Status of a card in the spaced repetition system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardState {
    /// Never reviewed
    New,
    /// In initial learning phase
    Learning,
    /// Regular spaced review
    Review,
    /// Failed and re-learning
    Relearning,
}

impl Default for CardState {
    fn default() -> Self {
        Self::New
    }
}

impl CardState {
    /// Short-term states that wait on a minute-scale step
    pub fn is_learning(&self) -> bool {
        matches!(self, Self::Learning | Self::Relearning)
    }
}

/// Spaced repetition fields stored alongside a marker.
///
/// These are written by the review backend; the marker store never touches
/// them after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SrsFields {
    #[serde(default)]
    pub card_state: CardState,
    /// Current interval in days
    #[serde(default)]
    pub interval: i32,
    /// SM-2 ease factor (default 2.5)
    #[serde(default = "default_ease_factor")]
    pub ease_factor: f32,
    /// Index into the learning or relearning steps
    #[serde(default)]
    pub learning_step: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_review_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub review_count: i32,
    #[serde(default)]
    pub lapses: i32,
}

fn default_ease_factor() -> f32 {
    2.5
}

impl Default for SrsFields {
    fn default() -> Self {
        Self {
            card_state: CardState::New,
            interval: 0,
            ease_factor: default_ease_factor(),
            learning_step: 0,
            next_review_date: None,
            last_reviewed_at: None,
            review_count: 0,
            lapses: 0,
        }
    }
}

/// Vocabulary annotation attached to a conceptual group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabEntry {
    #[serde(default)]
    pub definition: String,
    #[serde(default)]
    pub notes: String,
}

/// Which half of a [`VocabEntry`] an edit targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VocabField {
    Definition,
    Notes,
}

/// One point of confusion anchored to a time segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub id: Uuid,
    pub media_id: String,
    /// Segment start in seconds
    pub start: f64,
    /// Segment end in seconds, always greater than `start`
    pub end: f64,
    /// Segment text at creation time; `None` for time-window fallbacks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub misunderstood_indices: BTreeSet<usize>,
    /// Keyed by the first index of each group
    #[serde(default)]
    pub vocab_data: BTreeMap<usize, VocabEntry>,
    #[serde(default)]
    pub note: String,
    #[serde(default = "default_press_count")]
    pub press_count: u32,
    #[serde(default)]
    pub source: MarkerSource,
    #[serde(default)]
    pub srs: SrsFields,
}

fn default_press_count() -> u32 {
    1
}

impl Marker {
    pub fn new(media_id: String, start: f64, end: f64, text: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            media_id,
            start,
            end,
            text,
            created_at: Utc::now(),
            tags: BTreeSet::new(),
            misunderstood_indices: BTreeSet::new(),
            vocab_data: BTreeMap::new(),
            note: String::new(),
            press_count: default_press_count(),
            source: MarkerSource::default(),
            srs: SrsFields::default(),
        }
    }

    /// Whitespace tokens of the marker text
    pub fn tokens(&self) -> Vec<&str> {
        self.text.as_deref().map(tokenize).unwrap_or_default()
    }

    /// Only markers with at least one marked word become cards
    pub fn is_reviewable(&self) -> bool {
        !self.misunderstood_indices.is_empty()
    }

    /// Marker was created from the ±window fallback, not a real segment
    pub fn is_time_fallback(&self) -> bool {
        self.text.is_none()
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Check if the card is due at `now`. New cards are always due.
    pub fn is_due_at(&self, now: DateTime<Utc>) -> bool {
        match self.srs.next_review_date {
            Some(due) => due <= now,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_marker_defaults() {
        let marker = Marker::new("vid".to_string(), 1.0, 3.5, Some("hello there".to_string()));

        assert_eq!(marker.press_count, 1);
        assert_eq!(marker.srs.card_state, CardState::New);
        assert!(!marker.is_reviewable());
        assert!(!marker.is_time_fallback());
        assert_eq!(marker.tokens(), vec!["hello", "there"]);
    }

    #[test]
    fn test_marker_json_shape() {
        let mut marker = Marker::new("vid".to_string(), 1.0, 2.0, None);
        marker.misunderstood_indices.insert(3);
        marker.vocab_data.insert(3, VocabEntry {
            definition: "a word".to_string(),
            notes: String::new(),
        });

        let json = serde_json::to_value(&marker).unwrap();
        assert_eq!(json["mediaId"], "vid");
        assert_eq!(json["srs"]["cardState"], "new");
        assert_eq!(json["pressCount"], 1);
        assert_eq!(json["vocabData"]["3"]["definition"], "a word");
        assert!(json.get("text").is_none());

        let back: Marker = serde_json::from_value(json).unwrap();
        assert_eq!(back, marker);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "mediaId": "vid",
            "start": 0.0,
            "end": 1.0,
            "createdAt": Utc::now(),
        });
        let marker: Marker = serde_json::from_value(json).unwrap();
        assert_eq!(marker.press_count, 1);
        assert_eq!(marker.srs.ease_factor, 2.5);
        assert_eq!(marker.source, MarkerSource::Loop);
    }
}
