//! Data models for review sessions

use serde::{Deserialize, Serialize};

use crate::markers::Marker;

/// Learner's answer for a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Again,
    Hard,
    Good,
    Easy,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    /// Map to SM-2 quality (0-5)
    pub fn quality(&self) -> i32 {
        match self {
            Rating::Again => 1, // incorrect but recognized
            Rating::Hard => 3,  // correct with difficulty
            Rating::Good => 4,  // correct with hesitation
            Rating::Easy => 5,  // perfect
        }
    }

    pub fn is_correct(&self) -> bool {
        self.quality() >= 3
    }

    /// UI buttons are numbered 1-4
    pub fn from_button(button: i32) -> Option<Self> {
        match button {
            1 => Some(Rating::Again),
            2 => Some(Rating::Hard),
            3 => Some(Rating::Good),
            4 => Some(Rating::Easy),
            _ => None,
        }
    }
}

impl std::str::FromStr for Rating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "again" | "1" => Ok(Rating::Again),
            "hard" | "2" => Ok(Rating::Hard),
            "good" | "3" => Ok(Rating::Good),
            "easy" | "4" => Ok(Rating::Easy),
            other => Err(format!("Unknown rating: {}", other)),
        }
    }
}

/// Order of the due queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOption {
    /// Earliest due date first
    DueFirst,
    Random,
    /// Most recently created first
    Newest,
    /// Oldest created first
    Oldest,
}

impl Default for SortOption {
    fn default() -> Self {
        Self::DueFirst
    }
}

impl std::str::FromStr for SortOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "due_first" | "due" => Ok(Self::DueFirst),
            "random" => Ok(Self::Random),
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            other => Err(format!("Unknown sort option: {}", other)),
        }
    }
}

/// Where never-reviewed cards go in a `due_first` queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewCardPlacement {
    BeforeDue,
    AfterDue,
}

impl Default for NewCardPlacement {
    fn default() -> Self {
        Self::AfterDue
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueOptions {
    #[serde(default)]
    pub sort: SortOption,
    /// `None` means unlimited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_cards_limit: Option<usize>,
    #[serde(default)]
    pub new_card_placement: NewCardPlacement,
}

/// Which markers a session reviews
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "mediaId", rename_all = "camelCase")]
pub enum ReviewScope {
    All,
    Media(String),
}

impl ReviewScope {
    pub fn includes(&self, marker: &Marker) -> bool {
        match self {
            ReviewScope::All => true,
            ReviewScope::Media(media_id) => marker.media_id == *media_id,
        }
    }
}

impl Default for ReviewScope {
    fn default() -> Self {
        Self::All
    }
}

/// Learning cards that are not due yet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningStatus {
    pub pending_count: usize,
    /// Seconds until the earliest pending card is due
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_due_in: Option<u64>,
}

impl LearningStatus {
    pub fn has_pending(&self) -> bool {
        self.pending_count > 0
    }
}

/// Rating counts for the current session only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub reviewed: usize,
    pub again: usize,
    pub hard: usize,
    pub good: usize,
    pub easy: usize,
}

impl SessionStats {
    pub fn record(&mut self, rating: Rating) {
        self.reviewed += 1;
        match rating {
            Rating::Again => self.again += 1,
            Rating::Hard => self.hard += 1,
            Rating::Good => self.good += 1,
            Rating::Easy => self.easy += 1,
        }
    }

    /// Share of reviews not rated "again"
    pub fn retention(&self) -> Option<f64> {
        if self.reviewed == 0 {
            return None;
        }
        Some((self.reviewed - self.again) as f64 / self.reviewed as f64)
    }
}

/// Card counts for a scope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckStats {
    pub total: usize,
    pub new: usize,
    /// Learning and relearning
    pub learning: usize,
    pub review: usize,
    /// Review cards with a long interval
    pub mastered: usize,
    pub due_today: usize,
}
