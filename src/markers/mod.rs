//! Markers: points of confusion in a media item
//!
//! This module provides:
//! - The marker model, including the review fields read by the scheduler
//! - Grouping of marked word indices into words and phrases
//! - Segment resolution from a playback position
//! - The marker store with merge-on-re-mark and word/phrase toggling

pub mod grouping;
pub mod models;
pub mod segments;
pub mod store;

pub use grouping::{group_indices, ConceptualGroup};
pub use models::*;
pub use segments::{resolve_segment, ResolveOptions, ResolvedSegment, Segment};
pub use store::{AddOutcome, GroupView, MarkerError, MarkerStore, MarkerStoreOptions};
