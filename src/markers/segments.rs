//! Segment resolution
//!
//! Maps a playback position onto the subtitle line the learner was hearing.
//! Lookup order: the segment containing the position, then the nearest
//! segment within a small tolerance, then a synthetic window around the
//! position with no text.

use serde::{Deserialize, Serialize};

/// One timed line of text (a subtitle cue)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Zero-width or inverted cues cannot anchor a marker
    pub fn has_duration(&self) -> bool {
        self.end > self.start
    }

    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t <= self.end
    }

    /// Distance from `t` to the closest boundary
    pub fn boundary_distance(&self, t: f64) -> f64 {
        (t - self.start).abs().min((t - self.end).abs())
    }
}

/// Tolerances used while resolving a position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolveOptions {
    pub nearest_tolerance: f64,
    pub fallback_window: f64,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            nearest_tolerance: 1.0,
            fallback_window: 2.0,
        }
    }
}

/// Bounds a marker will be anchored to
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSegment {
    pub start: f64,
    pub end: f64,
    /// `None` when no aligned segment was found
    pub text: Option<String>,
}

impl ResolvedSegment {
    pub fn is_fallback(&self) -> bool {
        self.text.is_none()
    }
}

/// Resolve the segment for playback position `t`
pub fn resolve_segment(segments: &[Segment], t: f64, options: &ResolveOptions) -> ResolvedSegment {
    let t = t.max(0.0);
    let usable = || segments.iter().filter(|s| s.has_duration());

    if let Some(seg) = usable().find(|s| s.contains(t)) {
        return ResolvedSegment {
            start: seg.start,
            end: seg.end,
            text: Some(seg.text.clone()),
        };
    }

    let nearest = usable()
        .map(|s| (s, s.boundary_distance(t)))
        .filter(|(_, distance)| *distance <= options.nearest_tolerance)
        .min_by(|a, b| a.1.total_cmp(&b.1));

    if let Some((seg, _)) = nearest {
        return ResolvedSegment {
            start: seg.start,
            end: seg.end,
            text: Some(seg.text.clone()),
        };
    }

    ResolvedSegment {
        start: (t - options.fallback_window).max(0.0),
        end: t + options.fallback_window,
        text: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cues() -> Vec<Segment> {
        vec![
            Segment::new(0.0, 2.5, "first line"),
            Segment::new(3.0, 5.0, "second line"),
            Segment::new(10.0, 12.0, "third line"),
        ]
    }

    #[test]
    fn test_containment() {
        let resolved = resolve_segment(&cues(), 4.0, &ResolveOptions::default());
        assert_eq!(resolved.start, 3.0);
        assert_eq!(resolved.text.as_deref(), Some("second line"));

        // Boundaries are inclusive
        let resolved = resolve_segment(&cues(), 5.0, &ResolveOptions::default());
        assert_eq!(resolved.text.as_deref(), Some("second line"));
    }

    #[test]
    fn test_nearest_within_tolerance() {
        // 5.8 is 0.8s past the second cue and 4.2s before the third
        let resolved = resolve_segment(&cues(), 5.8, &ResolveOptions::default());
        assert_eq!(resolved.text.as_deref(), Some("second line"));

        // 9.3 is 0.7s before the third cue
        let resolved = resolve_segment(&cues(), 9.3, &ResolveOptions::default());
        assert_eq!(resolved.text.as_deref(), Some("third line"));
    }

    #[test]
    fn test_fallback_window() {
        let resolved = resolve_segment(&cues(), 7.5, &ResolveOptions::default());
        assert!(resolved.is_fallback());
        assert_eq!(resolved.start, 5.5);
        assert_eq!(resolved.end, 9.5);
    }

    #[test]
    fn test_zero_width_cues_are_skipped() {
        let segments = vec![
            Segment::new(5.0, 5.0, "empty"),
            Segment::new(7.0, 6.0, "inverted"),
            Segment::new(5.5, 8.0, "real"),
        ];

        let resolved = resolve_segment(&segments, 5.0, &ResolveOptions::default());
        assert_eq!(resolved.text.as_deref(), Some("real"));
        assert!(resolved.end > resolved.start);

        let resolved = resolve_segment(&segments[..2], 5.0, &ResolveOptions::default());
        assert!(resolved.is_fallback());
        assert_eq!((resolved.start, resolved.end), (3.0, 7.0));
    }

    #[test]
    fn test_fallback_clamps_at_zero() {
        let resolved = resolve_segment(&[], 0.5, &ResolveOptions::default());
        assert_eq!(resolved.start, 0.0);
        assert_eq!(resolved.end, 2.5);
        assert!(resolved.end > resolved.start);
    }
}
