// crates/snapreel-core/src/segment.rs
//
// Segment: one recorded or imported clip on the timeline.
//
// A segment never owns media bytes. It points at them through a `MediaRef`,
// which is either a handle into the session's local blob pool (fresh
// recordings, file imports) or a remote URI (media restored from a draft).
// Downstream code (assembly, thumbnail extraction) branches on the variant
// instead of sniffing string shapes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EditError;

// ── Budget constants ──────────────────────────────────────────────────────────

/// Hard ceiling on the summed duration of every segment in a session (seconds).
pub const MAX_DURATION: f64 = 60.0;

/// Takes shorter than this are discarded on stop instead of becoming segments.
pub const MIN_SEGMENT_SECS: f64 = 0.5;

/// Float slack used when comparing summed durations against the budget.
/// Repeated f64 additions of e.g. 0.1 drift by a few ULPs; without slack a
/// timeline that is exactly full would be reported as over budget.
pub const DURATION_EPSILON: f64 = 1e-9;

// ── Identifiers ───────────────────────────────────────────────────────────────

/// Monotonic segment identifier. Captured segments use the capture timestamp
/// in milliseconds; see `SegmentIdGen`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(pub u64);

impl std::fmt::Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Issues strictly increasing `SegmentId`s seeded from wall-clock millis.
///
/// Two takes finished within the same millisecond would otherwise collide,
/// so the generator bumps past the last issued value when the clock has not
/// moved (or went backwards).
#[derive(Debug, Default)]
pub struct SegmentIdGen {
    last: u64,
}

impl SegmentIdGen {
    pub fn new() -> Self { Self::default() }

    /// Seed the generator past every id already present (e.g. after loading a draft).
    pub fn observe(&mut self, id: SegmentId) {
        self.last = self.last.max(id.0);
    }

    /// Next id for a segment created at `now_millis`.
    pub fn next_at(&mut self, now_millis: u64) -> SegmentId {
        let id = now_millis.max(self.last + 1);
        self.last = id;
        SegmentId(id)
    }

    /// Next id stamped with the current system time.
    pub fn next(&mut self) -> SegmentId {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.next_at(now)
    }
}

// ── Media references ──────────────────────────────────────────────────────────

/// Key into the session-local blob pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalHandle(pub Uuid);

impl LocalHandle {
    pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Default for LocalHandle {
    fn default() -> Self { Self::new() }
}

/// Where a segment's media bytes live.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum MediaRef {
    /// In-memory bytes owned by this editing session.
    Local(LocalHandle),
    /// Already-uploaded media addressed by URI.
    Remote(String),
}

impl MediaRef {
    pub fn local_handle(&self) -> Option<LocalHandle> {
        match self {
            MediaRef::Local(h)  => Some(*h),
            MediaRef::Remote(_) => None,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, MediaRef::Local(_))
    }
}

// ── Segment ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id:       SegmentId,
    /// Logical playback length in seconds. Always > 0.
    pub duration: f64,
    #[serde(rename = "mediaRef")]
    pub media:    MediaRef,
    /// Seconds into the underlying media at which this segment starts.
    /// Non-zero only after a trim. Trims are metadata-only; the media bytes
    /// are never re-cut.
    #[serde(default)]
    pub source_offset: f64,
}

impl Segment {
    /// Build a segment, rejecting zero, negative, or non-finite durations.
    pub fn new(id: SegmentId, duration: f64, media: MediaRef) -> Result<Self, EditError> {
        validate_duration(duration)?;
        Ok(Self { id, duration, media, source_offset: 0.0 })
    }

    /// End of this segment within the underlying media.
    pub fn source_end(&self) -> f64 {
        self.source_offset + self.duration
    }
}

pub(crate) fn validate_duration(duration: f64) -> Result<(), EditError> {
    if duration.is_finite() && duration > 0.0 {
        Ok(())
    } else {
        Err(EditError::InvalidDuration(duration))
    }
}

// ── Timeline helpers ──────────────────────────────────────────────────────────

/// Sum of all segment durations.
pub fn total_duration(segments: &[Segment]) -> f64 {
    segments.iter().map(|s| s.duration).sum()
}

/// Seconds still available under `max` (never negative).
pub fn remaining_budget(segments: &[Segment], max: f64) -> f64 {
    (max - total_duration(segments)).max(0.0)
}

/// True when adding `extra` seconds keeps the timeline within `max`.
pub fn fits_budget(segments: &[Segment], extra: f64, max: f64) -> bool {
    total_duration(segments) + extra <= max + DURATION_EPSILON
}
