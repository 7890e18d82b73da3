// crates/snapreel-core/src/history.rs
//
// SegmentStore: the authoritative timeline plus linear undo/redo.
//
// Snapshot-based: every accepted edit pushes a full copy of the previous
// timeline onto `past`. Timelines are small (the 60 s budget divided by the
// 0.5 s minimum take caps them at 120 segments, typically a handful), so a
// copy per step is cheaper to reason about than a reversible-command log.
//
// Invariants:
//   • `past` only grows when the proposed timeline differs structurally
//     from the current one. No-op edits leave history alone.
//   • Any accepted edit clears `future`.
//   • `future[0]` is the state a single redo() restores.

use std::collections::{HashSet, VecDeque};

use crate::segment::{LocalHandle, Segment, SegmentId};

pub type Timeline = Vec<Segment>;

#[derive(Clone, Debug, Default)]
pub struct SegmentStore {
    segments: Timeline,
    past:     Vec<Timeline>,
    future:   VecDeque<Timeline>,
}

impl SegmentStore {
    pub fn new() -> Self { Self::default() }

    /// Store seeded with `segments` as an un-undoable baseline.
    pub fn with_segments(segments: Timeline) -> Self {
        Self { segments, ..Self::default() }
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    pub fn segments(&self) -> &[Segment] { &self.segments }

    pub fn past(&self) -> &[Timeline] { &self.past }

    pub fn future(&self) -> &VecDeque<Timeline> { &self.future }

    pub fn can_undo(&self) -> bool { !self.past.is_empty() }

    pub fn can_redo(&self) -> bool { !self.future.is_empty() }

    pub fn is_empty(&self) -> bool { self.segments.is_empty() }

    pub fn total_duration(&self) -> f64 {
        crate::segment::total_duration(&self.segments)
    }

    pub fn get(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == id)
    }

    /// Every local media handle reachable from the current timeline or any
    /// history snapshot. Media outside this set can be released.
    pub fn referenced_media(&self) -> HashSet<LocalHandle> {
        std::iter::once(&self.segments)
            .chain(self.past.iter())
            .chain(self.future.iter())
            .flat_map(|tl| tl.iter())
            .filter_map(|s| s.media.local_handle())
            .collect()
    }

    // ── Writes ────────────────────────────────────────────────────────────────

    /// The fundamental write. Returns `true` when the timeline changed.
    pub fn set_segments(&mut self, new_timeline: Timeline) -> bool {
        if new_timeline == self.segments {
            return false;
        }
        let previous = std::mem::replace(&mut self.segments, new_timeline);
        self.past.push(previous);
        self.future.clear();
        true
    }

    /// Step back one edit. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.past.pop() else { return false };
        let current = std::mem::replace(&mut self.segments, previous);
        self.future.push_front(current);
        true
    }

    /// Re-apply the most recently undone edit.
    pub fn redo(&mut self) -> bool {
        let Some(next) = self.future.pop_front() else { return false };
        let current = std::mem::replace(&mut self.segments, next);
        self.past.push(current);
        true
    }

    /// Drop both stacks, keeping the current timeline as the new baseline.
    pub fn reset_history(&mut self) {
        self.past.clear();
        self.future.clear();
    }

    /// Replace the timeline without recording history. Reserved for loading a
    /// persisted draft; normal edits go through `set_segments`.
    pub fn update_without_history(&mut self, new_timeline: Timeline) {
        self.segments = new_timeline;
    }

    // ── Conveniences over set_segments ────────────────────────────────────────

    pub fn add_segment(&mut self, segment: Segment) -> bool {
        let mut next = self.segments.clone();
        next.push(segment);
        self.set_segments(next)
    }

    pub fn remove_segment(&mut self, id: SegmentId) -> bool {
        let next: Timeline = self.segments.iter()
            .filter(|s| s.id != id)
            .cloned()
            .collect();
        self.set_segments(next)
    }

    pub fn reorder(&mut self, new_order: Timeline) -> bool {
        self.set_segments(new_order)
    }
}
