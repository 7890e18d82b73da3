// crates/snapreel-core/src/timeline.rs
//
// Timeline Composer: user-level edits expressed on top of SegmentStore.
//
// Every operation validates first and only then calls into the store, so a
// rejected edit never leaves a history entry behind.
//
// Trim is metadata-only. `trim` shortens `duration` and advances
// `source_offset`; it never re-slices the media bytes. Assembly carries the
// offset/duration pair per part so an encoder further down the line can
// honor it, but the concatenated composite still holds the full takes.

use std::collections::HashSet;

use crate::error::EditError;
use crate::history::{SegmentStore, Timeline};
use crate::segment::{fits_budget, remaining_budget, validate_duration, Segment, SegmentId};

/// What the editor should show for the current timeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimelineStatus {
    /// No segments: show the "start a new clip" affordance.
    Empty,
    Populated,
}

/// Edits against one store under one duration budget.
pub struct Composer<'a> {
    store:        &'a mut SegmentStore,
    max_duration: f64,
}

impl<'a> Composer<'a> {
    pub fn new(store: &'a mut SegmentStore, max_duration: f64) -> Self {
        Self { store, max_duration }
    }

    pub fn status(&self) -> TimelineStatus {
        if self.store.is_empty() { TimelineStatus::Empty } else { TimelineStatus::Populated }
    }

    /// Append a segment. Rejected when it would push the total past the budget.
    pub fn append(&mut self, segment: Segment) -> Result<(), EditError> {
        validate_duration(segment.duration)?;
        if self.store.get(segment.id).is_some() {
            return Err(EditError::DuplicateSegment(segment.id));
        }
        if !fits_budget(self.store.segments(), segment.duration, self.max_duration) {
            return Err(EditError::BudgetExceeded {
                requested: segment.duration,
                available: remaining_budget(self.store.segments(), self.max_duration),
            });
        }
        self.store.add_segment(segment);
        Ok(())
    }

    /// Remove a segment. Deleting the last one leaves an `Empty` timeline.
    pub fn delete(&mut self, id: SegmentId) -> Result<TimelineStatus, EditError> {
        if self.store.get(id).is_none() {
            return Err(EditError::UnknownSegment(id));
        }
        self.store.remove_segment(id);
        Ok(self.status())
    }

    /// Replace the order with `order`, which must name every current id once.
    pub fn reorder(&mut self, order: &[SegmentId]) -> Result<bool, EditError> {
        let current = self.store.segments();
        if order.len() != current.len() {
            return Err(EditError::NotAPermutation);
        }
        let mut seen = HashSet::with_capacity(order.len());
        let mut next: Timeline = Vec::with_capacity(order.len());
        for id in order {
            if !seen.insert(*id) {
                return Err(EditError::NotAPermutation);
            }
            let seg = current.iter()
                .find(|s| s.id == *id)
                .ok_or(EditError::NotAPermutation)?;
            next.push(seg.clone());
        }
        Ok(self.store.reorder(next))
    }

    /// Drag gesture: move the segment at index `from` so it lands at `to`.
    pub fn move_segment(&mut self, from: usize, to: usize) -> Result<bool, EditError> {
        let len = self.store.segments().len();
        if from >= len || to >= len {
            return Err(EditError::NotAPermutation);
        }
        let mut next = self.store.segments().to_vec();
        let seg = next.remove(from);
        next.insert(to, seg);
        Ok(self.store.reorder(next))
    }

    /// Keep only `[start, end]` (seconds relative to the segment's own start).
    ///
    /// Requires `0 <= start < end <= duration`; anything else is rejected
    /// rather than clamped. Returns the updated segment.
    pub fn trim(&mut self, id: SegmentId, start: f64, end: f64) -> Result<Segment, EditError> {
        let seg = self.store.get(id).ok_or(EditError::UnknownSegment(id))?;
        let valid = start.is_finite() && end.is_finite()
            && start >= 0.0 && start < end && end <= seg.duration;
        if !valid {
            return Err(EditError::InvalidTrim { start, end, duration: seg.duration });
        }

        let mut trimmed = seg.clone();
        trimmed.duration      = end - start;
        trimmed.source_offset = seg.source_offset + start;

        let next: Timeline = self.store.segments().iter()
            .map(|s| if s.id == id { trimmed.clone() } else { s.clone() })
            .collect();
        self.store.set_segments(next);
        Ok(trimmed)
    }
}
