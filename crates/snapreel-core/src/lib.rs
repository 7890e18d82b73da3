// crates/snapreel-core/src/lib.rs
//
// Pure editor data: segments, the history-aware store, timeline edits,
// drafts and commands. No threads, no hardware, no I/O beyond reading a
// config file. snapreel-media and snapreel-editor build on top of this.

pub mod commands;
pub mod config;
pub mod draft;
pub mod error;
pub mod helpers;
pub mod media_types;
pub mod history;
pub mod segment;
pub mod timeline;

pub use config::{CountdownPreset, EditorConfig, FacingMode};
pub use error::{EditError, EditorError};
pub use history::{SegmentStore, Timeline};
pub use segment::{LocalHandle, MediaRef, Segment, SegmentId, SegmentIdGen, MAX_DURATION, MIN_SEGMENT_SECS};
pub use timeline::{Composer, TimelineStatus};
