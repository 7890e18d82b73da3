// crates/snapreel-core/src/media_types.rs
//
// Types that flow across channels between snapreel-media and snapreel-editor.
// No hardware handles, no threads; plain data.

use uuid::Uuid;

use crate::segment::SegmentId;

/// Completion notice from a platform recorder. Delivered asynchronously after
/// `MediaStream::stop_recording`; `take` identifies which recording it belongs to.
#[derive(Debug, Clone)]
pub enum RecorderEvent {
    Finished { take: u64, bytes: Vec<u8> },
    Failed   { take: u64, msg: String },
}

/// A decoded still image (RGBA8, tightly packed rows).
#[derive(Clone, Debug, PartialEq)]
pub struct StillFrame {
    /// Position in the composite, seconds.
    pub timestamp: f64,
    pub width:     u32,
    pub height:    u32,
    pub data:      Vec<u8>,
}

/// Edit-decision entry for one segment inside a composite asset.
#[derive(Clone, Debug, PartialEq)]
pub struct CompositePart {
    pub segment_id:    SegmentId,
    /// Byte span of this segment's media within the composite.
    pub byte_range:    std::ops::Range<usize>,
    /// Trim start within the segment's media, seconds.
    pub source_offset: f64,
    /// Logical (trimmed) duration, seconds.
    pub duration:      f64,
}

/// Which step of the export pipeline a progress report refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportStage {
    Combining,
    Uploading,
    ExtractingFrames,
}

/// Outcome of a finished export job.
#[derive(Clone, Debug)]
pub struct ExportedClip {
    pub url:      String,
    pub duration: f64,
    pub parts:    Vec<CompositePart>,
    /// Cover candidates, possibly fewer than requested if decoding failed.
    pub frames:   Vec<StillFrame>,
    /// PNG encoding of each entry in `frames`, same order.
    pub covers:   Vec<Vec<u8>>,
}

/// Results sent from the export worker thread to the session.
#[derive(Debug)]
pub enum ExportResult {
    Progress { job_id: Uuid, stage: ExportStage, done: usize, total: usize },
    Done     { job_id: Uuid, clip: ExportedClip },
    Error    { job_id: Uuid, msg: String },
}
