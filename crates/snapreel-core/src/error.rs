// crates/snapreel-core/src/error.rs
//
// Error taxonomy shared by every snapreel crate.
//
//   EditError    a timeline edit was refused. The store and its history are
//                untouched whenever one of these is returned.
//   EditorError  the user-visible conditions the editor surfaces. Every
//                variant is retryable; none of them corrupt session state.
//
// Auto-stop at the duration budget is not an error here: it is a clamp,
// not a failure.

use crate::segment::SegmentId;

#[derive(Clone, Debug, PartialEq)]
pub enum EditError {
    /// Adding `requested` seconds would exceed the budget; `available` remain.
    BudgetExceeded { requested: f64, available: f64 },
    /// Trim range outside `[0, duration]` or empty.
    InvalidTrim { start: f64, end: f64, duration: f64 },
    UnknownSegment(SegmentId),
    /// Reorder input is not a permutation of the current segment ids.
    NotAPermutation,
    /// Segment durations must be finite and > 0.
    InvalidDuration(f64),
    DuplicateSegment(SegmentId),
}

impl std::fmt::Display for EditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditError::BudgetExceeded { requested, available } => write!(
                f, "clip of {requested:.1}s does not fit: only {available:.1}s left",
            ),
            EditError::InvalidTrim { start, end, duration } => write!(
                f, "trim range [{start:.2}, {end:.2}] is outside [0, {duration:.2}]",
            ),
            EditError::UnknownSegment(id) => write!(f, "no segment {id} on the timeline"),
            EditError::NotAPermutation    => write!(f, "new order must contain every segment exactly once"),
            EditError::InvalidDuration(d) => write!(f, "segment duration must be positive, got {d}"),
            EditError::DuplicateSegment(id) => write!(f, "segment {id} is already on the timeline"),
        }
    }
}

impl std::error::Error for EditError {}

/// User-facing failure conditions.
#[derive(Clone, Debug, PartialEq)]
pub enum EditorError {
    /// Permission refused or no capture device present. Recording is disabled.
    CameraAccessDenied(String),
    /// Active device has no torch. Non-fatal.
    FlashUnsupported,
    /// Imported file could not be decoded. Timeline unchanged.
    FileReadError(String),
    /// Persistence gateway failed. In-memory timeline and history retained.
    DraftSaveFailed(String),
    /// Persistence gateway could not list drafts, or a stored draft is invalid.
    DraftLoadFailed(String),
    /// Concatenation or upload failed. Timeline stays editable.
    ExportFailed(String),
}

impl std::fmt::Display for EditorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditorError::CameraAccessDenied(m) => write!(f, "camera access denied: {m}"),
            EditorError::FlashUnsupported      => write!(f, "flash is not supported on this camera"),
            EditorError::FileReadError(m)      => write!(f, "could not read file: {m}"),
            EditorError::DraftSaveFailed(m)    => write!(f, "draft was not saved, please retry: {m}"),
            EditorError::DraftLoadFailed(m)    => write!(f, "drafts could not be loaded, please retry: {m}"),
            EditorError::ExportFailed(m)       => write!(f, "export failed, please retry: {m}"),
        }
    }
}

impl std::error::Error for EditorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_message_is_readable() {
        let e = EditError::BudgetExceeded { requested: 5.0, available: 2.0 };
        assert_eq!(e.to_string(), "clip of 5.0s does not fit: only 2.0s left");
    }

    #[test]
    fn editor_errors_mention_retry_where_relevant() {
        assert!(EditorError::DraftSaveFailed("503".into()).to_string().contains("retry"));
        assert!(EditorError::ExportFailed("io".into()).to_string().contains("retry"));
    }
}
