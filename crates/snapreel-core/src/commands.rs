// crates/snapreel-core/src/commands.rs
//
// Every user gesture in the clip editor is expressed as an EditorCommand.
// The UI layer emits these; EditorSession::process_command applies them.
// Adding a feature = add a variant here + one match arm in the session.

use std::path::PathBuf;

use uuid::Uuid;

use crate::config::CountdownPreset;
use crate::draft::{Privacy, SongRegion, SongSelection};
use crate::segment::SegmentId;

#[derive(Debug, Clone)]
pub enum EditorCommand {
    // ── Capture ──────────────────────────────────────────────────────────────
    StartRecording,
    StopRecording,
    SwitchCamera,
    ToggleFlash,
    SetPlaybackRate(f64),

    // ── Countdown ────────────────────────────────────────────────────────────
    /// Arm a delayed start. Replaces any countdown already pending.
    ArmCountdown(u32),
    ArmCountdownPreset(CountdownPreset),
    /// Arm for `EditorConfig::default_countdown` seconds.
    ArmDefaultCountdown,
    CancelCountdown,

    // ── Timeline ─────────────────────────────────────────────────────────────
    ImportFile(PathBuf),
    DeleteSegment(SegmentId),
    /// Full new order; must be a permutation of the current ids.
    ReorderSegments(Vec<SegmentId>),
    /// Drag from index to index.
    MoveSegment { from: usize, to: usize },
    TrimSegment { id: SegmentId, start: f64, end: f64 },

    // ── Undo / Redo ───────────────────────────────────────────────────────────
    Undo,
    Redo,

    // ── Draft details ────────────────────────────────────────────────────────
    SelectSong(Option<SongSelection>),
    SetSongRegion(Option<SongRegion>),
    SetMusicVolume(f32),
    SetClipVolume(f32),
    SetCaption(String),
    SetPrivacy(Privacy),

    // ── Persistence ──────────────────────────────────────────────────────────
    SaveDraft,
    LoadDraft(Uuid),
    DeleteDraft(Uuid),

    // ── Export ───────────────────────────────────────────────────────────────
    StartExport,
    CancelExport,
    /// Publish the finished export with the cover candidate at `cover_index`.
    Publish {
        title:       String,
        description: String,
        category:    String,
        cover_index: usize,
    },
}
