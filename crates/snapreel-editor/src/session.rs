// crates/snapreel-editor/src/session.rs
//
// EditorSession: one clip-editing session, from camera open to publish.
//
// Owns the segment store, the capture controller, the countdown, the blob
// pool and the export worker. The host drives it with two calls:
//
//   process_command(cmd)  every user gesture
//   update(dt)            once per frame: capture clock, recorder
//                         completions, countdown, export results
//
// Anything the user should hear about that did not come back as the result
// of a command (a countdown tick, a take being committed, an export
// finishing) is queued as a Notice and drained with take_notices().
//
// Edit gating:
//   - While an export is in flight (`is_processing`) timeline edits and new
//     recordings are refused with SessionError::Busy. The flag clears when
//     the job reports Done or Error, including cancellation.
//   - While a take is recording or finalizing, timeline edits are refused so
//     the pending take always lands on the timeline it was budgeted against.
//
// Media lifetime: blobs live in the pool while any timeline snapshot
// (current, undo or redo) references them. After each edit the pool drops
// everything else; close() drops it all.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::anyhow;
use uuid::Uuid;

use snapreel_core::commands::EditorCommand;
use snapreel_core::draft::{Draft, DraftDetails};
use snapreel_core::media_types::{ExportResult, ExportStage, ExportedClip};
use snapreel_core::segment::fits_budget;
use snapreel_core::{
    Composer, EditError, EditorConfig, EditorError, LocalHandle, MediaRef, Segment, SegmentId,
    SegmentStore,
};
use snapreel_media::capture::{CaptureController, CaptureError, CaptureOutcome, CaptureState};
use snapreel_media::countdown::{Countdown, CountdownEvent};
use snapreel_media::frames::FrameSource;
use snapreel_media::probe::{self, MediaProbe, Mp4Probe};
use snapreel_media::worker::CANCELLED;
use snapreel_media::{BlobPool, CaptureDevice, ExportWorker};

use crate::export::{build_job, default_frame_source, upload_cover, PublishDetails, VIDEO_CONTENT_TYPE};
use crate::gateways::{Gateways, VideoMetadata};

// ── Errors and notices ────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum SessionError {
    /// An export is in flight.
    Busy,
    /// The session has been closed.
    Closed,
    Edit(EditError),
    Capture(CaptureError),
    Editor(EditorError),
    UnknownDraft(Uuid),
    /// `publish` needs a finished export of the current timeline.
    NothingToPublish,
    InvalidCover { index: usize, available: usize },
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Busy             => write!(f, "export in progress, try again when it finishes"),
            SessionError::Closed           => write!(f, "editing session is closed"),
            SessionError::Edit(e)          => write!(f, "{e}"),
            SessionError::Capture(e)       => write!(f, "{e}"),
            SessionError::Editor(e)        => write!(f, "{e}"),
            SessionError::UnknownDraft(id) => write!(f, "no draft {id}"),
            SessionError::NothingToPublish => write!(f, "export the clip before publishing"),
            SessionError::InvalidCover { index, available } => {
                write!(f, "cover {index} does not exist ({available} available)")
            }
        }
    }
}

impl std::error::Error for SessionError {}

impl From<EditError> for SessionError {
    fn from(e: EditError) -> Self { SessionError::Edit(e) }
}

impl From<CaptureError> for SessionError {
    fn from(e: CaptureError) -> Self { SessionError::Capture(e) }
}

impl From<EditorError> for SessionError {
    fn from(e: EditorError) -> Self { SessionError::Editor(e) }
}

/// Something the UI should show that did not come back from a command.
#[derive(Clone, Debug, PartialEq)]
pub enum Notice {
    Error(EditorError),
    /// A deferred action (countdown start) was refused.
    CommandFailed(SessionError),
    CountdownTick(u32),
    RecordingStarted { take: u64 },
    /// Recording stopped itself at the duration budget.
    BudgetReached,
    SegmentCommitted(SegmentId),
    TakeDiscarded { duration: f64 },
    TakeRejected(EditError),
    TakeFailed(String),
    ExportProgress { stage: ExportStage, done: usize, total: usize },
    ExportReady { url: String, covers: usize },
    ExportCancelled,
    DraftSaved(Uuid),
    Published { video_id: String },
}

// ── Session ───────────────────────────────────────────────────────────────────

pub struct EditorSession {
    config:            EditorConfig,
    user_id:           String,
    store:             SegmentStore,
    capture:           CaptureController,
    countdown:         Countdown,
    blobs:             BlobPool,
    details:           DraftDetails,
    gateways:          Gateways,
    probe:             Arc<dyn MediaProbe>,
    frames:            Arc<dyn FrameSource>,
    worker:            ExportWorker,
    /// Set while an export is in flight; this is the processing flag.
    export_job:        Option<Uuid>,
    exported:          Option<ExportedClip>,
    /// Timeline the last export was built from.
    export_source:     Vec<Segment>,
    draft_id:          Option<Uuid>,
    draft_created_at:  Option<u64>,
    /// Local media already uploaded for a draft, so re-saving is cheap.
    uploaded:          HashMap<LocalHandle, String>,
    recording_enabled: bool,
    notices:           Vec<Notice>,
    closed:            bool,
}

impl EditorSession {
    /// Start a session and open the camera.
    ///
    /// A refused or missing camera does not fail the session: recording is
    /// disabled, a `CameraAccessDenied` notice is queued, and everything else
    /// (imports, drafts, export) keeps working. `retry_camera` asks again.
    pub fn open(
        config:   EditorConfig,
        user_id:  impl Into<String>,
        device:   Box<dyn CaptureDevice>,
        gateways: Gateways,
    ) -> Self {
        let capture = CaptureController::new(device, &config);
        let mut session = Self {
            user_id:           user_id.into(),
            store:             SegmentStore::new(),
            capture,
            countdown:         Countdown::new(),
            blobs:             BlobPool::new(),
            details:           DraftDetails::default(),
            gateways,
            probe:             Arc::new(Mp4Probe),
            frames:            default_frame_source(),
            worker:            ExportWorker::new(),
            export_job:        None,
            exported:          None,
            export_source:     Vec::new(),
            draft_id:          None,
            draft_created_at:  None,
            uploaded:          HashMap::new(),
            recording_enabled: false,
            notices:           Vec::new(),
            closed:            false,
            config,
        };
        // The outcome is already queued as a notice on failure.
        let _ = session.retry_camera();
        tracing::info!("[session] opened for user {}", session.user_id);
        session
    }

    pub fn with_probe(mut self, probe: Arc<dyn MediaProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_frame_source(mut self, frames: Arc<dyn FrameSource>) -> Self {
        self.frames = frames;
        self
    }

    /// (Re)acquire the camera with the configured facing mode.
    pub fn retry_camera(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        let facing = self.capture.facing();
        match self.capture.initialize(facing) {
            Ok(()) => {
                self.recording_enabled = true;
                Ok(())
            }
            Err(e @ (CaptureError::AlreadyRecording | CaptureError::Finalizing)) => Err(e.into()),
            Err(e) => {
                tracing::warn!("[session] camera unavailable: {e}");
                self.recording_enabled = false;
                let user_error = e.to_editor_error()
                    .unwrap_or_else(|| EditorError::CameraAccessDenied(e.to_string()));
                self.notices.push(Notice::Error(user_error));
                Err(e.into())
            }
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn config(&self) -> &EditorConfig { &self.config }
    pub fn user_id(&self) -> &str { &self.user_id }
    pub fn store(&self) -> &SegmentStore { &self.store }
    pub fn segments(&self) -> &[Segment] { self.store.segments() }
    pub fn details(&self) -> &DraftDetails { &self.details }
    pub fn capture(&self) -> &CaptureController { &self.capture }
    pub fn countdown(&self) -> &Countdown { &self.countdown }
    pub fn blobs(&self) -> &BlobPool { &self.blobs }
    pub fn recording_enabled(&self) -> bool { self.recording_enabled }
    pub fn is_processing(&self) -> bool { self.export_job.is_some() }
    pub fn export_job(&self) -> Option<Uuid> { self.export_job }
    /// The finished export, as long as the timeline still matches what was
    /// exported. Any later edit makes it stale until the timeline returns to
    /// that exact state (e.g. via undo).
    pub fn exported(&self) -> Option<&ExportedClip> {
        self.exported.as_ref().filter(|_| self.export_source.as_slice() == self.store.segments())
    }
    pub fn draft_id(&self) -> Option<Uuid> { self.draft_id }
    pub fn is_closed(&self) -> bool { self.closed }

    /// Seconds still available on the timeline.
    pub fn remaining(&self) -> f64 {
        (self.config.max_duration - self.store.total_duration()).max(0.0)
    }

    /// Drain queued notices, oldest first.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    pub fn process_command(&mut self, cmd: EditorCommand) -> Result<(), SessionError> {
        self.ensure_open()?;
        match cmd {
            // ── Capture ──────────────────────────────────────────────────────
            EditorCommand::StartRecording => {
                self.start_recording()?;
            }
            EditorCommand::StopRecording => {
                self.capture.stop()?;
            }
            EditorCommand::SwitchCamera => {
                self.capture.switch_camera()?;
            }
            EditorCommand::ToggleFlash => match self.capture.toggle_flash() {
                Ok(_) => {}
                Err(CaptureError::FlashUnsupported) => {
                    self.notices.push(Notice::Error(EditorError::FlashUnsupported));
                }
                Err(e) => return Err(e.into()),
            },
            EditorCommand::SetPlaybackRate(rate) => {
                self.capture.set_playback_rate(rate)?;
            }

            // ── Countdown ────────────────────────────────────────────────────
            EditorCommand::ArmCountdown(secs) => {
                self.arm_countdown(secs)?;
            }
            EditorCommand::ArmCountdownPreset(preset) => {
                self.arm_countdown(preset.secs())?;
            }
            EditorCommand::ArmDefaultCountdown => {
                self.arm_countdown(self.config.default_countdown)?;
            }
            EditorCommand::CancelCountdown => {
                self.countdown.cancel();
            }

            // ── Timeline ─────────────────────────────────────────────────────
            EditorCommand::ImportFile(path) => {
                self.import_file(&path)?;
            }
            EditorCommand::DeleteSegment(id) => {
                self.edit(|c| c.delete(id))?;
            }
            EditorCommand::ReorderSegments(order) => {
                self.edit(|c| c.reorder(&order))?;
            }
            EditorCommand::MoveSegment { from, to } => {
                self.edit(|c| c.move_segment(from, to))?;
            }
            EditorCommand::TrimSegment { id, start, end } => {
                self.edit(|c| c.trim(id, start, end))?;
            }

            // ── Undo / Redo ──────────────────────────────────────────────────
            EditorCommand::Undo => {
                self.ensure_editable()?;
                self.store.undo();
            }
            EditorCommand::Redo => {
                self.ensure_editable()?;
                self.store.redo();
            }

            // ── Draft details ────────────────────────────────────────────────
            EditorCommand::SelectSong(song)      => self.details.selected_song = song,
            EditorCommand::SetSongRegion(region) => self.details.song_region = region,
            EditorCommand::SetMusicVolume(v)     => self.details.set_music_volume(v),
            EditorCommand::SetClipVolume(v)      => self.details.set_clip_volume(v),
            EditorCommand::SetCaption(text)      => self.details.caption = text,
            EditorCommand::SetPrivacy(p)         => self.details.privacy = p,

            // ── Persistence ──────────────────────────────────────────────────
            EditorCommand::SaveDraft => {
                self.save_draft()?;
            }
            EditorCommand::LoadDraft(id) => {
                self.load_draft(id)?;
            }
            EditorCommand::DeleteDraft(id) => {
                self.delete_draft(id)?;
            }

            // ── Export ───────────────────────────────────────────────────────
            EditorCommand::StartExport => {
                self.start_export()?;
            }
            EditorCommand::CancelExport => {
                self.cancel_export();
            }
            EditorCommand::Publish { title, description, category, cover_index } => {
                self.publish(PublishDetails { title, description, category }, cover_index)?;
            }
        }
        Ok(())
    }

    /// Advance session time by `dt` seconds.
    pub fn update(&mut self, dt: f64) {
        if self.closed {
            return;
        }
        if self.capture.tick(dt) {
            self.notices.push(Notice::BudgetReached);
        }
        self.ingest_capture();

        for event in self.countdown.tick(dt) {
            match event {
                CountdownEvent::Tick(n) => self.notices.push(Notice::CountdownTick(n)),
                CountdownEvent::Fire => {
                    if let Err(e) = self.start_recording() {
                        tracing::warn!("[session] countdown start refused: {e}");
                        self.notices.push(Notice::CommandFailed(e));
                    }
                }
            }
        }

        self.poll_export();
    }

    // ── Recording ─────────────────────────────────────────────────────────────

    fn ensure_can_record(&self) -> Result<(), SessionError> {
        if self.is_processing() {
            return Err(SessionError::Busy);
        }
        if !self.recording_enabled || !self.capture.is_ready() {
            return Err(CaptureError::NoStream.into());
        }
        match self.capture.state() {
            CaptureState::Idle              => {}
            CaptureState::Recording { .. }  => return Err(CaptureError::AlreadyRecording.into()),
            CaptureState::Finalizing { .. } => return Err(CaptureError::Finalizing.into()),
        }
        if self.remaining() <= snapreel_core::segment::DURATION_EPSILON {
            return Err(CaptureError::BudgetFull.into());
        }
        Ok(())
    }

    fn arm_countdown(&mut self, secs: u32) -> Result<(), SessionError> {
        self.ensure_can_record()?;
        self.countdown.arm(secs);
        tracing::debug!("[session] countdown armed for {secs}s");
        Ok(())
    }

    fn start_recording(&mut self) -> Result<u64, SessionError> {
        self.ensure_can_record()?;
        self.countdown.cancel();
        let take = self.capture.start(self.store.segments())?;
        self.notices.push(Notice::RecordingStarted { take });
        Ok(take)
    }

    fn ingest_capture(&mut self) {
        let mut committed = false;
        for outcome in self.capture.poll(&mut self.store, &self.blobs) {
            committed |= matches!(outcome, CaptureOutcome::Committed(_));
            let notice = match outcome {
                CaptureOutcome::Committed(seg)             => Notice::SegmentCommitted(seg.id),
                CaptureOutcome::Discarded { duration, .. } => Notice::TakeDiscarded { duration },
                CaptureOutcome::Rejected { error, .. }     => Notice::TakeRejected(error),
                CaptureOutcome::Failed { msg, .. }         => Notice::TakeFailed(msg),
            };
            self.notices.push(notice);
        }
        // A committed take clears the redo stack.
        if committed {
            self.collect_garbage();
        }
    }

    // ── Timeline edits ────────────────────────────────────────────────────────

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed { Err(SessionError::Closed) } else { Ok(()) }
    }

    fn ensure_editable(&self) -> Result<(), SessionError> {
        self.ensure_open()?;
        if self.is_processing() {
            return Err(SessionError::Busy);
        }
        match self.capture.state() {
            CaptureState::Idle              => Ok(()),
            CaptureState::Recording { .. }  => Err(CaptureError::AlreadyRecording.into()),
            CaptureState::Finalizing { .. } => Err(CaptureError::Finalizing.into()),
        }
    }

    fn edit<T>(
        &mut self,
        f: impl FnOnce(&mut Composer<'_>) -> Result<T, EditError>,
    ) -> Result<T, SessionError> {
        self.ensure_editable()?;
        let max = self.config.max_duration;
        let out = f(&mut Composer::new(&mut self.store, max))?;
        self.collect_garbage();
        Ok(out)
    }

    /// Drop pooled media no timeline snapshot refers to any more.
    fn collect_garbage(&mut self) {
        let referenced = self.store.referenced_media();
        if self.blobs.retain_referenced(&referenced) > 0 {
            self.uploaded.retain(|h, _| referenced.contains(h));
        }
    }

    /// Read, probe and append a file from disk. A file that cannot be decoded
    /// or does not fit the remaining budget leaves the timeline untouched.
    pub fn import_file(&mut self, path: &Path) -> Result<SegmentId, SessionError> {
        self.ensure_editable()?;
        let media = probe::import_file(path, self.probe.as_ref(), &self.blobs)?;

        let id = self.capture.issue_segment_id();
        let appended = Segment::new(id, media.duration, MediaRef::Local(media.handle))
            .map_err(SessionError::from)
            .and_then(|seg| self.edit(move |c| c.append(seg)));

        match appended {
            Ok(()) => {
                tracing::info!("[session] imported {} as {id}", path.display());
                Ok(id)
            }
            Err(e) => {
                self.blobs.release(media.handle);
                tracing::warn!("[session] import of {} refused: {e}", path.display());
                Err(e)
            }
        }
    }

    // ── Drafts ────────────────────────────────────────────────────────────────

    /// Timeline copy with every local segment replaced by its uploaded URL.
    fn remote_segments(&mut self) -> anyhow::Result<Vec<Segment>> {
        let mut out = Vec::with_capacity(self.store.segments().len());
        for seg in self.store.segments() {
            let mut seg = seg.clone();
            if let Some(handle) = seg.media.local_handle() {
                let url = match self.uploaded.get(&handle) {
                    Some(url) => url.clone(),
                    None => {
                        let bytes = self.blobs.get(handle)
                            .ok_or_else(|| anyhow!("media for segment {} is gone", seg.id))?;
                        let name = format!("{}-segment-{}.mp4", self.config.export_name, handle.0);
                        let url = self.gateways.uploader.upload(&name, &bytes, VIDEO_CONTENT_TYPE)?;
                        self.uploaded.insert(handle, url.clone());
                        url
                    }
                };
                seg.media = MediaRef::Remote(url);
            }
            out.push(seg);
        }
        Ok(out)
    }

    /// Persist the current session as a draft. Local media is uploaded first
    /// so the draft can be restored on another device. On failure nothing in
    /// the session changes and the user can retry.
    pub fn save_draft(&mut self) -> Result<Uuid, SessionError> {
        self.ensure_open()?;
        let save_failed = |e: anyhow::Error| {
            tracing::warn!("[session] draft save failed: {e:#}");
            SessionError::Editor(EditorError::DraftSaveFailed(format!("{e:#}")))
        };

        let segments   = self.remote_segments().map_err(save_failed)?;
        let id         = self.draft_id.unwrap_or_else(Uuid::new_v4);
        let created_at = self.draft_created_at.unwrap_or_else(now_millis);
        let draft      = Draft::from_session(id, created_at, &segments, &self.details)?;

        let stored = self.gateways.drafts.save(&self.user_id, &draft).map_err(save_failed)?;
        self.draft_id         = Some(stored.id);
        self.draft_created_at = Some(stored.created_at);
        tracing::info!("[session] draft {} saved ({} segment(s))", stored.id, segments.len());
        self.notices.push(Notice::DraftSaved(stored.id));
        Ok(stored.id)
    }

    /// Every draft stored for this user.
    pub fn list_drafts(&self) -> Result<Vec<Draft>, SessionError> {
        self.ensure_open()?;
        self.gateways.drafts.load_all(&self.user_id)
            .map_err(|e| EditorError::DraftLoadFailed(format!("{e:#}")).into())
    }

    /// Replace the session with a stored draft. The loaded timeline becomes
    /// the baseline: there is nothing to undo right after loading.
    pub fn load_draft(&mut self, id: Uuid) -> Result<(), SessionError> {
        self.ensure_editable()?;
        let draft = self.list_drafts()?
            .into_iter()
            .find(|d| d.id == id)
            .ok_or(SessionError::UnknownDraft(id))?;
        validate_draft(&draft, self.config.max_duration)?;

        self.countdown.cancel();
        self.store.update_without_history(draft.segments.clone());
        self.store.reset_history();
        self.capture.observe_segments(self.store.segments());
        self.details          = draft.details();
        self.draft_id         = Some(draft.id);
        self.draft_created_at = Some(draft.created_at);
        self.exported         = None;
        self.export_source.clear();
        self.collect_garbage();
        tracing::info!("[session] draft {id} loaded ({} segment(s))", draft.segments.len());
        Ok(())
    }

    pub fn delete_draft(&mut self, id: Uuid) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.gateways.drafts.delete(id, &self.user_id).map_err(|e| {
            tracing::warn!("[session] draft delete failed: {e:#}");
            EditorError::DraftSaveFailed(format!("{e:#}"))
        })?;
        if self.draft_id == Some(id) {
            self.draft_id         = None;
            self.draft_created_at = None;
        }
        Ok(())
    }

    // ── Export ────────────────────────────────────────────────────────────────

    /// Combine, upload and extract covers on the worker. Progress and the
    /// result arrive through `update` / `poll_export`.
    pub fn start_export(&mut self) -> Result<Uuid, SessionError> {
        self.ensure_editable()?;
        if self.store.is_empty() {
            return Err(EditorError::ExportFailed("timeline is empty".into()).into());
        }
        self.countdown.cancel();
        let job = build_job(
            &self.config, self.store.segments(), &self.blobs, &self.gateways, Arc::clone(&self.frames),
        );
        let job_id = self.worker.start_export(job);
        self.export_job    = Some(job_id);
        self.exported      = None;
        self.export_source = self.store.segments().to_vec();
        Ok(job_id)
    }

    /// Ask the running export to stop. Returns false when nothing is running.
    pub fn cancel_export(&mut self) -> bool {
        match self.export_job {
            Some(id) => {
                self.worker.cancel_export(id);
                true
            }
            None => false,
        }
    }

    /// Drain export results. Returns true when the current job settled.
    pub fn poll_export(&mut self) -> bool {
        let mut settled = false;
        while let Ok(result) = self.worker.rx.try_recv() {
            match result {
                ExportResult::Progress { job_id, stage, done, total } => {
                    if self.export_job == Some(job_id) {
                        self.notices.push(Notice::ExportProgress { stage, done, total });
                    }
                }
                ExportResult::Done { job_id, clip } => {
                    if self.export_job != Some(job_id) {
                        continue;
                    }
                    self.export_job = None;
                    settled = true;
                    tracing::info!("[session] export {job_id} ready: {} ({} cover(s))", clip.url, clip.covers.len());
                    self.notices.push(Notice::ExportReady { url: clip.url.clone(), covers: clip.covers.len() });
                    self.exported = Some(clip);
                }
                ExportResult::Error { job_id, msg } => {
                    if self.export_job != Some(job_id) {
                        continue;
                    }
                    self.export_job = None;
                    settled = true;
                    if msg == CANCELLED {
                        self.notices.push(Notice::ExportCancelled);
                    } else {
                        self.notices.push(Notice::Error(EditorError::ExportFailed(msg)));
                    }
                }
            }
        }
        settled
    }

    /// Upload the chosen cover frame and register the exported clip with the
    /// video catalogue. Returns the new video id.
    pub fn publish(&mut self, details: PublishDetails, cover_index: usize) -> Result<String, SessionError> {
        self.ensure_open()?;
        if self.is_processing() {
            return Err(SessionError::Busy);
        }
        let clip = self.exported().ok_or(SessionError::NothingToPublish)?;
        let available = clip.covers.len();
        if available > 0 && cover_index >= available {
            return Err(SessionError::InvalidCover { index: cover_index, available });
        }

        let publish_failed = |e: anyhow::Error| {
            tracing::warn!("[session] publish failed: {e:#}");
            SessionError::Editor(EditorError::ExportFailed(format!("{e:#}")))
        };
        let thumbnail_url = upload_cover(clip, cover_index, self.gateways.uploader.as_ref(), &self.config.export_name)
            .map_err(publish_failed)?;
        let meta = VideoMetadata {
            title:         details.title,
            description:   details.description,
            category:      details.category,
            video_url:     clip.url.clone(),
            thumbnail_url,
            user_id:       self.user_id.clone(),
            duration:      clip.duration,
        };
        let video_id = self.gateways.catalog.save_video(&meta).map_err(publish_failed)?;
        tracing::info!("[session] published {video_id}");
        self.notices.push(Notice::Published { video_id: video_id.clone() });
        Ok(video_id)
    }

    // ── Teardown ──────────────────────────────────────────────────────────────

    /// Stop everything and free the hardware and all session media. Safe to
    /// call more than once; `Drop` calls it too.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.countdown.cancel();
        self.capture.shutdown();
        if let Some(id) = self.export_job.take() {
            self.worker.cancel_export(id);
        }
        self.worker.shutdown();
        self.blobs.clear();
        self.uploaded.clear();
        self.recording_enabled = false;
        tracing::info!("[session] closed");
    }
}

impl Drop for EditorSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn validate_draft(draft: &Draft, max_duration: f64) -> Result<(), SessionError> {
    let invalid = |m: String| SessionError::Editor(EditorError::DraftLoadFailed(m));
    if let Some(bad) = draft.segments.iter().find(|s| !(s.duration.is_finite() && s.duration > 0.0)) {
        return Err(invalid(format!("segment {} has duration {}", bad.id, bad.duration)));
    }
    if let Some(bad) = draft.segments.iter().find(|s| !(s.source_offset.is_finite() && s.source_offset >= 0.0)) {
        return Err(invalid(format!("segment {} has source offset {}", bad.id, bad.source_offset)));
    }
    if !fits_budget(&draft.segments, 0.0, max_duration) {
        return Err(invalid(format!("draft is longer than {max_duration}s")));
    }
    let mut ids: Vec<SegmentId> = draft.segments.iter().map(|s| s.id).collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.len() != draft.segments.len() {
        return Err(invalid("draft repeats a segment id".into()));
    }
    Ok(())
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    use anyhow::{bail, Result};
    use crossbeam_channel::Sender;
    use parking_lot::Mutex;

    use snapreel_core::media_types::{RecorderEvent, StillFrame};
    use snapreel_core::{CountdownPreset, FacingMode};
    use snapreel_media::assemble::CompositeAsset;
    use snapreel_media::device::{DeviceError, DeviceInfo, DeviceKind, MediaStream};
    use snapreel_media::frames::FrameDecoder;

    use crate::gateways::{DraftStore, Uploader, VideoCatalog};

    // ── Fake hardware ─────────────────────────────────────────────────────────

    #[derive(Clone, Default)]
    struct Hardware {
        live:    Arc<Mutex<usize>>,
        pending: Arc<Mutex<Vec<(u64, Sender<RecorderEvent>)>>>,
        deny:    Arc<Mutex<bool>>,
        torch:   bool,
    }

    impl Hardware {
        fn flush(&self, bytes: &[u8]) {
            for (take, tx) in self.pending.lock().drain(..) {
                let _ = tx.send(RecorderEvent::Finished { take, bytes: bytes.to_vec() });
            }
        }
    }

    struct Camera(Hardware);

    struct Stream {
        hw:       Hardware,
        facing:   FacingMode,
        live:     bool,
        recorder: Option<(u64, Sender<RecorderEvent>)>,
    }

    impl MediaStream for Stream {
        fn id(&self) -> String { format!("test-{:?}", self.facing) }
        fn facing(&self) -> FacingMode { self.facing }
        fn has_torch(&self) -> bool { self.hw.torch }
        fn set_torch(&mut self, _on: bool) -> Result<()> { Ok(()) }
        fn start_recording(&mut self, take: u64, events: Sender<RecorderEvent>) -> Result<()> {
            self.recorder = Some((take, events));
            Ok(())
        }
        fn stop_recording(&mut self) {
            if let Some(r) = self.recorder.take() {
                self.hw.pending.lock().push(r);
            }
        }
        fn stop_tracks(&mut self) {
            if self.live {
                self.live = false;
                *self.hw.live.lock() -= 1;
            }
        }
        fn tracks_live(&self) -> bool { self.live }
    }

    impl CaptureDevice for Camera {
        fn enumerate(&self) -> Result<Vec<DeviceInfo>, DeviceError> {
            if *self.0.deny.lock() {
                return Err(DeviceError::PermissionDenied("blocked in settings".into()));
            }
            Ok(vec![DeviceInfo {
                id:     "cam0".into(),
                label:  "Front".into(),
                kind:   DeviceKind::Camera,
                facing: Some(FacingMode::User),
            }])
        }

        fn acquire(&mut self, facing: FacingMode) -> Result<Box<dyn MediaStream>, DeviceError> {
            *self.0.live.lock() += 1;
            Ok(Box::new(Stream { hw: self.0.clone(), facing, live: true, recorder: None }))
        }
    }

    // ── Fake gateways ─────────────────────────────────────────────────────────

    #[derive(Default)]
    struct Cdn {
        uploads: Mutex<Vec<(String, usize, String)>>,
        fail:    Mutex<bool>,
    }

    impl Uploader for Cdn {
        fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<String> {
            if *self.fail.lock() {
                bail!("503 from storage");
            }
            self.uploads.lock().push((name.into(), bytes.len(), content_type.into()));
            Ok(format!("https://cdn.test/{name}"))
        }
    }

    #[derive(Default)]
    struct Drafts {
        rows: Mutex<Vec<(String, Draft)>>,
        fail: Mutex<bool>,
    }

    impl DraftStore for Drafts {
        fn save(&self, user_id: &str, draft: &Draft) -> Result<Draft> {
            if *self.fail.lock() {
                bail!("database offline");
            }
            let mut rows = self.rows.lock();
            rows.retain(|(_, d)| d.id != draft.id);
            rows.push((user_id.into(), draft.clone()));
            Ok(draft.clone())
        }

        fn load_all(&self, user_id: &str) -> Result<Vec<Draft>> {
            Ok(self.rows.lock().iter().filter(|(u, _)| u == user_id).map(|(_, d)| d.clone()).collect())
        }

        fn delete(&self, draft_id: Uuid, user_id: &str) -> Result<()> {
            self.rows.lock().retain(|(u, d)| !(u == user_id && d.id == draft_id));
            Ok(())
        }
    }

    #[derive(Default)]
    struct Catalog {
        saved: Mutex<Vec<VideoMetadata>>,
    }

    impl VideoCatalog for Catalog {
        fn save_video(&self, meta: &VideoMetadata) -> Result<String> {
            let mut saved = self.saved.lock();
            saved.push(meta.clone());
            Ok(format!("vid-{}", saved.len()))
        }
    }

    struct FixedProbe(f64);

    impl MediaProbe for FixedProbe {
        fn probe_duration(&self, _bytes: &[u8]) -> Result<f64> { Ok(self.0) }
    }

    struct Gray;

    struct GrayDecoder;

    impl FrameDecoder for GrayDecoder {
        fn decode_at(&mut self, timestamp: f64) -> Result<StillFrame> {
            Ok(StillFrame { timestamp, width: 2, height: 2, data: vec![128; 16] })
        }
    }

    impl FrameSource for Gray {
        fn open(&self, _asset: &CompositeAsset) -> Result<Box<dyn FrameDecoder + Send>> {
            Ok(Box::new(GrayDecoder))
        }
    }

    // ── Harness ───────────────────────────────────────────────────────────────

    struct Rig {
        hw:      Hardware,
        cdn:     Arc<Cdn>,
        drafts:  Arc<Drafts>,
        catalog: Arc<Catalog>,
    }

    fn rig_with(hw: Hardware) -> (EditorSession, Rig) {
        rig_config(EditorConfig::default(), hw)
    }

    fn rig_config(config: EditorConfig, hw: Hardware) -> (EditorSession, Rig) {
        let cdn     = Arc::new(Cdn::default());
        let drafts  = Arc::new(Drafts::default());
        let catalog = Arc::new(Catalog::default());
        let gateways = Gateways::new(drafts.clone(), cdn.clone(), catalog.clone());
        let session = EditorSession::open(config, "user-1", Box::new(Camera(hw.clone())), gateways)
            .with_probe(Arc::new(FixedProbe(5.0)))
            .with_frame_source(Arc::new(Gray));
        (session, Rig { hw, cdn, drafts, catalog })
    }

    fn rig() -> (EditorSession, Rig) {
        rig_with(Hardware::default())
    }

    fn clip_file() -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[1u8; 32]).unwrap();
        f
    }

    fn record(s: &mut EditorSession, hw: &Hardware, secs: f64) {
        s.process_command(EditorCommand::StartRecording).unwrap();
        s.update(secs);
        if s.capture().is_recording() {
            s.process_command(EditorCommand::StopRecording).unwrap();
        }
        hw.flush(b"take-bytes");
        s.update(0.0);
    }

    fn wait_export(s: &mut EditorSession) {
        for _ in 0..500 {
            s.update(0.0);
            if !s.is_processing() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("export never settled");
    }

    // ── Tests ─────────────────────────────────────────────────────────────────

    #[test]
    fn denied_camera_opens_with_recording_disabled() {
        let hw = Hardware::default();
        *hw.deny.lock() = true;
        let (mut s, _rig) = rig_with(hw);

        assert!(!s.recording_enabled());
        assert!(matches!(&s.take_notices()[..], [Notice::Error(EditorError::CameraAccessDenied(_))]));
        assert!(s.process_command(EditorCommand::StartRecording).is_err());
        assert!(s.process_command(EditorCommand::ArmCountdown(3)).is_err());

        // Imports still work without a camera.
        let f = clip_file();
        s.process_command(EditorCommand::ImportFile(f.path().into())).unwrap();
        assert_eq!(s.segments().len(), 1);
    }

    #[test]
    fn retry_camera_recovers_after_permission_granted() {
        let hw = Hardware::default();
        *hw.deny.lock() = true;
        let (mut s, rig) = rig_with(hw);
        *rig.hw.deny.lock() = false;
        s.retry_camera().unwrap();
        assert!(s.recording_enabled());
    }

    #[test]
    fn recorded_take_lands_on_timeline() {
        let (mut s, rig) = rig();
        record(&mut s, &rig.hw, 2.0);

        assert_eq!(s.segments().len(), 1);
        assert_eq!(s.segments()[0].duration, 2.0);
        assert_eq!(s.blobs().len(), 1);
        let notices = s.take_notices();
        assert!(notices.iter().any(|n| matches!(n, Notice::SegmentCommitted(_))));
    }

    #[test]
    fn countdown_starts_recording_on_fire() {
        let (mut s, _rig) = rig();
        s.process_command(EditorCommand::ArmCountdown(3)).unwrap();
        s.update(1.0);
        s.update(1.0);
        assert!(!s.capture().is_recording());
        s.update(1.0);
        assert!(s.capture().is_recording());

        let notices = s.take_notices();
        assert_eq!(notices, vec![
            Notice::CountdownTick(2),
            Notice::CountdownTick(1),
            Notice::RecordingStarted { take: 1 },
        ]);
    }

    #[test]
    fn default_countdown_comes_from_config() {
        let config = EditorConfig { default_countdown: 10, ..EditorConfig::default() };
        let (mut s, _rig) = rig_config(config, Hardware::default());
        s.process_command(EditorCommand::ArmDefaultCountdown).unwrap();
        assert_eq!(s.countdown().display_secs(), Some(10));

        s.update(9.0);
        assert!(!s.capture().is_recording());
        s.update(1.0);
        assert!(s.capture().is_recording());
    }

    #[test]
    fn countdown_preset_arms_its_seconds() {
        let (mut s, _rig) = rig();
        s.process_command(EditorCommand::ArmCountdownPreset(CountdownPreset::Ten)).unwrap();
        assert_eq!(s.countdown().display_secs(), Some(10));
        s.process_command(EditorCommand::ArmCountdownPreset(CountdownPreset::Three)).unwrap();
        assert_eq!(s.countdown().display_secs(), Some(3));
    }

    #[test]
    fn cancelled_countdown_never_records() {
        let (mut s, _rig) = rig();
        s.process_command(EditorCommand::ArmCountdown(3)).unwrap();
        s.update(1.5);
        s.process_command(EditorCommand::CancelCountdown).unwrap();
        s.update(5.0);
        assert!(!s.capture().is_recording());
    }

    #[test]
    fn budget_auto_stop_is_a_notice_not_an_error() {
        let (mut s, rig) = rig();
        s.process_command(EditorCommand::StartRecording).unwrap();
        s.update(61.0);
        assert!(s.take_notices().contains(&Notice::BudgetReached));
        rig.hw.flush(b"x");
        s.update(0.0);
        assert_eq!(s.store().total_duration(), 60.0);
        assert!(matches!(
            s.process_command(EditorCommand::StartRecording),
            Err(SessionError::Capture(CaptureError::BudgetFull))
        ));
    }

    #[test]
    fn timeline_edits_refused_while_recording() {
        let (mut s, rig) = rig();
        record(&mut s, &rig.hw, 2.0);
        s.process_command(EditorCommand::StartRecording).unwrap();
        assert!(matches!(
            s.process_command(EditorCommand::Undo),
            Err(SessionError::Capture(CaptureError::AlreadyRecording))
        ));
    }

    #[test]
    fn flash_unsupported_is_a_no_op_with_notice() {
        let (mut s, _rig) = rig();
        s.take_notices();
        s.process_command(EditorCommand::ToggleFlash).unwrap();
        assert_eq!(s.take_notices(), vec![Notice::Error(EditorError::FlashUnsupported)]);
        assert!(!s.capture().flash_on());
    }

    #[test]
    fn import_over_budget_leaves_session_untouched() {
        let (s, _rig) = rig();
        let mut s = s.with_probe(Arc::new(FixedProbe(75.0)));
        let f = clip_file();
        let err = s.process_command(EditorCommand::ImportFile(f.path().into())).unwrap_err();
        assert!(matches!(err, SessionError::Edit(EditError::BudgetExceeded { .. })));
        assert!(s.segments().is_empty());
        assert!(s.blobs().is_empty());
        assert!(!s.store().can_undo());
    }

    #[test]
    fn media_released_once_no_snapshot_references_it() {
        let (mut s, _rig) = rig();
        let (a, b) = (clip_file(), clip_file());

        s.process_command(EditorCommand::ImportFile(a.path().into())).unwrap();
        s.process_command(EditorCommand::Undo).unwrap();
        // Still reachable through redo.
        assert_eq!(s.blobs().len(), 1);

        s.process_command(EditorCommand::ImportFile(b.path().into())).unwrap();
        // New edit cleared the redo stack; the first import is gone for good.
        assert_eq!(s.blobs().len(), 1);
        assert!(!s.store().can_redo());
    }

    #[test]
    fn delete_then_undo_restores_segment_and_media() {
        let (mut s, _rig) = rig();
        let f = clip_file();
        let id = s.import_file(f.path()).unwrap();
        s.process_command(EditorCommand::DeleteSegment(id)).unwrap();
        assert!(s.segments().is_empty());
        s.process_command(EditorCommand::Undo).unwrap();
        assert_eq!(s.segments()[0].id, id);
        assert!(s.blobs().contains(s.segments()[0].media.local_handle().unwrap()));
    }

    #[test]
    fn export_then_publish() {
        let (mut s, rig) = rig();
        record(&mut s, &rig.hw, 2.0);
        record(&mut s, &rig.hw, 3.0);

        s.process_command(EditorCommand::StartExport).unwrap();
        assert!(s.is_processing());
        assert_eq!(s.process_command(EditorCommand::Undo), Err(SessionError::Busy));
        assert_eq!(s.process_command(EditorCommand::StartExport), Err(SessionError::Busy));

        wait_export(&mut s);
        let clip = s.exported().expect("export finished").clone();
        assert_eq!(clip.duration, 5.0);
        assert_eq!(clip.frames.len(), EditorConfig::default().cover_frames);
        assert_eq!(clip.covers.len(), clip.frames.len());

        let details = PublishDetails { title: "Beach".into(), description: "day one".into(), category: "travel".into() };
        let video_id = s.publish(details, 2).unwrap();
        assert_eq!(video_id, "vid-1");

        let saved = rig.catalog.saved.lock();
        assert_eq!(saved[0].video_url, clip.url);
        assert_eq!(saved[0].user_id, "user-1");
        assert!(saved[0].thumbnail_url.as_deref().is_some_and(|u| u.ends_with(".png")));

        let uploads = rig.cdn.uploads.lock();
        assert_eq!(uploads.iter().filter(|u| u.2 == "image/png").count(), 1);
        assert_eq!(uploads.iter().filter(|u| u.2 == "video/mp4").count(), 1);
    }

    #[test]
    fn edited_timeline_cannot_publish_old_export() {
        let (mut s, rig) = rig();
        record(&mut s, &rig.hw, 2.0);
        record(&mut s, &rig.hw, 3.0);
        s.process_command(EditorCommand::StartExport).unwrap();
        wait_export(&mut s);
        assert!(s.exported().is_some());

        s.process_command(EditorCommand::DeleteSegment(s.segments()[0].id)).unwrap();
        assert!(s.exported().is_none());
        assert_eq!(s.publish(PublishDetails::default(), 0), Err(SessionError::NothingToPublish));
        assert!(rig.catalog.saved.lock().is_empty());

        // Back to the exported timeline, the clip matches again.
        s.process_command(EditorCommand::Undo).unwrap();
        assert_eq!(s.exported().map(|c| c.duration), Some(5.0));
    }

    #[test]
    fn new_take_after_export_makes_it_stale() {
        let (mut s, rig) = rig();
        record(&mut s, &rig.hw, 2.0);
        s.process_command(EditorCommand::StartExport).unwrap();
        wait_export(&mut s);

        record(&mut s, &rig.hw, 1.0);
        assert_eq!(s.segments().len(), 2);
        assert!(s.exported().is_none());
        assert_eq!(s.publish(PublishDetails::default(), 0), Err(SessionError::NothingToPublish));
    }

    #[test]
    fn failed_export_clears_processing_and_keeps_timeline() {
        let (mut s, rig) = rig();
        record(&mut s, &rig.hw, 2.0);
        *rig.cdn.fail.lock() = true;

        s.process_command(EditorCommand::StartExport).unwrap();
        wait_export(&mut s);

        assert!(s.take_notices().iter().any(|n| matches!(n, Notice::Error(EditorError::ExportFailed(_)))));
        assert_eq!(s.segments().len(), 1);
        assert!(s.exported().is_none());
        s.process_command(EditorCommand::DeleteSegment(s.segments()[0].id)).unwrap();
    }

    #[test]
    fn empty_timeline_cannot_export_or_publish() {
        let (mut s, _rig) = rig();
        assert!(matches!(
            s.process_command(EditorCommand::StartExport),
            Err(SessionError::Editor(EditorError::ExportFailed(_)))
        ));
        assert_eq!(s.publish(PublishDetails::default(), 0), Err(SessionError::NothingToPublish));
        let cmd = EditorCommand::Publish {
            title:       "t".into(),
            description: String::new(),
            category:    String::new(),
            cover_index: 0,
        };
        assert_eq!(s.process_command(cmd), Err(SessionError::NothingToPublish));
    }

    #[test]
    fn draft_round_trip_uploads_local_media_once() {
        let (mut s, rig) = rig();
        record(&mut s, &rig.hw, 2.0);
        s.process_command(EditorCommand::SetCaption("first try".into())).unwrap();
        s.process_command(EditorCommand::SetMusicVolume(3.0)).unwrap();

        let id = s.save_draft().unwrap();
        s.save_draft().unwrap();
        assert_eq!(rig.cdn.uploads.lock().len(), 1);

        let stored = rig.drafts.load_all("user-1").unwrap();
        assert_eq!(stored.len(), 1);
        assert!(matches!(stored[0].segments[0].media, MediaRef::Remote(_)));
        assert_eq!(stored[0].music_volume, 1.0);

        // The live session keeps its local media.
        assert!(s.segments()[0].media.is_local());

        let (mut other, _other_rig) = rig_with(Hardware::default());
        let shared: Arc<dyn DraftStore> = rig.drafts.clone();
        other.gateways.drafts = shared;
        other.process_command(EditorCommand::LoadDraft(id)).unwrap();
        assert_eq!(other.segments().len(), 1);
        assert_eq!(other.details().caption, "first try");
        assert!(!other.store().can_undo());
        assert_eq!(other.draft_id(), Some(id));
    }

    #[test]
    fn draft_save_failure_keeps_work() {
        let (mut s, rig) = rig();
        record(&mut s, &rig.hw, 2.0);
        s.process_command(EditorCommand::DeleteSegment(s.segments()[0].id)).unwrap();
        s.process_command(EditorCommand::Undo).unwrap();
        *rig.drafts.fail.lock() = true;

        let err = s.save_draft().unwrap_err();
        assert!(matches!(err, SessionError::Editor(EditorError::DraftSaveFailed(_))));
        assert_eq!(s.segments().len(), 1);
        assert!(s.store().can_undo());
        assert!(s.store().can_redo());
        assert_eq!(s.draft_id(), None);
    }

    #[test]
    fn draft_with_bad_source_offset_is_refused() {
        let (mut s, rig) = rig();
        record(&mut s, &rig.hw, 2.0);
        let id = s.save_draft().unwrap();

        for offset in [-1.0, f64::NAN] {
            rig.drafts.rows.lock()[0].1.segments[0].source_offset = offset;
            let (mut other, _other_rig) = rig_with(Hardware::default());
            let shared: Arc<dyn DraftStore> = rig.drafts.clone();
            other.gateways.drafts = shared;
            assert!(matches!(
                other.load_draft(id),
                Err(SessionError::Editor(EditorError::DraftLoadFailed(_)))
            ));
            assert!(other.segments().is_empty());
        }
    }

    #[test]
    fn loading_unknown_draft_fails() {
        let (mut s, _rig) = rig();
        let id = Uuid::new_v4();
        assert_eq!(s.load_draft(id), Err(SessionError::UnknownDraft(id)));
    }

    #[test]
    fn delete_draft_forgets_current_id() {
        let (mut s, _rig) = rig();
        let id = s.save_draft().unwrap();
        s.process_command(EditorCommand::DeleteDraft(id)).unwrap();
        assert_eq!(s.draft_id(), None);
        assert!(s.list_drafts().unwrap().is_empty());
    }

    #[test]
    fn close_releases_camera_and_media() {
        let (mut s, rig) = rig();
        record(&mut s, &rig.hw, 2.0);
        assert_eq!(*rig.hw.live.lock(), 1);

        s.close();
        assert_eq!(*rig.hw.live.lock(), 0);
        assert!(s.blobs().is_empty());
        assert_eq!(s.process_command(EditorCommand::Undo), Err(SessionError::Closed));
        s.close();
    }

    #[test]
    fn drop_releases_camera() {
        let (s, rig) = rig();
        assert_eq!(*rig.hw.live.lock(), 1);
        drop(s);
        assert_eq!(*rig.hw.live.lock(), 0);
    }
}
