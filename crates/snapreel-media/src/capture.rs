// crates/snapreel-media/src/capture.rs
//
// CaptureController: turns the live camera stream into discrete segments.
//
// State machine:
//
//   Idle ──start()──▶ Recording ──stop() / budget reached──▶ Finalizing
//    ▲                                                          │
//    └──────────── poll() receives RecorderEvent for the take ──┘
//
// `stop()` only asks the platform recorder to stop; the bytes arrive later on
// the recorder channel. `poll()` drains that channel and commits the segment
// into the store. Until then the controller sits in `Finalizing` and refuses
// a new `start()`, so takes are always appended in the order they were shot.
//
// Duration accounting:
//   elapsed   wall-clock seconds accumulated by `tick(dt)` while recording
//   duration  elapsed / playback_rate, clamped to the budget that remained
//             when the take started
// Reaching the budget stops the take automatically. That is a clamp, not an
// error; the committed segment fills the timeline exactly.
//
// Hardware discipline:
//   Exactly one stream is held at a time. Every path that needs a different
//   stream (initialize again, switch_camera, shutdown) stops and drops the
//   old stream's tracks before asking the device for a new one.

use crossbeam_channel::{unbounded, Receiver, Sender};

use snapreel_core::media_types::RecorderEvent;
use snapreel_core::segment::{remaining_budget, DURATION_EPSILON};
use snapreel_core::{
    Composer, EditError, EditorConfig, EditorError, FacingMode, MediaRef, Segment, SegmentId,
    SegmentIdGen, SegmentStore,
};

use crate::blob::BlobPool;
use crate::device::{camera_count, CaptureDevice, DeviceError, DeviceInfo, MediaStream};

/// Highest capture speed multiplier accepted by `set_playback_rate`.
pub const MAX_PLAYBACK_RATE: f64 = 4.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CaptureState {
    Idle,
    Recording  { take: u64, rate: f64 },
    /// Recorder asked to stop; waiting for its bytes.
    Finalizing { take: u64, duration: f64 },
}

#[derive(Clone, Debug, PartialEq)]
pub enum CaptureError {
    /// Permission refused or no camera present.
    AccessDenied(String),
    /// No stream acquired (initialize failed or was never called).
    NoStream,
    AlreadyRecording,
    /// Previous take is still being flushed.
    Finalizing,
    /// Timeline already holds the full duration budget.
    BudgetFull,
    NotRecording,
    FlashUnsupported,
    InvalidRate(f64),
    Device(String),
}

impl CaptureError {
    /// The user-visible condition this maps to, if any.
    pub fn to_editor_error(&self) -> Option<EditorError> {
        match self {
            CaptureError::AccessDenied(m)  => Some(EditorError::CameraAccessDenied(m.clone())),
            CaptureError::FlashUnsupported => Some(EditorError::FlashUnsupported),
            _ => None,
        }
    }
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::AccessDenied(m)  => write!(f, "camera access denied: {m}"),
            CaptureError::NoStream         => write!(f, "camera is not available"),
            CaptureError::AlreadyRecording => write!(f, "already recording"),
            CaptureError::Finalizing       => write!(f, "previous clip is still being saved"),
            CaptureError::BudgetFull       => write!(f, "maximum clip length reached"),
            CaptureError::NotRecording     => write!(f, "not recording"),
            CaptureError::FlashUnsupported => write!(f, "flash is not supported on this camera"),
            CaptureError::InvalidRate(r)   => write!(f, "unsupported speed {r}x"),
            CaptureError::Device(m)        => write!(f, "camera error: {m}"),
        }
    }
}

impl std::error::Error for CaptureError {}

fn device_error(e: DeviceError) -> CaptureError {
    match e {
        DeviceError::PermissionDenied(m) => CaptureError::AccessDenied(m),
        DeviceError::NotFound            => CaptureError::AccessDenied("no camera found".into()),
        DeviceError::Other(m)            => CaptureError::Device(m),
    }
}

/// What happened to a take once the recorder finished with it.
#[derive(Clone, Debug, PartialEq)]
pub enum CaptureOutcome {
    Committed(Segment),
    /// Shorter than the minimum take length; bytes dropped.
    Discarded { take: u64, duration: f64 },
    /// The store refused the append (budget consumed while finalizing).
    Rejected  { take: u64, error: EditError },
    /// The platform recorder failed; nothing was captured.
    Failed    { take: u64, msg: String },
}

pub struct CaptureController {
    device:           Box<dyn CaptureDevice>,
    stream:           Option<Box<dyn MediaStream>>,
    devices:          Vec<DeviceInfo>,
    facing:           FacingMode,
    /// Applied to the next take; the running take keeps the rate it started with.
    playback_rate:    f64,
    flash_on:         bool,
    state:            CaptureState,
    elapsed:          f64,
    /// Seconds of budget left when the running take started.
    budget:           f64,
    next_take:        u64,
    max_duration:     f64,
    min_segment_secs: f64,
    ids:              SegmentIdGen,
    events_tx:        Sender<RecorderEvent>,
    events_rx:        Receiver<RecorderEvent>,
}

impl CaptureController {
    pub fn new(device: Box<dyn CaptureDevice>, config: &EditorConfig) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            device,
            stream:           None,
            devices:          Vec::new(),
            facing:           config.default_facing,
            playback_rate:    1.0,
            flash_on:         false,
            state:            CaptureState::Idle,
            elapsed:          0.0,
            budget:           0.0,
            next_take:        1,
            max_duration:     config.max_duration,
            min_segment_secs: config.min_segment_secs,
            ids:              SegmentIdGen::new(),
            events_tx,
            events_rx,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn state(&self) -> CaptureState { self.state }

    pub fn is_recording(&self) -> bool { matches!(self.state, CaptureState::Recording { .. }) }

    pub fn is_ready(&self) -> bool { self.stream.is_some() }

    pub fn facing(&self) -> FacingMode { self.facing }

    pub fn playback_rate(&self) -> f64 { self.playback_rate }

    pub fn flash_on(&self) -> bool { self.flash_on }

    pub fn devices(&self) -> &[DeviceInfo] { &self.devices }

    /// Wall-clock seconds of the running take.
    pub fn elapsed(&self) -> f64 { self.elapsed }

    /// Logical seconds the running take would commit if stopped now.
    pub fn pending_duration(&self) -> f64 {
        match self.state {
            CaptureState::Recording { rate, .. }      => (self.elapsed / rate).min(self.budget),
            CaptureState::Finalizing { duration, .. } => duration,
            CaptureState::Idle                        => 0.0,
        }
    }

    /// Keep issued segment ids ahead of ids that arrived from elsewhere (drafts).
    pub fn observe_segments(&mut self, segments: &[Segment]) {
        for s in segments {
            self.ids.observe(s.id);
        }
    }

    /// Id for a segment created outside the recorder (file import). Shares the
    /// take sequence so imported and captured ids never collide.
    pub fn issue_segment_id(&mut self) -> SegmentId {
        self.ids.next()
    }

    // ── Stream lifecycle ──────────────────────────────────────────────────────

    /// Acquire a stream for `facing` and refresh the device list.
    pub fn initialize(&mut self, facing: FacingMode) -> Result<(), CaptureError> {
        self.ensure_idle()?;
        self.release_stream();

        self.devices = self.device.enumerate().map_err(device_error)?;
        if camera_count(&self.devices) == 0 {
            tracing::warn!("[capture] no camera among {} device(s)", self.devices.len());
            return Err(CaptureError::AccessDenied("no camera found".into()));
        }

        let stream = self.device.acquire(facing).map_err(device_error)?;
        tracing::info!("[capture] stream {} acquired ({facing:?})", stream.id());
        self.stream   = Some(stream);
        self.facing   = facing;
        self.flash_on = false;
        Ok(())
    }

    /// Flip between front and back cameras.
    ///
    /// The old stream is fully stopped and dropped before the new one is
    /// requested. If the new camera cannot be opened the previous facing is
    /// re-acquired so the user is not left without a preview.
    pub fn switch_camera(&mut self) -> Result<FacingMode, CaptureError> {
        self.ensure_idle()?;
        if self.stream.is_none() {
            return Err(CaptureError::NoStream);
        }
        let previous = self.facing;
        let next     = previous.flipped();

        self.release_stream();
        self.flash_on = false;

        match self.device.acquire(next) {
            Ok(stream) => {
                tracing::info!("[capture] switched to {next:?} ({})", stream.id());
                self.stream = Some(stream);
                self.facing = next;
                Ok(next)
            }
            Err(e) => {
                tracing::warn!("[capture] switch to {next:?} failed: {e}");
                match self.device.acquire(previous) {
                    Ok(stream) => self.stream = Some(stream),
                    Err(e2)    => tracing::warn!("[capture] could not restore {previous:?}: {e2}"),
                }
                Err(device_error(e))
            }
        }
    }

    /// Stop any take and release the hardware. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        if let CaptureState::Recording { .. } = self.state {
            if let Some(s) = self.stream.as_mut() {
                s.stop_recording();
            }
        }
        self.state   = CaptureState::Idle;
        self.elapsed = 0.0;
        self.release_stream();
    }

    fn release_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop_tracks();
            debug_assert!(!stream.tracks_live(), "stream tracks still live after stop_tracks");
            tracing::debug!("[capture] stream {} released", stream.id());
        }
    }

    fn ensure_idle(&self) -> Result<(), CaptureError> {
        match self.state {
            CaptureState::Idle              => Ok(()),
            CaptureState::Recording { .. }  => Err(CaptureError::AlreadyRecording),
            CaptureState::Finalizing { .. } => Err(CaptureError::Finalizing),
        }
    }

    // ── Controls ──────────────────────────────────────────────────────────────

    /// Toggle the torch. Returns the new flash state.
    pub fn toggle_flash(&mut self) -> Result<bool, CaptureError> {
        let stream = self.stream.as_mut().ok_or(CaptureError::NoStream)?;
        if !stream.has_torch() {
            return Err(CaptureError::FlashUnsupported);
        }
        let on = !self.flash_on;
        stream.set_torch(on).map_err(|e| {
            tracing::warn!("[capture] torch control failed: {e}");
            CaptureError::FlashUnsupported
        })?;
        self.flash_on = on;
        Ok(on)
    }

    /// Speed multiplier for subsequent takes, `(0, MAX_PLAYBACK_RATE]`.
    pub fn set_playback_rate(&mut self, rate: f64) -> Result<(), CaptureError> {
        if !(rate.is_finite() && rate > 0.0 && rate <= MAX_PLAYBACK_RATE) {
            return Err(CaptureError::InvalidRate(rate));
        }
        self.playback_rate = rate;
        Ok(())
    }

    // ── Recording ─────────────────────────────────────────────────────────────

    /// Begin a take. `timeline` is the committed timeline, used for the budget.
    pub fn start(&mut self, timeline: &[Segment]) -> Result<u64, CaptureError> {
        self.ensure_idle()?;
        let budget = remaining_budget(timeline, self.max_duration);
        if budget <= DURATION_EPSILON {
            return Err(CaptureError::BudgetFull);
        }
        let stream = self.stream.as_mut().ok_or(CaptureError::NoStream)?;

        let take = self.next_take;
        stream.start_recording(take, self.events_tx.clone())
            .map_err(|e| CaptureError::Device(e.to_string()))?;

        self.next_take += 1;
        self.elapsed    = 0.0;
        self.budget     = budget;
        self.state      = CaptureState::Recording { take, rate: self.playback_rate };
        tracing::info!("[capture] take {take} started ({:.1}s budget, {}x)", budget, self.playback_rate);
        Ok(take)
    }

    /// Stop the running take. Returns the duration that will be committed once
    /// the recorder delivers its bytes.
    pub fn stop(&mut self) -> Result<f64, CaptureError> {
        let CaptureState::Recording { take, rate } = self.state else {
            return Err(CaptureError::NotRecording);
        };
        let duration = (self.elapsed / rate).min(self.budget);
        if let Some(s) = self.stream.as_mut() {
            s.stop_recording();
        }
        self.state = CaptureState::Finalizing { take, duration };
        tracing::info!("[capture] take {take} stopping at {duration:.2}s");
        Ok(duration)
    }

    /// Advance the elapsed accumulator by `dt` seconds. Returns `true` when
    /// this tick hit the budget and stopped the take.
    pub fn tick(&mut self, dt: f64) -> bool {
        let CaptureState::Recording { rate, .. } = self.state else { return false };
        self.elapsed += dt.max(0.0);
        if self.elapsed / rate + DURATION_EPSILON >= self.budget {
            tracing::info!("[capture] duration budget reached, auto-stopping");
            return self.stop().is_ok();
        }
        false
    }

    /// Drain recorder completions and commit finished takes into `store`.
    pub fn poll(&mut self, store: &mut SegmentStore, pool: &BlobPool) -> Vec<CaptureOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                RecorderEvent::Finished { take, bytes } => {
                    let CaptureState::Finalizing { take: pending, duration } = self.state else {
                        tracing::warn!("[capture] data for take {take} arrived while not finalizing");
                        continue;
                    };
                    if pending != take {
                        tracing::warn!("[capture] stale data for take {take} (expecting {pending})");
                        continue;
                    }
                    self.state   = CaptureState::Idle;
                    self.elapsed = 0.0;
                    outcomes.push(self.commit(take, duration, bytes, store, pool));
                }
                RecorderEvent::Failed { take, msg } => {
                    let matches = match self.state {
                        CaptureState::Recording  { take: t, .. } => t == take,
                        CaptureState::Finalizing { take: t, .. } => t == take,
                        CaptureState::Idle => false,
                    };
                    if !matches {
                        continue;
                    }
                    tracing::warn!("[capture] take {take} failed: {msg}");
                    self.state   = CaptureState::Idle;
                    self.elapsed = 0.0;
                    outcomes.push(CaptureOutcome::Failed { take, msg });
                }
            }
        }
        outcomes
    }

    fn commit(
        &mut self,
        take:     u64,
        duration: f64,
        bytes:    Vec<u8>,
        store:    &mut SegmentStore,
        pool:     &BlobPool,
    ) -> CaptureOutcome {
        if duration < self.min_segment_secs {
            tracing::info!("[capture] take {take} discarded ({duration:.2}s is too short)");
            return CaptureOutcome::Discarded { take, duration };
        }

        let handle = pool.insert(bytes);
        let segment = match Segment::new(self.ids.next(), duration, MediaRef::Local(handle)) {
            Ok(s)  => s,
            Err(_) => {
                pool.release(handle);
                return CaptureOutcome::Discarded { take, duration };
            }
        };

        match Composer::new(store, self.max_duration).append(segment.clone()) {
            Ok(()) => {
                tracing::info!("[capture] take {take} committed as {} ({duration:.2}s)", segment.id);
                CaptureOutcome::Committed(segment)
            }
            Err(error) => {
                pool.release(handle);
                tracing::warn!("[capture] take {take} rejected: {error}");
                CaptureOutcome::Rejected { take, error }
            }
        }
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
