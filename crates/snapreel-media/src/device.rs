// crates/snapreel-media/src/device.rs
//
// Seam between the capture controller and the platform camera/microphone API.
//
// The platform owns the real hardware; snapreel only ever talks to it through
// these two traits. A `MediaStream` is one acquired camera+mic stream. Its
// recorder reports completion asynchronously over a crossbeam channel so the
// controller's `stop()` can return immediately while the bytes are flushed.

use crossbeam_channel::Sender;

use snapreel_core::media_types::RecorderEvent;
use snapreel_core::FacingMode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceKind {
    Camera,
    Microphone,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeviceInfo {
    pub id:     String,
    pub label:  String,
    pub kind:   DeviceKind,
    /// Known facing for cameras; `None` for microphones and unlabelled webcams.
    pub facing: Option<FacingMode>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DeviceError {
    /// User or OS refused the permission prompt.
    PermissionDenied(String),
    /// No device matches the request.
    NotFound,
    Other(String),
}

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceError::PermissionDenied(m) => write!(f, "permission denied: {m}"),
            DeviceError::NotFound            => write!(f, "no capture device found"),
            DeviceError::Other(m)            => write!(f, "{m}"),
        }
    }
}

impl std::error::Error for DeviceError {}

/// One live camera+microphone stream.
pub trait MediaStream {
    /// Platform identifier, used only for logging.
    fn id(&self) -> String;
    fn facing(&self) -> FacingMode;

    /// Whether the active video track exposes a torch control.
    fn has_torch(&self) -> bool;
    fn set_torch(&mut self, on: bool) -> anyhow::Result<()>;

    /// Begin buffering encoded media. `take` must be echoed back in the
    /// matching `RecorderEvent`.
    fn start_recording(&mut self, take: u64, events: Sender<RecorderEvent>) -> anyhow::Result<()>;
    /// Request the recorder to stop. Completion arrives later on the channel
    /// passed to `start_recording`.
    fn stop_recording(&mut self);

    /// Stop every track and release the device handle.
    fn stop_tracks(&mut self);
    /// True while any track is still live.
    fn tracks_live(&self) -> bool;
}

/// Platform device access.
pub trait CaptureDevice {
    fn enumerate(&self) -> Result<Vec<DeviceInfo>, DeviceError>;
    fn acquire(&mut self, facing: FacingMode) -> Result<Box<dyn MediaStream>, DeviceError>;
}

/// Number of cameras in an enumeration result.
pub fn camera_count(devices: &[DeviceInfo]) -> usize {
    devices.iter().filter(|d| d.kind == DeviceKind::Camera).count()
}
