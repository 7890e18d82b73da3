// crates/snapreel-media/src/lib.rs
//
// Capture, media storage and export. Hardware and network access sit behind
// traits (CaptureDevice, MediaStream, Uploader, FrameSource) so the host
// application plugs in the platform pieces; results come back over channels.
//
// To add a new export step:
//   1. Put the work in its own module here
//   2. Call it from worker.rs::run_export between cancel checkpoints
//   3. Add an ExportStage variant in snapreel-core so progress can name it

pub mod assemble;
pub mod blob;
pub mod capture;
pub mod countdown;
pub mod device;
pub mod frames;
pub mod probe;
pub mod worker;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

pub use assemble::{combine, CompositeAsset, MediaResolver, PoolResolver, RemoteFetcher};
pub use blob::BlobPool;
pub use capture::{CaptureController, CaptureError, CaptureOutcome, CaptureState};
pub use countdown::{Countdown, CountdownEvent, CountdownPreset};
pub use device::{CaptureDevice, DeviceError, DeviceInfo, DeviceKind, MediaStream};
pub use frames::{extract_frames, FrameDecoder, FrameSource};
pub use probe::{import_file, ImportedMedia, MediaProbe, Mp4Probe};
pub use worker::{ExportJob, ExportWorker, Uploader};
pub use snapreel_core::media_types::{ExportResult, ExportStage, ExportedClip, StillFrame};
