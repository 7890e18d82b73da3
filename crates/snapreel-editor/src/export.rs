// crates/snapreel-editor/src/export.rs
//
// Export plumbing that sits between the session and the media worker:
// building an ExportJob from session state, choosing a frame source, and
// turning a picked cover frame into an uploaded thumbnail.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use uuid::Uuid;

use snapreel_core::{EditorConfig, Segment};
use snapreel_media::assemble::{CompositeAsset, PoolResolver};
use snapreel_media::frames::{FrameDecoder, FrameSource};
use snapreel_media::{BlobPool, ExportJob, ExportedClip, Uploader};

use crate::gateways::Gateways;

pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";
pub const COVER_CONTENT_TYPE: &str = "image/png";

/// User-entered fields for publishing an exported clip.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PublishDetails {
    pub title:       String,
    pub description: String,
    pub category:    String,
}

/// Frame source used when no decoder is compiled in. Exports still succeed,
/// just without cover candidates.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFrameSource;

impl FrameSource for NoFrameSource {
    fn open(&self, _asset: &CompositeAsset) -> Result<Box<dyn FrameDecoder + Send>> {
        Err(anyhow!("frame decoding not available in this build"))
    }
}

/// FFmpeg when the `ffmpeg` feature is on and the libraries initialise,
/// otherwise `NoFrameSource`.
pub fn default_frame_source() -> Arc<dyn FrameSource> {
    #[cfg(feature = "ffmpeg")]
    {
        match snapreel_media::ffmpeg::FfmpegFrameSource::new() {
            Ok(src) => return Arc::new(src),
            Err(e)  => tracing::warn!("[export] ffmpeg unavailable, covers disabled: {e:#}"),
        }
    }
    Arc::new(NoFrameSource)
}

pub fn build_job(
    config:   &EditorConfig,
    segments: &[Segment],
    blobs:    &BlobPool,
    gateways: &Gateways,
    frames:   Arc<dyn FrameSource>,
) -> ExportJob {
    let resolver = match &gateways.fetcher {
        Some(f) => PoolResolver::with_remote(blobs.clone(), Arc::clone(f)),
        None    => PoolResolver::new(blobs.clone()),
    };
    ExportJob {
        segments:     segments.to_vec(),
        resolver:     Arc::new(resolver),
        uploader:     Arc::clone(&gateways.uploader),
        frames,
        cover_frames: config.cover_frames,
        name:         format!("{}-{}.mp4", config.export_name, Uuid::new_v4()),
        content_type: VIDEO_CONTENT_TYPE.into(),
    }
}

/// Upload the pre-encoded PNG of cover candidate `index`. A clip with no
/// cover candidates publishes without a thumbnail.
pub fn upload_cover(
    clip:     &ExportedClip,
    index:    usize,
    uploader: &dyn Uploader,
    base:     &str,
) -> Result<Option<String>> {
    if clip.covers.is_empty() {
        return Ok(None);
    }
    let png = clip.covers.get(index)
        .ok_or_else(|| anyhow!("cover {index} out of range ({} candidates)", clip.covers.len()))?;
    let url = uploader.upload(&format!("{base}-cover-{}.png", Uuid::new_v4()), png, COVER_CONTENT_TYPE)?;
    tracing::info!("[export] cover {index} uploaded → {url}");
    Ok(Some(url))
}
