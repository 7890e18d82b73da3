// crates/snapreel-media/src/ffmpeg.rs
//
// FFmpeg-backed cover-frame decoding (feature "ffmpeg").
//
// A composite asset is a byte concatenation of whole segment files, so it is
// not itself a playable container. `FfmpegFrameSource::open` spills each part
// to its own temp file; `decode_at` maps a composite timestamp to the part it
// falls in and decodes that file at `source_offset + local time`, honouring
// trims. Temp files live as long as the decoder.

use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::{input, Pixel};
use ffmpeg::media::Type;
use ffmpeg::software::scaling::{context::Context as SwsContext, flag::Flags};
use tempfile::NamedTempFile;

use snapreel_core::media_types::StillFrame;

use crate::assemble::CompositeAsset;
use crate::frames::{FrameDecoder, FrameSource};

/// Longest edge of an extracted still. Covers are thumbnails.
const COVER_MAX_EDGE: u32 = 720;

#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegFrameSource;

impl FfmpegFrameSource {
    /// Initialise the FFmpeg libraries. Safe to call more than once.
    pub fn new() -> Result<Self> {
        ffmpeg::init().context("ffmpeg init")?;
        Ok(Self)
    }
}

struct Part {
    file:          NamedTempFile,
    start:         f64,
    duration:      f64,
    source_offset: f64,
}

pub struct FfmpegFrameDecoder {
    parts: Vec<Part>,
}

impl FrameSource for FfmpegFrameSource {
    fn open(&self, asset: &CompositeAsset) -> Result<Box<dyn FrameDecoder + Send>> {
        let mut parts = Vec::with_capacity(asset.parts.len());
        let mut start = 0.0;
        for (i, p) in asset.parts.iter().enumerate() {
            let bytes = asset.part_bytes(i).ok_or_else(|| anyhow!("part {i} out of range"))?;
            let mut file = tempfile::Builder::new()
                .prefix("snapreel-part-")
                .suffix(".mp4")
                .tempfile()
                .context("creating temp file")?;
            file.write_all(bytes).context("spilling part")?;
            file.flush()?;
            parts.push(Part { file, start, duration: p.duration, source_offset: p.source_offset });
            start += p.duration;
        }
        tracing::debug!("[frames] spilled {} part(s) for decoding", parts.len());
        Ok(Box::new(FfmpegFrameDecoder { parts }))
    }
}

impl FrameDecoder for FfmpegFrameDecoder {
    fn decode_at(&mut self, timestamp: f64) -> Result<StillFrame> {
        let part = self.parts.iter()
            .find(|p| timestamp < p.start + p.duration)
            .or_else(|| self.parts.last())
            .ok_or_else(|| anyhow!("no media to decode"))?;
        let local = (timestamp - part.start).clamp(0.0, part.duration) + part.source_offset;
        let (width, height, data) = decode_still(part.file.path(), local)?;
        Ok(StillFrame { timestamp, width, height, data })
    }
}

fn cover_size(w: u32, h: u32) -> (u32, u32) {
    let edge = w.max(h);
    if edge <= COVER_MAX_EDGE || edge == 0 {
        return (w, h);
    }
    let scale = COVER_MAX_EDGE as f64 / edge as f64;
    let even = |v: u32| ((v as f64 * scale) as u32).max(2) & !1;
    (even(w), even(h))
}

/// Seconds to a container-level seek position (stream index -1 reads
/// `AV_TIME_BASE` units).
fn secs_to_av_ts(secs: f64) -> i64 {
    (secs * ffmpeg::ffi::AV_TIME_BASE as f64) as i64
}

/// Seconds to a pts in a stream whose time base is `num/den`.
fn secs_to_stream_ts(secs: f64, num: i32, den: i32) -> i64 {
    (secs * den as f64 / num.max(1) as f64) as i64
}

/// Backward seek to the keyframe at or before `secs`. A failed seek is not
/// fatal: decoding continues from the current position and the pts filter
/// skips the pre-roll.
fn seek_to_secs(ictx: &mut ffmpeg::format::context::Input, secs: f64) {
    if secs <= 0.0 {
        return;
    }
    let ts = secs_to_av_ts(secs);
    if let Err(e) = ictx.seek(ts, ..=ts) {
        tracing::warn!("[ffmpeg] seek to {secs:.3}s failed, decoding from current position: {e}");
    }
}

/// Seek to `timestamp` seconds and return one RGBA frame.
fn decode_still(path: &Path, timestamp: f64) -> Result<(u32, u32, Vec<u8>)> {
    let mut ictx = input(path)?;

    let video_idx = ictx.streams().best(Type::Video)
        .ok_or_else(|| anyhow!("no video stream"))?
        .index();

    let (target_pts, decoder_ctx) = {
        let stream = ictx.stream(video_idx).ok_or_else(|| anyhow!("stream gone"))?;
        let tb     = stream.time_base();
        let pts    = secs_to_stream_ts(timestamp, tb.numerator(), tb.denominator());
        (pts, ffmpeg::codec::context::Context::from_parameters(stream.parameters())?)
    };
    let mut decoder = decoder_ctx.decoder().video()?;
    seek_to_secs(&mut ictx, timestamp);

    let (out_w, out_h) = cover_size(decoder.width(), decoder.height());
    let mut scaler = SwsContext::get(
        decoder.format(), decoder.width(), decoder.height(),
        Pixel::RGBA, out_w, out_h,
        Flags::BILINEAR,
    )?;

    // Kept in case EOF arrives before the target (e.g. the last frame of a clip).
    let mut last_good: Option<ffmpeg::util::frame::video::Video> = None;

    for (stream, packet) in ictx.packets().flatten() {
        if stream.index() != video_idx { continue; }
        decoder.send_packet(&packet)?;
        let mut decoded = ffmpeg::util::frame::video::Video::empty();
        while decoder.receive_frame(&mut decoded).is_ok() {
            let mut out = ffmpeg::util::frame::video::Video::empty();
            scaler.run(&decoded, &mut out)?;
            // Keyframe-aligned seeks land early; skip ahead to the target.
            if matches!(decoded.pts(), Some(pts) if pts + 2 < target_pts) {
                last_good = Some(out);
                continue;
            }
            return Ok((out_w, out_h, packed_rgba(&out, out_w, out_h)));
        }
    }

    last_good
        .map(|out| (out_w, out_h, packed_rgba(&out, out_w, out_h)))
        .ok_or_else(|| anyhow!("no frame found at t={timestamp:.3}"))
}

/// Strip row padding from a scaled frame.
fn packed_rgba(frame: &ffmpeg::util::frame::video::Video, w: u32, h: u32) -> Vec<u8> {
    let stride = frame.stride(0);
    let raw    = frame.data(0);
    let row    = w as usize * 4;
    (0..h as usize)
        .flat_map(|r| &raw[r * stride..r * stride + row])
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cover_size_caps_long_edge() {
        assert_eq!(cover_size(1080, 1920), (404, 720));
        assert_eq!(cover_size(640, 360), (640, 360));
    }

    #[test]
    fn seek_position_and_pts_use_their_own_units() {
        // 2.5 s: microseconds for the container seek, 1/90000 ticks for pts.
        assert_eq!(secs_to_av_ts(2.5), 2_500_000);
        assert_eq!(secs_to_stream_ts(2.5, 1, 90_000), 225_000);
        assert_eq!(secs_to_stream_ts(2.5, 1, 30), 75);
    }
}
