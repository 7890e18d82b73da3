// crates/snapreel-media/src/frames.rs
//
// Cover-frame extraction from a composite asset.
//
// `extract_frames` returns a lazy iterator: each `next()` seeks the decoder
// to the next timestamp and decodes one still. The iterator owns its decoder,
// is finite (exactly `n` timestamps), and cannot be restarted. A decode error
// ends the sequence early instead of failing the export; the caller gets
// however many frames decoded cleanly.
//
// Timestamps are the midpoints of `n` equal slices of the duration, so the
// first and last candidates never land on a black lead-in or a trailing
// partial frame.

use anyhow::{Context, Result};
use rayon::prelude::*;

use snapreel_core::media_types::StillFrame;

use crate::assemble::CompositeAsset;

/// Seeks into decoded media and returns a still at a timestamp.
pub trait FrameDecoder {
    fn decode_at(&mut self, timestamp: f64) -> Result<StillFrame>;
}

impl FrameDecoder for Box<dyn FrameDecoder + Send> {
    fn decode_at(&mut self, timestamp: f64) -> Result<StillFrame> {
        (**self).decode_at(timestamp)
    }
}

/// Opens a decoder over a composite asset. Lets the export worker build one
/// on its own thread.
pub trait FrameSource: Send + Sync {
    fn open(&self, asset: &CompositeAsset) -> Result<Box<dyn FrameDecoder + Send>>;
}

/// `n` evenly spaced sample points across `duration`.
///
/// ```
/// use snapreel_media::frames::frame_timestamps;
/// assert_eq!(frame_timestamps(8.0, 4), vec![1.0, 3.0, 5.0, 7.0]);
/// assert!(frame_timestamps(8.0, 0).is_empty());
/// ```
pub fn frame_timestamps(duration: f64, n: usize) -> Vec<f64> {
    if n == 0 || !(duration.is_finite() && duration > 0.0) {
        return Vec::new();
    }
    let step = duration / n as f64;
    (0..n).map(|i| step * (i as f64 + 0.5)).collect()
}

pub struct FrameIter<D: FrameDecoder> {
    decoder:    D,
    timestamps: std::vec::IntoIter<f64>,
    failed:     bool,
}

impl<D: FrameDecoder> Iterator for FrameIter<D> {
    type Item = StillFrame;

    fn next(&mut self) -> Option<StillFrame> {
        if self.failed {
            return None;
        }
        let ts = self.timestamps.next()?;
        match self.decoder.decode_at(ts) {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!("[frames] decode at {ts:.2}s failed, stopping early: {e:#}");
                self.failed = true;
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed { (0, Some(0)) } else { (0, Some(self.timestamps.len())) }
    }
}

impl<D: FrameDecoder> std::iter::FusedIterator for FrameIter<D> {}

/// Lazily decode up to `n` stills spread across `duration` seconds.
pub fn extract_frames<D: FrameDecoder>(decoder: D, duration: f64, n: usize) -> FrameIter<D> {
    FrameIter {
        decoder,
        timestamps: frame_timestamps(duration, n).into_iter(),
        failed:     false,
    }
}

/// Encode one RGBA still as PNG.
pub fn encode_png(frame: &StillFrame) -> Result<Vec<u8>> {
    let expected = frame.width as usize * frame.height as usize * 4;
    anyhow::ensure!(
        frame.data.len() == expected,
        "frame buffer is {} bytes, expected {expected} for {}x{}",
        frame.data.len(), frame.width, frame.height,
    );

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, frame.width, frame.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().context("png header")?;
        writer.write_image_data(&frame.data).context("png data")?;
    }
    Ok(out)
}

/// Encode a batch of stills in parallel, preserving order.
pub fn encode_pngs(frames: &[StillFrame]) -> Vec<Result<Vec<u8>>> {
    frames.par_iter().map(encode_png).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::bail;

    /// Solid-colour decoder that can be told to fail from a given call onwards.
    pub(crate) struct SolidDecoder {
        pub calls:      usize,
        pub fail_after: Option<usize>,
    }

    impl FrameDecoder for SolidDecoder {
        fn decode_at(&mut self, timestamp: f64) -> Result<StillFrame> {
            self.calls += 1;
            if matches!(self.fail_after, Some(n) if self.calls > n) {
                bail!("corrupt packet");
            }
            Ok(StillFrame { timestamp, width: 2, height: 2, data: vec![255; 16] })
        }
    }

    #[test]
    fn yields_exactly_n_frames() {
        let frames: Vec<_> = extract_frames(SolidDecoder { calls: 0, fail_after: None }, 10.0, 5).collect();
        let ts: Vec<f64> = frames.iter().map(|f| f.timestamp).collect();
        assert_eq!(ts, vec![1.0, 3.0, 5.0, 7.0, 9.0]);
    }

    #[test]
    fn is_lazy() {
        let mut it = extract_frames(SolidDecoder { calls: 0, fail_after: None }, 10.0, 5);
        assert_eq!(it.decoder.calls, 0);
        it.next();
        assert_eq!(it.decoder.calls, 1);
    }

    #[test]
    fn decode_error_returns_fewer_frames() {
        let mut it = extract_frames(SolidDecoder { calls: 0, fail_after: Some(2) }, 10.0, 6);
        let got: Vec<_> = it.by_ref().collect();
        assert_eq!(got.len(), 2);
        assert!(it.next().is_none());
        assert_eq!(it.decoder.calls, 3);
    }

    #[test]
    fn png_round_trip_header() {
        let f = StillFrame { timestamp: 0.0, width: 2, height: 2, data: vec![10; 16] };
        let png = encode_png(&f).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn png_rejects_short_buffer() {
        let f = StillFrame { timestamp: 0.0, width: 4, height: 4, data: vec![0; 10] };
        assert!(encode_png(&f).is_err());
    }

    #[test]
    fn batch_encode_preserves_order() {
        let frames = vec![
            StillFrame { timestamp: 0.0, width: 1, height: 1, data: vec![0; 4] },
            StillFrame { timestamp: 1.0, width: 1, height: 1, data: vec![0; 3] },
        ];
        let out = encode_pngs(&frames);
        assert!(out[0].is_ok());
        assert!(out[1].is_err());
    }
}
