// crates/snapreel-media/src/probe.rs
//
// File import: read bytes from disk, probe the clip duration, and hand the
// media to the blob pool. Nothing touches the pool until the probe succeeds,
// so a non-decodable file leaves the session exactly as it was.

use std::io::Cursor;
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use snapreel_core::{EditorError, LocalHandle};

use crate::blob::BlobPool;

/// Extracts a clip duration (seconds) from raw container bytes.
pub trait MediaProbe: Send + Sync {
    fn probe_duration(&self, bytes: &[u8]) -> Result<f64>;
}

/// ISO-BMFF (MP4 / MOV / M4V) probe built on the `mp4` crate. Reads only the
/// header boxes; sample data is never decoded.
#[derive(Clone, Copy, Debug, Default)]
pub struct Mp4Probe;

impl MediaProbe for Mp4Probe {
    fn probe_duration(&self, bytes: &[u8]) -> Result<f64> {
        let size = bytes.len() as u64;
        let reader = mp4::Mp4Reader::read_header(Cursor::new(bytes), size)
            .map_err(|e| anyhow!("not an MP4 container: {e}"))?;

        let movie = reader.duration().as_secs_f64();
        if movie > 0.0 {
            return Ok(movie);
        }
        // Fall back to the longest track when the movie header is zeroed.
        let track = reader.tracks().values()
            .map(|t| t.duration().as_secs_f64())
            .fold(0.0_f64, f64::max);
        if track > 0.0 {
            Ok(track)
        } else {
            Err(anyhow!("duration unknown"))
        }
    }
}

/// A file that has been read and probed, ready to become a segment.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportedMedia {
    pub handle:   LocalHandle,
    pub duration: f64,
    pub bytes:    usize,
}

/// Read `path`, probe it, and on success move its bytes into `pool`.
pub fn import_file(path: &Path, probe: &dyn MediaProbe, pool: &BlobPool) -> Result<ImportedMedia, EditorError> {
    let read = || -> Result<(Vec<u8>, f64)> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading '{}'", path.display()))?;
        let duration = probe.probe_duration(&bytes)
            .with_context(|| format!("probing '{}'", path.display()))?;
        if !(duration.is_finite() && duration > 0.0) {
            return Err(anyhow!("'{}' reports a duration of {duration}", path.display()));
        }
        Ok((bytes, duration))
    };

    match read() {
        Ok((bytes, duration)) => {
            let len    = bytes.len();
            let handle = pool.insert(bytes);
            tracing::info!("[import] {duration:.2}s ({len} bytes) ← {}", path.display());
            Ok(ImportedMedia { handle, duration, bytes: len })
        }
        Err(e) => {
            tracing::warn!("[import] failed: {e:#}");
            Err(EditorError::FileReadError(format!("{e:#}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct FixedProbe(f64);

    impl MediaProbe for FixedProbe {
        fn probe_duration(&self, _bytes: &[u8]) -> Result<f64> { Ok(self.0) }
    }

    #[test]
    fn mp4_probe_rejects_garbage() {
        assert!(Mp4Probe.probe_duration(b"definitely not a movie").is_err());
        assert!(Mp4Probe.probe_duration(&[]).is_err());
    }

    #[test]
    fn import_moves_bytes_into_pool() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[7u8; 64]).unwrap();
        let pool = BlobPool::new();

        let media = import_file(f.path(), &FixedProbe(4.5), &pool).unwrap();
        assert_eq!(media.duration, 4.5);
        assert_eq!(media.bytes, 64);
        assert_eq!(pool.get(media.handle).map(|b| b.len()), Some(64));
    }

    #[test]
    fn undecodable_file_is_file_read_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello").unwrap();
        let pool = BlobPool::new();

        let err = import_file(f.path(), &Mp4Probe, &pool).unwrap_err();
        assert!(matches!(err, EditorError::FileReadError(_)));
        assert!(pool.is_empty());
    }

    #[test]
    fn missing_file_is_file_read_error() {
        let pool = BlobPool::new();
        let err = import_file(Path::new("/no/such/clip.mp4"), &FixedProbe(1.0), &pool).unwrap_err();
        assert!(matches!(err, EditorError::FileReadError(_)));
    }

    #[test]
    fn zero_duration_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"x").unwrap();
        let pool = BlobPool::new();
        assert!(import_file(f.path(), &FixedProbe(0.0), &pool).is_err());
        assert!(pool.is_empty());
    }
}
