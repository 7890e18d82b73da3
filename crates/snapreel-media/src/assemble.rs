// crates/snapreel-media/src/assemble.rs
//
// Assembly: concatenate the timeline's media into one composite asset.
//
// Order is the timeline order at the moment `combine` is called, never the
// order the takes were captured. Each segment contributes its whole media
// blob; trims are carried as per-part `source_offset`/`duration` metadata in
// `CompositeAsset::parts` rather than applied to the bytes.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};

use snapreel_core::media_types::CompositePart;
use snapreel_core::{MediaRef, Segment};

use crate::blob::BlobPool;

/// Resolves a segment's media reference to bytes.
pub trait MediaResolver: Send + Sync {
    fn resolve(&self, media: &MediaRef) -> Result<Arc<Vec<u8>>>;
}

/// Downloads remote media. Supplied by the host application.
pub trait RemoteFetcher: Send + Sync {
    fn fetch(&self, uri: &str) -> Result<Vec<u8>>;
}

/// Resolver backed by the session blob pool plus an optional remote fetcher.
#[derive(Clone)]
pub struct PoolResolver {
    pool:   BlobPool,
    remote: Option<Arc<dyn RemoteFetcher>>,
}

impl PoolResolver {
    pub fn new(pool: BlobPool) -> Self {
        Self { pool, remote: None }
    }

    pub fn with_remote(pool: BlobPool, remote: Arc<dyn RemoteFetcher>) -> Self {
        Self { pool, remote: Some(remote) }
    }
}

impl MediaResolver for PoolResolver {
    fn resolve(&self, media: &MediaRef) -> Result<Arc<Vec<u8>>> {
        match media {
            MediaRef::Local(h) => self.pool.get(*h)
                .ok_or_else(|| anyhow!("local media {} has been released", h.0)),
            MediaRef::Remote(uri) => {
                let fetcher = self.remote.as_ref()
                    .ok_or_else(|| anyhow!("no fetcher configured for remote media '{uri}'"))?;
                let bytes = fetcher.fetch(uri).with_context(|| format!("fetching '{uri}'"))?;
                Ok(Arc::new(bytes))
            }
        }
    }
}

/// The single exportable blob produced from a timeline.
#[derive(Clone, Debug, PartialEq)]
pub struct CompositeAsset {
    pub bytes:    Vec<u8>,
    /// Logical duration: the sum of the (possibly trimmed) segment durations.
    pub duration: f64,
    pub parts:    Vec<CompositePart>,
}

impl CompositeAsset {
    /// Byte span for one segment.
    pub fn part_bytes(&self, index: usize) -> Option<&[u8]> {
        self.parts.get(index).map(|p| &self.bytes[p.byte_range.clone()])
    }
}

/// Concatenate `segments` in order.
pub fn combine(segments: &[Segment], resolver: &dyn MediaResolver) -> Result<CompositeAsset> {
    if segments.is_empty() {
        bail!("nothing to export: timeline is empty");
    }

    let blobs: Vec<Arc<Vec<u8>>> = segments.iter()
        .map(|s| resolver.resolve(&s.media).with_context(|| format!("segment {}", s.id)))
        .collect::<Result<_>>()?;

    let total_len = blobs.iter().map(|b| b.len()).sum();
    let mut bytes = Vec::with_capacity(total_len);
    let mut parts = Vec::with_capacity(segments.len());

    for (seg, blob) in segments.iter().zip(&blobs) {
        let start = bytes.len();
        bytes.extend_from_slice(blob);
        parts.push(CompositePart {
            segment_id:    seg.id,
            byte_range:    start..bytes.len(),
            source_offset: seg.source_offset,
            duration:      seg.duration,
        });
    }

    let duration = parts.iter().map(|p| p.duration).sum();
    tracing::info!("[export] combined {} segment(s): {total_len} bytes, {duration:.2}s", parts.len());
    Ok(CompositeAsset { bytes, duration, parts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapreel_core::{Composer, SegmentId, SegmentStore};

    struct StaticFetcher;

    impl RemoteFetcher for StaticFetcher {
        fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
            match uri {
                "https://cdn/ok" => Ok(b"RR".to_vec()),
                _ => bail!("404"),
            }
        }
    }

    fn local(pool: &BlobPool, id: u64, d: f64, bytes: &[u8]) -> Segment {
        Segment::new(SegmentId(id), d, MediaRef::Local(pool.insert(bytes.to_vec()))).unwrap()
    }

    #[test]
    fn concatenates_in_timeline_order() {
        let pool = BlobPool::new();
        let a = local(&pool, 1, 1.0, b"aaa");
        let b = local(&pool, 2, 2.0, b"bb");
        let c = local(&pool, 3, 3.0, b"c");
        let mut store = SegmentStore::with_segments(vec![a, b, c]);
        Composer::new(&mut store, 60.0)
            .reorder(&[SegmentId(3), SegmentId(1), SegmentId(2)])
            .unwrap();

        let asset = combine(store.segments(), &PoolResolver::new(pool)).unwrap();
        assert_eq!(asset.bytes, b"caaabb");
        assert_eq!(asset.duration, 6.0);
        let order: Vec<u64> = asset.parts.iter().map(|p| p.segment_id.0).collect();
        assert_eq!(order, vec![3, 1, 2]);
        assert_eq!(asset.part_bytes(1), Some(&b"aaa"[..]));
    }

    #[test]
    fn trimmed_parts_keep_full_bytes_and_carry_offsets() {
        let pool = BlobPool::new();
        let mut store = SegmentStore::with_segments(vec![local(&pool, 1, 10.0, b"0123456789")]);
        Composer::new(&mut store, 60.0).trim(SegmentId(1), 2.0, 5.0).unwrap();

        let asset = combine(store.segments(), &PoolResolver::new(pool)).unwrap();
        assert_eq!(asset.bytes.len(), 10);
        assert_eq!(asset.duration, 3.0);
        assert_eq!(asset.parts[0].source_offset, 2.0);
    }

    #[test]
    fn remote_media_goes_through_fetcher() {
        let pool = BlobPool::new();
        let segs = vec![
            local(&pool, 1, 1.0, b"L"),
            Segment::new(SegmentId(2), 1.0, MediaRef::Remote("https://cdn/ok".into())).unwrap(),
        ];
        let resolver = PoolResolver::with_remote(pool, Arc::new(StaticFetcher));
        assert_eq!(combine(&segs, &resolver).unwrap().bytes, b"LRR");
    }

    #[test]
    fn missing_media_fails_whole_combine() {
        let pool = BlobPool::new();
        let seg = local(&pool, 1, 1.0, b"x");
        pool.clear();
        assert!(combine(&[seg], &PoolResolver::new(pool)).is_err());
    }

    #[test]
    fn remote_without_fetcher_fails() {
        let seg = Segment::new(SegmentId(1), 1.0, MediaRef::Remote("https://cdn/ok".into())).unwrap();
        assert!(combine(&[seg], &PoolResolver::new(BlobPool::new())).is_err());
    }

    #[test]
    fn empty_timeline_is_an_error() {
        assert!(combine(&[], &PoolResolver::new(BlobPool::new())).is_err());
    }
}
