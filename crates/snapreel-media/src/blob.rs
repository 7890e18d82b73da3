// crates/snapreel-media/src/blob.rs
//
// BlobPool: session-local media bytes keyed by LocalHandle.
//
// A segment references its media exclusively through a handle. Because undo
// can resurrect a deleted segment, media is not freed the instant a segment
// leaves the timeline; it is freed once no snapshot in the store (current,
// past, or future) still references it. `retain_referenced` is run after
// every accepted edit and `clear` when the session ends.
//
// Cloning a pool is cheap and shares the same storage, so the export worker
// thread can read bytes while the session keeps editing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use snapreel_core::LocalHandle;

#[derive(Clone, Default)]
pub struct BlobPool {
    inner: Arc<Mutex<HashMap<LocalHandle, Arc<Vec<u8>>>>>,
}

impl BlobPool {
    pub fn new() -> Self { Self::default() }

    /// Take ownership of `bytes` and return a fresh handle for them.
    pub fn insert(&self, bytes: Vec<u8>) -> LocalHandle {
        let handle = LocalHandle::new();
        self.inner.lock().insert(handle, Arc::new(bytes));
        handle
    }

    pub fn get(&self, handle: LocalHandle) -> Option<Arc<Vec<u8>>> {
        self.inner.lock().get(&handle).cloned()
    }

    pub fn contains(&self, handle: LocalHandle) -> bool {
        self.inner.lock().contains_key(&handle)
    }

    /// Free one blob. Returns `false` if it was already gone.
    pub fn release(&self, handle: LocalHandle) -> bool {
        self.inner.lock().remove(&handle).is_some()
    }

    /// Free every blob not in `referenced`. Returns how many were released.
    pub fn retain_referenced(&self, referenced: &HashSet<LocalHandle>) -> usize {
        let mut map = self.inner.lock();
        let before = map.len();
        map.retain(|h, _| referenced.contains(h));
        let released = before - map.len();
        if released > 0 {
            tracing::debug!("[blob] released {released} unreferenced blob(s)");
        }
        released
    }

    /// Free everything. Called when the editing session ends.
    pub fn clear(&self) {
        let mut map = self.inner.lock();
        if !map.is_empty() {
            tracing::debug!("[blob] clearing {} blob(s)", map.len());
        }
        map.clear();
    }

    pub fn len(&self) -> usize { self.inner.lock().len() }

    pub fn is_empty(&self) -> bool { self.inner.lock().is_empty() }

    /// Bytes currently held.
    pub fn total_bytes(&self) -> usize {
        self.inner.lock().values().map(|b| b.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_release() {
        let pool = BlobPool::new();
        let h = pool.insert(vec![1, 2, 3]);
        assert_eq!(pool.get(h).as_deref(), Some(&vec![1, 2, 3]));
        assert_eq!(pool.total_bytes(), 3);
        assert!(pool.release(h));
        assert!(!pool.release(h));
        assert!(pool.get(h).is_none());
    }

    #[test]
    fn retain_drops_unreferenced() {
        let pool = BlobPool::new();
        let keep = pool.insert(vec![0; 4]);
        let drop = pool.insert(vec![0; 8]);
        let referenced: HashSet<_> = [keep].into_iter().collect();
        assert_eq!(pool.retain_referenced(&referenced), 1);
        assert!(pool.contains(keep));
        assert!(!pool.contains(drop));
    }

    #[test]
    fn clones_share_storage() {
        let pool = BlobPool::new();
        let other = pool.clone();
        let h = pool.insert(vec![9]);
        assert!(other.contains(h));
        other.clear();
        assert!(pool.is_empty());
    }
}
