//! `ImageBuf`/`Entry`: the cached pixel buffer and its per-entry lock and
//! refcount, per spec §3. Grounded on `is.h`'s `isImageBufStruct`.

use is_domain::cache_key::CacheKey;
use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, RawRwLock, RwLock};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Whether a buffer was freshly decoded from the detector file or filled
/// from the external key/value store cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Decoded,
    FromRemoteStore,
}

/// A decoded or reduced pixel buffer plus its metadata.
#[derive(Debug, Clone)]
pub struct ImageBuf {
    pub metadata: Option<serde_json::Value>,
    pub buf: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Bytes per pixel: 2 or 4.
    pub depth: u8,
    /// Same shape as `buf`'s pixel grid when present.
    pub bad_pixel_map: Option<Vec<u32>>,
    pub provenance: Provenance,
}

impl ImageBuf {
    /// Spec §3/§8 invariant: `width * height * depth == byte size`, and
    /// `depth` is one of the two supported detector pixel widths.
    pub fn is_well_formed(&self) -> bool {
        (self.depth == 2 || self.depth == 4)
            && (self.width as usize) * (self.height as usize) * (self.depth as usize)
                == self.buf.len()
    }
}

/// One slot in the cache: an immutable key, a refcount mutated only while
/// the owning context's mutex is held, and a read/write lock guarding the
/// buffer itself.
pub struct Entry {
    pub key: CacheKey,
    in_use: AtomicI64,
    data: Arc<RwLock<Option<ImageBuf>>>,
}

pub type ReadGuard = ArcRwLockReadGuard<RawRwLock, Option<ImageBuf>>;
pub type WriteGuard = ArcRwLockWriteGuard<RawRwLock, Option<ImageBuf>>;

impl Entry {
    pub(crate) fn empty(key: CacheKey) -> Arc<Entry> {
        Arc::new(Entry {
            key,
            in_use: AtomicI64::new(0),
            data: Arc::new(RwLock::new(None)),
        })
    }

    pub fn in_use(&self) -> i64 {
        self.in_use.load(Ordering::SeqCst)
    }

    /// Must only be called while the owning registry's context mutex is
    /// held (spec §3 invariant).
    pub(crate) fn inc_in_use(&self) {
        self.in_use.fetch_add(1, Ordering::SeqCst);
    }

    /// Must only be called while the owning registry's context mutex is
    /// held (spec §3 invariant).
    pub(crate) fn dec_in_use(&self) {
        let prev = self.in_use.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(prev > 0, "in_use underflow on {}", self.key);
    }

    pub(crate) fn write_arc(self: &Arc<Self>) -> WriteGuard {
        self.data.write_arc()
    }

    pub(crate) fn read_arc(self: &Arc<Self>) -> ReadGuard {
        self.data.read_arc()
    }
}
