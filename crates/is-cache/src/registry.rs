//! The buffer registry: `get_or_create` and compaction, per spec §4.1.
//! Grounded on `isData.c`'s `createNewImageBuf`/`isGetImageBufFromKey` and
//! their `hsearch_data`-based index, restructured as an owned `Vec` of
//! entries plus an `ahash`-backed lookup index rather than an intrusive
//! linked list.

use crate::entry::{Entry, ReadGuard, WriteGuard};
use is_domain::cache_key::CacheKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Either an existing entry (already has at least one reader, possibly
/// still being populated by its creator) or a freshly created, empty one
/// the caller must populate. `Created` carries the entry's writer lock,
/// already held, so the entry is never visible to another thread unlocked
/// (spec.md invariant: a freshly created entry holds its writer lock and
/// has `in_use = 1` before any other thread can observe it).
pub enum GetOrCreate {
    Existing(Arc<Entry>),
    Created(Arc<Entry>, WriteGuard),
}

struct Inner {
    /// Insertion order; doubles as the compaction eviction order.
    order: Vec<Arc<Entry>>,
    index: HashMap<CacheKey, Arc<Entry>, ahash::RandomState>,
    max_buffers: usize,
}

/// The per-worker-process cache registry (spec's "Worker context").
pub struct Registry {
    inner: Mutex<Inner>,
}

impl Registry {
    pub fn new(max_buffers: usize) -> Registry {
        Registry {
            inner: Mutex::new(Inner {
                order: Vec::new(),
                index: HashMap::default(),
                max_buffers,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_buffers(&self) -> usize {
        self.inner.lock().max_buffers
    }

    /// Spec §4.1 `get_or_create`. Looks up `key`; on a hit increments
    /// `in_use` and returns `Existing`. On a miss, acquires the new entry's
    /// writer lock *before* inserting it into the list and index, then
    /// returns `Created` with that lock already held — the caller must
    /// populate the entry through the guard and downgrade to a reader lock.
    pub fn get_or_create(&self, key: &CacheKey) -> GetOrCreate {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.index.get(key) {
            existing.inc_in_use();
            return GetOrCreate::Existing(Arc::clone(existing));
        }

        let entry = Entry::empty(key.clone());
        let guard = entry.write_arc();
        entry.inc_in_use();
        inner.order.push(Arc::clone(&entry));
        inner.index.insert(key.clone(), Arc::clone(&entry));

        let n = inner.order.len();
        let max = inner.max_buffers;
        if n >= max / 2 {
            compact_locked(&mut inner);
        }

        GetOrCreate::Created(entry, guard)
    }

    /// Acquire the entry's reader lock (for an `Existing` entry, or to
    /// downgrade after populating a `Created` one).
    pub fn read_lock(&self, entry: &Arc<Entry>) -> ReadGuard {
        entry.read_arc()
    }

    /// Spec §4.1 `release`: decrement `in_use` under the context mutex.
    /// The caller is responsible for dropping its reader lock guard itself
    /// (Rust's borrow checker enforces the lock is released no later than
    /// this call, since the guard type borrows the entry).
    pub fn release(&self, entry: &Arc<Entry>) {
        let _inner = self.inner.lock();
        entry.dec_in_use();
    }

    /// Spec §4.1 `destroy_context`: called only after all worker threads
    /// have joined. Drops every entry unconditionally.
    pub fn destroy_context(&self) {
        let mut inner = self.inner.lock();
        inner.order.clear();
        inner.index.clear();
    }

    /// Force a compaction pass regardless of the `n_buffers >= max/2`
    /// threshold (used by supervisors on an explicit schedule, and by
    /// tests).
    pub fn compact(&self) {
        let mut inner = self.inner.lock();
        compact_locked(&mut inner);
    }
}

/// Rebuild the index keeping all `in_use > 0` entries plus the most recent
/// `max_buffers / 4` idle entries (walking in insertion order, as
/// `isData.c`'s compaction loop does); doubles `max_buffers` if the kept
/// set didn't shrink enough to make room. Caller holds `inner`'s mutex.
fn compact_locked(inner: &mut Inner) {
    let keep_idle_budget = inner.max_buffers / 4;
    let mut kept = Vec::with_capacity(inner.order.len());
    let mut idle_kept = 0usize;

    for entry in inner.order.drain(..) {
        if entry.in_use() > 0 {
            kept.push(entry);
        } else if idle_kept < keep_idle_budget {
            idle_kept += 1;
            kept.push(entry);
        }
        // else: drop the entry (evicted)
    }

    if kept.len() * 2 >= inner.max_buffers {
        inner.max_buffers *= 2;
        tracing::debug!(target: "cache", new_max = inner.max_buffers, "doubled cache capacity");
    }

    inner.index = kept
        .iter()
        .map(|e| (e.key.clone(), Arc::clone(e)))
        .collect();
    inner.order = kept;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> CacheKey {
        CacheKey::raw(1000, s, 1)
    }

    #[test]
    fn create_then_lookup_is_existing() {
        let reg = Registry::new(16);
        match reg.get_or_create(&key("/a")) {
            GetOrCreate::Created(..) => {}
            GetOrCreate::Existing(_) => panic!("expected a fresh entry"),
        }
        match reg.get_or_create(&key("/a")) {
            GetOrCreate::Existing(e) => assert_eq!(e.in_use(), 2),
            GetOrCreate::Created(..) => panic!("expected the existing entry"),
        }
    }

    #[test]
    fn release_decrements_in_use() {
        let reg = Registry::new(16);
        let entry = match reg.get_or_create(&key("/a")) {
            GetOrCreate::Created(e, guard) => {
                drop(guard);
                e
            }
            _ => unreachable!(),
        };
        assert_eq!(entry.in_use(), 1);
        reg.release(&entry);
        assert_eq!(entry.in_use(), 0);
    }

    #[test]
    fn compaction_keeps_in_use_entries_and_drops_excess_idle() {
        let reg = Registry::new(8); // keep_idle_budget = 2

        let busy = match reg.get_or_create(&key("/busy")) {
            GetOrCreate::Created(e, guard) => {
                drop(guard);
                e
            }
            _ => unreachable!(),
        };
        // leave `busy` with in_use == 1 (never released)

        for i in 0..5 {
            let e = match reg.get_or_create(&key(&format!("/idle{i}"))) {
                GetOrCreate::Created(e, guard) => {
                    drop(guard);
                    e
                }
                _ => unreachable!(),
            };
            reg.release(&e); // in_use back to 0, now idle
        }

        reg.compact();
        assert!(reg.len() <= 1 + 2);
        assert_eq!(busy.in_use(), 1);
    }

    #[test]
    fn compaction_doubles_capacity_when_kept_set_stays_large() {
        let reg = Registry::new(8);
        for i in 0..8 {
            // never release: in_use stays 1, so compaction must keep all of them
            reg.get_or_create(&key(&format!("/f{i}")));
        }
        let before = reg.max_buffers();
        reg.compact();
        assert!(reg.max_buffers() >= before * 2);
    }

    #[test]
    fn destroy_context_clears_everything() {
        let reg = Registry::new(16);
        reg.get_or_create(&key("/a"));
        reg.get_or_create(&key("/b"));
        assert_eq!(reg.len(), 2);
        reg.destroy_context();
        assert_eq!(reg.len(), 0);
    }

    /// A concurrent `get_or_create` for a key still being populated must
    /// block on the writer lock rather than observe an empty buffer: this
    /// is the scenario of two requests racing for the same uncached image.
    #[test]
    fn concurrent_get_or_create_blocks_until_populated() {
        use crate::entry::ImageBuf;
        use crate::entry::Provenance;
        use std::sync::Barrier;

        let reg = Registry::new(16);
        let k = key("/racing");

        let (entry, mut guard) = match reg.get_or_create(&k) {
            GetOrCreate::Created(e, g) => (e, g),
            GetOrCreate::Existing(_) => unreachable!(),
        };

        let barrier = Barrier::new(2);
        std::thread::scope(|scope| {
            scope.spawn(|| {
                barrier.wait();
                // Entry is already visible in the index, but still locked
                // for writing, so this must block until the buffer below
                // is populated rather than hand back an empty read guard.
                let second = match reg.get_or_create(&k) {
                    GetOrCreate::Existing(e) => e,
                    GetOrCreate::Created(..) => panic!("expected the entry created by the other thread"),
                };
                let read = reg.read_lock(&second);
                assert!(read.is_some(), "reader observed an unpopulated entry");
            });

            barrier.wait();
            std::thread::sleep(std::time::Duration::from_millis(20));
            *guard = Some(ImageBuf {
                metadata: None,
                buf: vec![0u8; 4],
                width: 1,
                height: 1,
                depth: 4,
                bad_pixel_map: None,
                provenance: Provenance::Decoded,
            });
            drop(guard);
        });

        assert_eq!(entry.in_use(), 2);
    }
}
