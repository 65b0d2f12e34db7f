//! `Context`: the per-worker-process cache (spec's "Worker context"),
//! combining the registry with file-type dispatch and pluggable decoders to
//! implement `get_raw`/`reduce`/`release` (spec §4.1). Decoding and pixel
//! reduction are themselves out-of-scope external collaborators (spec.md
//! §1); this crate only owns the caching contract around them.

use crate::entry::{Entry, ImageBuf};
use crate::file_type::{self, FileType};
use crate::registry::{GetOrCreate, Registry};
use is_domain::cache_key::CacheKey;
use is_domain::error::{IsError, Result};
use is_domain::request::ReductionParams;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// `decode_metadata(path) -> metadata` / `decode_frame(path, frame) ->
/// pixel buffer`, the out-of-scope decoder interface named in spec.md §1.
pub trait ImageDecoder: Send + Sync {
    fn decode_metadata(&self, path: &str) -> Result<serde_json::Value>;
    fn decode_frame(&self, path: &str, frame: u32) -> Result<ImageBuf>;
}

/// A reader-locked entry plus enough state to release it correctly.
pub struct ReaderHandle {
    entry: Arc<Entry>,
    guard: crate::entry::ReadGuard,
}

impl ReaderHandle {
    pub fn metadata(&self) -> Option<&serde_json::Value> {
        self.guard.as_ref().and_then(|b| b.metadata.as_ref())
    }

    pub fn buffer(&self) -> Option<&ImageBuf> {
        self.guard.as_ref()
    }

    pub fn key(&self) -> &CacheKey {
        &self.entry.key
    }
}

/// The per-process image buffer cache context.
pub struct Context {
    gid: u32,
    registry: Registry,
    decoders: HashMap<FileType, Arc<dyn ImageDecoder>>,
}

impl Context {
    pub fn new(gid: u32, max_buffers: usize) -> Context {
        Context {
            gid,
            registry: Registry::new(max_buffers),
            decoders: HashMap::new(),
        }
    }

    pub fn register_decoder(&mut self, ft: FileType, decoder: Arc<dyn ImageDecoder>) {
        self.decoders.insert(ft, decoder);
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Spec §4.1 `get_raw`: build the raw key, `get_or_create` it, and on a
    /// fresh entry dispatch to the decoder matching the file's type.
    pub fn get_raw(&self, path: &str, frame: u32) -> Result<ReaderHandle> {
        let key = CacheKey::raw(self.gid, path, frame);
        match self.registry.get_or_create(&key) {
            GetOrCreate::Existing(entry) => {
                let guard = self.registry.read_lock(&entry);
                Ok(ReaderHandle { entry, guard })
            }
            GetOrCreate::Created(entry, mut guard) => {
                let populate = self.decode_raw(path, frame);
                match populate {
                    Ok(buf) => {
                        debug_assert!(buf.is_well_formed());
                        *guard = Some(buf);
                        drop(guard);
                        let read_guard = self.registry.read_lock(&entry);
                        Ok(ReaderHandle {
                            entry,
                            guard: read_guard,
                        })
                    }
                    Err(e) => {
                        // Failure semantics (spec §4.1): leave the entry
                        // empty so a later identical request retries.
                        drop(guard);
                        self.registry.release(&entry);
                        Err(e)
                    }
                }
            }
        }
    }

    fn decode_raw(&self, path: &str, frame: u32) -> Result<ImageBuf> {
        let ft = file_type::detect(Path::new(path));
        if ft == FileType::Unknown {
            return Err(IsError::Unsupported(path.to_string()));
        }
        let decoder = self
            .decoders
            .get(&ft)
            .ok_or_else(|| IsError::Unsupported(format!("{path} ({ft:?})")))?;
        decoder.decode_frame(path, frame)
    }

    /// Metadata-only path (spec §4.4 `metadata`): decode metadata without
    /// touching pixel data.
    pub fn get_metadata(&self, path: &str) -> Result<serde_json::Value> {
        let ft = file_type::detect(Path::new(path));
        if ft == FileType::Unknown {
            return Err(IsError::Unsupported(path.to_string()));
        }
        let decoder = self
            .decoders
            .get(&ft)
            .ok_or_else(|| IsError::Unsupported(format!("{path} ({ft:?})")))?;
        decoder.decode_metadata(path)
    }

    /// Spec §4.1 `reduce`: build the reduced key, `get_or_create` it, and
    /// on a fresh entry pull a raw buffer via `get_raw` and run `reducer`
    /// over it. `reducer` is the pixel-reduction algorithm, supplied by the
    /// caller (this crate does not depend on `is-reduce` to avoid a cycle;
    /// `is-supervisor` wires the two together).
    pub fn reduce(
        &self,
        path: &str,
        frame: u32,
        params: &ReductionParams,
        reducer: &dyn Fn(&ImageBuf, &ReductionParams) -> Result<ImageBuf>,
    ) -> Result<ReaderHandle> {
        let key = CacheKey::reduced(self.gid, path, frame, params);
        match self.registry.get_or_create(&key) {
            GetOrCreate::Existing(entry) => {
                let guard = self.registry.read_lock(&entry);
                Ok(ReaderHandle { entry, guard })
            }
            GetOrCreate::Created(entry, mut guard) => {
                let raw = self.get_raw(path, frame);
                let result = match raw {
                    Ok(raw_handle) => {
                        let reduced = raw_handle
                            .buffer()
                            .ok_or_else(|| IsError::DecodeError(path.to_string()))
                            .and_then(|raw_buf| reducer(raw_buf, params));
                        self.release(raw_handle);
                        reduced
                    }
                    Err(e) => Err(e),
                };

                match result {
                    Ok(buf) => {
                        *guard = Some(buf);
                        drop(guard);
                        let read_guard = self.registry.read_lock(&entry);
                        Ok(ReaderHandle {
                            entry,
                            guard: read_guard,
                        })
                    }
                    Err(e) => {
                        drop(guard);
                        self.registry.release(&entry);
                        Err(e)
                    }
                }
            }
        }
    }

    /// Spec §4.1 `release`.
    pub fn release(&self, handle: ReaderHandle) {
        let ReaderHandle { entry, guard } = handle;
        drop(guard);
        self.registry.release(&entry);
    }

    /// Spec §4.1 `destroy_context`.
    pub fn destroy(&self) {
        self.registry.destroy_context();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Provenance;

    struct FixedDecoder {
        meta: serde_json::Value,
        width: u32,
        height: u32,
    }

    impl ImageDecoder for FixedDecoder {
        fn decode_metadata(&self, _path: &str) -> Result<serde_json::Value> {
            Ok(self.meta.clone())
        }

        fn decode_frame(&self, _path: &str, _frame: u32) -> Result<ImageBuf> {
            Ok(ImageBuf {
                metadata: Some(self.meta.clone()),
                buf: vec![0u8; (self.width * self.height * 2) as usize],
                width: self.width,
                height: self.height,
                depth: 2,
                bad_pixel_map: None,
                provenance: Provenance::Decoded,
            })
        }
    }

    fn fixture_ctx() -> Context {
        let mut ctx = Context::new(1000, 16);
        ctx.register_decoder(
            FileType::NexusHdf5,
            Arc::new(FixedDecoder {
                meta: serde_json::json!({"mean": 10.0, "stddev": 2.0}),
                width: 16,
                height: 16,
            }),
        );
        ctx
    }

    #[test]
    fn get_raw_decodes_once_and_caches() {
        let ctx = fixture_ctx();
        let h1 = ctx.get_raw("/data/f.h5", 1).unwrap();
        assert!(h1.buffer().unwrap().is_well_formed());
        ctx.release(h1);

        let h2 = ctx.get_raw("/data/f.h5", 1).unwrap();
        assert_eq!(ctx.registry().len(), 1);
        ctx.release(h2);
    }

    #[test]
    fn unknown_file_type_is_unsupported() {
        let ctx = fixture_ctx();
        let err = ctx.get_raw("/data/f.xyz", 1).unwrap_err();
        assert!(matches!(err, IsError::Unsupported(_)));
    }

    #[test]
    fn reduce_identity_passthrough() {
        let ctx = fixture_ctx();
        let params = ReductionParams::normalized(1.0, 0.0, 0.0, 16, 16);
        let identity = |buf: &ImageBuf, _: &ReductionParams| Ok(buf.clone());
        let h = ctx.reduce("/data/f.h5", 1, &params, &identity).unwrap();
        assert_eq!(h.buffer().unwrap().width, 16);
        ctx.release(h);
        // raw + reduced entries both present
        assert_eq!(ctx.registry().len(), 2);
    }
}
