//! The per-process image buffer cache (spec §4.1): registry with
//! compaction, per-entry reader/writer locking, file-type dispatch, and the
//! `get_raw`/`reduce`/`release`/`destroy_context` operations.

pub mod context;
pub mod entry;
pub mod file_type;
pub mod registry;

pub use context::{Context, ImageDecoder, ReaderHandle};
pub use entry::{Entry, ImageBuf, Provenance};
pub use file_type::FileType;
pub use registry::{GetOrCreate, Registry};
