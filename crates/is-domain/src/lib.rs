//! Shared, I/O-free types for the image server: request fingerprints, cache
//! keys, the error enum, and the process-registry / image-buffer-entry state
//! machines. Every other crate in the workspace depends on this one.

pub mod cache_key;
pub mod error;
pub mod request;
pub mod state;

pub use cache_key::CacheKey;
pub use error::IsError;
pub use request::{Operation, ReductionParams, RequestFingerprint};
pub use state::{BufferState, ProcessState};
