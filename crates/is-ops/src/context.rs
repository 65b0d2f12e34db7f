//! Wiring a worker thread needs to dispatch a request: the per-process cache,
//! the injected reduction function, a JPEG encoder, and the external-process
//! collaborator for `index`/`transfer`/`connection-test` (spec §4.5). The
//! concrete `ProcessRunner` lives in `is-exec`; this crate only names the
//! boundary, following the same pattern `is-cache::Context::reduce` uses for
//! the reducer closure, to avoid a dependency cycle on `is-exec`.

use is_cache::{Context as CacheContext, ImageBuf};
use is_domain::error::Result;
use is_domain::request::{ReductionParams, RemotePubSub};
use is_reduce::render::JpegEncoder;
use std::sync::Arc;

/// A declarative description of an external helper to run (spec §4.5): the
/// command line, and where to re-publish progress, if anywhere.
#[derive(Debug, Clone)]
pub struct ProcessJob {
    pub program: String,
    pub args: Vec<String>,
    pub tag: String,
    pub progress: Option<RemotePubSub>,
}

/// What came back once the external helper exited.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutcome {
    pub exit_ok: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Present for `index`, whose json-fd stream is the authoritative result
    /// (spec §4.5 "Indexer specifics").
    pub json_result: Option<serde_json::Value>,
}

/// The out-of-scope external-process collaborator (spec §4.5), implemented
/// by `is-exec`.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, job: &ProcessJob) -> Result<ProcessOutcome>;
}

/// Everything a worker thread needs to dispatch one request (spec §4.4).
pub struct OpsContext<'a> {
    pub cache: &'a CacheContext,
    pub reducer: &'a dyn Fn(&ImageBuf, &ReductionParams) -> Result<ImageBuf>,
    pub encoder: &'a dyn JpegEncoder,
    pub process_runner: Arc<dyn ProcessRunner>,
}
