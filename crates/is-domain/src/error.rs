//! Crate-wide error kinds, matching spec §7.

use thiserror::Error;

/// The error kinds a request can fail with, as routed back to the client.
#[derive(Debug, Error)]
pub enum IsError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not authorized")]
    Unauthorized,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unsupported file type: {0}")]
    Unsupported(String),

    #[error("decode error: {0}")]
    DecodeError(String),

    #[error("out of memory: {0}")]
    Oom(String),

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("failed to launch subprocess: {0}")]
    SubprocessLaunchError(String),

    #[error("subprocess failed: {0}")]
    SubprocessRuntimeError(String),
}

impl IsError {
    /// `oom` is fatal to the owning process; everything else is a per-request
    /// failure that gets turned into an error reply.
    pub fn is_fatal(&self) -> bool {
        matches!(self, IsError::Oom(_))
    }
}

pub type Result<T> = std::result::Result<T, IsError>;
