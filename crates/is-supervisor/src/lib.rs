//! The per-identity supervisor and its worker thread pool (spec §4.4).
//! Grounded on `isWorker.c`: a router/dealer pair forwards frames verbatim
//! between the parent process and an inproc dealer that worker threads'
//! reply sockets connect to.

pub mod forward;
pub mod supervisor;
pub mod worker;

pub use supervisor::{run, SupervisorConfig};

/// Poll timeout used by both the forwarding loop and each worker thread, so
/// `shutdown` is checked promptly without busy-spinning.
pub(crate) const POLL_TIMEOUT_MS: i64 = 250;
