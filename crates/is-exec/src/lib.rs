//! External-process orchestration (spec §4.5): fork/pipe/poll plumbing,
//! rsync-style progress parsing and re-publication, indexer staging, and
//! restart recovery. `runner::SubprocessRunner` is the concrete
//! `is_ops::ProcessRunner` a per-identity worker process injects into its
//! `OpsContext`.

pub mod indexer;
pub mod progress;
pub mod recover;
pub mod runner;
pub mod subprocess;

pub use recover::{recover, RecoveredJob};
pub use runner::SubprocessRunner;
