//! The per-operation dispatcher (spec §4.4): `jpeg`, `blank`, `spots`,
//! `metadata`, `index`, `transfer`, `connection-test`, `directory-stats`.
//! Grounded on `isWorker.c`'s worker thread loop.

pub mod connection_test;
pub mod context;
pub mod directory_stats;
pub mod dispatch;
pub mod index;
pub mod jpeg;
pub mod metadata;
pub mod transfer;

pub use context::{OpsContext, ProcessJob, ProcessOutcome, ProcessRunner};
pub use dispatch::dispatch;
