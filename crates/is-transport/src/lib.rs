//! Message-oriented transport plumbing (spec §4.3/§4.4): zero-HWM ROUTER/
//! DEALER/REP sockets, abstract-namespace endpoint naming, rebuildable poll
//! sets, and the graceful-shutdown flag shared by the root router and every
//! per-identity supervisor. Grounded on `isMain.c`/`isProcessManagement.c`.

pub mod endpoint;
pub mod poll;
pub mod shutdown;
pub mod socket;

pub use endpoint::{inproc_endpoint, ipc_endpoint};
pub use poll::PollSet;
pub use shutdown::ShutdownFlag;
