//! Graceful-shutdown flag (spec §4.4 "Install signal handlers that set a
//! `running` flag to false on SIGTERM/SIGINT"; DESIGN NOTES §9: "use a
//! self-pipe or a cancellation token observed by the main poll loop").
//! `signal_hook::flag::register` is the self-pipe under the hood; the flag
//! itself is a cheaply clonable handle observed by the main poll loop,
//! mirroring the clone-handle/listener split of an async shutdown notifier
//! but built on a plain `AtomicBool` for a synchronous poll loop.

use is_domain::error::{IsError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone)]
pub struct ShutdownFlag {
    stopped: Arc<AtomicBool>,
}

impl ShutdownFlag {
    /// Install SIGTERM/SIGINT handlers that flip the flag. Safe to call
    /// once per process; installing twice just registers two handlers for
    /// the same flag.
    pub fn install() -> Result<Self> {
        let stopped = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(signal_hook::consts::SIGTERM, stopped.clone())
            .map_err(|e| IsError::TransportError(format!("failed to install SIGTERM handler: {e}")))?;
        signal_hook::flag::register(signal_hook::consts::SIGINT, stopped.clone())
            .map_err(|e| IsError::TransportError(format!("failed to install SIGINT handler: {e}")))?;
        Ok(ShutdownFlag { stopped })
    }

    /// A flag with no signal handlers installed, for tests and for workers
    /// that take their shutdown cue from their supervisor rather than a
    /// signal.
    pub fn manual() -> Self {
        ShutdownFlag {
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }
}
