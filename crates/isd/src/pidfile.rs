//! PID file takeover (SPEC_FULL.md §2, spec §6 "Persisted state"). Grounded
//! on `isProcessManagement.c`'s `isInit`: read any pid left behind by a
//! previous run, kill its whole process group, then record our own pid.

use anyhow::{Context, Result};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::io::Write;
use std::path::Path;

/// If `path` names a still-living process group, send it `SIGKILL`
/// (process-group-wide, per the original); a missing file or an already-dead
/// pid are not errors. Then write our own pid to `path`.
pub fn take_over(path: &Path) -> Result<()> {
    if let Ok(text) = std::fs::read_to_string(path) {
        if let Ok(old_pid) = text.trim().parse::<i32>() {
            match signal::kill(Pid::from_raw(-old_pid), Signal::SIGKILL) {
                Ok(()) => tracing::info!(target: "router", old_pid, "killed previous process group"),
                Err(nix::errno::Errno::ESRCH) => {}
                Err(e) => tracing::warn!(target: "router", old_pid, error = %e, "failed to kill previous process group"),
            }
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let mut f = std::fs::File::create(path)
        .with_context(|| format!("creating pid file {}", path.display()))?;
    write!(f, "{}", std::process::id())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_our_own_pid_when_file_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("is.pid");
        take_over(&path).unwrap();
        let written: u32 = std::fs::read_to_string(&path).unwrap().parse().unwrap();
        assert_eq!(written, std::process::id());
    }

    #[test]
    fn stale_unkillable_pid_does_not_abort_takeover() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("is.pid");
        std::fs::write(&path, "999999999").unwrap();
        take_over(&path).unwrap();
        let written: u32 = std::fs::read_to_string(&path).unwrap().parse().unwrap();
        assert_eq!(written, std::process::id());
    }
}
