//! Restart recovery for in-flight `transfer` jobs (spec §4.5 "Restart
//! recovery"). Grounded on `isRsync.c`'s `isRsyncRecover`: read the local
//! key/value store's `RSYNCS` hash, kill any surviving child that still has
//! the expected ownership, then hand the job back to the caller to re-fork.

use is_domain::error::{IsError, Result};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::os::unix::fs::MetadataExt;
use std::thread::sleep;
use std::time::Duration;

/// One `RSYNCS` hash entry worth re-forking.
#[derive(Debug, Clone)]
pub struct RecoveredJob {
    pub tag: String,
    pub job: serde_json::Value,
    pub uid: u32,
    pub gid: u32,
}

/// Read every `tag -> {job, childPid, uid, gid}` entry from the `RSYNCS`
/// hash, kill any surviving process that still has the expected
/// uid/gid, clear the hash, and return the jobs for the caller to re-fork.
pub fn recover(conn: &mut redis::Connection) -> Result<Vec<RecoveredJob>> {
    let entries: Vec<(String, String)> = redis::cmd("HGETALL")
        .arg("RSYNCS")
        .query(conn)
        .map_err(|e| IsError::TransportError(format!("HGETALL RSYNCS failed: {e}")))?;

    let mut recovered = Vec::new();

    for (tag, raw) in entries {
        let parsed: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(tag = %tag, error = %e, "failed to parse RSYNCS entry, skipping");
                continue;
            }
        };

        let pid = parsed.get("childPid").and_then(|v| v.as_i64());
        let uid = parsed.get("uid").and_then(|v| v.as_u64()).map(|v| v as u32);
        let gid = parsed.get("gid").and_then(|v| v.as_u64()).map(|v| v as u32);

        let (Some(pid), Some(uid), Some(gid)) = (pid, uid, gid) else {
            tracing::warn!(tag = %tag, "RSYNCS entry missing childPid/uid/gid, skipping");
            let _: () = redis::cmd("HDEL").arg("RSYNCS").arg(&tag).query(conn).unwrap_or_default();
            continue;
        };

        if owned_by(pid, uid, gid) {
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGINT);
            sleep(Duration::from_secs(1));
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
        }

        let _: () = redis::cmd("HDEL").arg("RSYNCS").arg(&tag).query(conn).unwrap_or_default();

        recovered.push(RecoveredJob {
            tag,
            job: parsed.get("job").cloned().unwrap_or(parsed),
            uid,
            gid,
        });
    }

    Ok(recovered)
}

fn owned_by(pid: i64, expected_uid: u32, expected_gid: u32) -> bool {
    std::fs::metadata(format!("/proc/{pid}"))
        .map(|m| m.uid() == expected_uid && m.gid() == expected_gid)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonexistent_pid_is_never_owned() {
        assert!(!owned_by(i64::MAX - 1, 1000, 1000));
    }
}
