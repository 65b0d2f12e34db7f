//! The root process's child registry (spec §4.3/§4.6). Grounded on
//! `isProcessManagement.c`'s hash-table-backed process list: a map from the
//! composite key to everything needed to reach and reap one child.

use is_domain::state::ProcessState;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag};
use nix::unistd::Pid;
use std::collections::HashMap;

/// `{session_id}-{esaf}`, with a `-dev` suffix in dev mode (`isProcessManagement.c`'s
/// `isCreateProcessListItem`/`isFindProcess`: `snprintf(ourKey, ..., "%s-%d%s", pid, esaf, dev_mode ? "-dev" : "")`).
pub fn registry_key(session_id: &str, esaf: u32, dev_mode: bool) -> String {
    if dev_mode {
        format!("{session_id}-{esaf}-dev")
    } else {
        format!("{session_id}-{esaf}")
    }
}

pub struct ChildEntry {
    pub key: String,
    pub esaf: u32,
    pub session_id: String,
    pub child_pid: nix::unistd::Pid,
    pub parent_dealer: zmq::Socket,
    pub state: ProcessState,
}

#[derive(Default)]
pub struct Registry {
    children: HashMap<String, ChildEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn find(&self, key: &str) -> Option<&ChildEntry> {
        self.children.get(key)
    }

    pub fn insert(&mut self, entry: ChildEntry) {
        self.children.insert(entry.key.clone(), entry);
    }

    /// Drop the entry and return its dealer so the caller can close it
    /// outside the registry's borrow.
    pub fn remove(&mut self, key: &str) -> Option<ChildEntry> {
        self.children.remove(key)
    }

    /// `running -> defunct -> absent`: remove the entry and terminate its
    /// child process (spec §4.6 process lifecycle), returning the removed
    /// entry for logging.
    pub fn terminate_and_remove(&mut self, key: &str) -> Option<ChildEntry> {
        let entry = self.children.remove(key)?;
        terminate_child(entry.key.as_str(), entry.child_pid);
        Some(entry)
    }

    pub fn dealers(&self) -> impl Iterator<Item = (&str, &zmq::Socket)> {
        self.children.iter().map(|(k, v)| (k.as_str(), &v.parent_dealer))
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// `SIGTERM` the child, then a non-blocking reap (`isProcessManagement.c`'s
/// expired-session sweep: `kill(plp->processID, SIGTERM)` followed by
/// `waitpid(plp->processID, NULL, WNOHANG)`). A still-running child is
/// picked up by a later `WNOHANG` reap rather than blocking the router here.
fn terminate_child(key: &str, pid: Pid) {
    match signal::kill(pid, Signal::SIGTERM) {
        Ok(()) => match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(_) => {}
            Err(e) => tracing::warn!(target: "router", key, pid = pid.as_raw(), error = %e, "waitpid after SIGTERM failed"),
        },
        Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => tracing::warn!(target: "router", key, pid = pid.as_raw(), error = %e, "failed to SIGTERM child"),
    }
}
