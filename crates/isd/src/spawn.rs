//! Privilege-dropping fork into a per-identity supervisor (spec §4.3
//! "Spawning"). Grounded on `isProcessManagement.c`'s `isStartProcess`: look
//! up the calling user's passwd entry, resolve the group (the ESAF
//! pseudo-user's gid when `esaf > 40000`, else the user's own gid) and home
//! directory, fork, then in the child `setgid`/`setuid`/`chdir` before
//! entering the supervisor.

use anyhow::{anyhow, Context, Result};
use is_auth::AuthBlob;
use is_supervisor::SupervisorConfig;
use is_transport::ShutdownFlag;
use nix::unistd::{self, ForkResult, Gid, Pid, Uid, User};
use std::path::PathBuf;

struct Identity {
    uid: Uid,
    gid: Gid,
    home: PathBuf,
}

/// ESAF numbers above this threshold are real beamline experiments with
/// their own `e{esaf}` pseudo-user and group; at or below it, run with the
/// calling user's own group (original: `p->esaf > 40000`).
const ESAF_THRESHOLD: u32 = 40000;

fn resolve_identity(auth: &AuthBlob, esaf: u32) -> Result<Identity> {
    let uid = Uid::from_raw(auth.uid);
    let user = User::from_uid(uid)
        .context("passwd lookup failed")?
        .ok_or_else(|| anyhow!("no passwd entry for uid {}", auth.uid))?;

    if esaf > ESAF_THRESHOLD {
        let esaf_user_name = format!("e{esaf}");
        let esaf_user = User::from_name(&esaf_user_name)
            .context("esaf passwd lookup failed")?
            .ok_or_else(|| anyhow!("no passwd entry for esaf user {esaf_user_name}"))?;
        Ok(Identity { uid, gid: esaf_user.gid, home: esaf_user.dir })
    } else {
        Ok(Identity { uid, gid: user.gid, home: user.dir })
    }
}

/// Fork and, in the child, drop privileges and run the supervisor for
/// `key`. Returns the child's pid to the parent; never returns in the
/// child (it calls `is_supervisor::run` and exits when that returns).
///
/// `build_config` is only invoked in the child, after the fork, so it may
/// freely reference the resolved `gid` to build the cache context's
/// partition key.
pub fn spawn_child(
    key: &str,
    auth: &AuthBlob,
    esaf: u32,
    shutdown: ShutdownFlag,
    build_config: impl FnOnce(u32) -> SupervisorConfig,
) -> Result<Pid> {
    let identity = resolve_identity(auth, esaf)?;

    tracing::info!(
        target: "router", key, uid = identity.uid.as_raw(), gid = identity.gid.as_raw(),
        home = %identity.home.display(), "starting sub process"
    );

    // SAFETY: the root process is single-threaded in its main loop (spec
    // §5), so forking here never races another thread's locks.
    match unsafe { unistd::fork() }.context("fork failed")? {
        ForkResult::Parent { child } => Ok(child),
        ForkResult::Child => {
            if let Err(e) = drop_privileges(&identity) {
                tracing::error!(target: "router", key, error = %e, "privilege drop failed in child");
                std::process::exit(1);
            }

            let config = build_config(identity.gid.as_raw());
            if let Err(e) = is_supervisor::run(shutdown, config) {
                tracing::error!(target: "router", key, error = %e, "supervisor exited with error");
                std::process::exit(1);
            }
            std::process::exit(0);
        }
    }
}

fn drop_privileges(identity: &Identity) -> Result<()> {
    unistd::setgid(identity.gid).context("setgid failed")?;
    unistd::setuid(identity.uid).context("setuid failed")?;
    unistd::chdir(&identity.home).context("chdir failed")?;
    Ok(())
}
