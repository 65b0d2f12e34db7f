//! The root process's request router (spec §4.3). Grounded on `isMain.c`'s
//! main loop: a transport-facing router, an error-echo dealer/rep pair used
//! to turn a synchronous error reply into a routed envelope, and one dealer
//! per running child. Authenticates first encounters of a `(pid, esaf)`
//! pair against the remote key/value store, spawns a child on success, and
//! forwards everything else verbatim.

use crate::registry::{registry_key, ChildEntry, Registry};
use crate::spawn;
use anyhow::{anyhow, Context as _, Result};
use is_auth::{AuthBlob, HmacSha256Verifier};
use is_cache::{FileType, ImageDecoder};
use is_proto::envelope::{read_envelope, Envelope};
use is_reduce::render::JpegEncoder;
use is_ops::ProcessRunner;
use is_supervisor::SupervisorConfig;
use is_transport::{ipc_endpoint, socket, PollSet, ShutdownFlag};
use std::sync::Arc;

/// Shared with every per-identity supervisor's own poll loop (spec §4.4),
/// so shutdown is noticed promptly without busy-spinning.
const POLL_TIMEOUT_MS: i64 = 250;

/// Fixed abstract-namespace endpoint for the error-echo pair (original:
/// `is.h`'s `ERR_REP`, `"inproc://#err_rep"`).
const ERROR_ENDPOINT: &str = "inproc://#err_rep";

pub struct RootConfig {
    pub dealer_address: String,
    pub remote_store_url: Option<String>,
    pub auth_public_key: Vec<u8>,
    /// Bypass signature verification with a synthetic `isAuth` blob
    /// (SPEC_FULL.md §2 "dev_mode auth bypass"). Never set in production.
    pub dev_mode: bool,
    pub worker_threads: usize,
    pub max_buffers: usize,
    pub decoders: Vec<(FileType, Arc<dyn ImageDecoder>)>,
    pub encoder: Arc<dyn JpegEncoder>,
    pub process_runner: Arc<dyn ProcessRunner>,
}

pub fn run_root(shutdown: ShutdownFlag, config: RootConfig) -> Result<()> {
    let zctx = zmq::Context::new();

    let router = socket::new_router(&zctx).context("creating transport router")?;
    socket::connect(&router, &config.dealer_address).context("connecting transport router")?;

    let error_dealer = socket::new_dealer(&zctx).context("creating error dealer")?;
    socket::bind(&error_dealer, ERROR_ENDPOINT).context("binding error dealer")?;
    let error_rep = socket::new_rep(&zctx).context("creating error rep")?;
    socket::connect(&error_rep, ERROR_ENDPOINT).context("connecting error rep")?;

    let verifier = HmacSha256Verifier;
    let mut registry = Registry::new();

    tracing::info!(target: "router", address = %config.dealer_address, "root router started");

    while shutdown.is_running() {
        let child_keys: Vec<String> = registry.dealers().map(|(k, _)| k.to_string()).collect();

        // Scoped so the poll set's borrow of `registry` (through the child
        // dealer sockets) ends before the handlers below need `&mut
        // registry` again.
        let readable: Vec<bool> = {
            let sockets: Vec<&zmq::Socket> = std::iter::once(&router)
                .chain(std::iter::once(&error_rep))
                .chain(std::iter::once(&error_dealer))
                .chain(child_keys.iter().map(|k| &registry.find(k).expect("key came from this registry").parent_dealer))
                .collect();
            let mut poll = PollSet::new(sockets);

            if poll.poll(POLL_TIMEOUT_MS)? <= 0 {
                continue;
            }
            (0..poll.len()).map(|i| poll.is_readable(i)).collect()
        };

        if readable[1] {
            is_supervisor::forward::relay(&error_rep, &error_rep)?;
        }
        if readable[2] {
            is_supervisor::forward::relay(&error_dealer, &router)?;
        }
        for (i, key) in child_keys.iter().enumerate() {
            if readable[i + 3] {
                let dealer = &registry.find(key).expect("key came from this registry").parent_dealer;
                is_supervisor::forward::relay(dealer, &router)?;
            }
        }

        if readable[0] {
            if let Err(e) = handle_incoming(&zctx, &router, &error_dealer, &verifier, &mut registry, &shutdown, &config) {
                tracing::error!(target: "router", error = %e, "fatal error handling incoming request");
                return Err(e);
            }
        }
    }

    Ok(())
}

fn send_error(error_dealer: &zmq::Socket, envelope: &Envelope, msg: &str) -> Result<()> {
    tracing::warn!(target: "router", %msg, "rejecting request");
    let frames = envelope.prefix(vec![msg.as_bytes().to_vec()]);
    socket::send_multipart(error_dealer, frames).map_err(|e| anyhow!(e))
}

#[allow(clippy::too_many_arguments)]
fn handle_incoming(
    zctx: &zmq::Context,
    router: &zmq::Socket,
    error_dealer: &zmq::Socket,
    verifier: &HmacSha256Verifier,
    registry: &mut Registry,
    shutdown: &ShutdownFlag,
    config: &RootConfig,
) -> Result<()> {
    let all = socket::recv_multipart(router).map_err(|e| anyhow!(e))?;
    let mut iter = all.into_iter();
    let envelope = match read_envelope(iter.by_ref()) {
        Ok(e) => e,
        // Cap exhaustion (or a malformed stream) is fatal to the router
        // (spec §4.3: "cap exhaustion is fatal").
        Err(e) => return Err(anyhow!(e)),
    };
    let rest: Vec<Vec<u8>> = iter.collect();
    let Some(payload) = rest.first() else {
        return send_error(error_dealer, &envelope, "request contained no payload");
    };

    let request: serde_json::Value = match serde_json::from_slice(payload) {
        Ok(v) => v,
        Err(e) => return send_error(error_dealer, &envelope, &format!("failed to parse request: {e}")),
    };

    let Some(session_id) = request.get("pid").and_then(|v| v.as_str()) else {
        return send_error(error_dealer, &envelope, "request does not contain pid");
    };
    let esaf = request.get("esaf").and_then(|v| v.as_u64()).unwrap_or(0) as u32;

    tracing::info!(target: "router", pid = session_id, esaf, "got request");

    let key = registry_key(session_id, esaf, config.dev_mode);

    if registry.find(&key).is_some() {
        if let Err(e) = revalidate_session(config, session_id) {
            registry.terminate_and_remove(&key);
            return send_error(error_dealer, &envelope, &format!("process {session_id} is not active: {e}"));
        }
    } else {
        let auth = match authenticate_session(verifier, config, session_id, esaf) {
            Ok(auth) => auth,
            Err(e) => return send_error(error_dealer, &envelope, &format!("process {session_id} is not authorized: {e}")),
        };

        spawn_one(zctx, registry, config, key.clone(), session_id, esaf, &auth, shutdown.clone())?;
    }

    let Some(entry) = registry.find(&key) else {
        return send_error(error_dealer, &envelope, &format!("process {session_id} could not be started"));
    };
    let frames = envelope.prefix(rest);
    socket::send_multipart(&entry.parent_dealer, frames).map_err(|e| anyhow!(e))
}

fn revalidate_session(config: &RootConfig, session_id: &str) -> Result<()> {
    if config.dev_mode {
        return Ok(());
    }
    let url = config
        .remote_store_url
        .as_deref()
        .ok_or_else(|| anyhow!("no remote store configured"))?;
    let mut conn = redis::Client::open(url)?.get_connection()?;
    let exists: i64 = redis::cmd("EXISTS").arg(session_id).query(&mut conn)?;
    if exists == 0 {
        return Err(anyhow!("session no longer present in remote store"));
    }
    Ok(())
}

fn authenticate_session(
    verifier: &HmacSha256Verifier,
    config: &RootConfig,
    session_id: &str,
    esaf: u32,
) -> Result<AuthBlob> {
    if config.dev_mode {
        tracing::warn!(target: "router", session_id, "dev_mode: bypassing authentication");
        return Ok(AuthBlob {
            pid: session_id.to_string(),
            uid: nix::unistd::getuid().as_raw(),
            role: "dev".to_string(),
            allowed_esafs: vec![0],
        });
    }

    let url = config
        .remote_store_url
        .as_deref()
        .ok_or_else(|| anyhow!("no remote store configured"))?;
    let mut conn = redis::Client::open(url)?.get_connection()?;
    let (raw_auth, raw_sig): (Option<String>, Option<String>) = redis::cmd("HMGET")
        .arg(session_id)
        .arg("isAuth")
        .arg("isAuthSig")
        .query(&mut conn)?;
    let raw_auth = raw_auth.ok_or_else(|| anyhow!("no isAuth entry for {session_id}"))?;
    let raw_sig = raw_sig.ok_or_else(|| anyhow!("no isAuthSig entry for {session_id}"))?;

    is_auth::authenticate(verifier, &raw_auth, &raw_sig, &config.auth_public_key, session_id, esaf)
        .map_err(|e| anyhow!(e))
}

#[allow(clippy::too_many_arguments)]
fn spawn_one(
    zctx: &zmq::Context,
    registry: &mut Registry,
    config: &RootConfig,
    key: String,
    session_id: &str,
    esaf: u32,
    auth: &AuthBlob,
    shutdown: ShutdownFlag,
) -> Result<()> {
    let parent_dealer = socket::new_dealer(zctx).map_err(|e| anyhow!(e))?;
    socket::bind(&parent_dealer, &ipc_endpoint(&key)).map_err(|e| anyhow!(e))?;

    let worker_threads = config.worker_threads;
    let max_buffers = config.max_buffers;
    let decoders = config.decoders.clone();
    let encoder = Arc::clone(&config.encoder);
    let process_runner = Arc::clone(&config.process_runner);
    let spawn_key = key.clone();

    let child_pid = spawn::spawn_child(&spawn_key, auth, esaf, shutdown, move |gid| SupervisorConfig {
        key: spawn_key.clone(),
        gid,
        worker_threads,
        max_buffers,
        decoders,
        encoder,
        process_runner,
    })?;

    registry.insert(ChildEntry {
        key: key.clone(),
        esaf,
        session_id: session_id.to_string(),
        child_pid,
        parent_dealer,
        state: is_domain::state::ProcessState::Running,
    });

    tracing::info!(target: "router", key = %key, pid = child_pid.as_raw(), "spawned child");
    Ok(())
}
