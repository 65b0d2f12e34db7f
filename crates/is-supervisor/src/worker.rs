//! One worker thread's body (spec §4.4 "Thread pool"). Grounded on
//! `isWorker.c`'s `isWorker`: open a reply socket connected to the
//! supervisor's inproc dealer, then loop receive/dispatch/reply. The
//! blocking `zmq_msg_recv` of the original becomes a timed poll here so the
//! thread can notice `shutdown` between requests instead of running until
//! the process is killed.

use is_cache::Context as CacheContext;
use is_domain::error::Result;
use is_ops::{OpsContext, ProcessRunner};
use is_proto::Reply;
use is_reduce::render::JpegEncoder;
use is_transport::{inproc_endpoint, socket, PollSet, ShutdownFlag};
use std::sync::Arc;

use crate::POLL_TIMEOUT_MS;

pub fn run_one(
    zctx: &zmq::Context,
    key: &str,
    cache: &CacheContext,
    encoder: &dyn JpegEncoder,
    process_runner: &Arc<dyn ProcessRunner>,
    shutdown: &ShutdownFlag,
) -> Result<()> {
    let rep = socket::new_rep(zctx)?;
    socket::connect(&rep, &inproc_endpoint(key))?;
    let mut poll = PollSet::new([&rep]);

    let reducer = &is_reduce::reduce;
    let ops_ctx = OpsContext {
        cache,
        reducer,
        encoder,
        process_runner: Arc::clone(process_runner),
    };

    while shutdown.is_running() {
        if poll.poll(POLL_TIMEOUT_MS)? == 0 || !poll.is_readable(0) {
            continue;
        }

        let frames = socket::recv_multipart(&rep)?;
        let payload = frames.into_iter().next().unwrap_or_default();

        let reply = match is_proto::parse_request(&payload) {
            Ok(req) => is_ops::dispatch(&ops_ctx, &req, &payload, payload.clone()),
            Err(e) => Reply::Error(e.to_string()),
        };

        socket::send_multipart(&rep, reply.into_frames())?;
    }

    Ok(())
}
