//! The per-identity supervisor (spec §4.4). Grounded on `isWorker.c`'s
//! `isSupervisor`: connect a router to the parent's per-key ipc dealer, bind
//! a dealer workers connect their reply sockets to, start the worker pool,
//! then forward frames verbatim between router and dealer until shutdown.

use is_cache::{Context as CacheContext, ImageDecoder};
use is_domain::error::Result;
use is_ops::ProcessRunner;
use is_reduce::render::JpegEncoder;
use is_transport::{ipc_endpoint, inproc_endpoint, socket, PollSet, ShutdownFlag};
use std::sync::Arc;

use crate::{forward, worker, POLL_TIMEOUT_MS};

/// Everything needed to bring up one identity's supervisor + worker pool.
pub struct SupervisorConfig {
    /// The process registry key (`{pid}-{esaf}` or `{pid}-{esaf}-dev`),
    /// shared with the ipc/inproc endpoint names (spec §4.3/§4.4).
    pub key: String,
    /// The gid this process was dropped to before `isd` handed off here
    /// (spec §4.3 "Spawning"); becomes the cache's partition key.
    pub gid: u32,
    pub worker_threads: usize,
    pub max_buffers: usize,
    pub decoders: Vec<(is_cache::FileType, Arc<dyn ImageDecoder>)>,
    pub encoder: Arc<dyn JpegEncoder>,
    pub process_runner: Arc<dyn ProcessRunner>,
}

pub fn run(shutdown: ShutdownFlag, config: SupervisorConfig) -> Result<()> {
    let zctx = zmq::Context::new();

    let router = socket::new_router(&zctx)?;
    socket::connect(&router, &ipc_endpoint(&config.key))?;

    let dealer = socket::new_dealer(&zctx)?;
    socket::bind(&dealer, &inproc_endpoint(&config.key))?;

    let mut cache = CacheContext::new(config.gid, config.max_buffers);
    for (ft, decoder) in config.decoders {
        cache.register_decoder(ft, decoder);
    }
    let cache = cache;

    let encoder: &dyn JpegEncoder = config.encoder.as_ref();
    let process_runner = config.process_runner;
    let key = config.key;

    tracing::info!(target: "supervisor", key = %key, threads = config.worker_threads, "starting supervisor");

    let zctx = &zctx;
    std::thread::scope(|scope| {
        for i in 0..config.worker_threads {
            let shutdown = shutdown.clone();
            let cache = &cache;
            let process_runner = Arc::clone(&process_runner);
            let key = key.clone();
            scope.spawn(move || {
                if let Err(e) = worker::run_one(zctx, &key, cache, encoder, &process_runner, &shutdown) {
                    tracing::error!(target: "supervisor", error = %e, worker = i, "worker exited with error");
                }
            });
        }

        let mut poll = PollSet::new([&dealer, &router]);
        while shutdown.is_running() {
            if poll.poll(POLL_TIMEOUT_MS)? <= 0 {
                continue;
            }
            if poll.is_readable(0) {
                forward::relay(&dealer, &router)?;
            }
            if poll.is_readable(1) {
                forward::relay(&router, &dealer)?;
            }
        }
        Ok(())
    })?;

    tracing::info!(target: "supervisor", key = %key, "supervisor stopped, destroying cache context");
    cache.destroy();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_ops::{ProcessJob, ProcessOutcome};

    struct NoopRunner;
    impl ProcessRunner for NoopRunner {
        fn run(&self, _job: &ProcessJob) -> Result<ProcessOutcome> {
            Ok(ProcessOutcome::default())
        }
    }

    struct FakeEncoder;
    impl JpegEncoder for FakeEncoder {
        fn encode(&self, rgb: &[u8], _w: u32, _h: u32, _q: u8) -> Result<Vec<u8>> {
            Ok(rgb.to_vec())
        }
    }

    #[test]
    fn stops_cleanly_once_shutdown_is_signaled() {
        let key = "supervisor-test-shutdown-0";
        let zctx = zmq::Context::new();

        // Stand in for the root process: bind the per-key ipc dealer the
        // supervisor's router connects out to.
        let root_dealer = socket::new_dealer(&zctx).unwrap();
        socket::bind(&root_dealer, &ipc_endpoint(key)).unwrap();

        let shutdown = ShutdownFlag::manual();
        let config = SupervisorConfig {
            key: key.to_string(),
            gid: 1000,
            worker_threads: 1,
            max_buffers: 16,
            decoders: Vec::new(),
            encoder: Arc::new(FakeEncoder),
            process_runner: Arc::new(NoopRunner),
        };

        std::thread::scope(|scope| {
            let shutdown_for_run = shutdown.clone();
            let handle = scope.spawn(move || run(shutdown_for_run, config));

            // Give the router/dealer a moment to connect/bind before asking
            // everything to stop.
            std::thread::sleep(std::time::Duration::from_millis(50));
            shutdown.stop();

            assert!(handle.join().unwrap().is_ok());
        });
    }
}
