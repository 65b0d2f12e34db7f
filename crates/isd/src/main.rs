//! `isd`: the image server daemon entrypoint. Grounded on `ox-bin/src/
//! main.rs`'s `AppStartup` for the CLI/logging/panic-hook bootstrap shape,
//! retargeted from an interactive editor to a forking daemon.

mod decoders;
mod encoder;
mod pidfile;
mod registry;
mod router;
mod spawn;

use anyhow::{Context, Result};
use clap::Parser;
use is_cache::FileType;
use is_exec::SubprocessRunner;
use is_ops::ProcessRunner;
use is_reduce::render::JpegEncoder;
use is_transport::ShutdownFlag;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use tracing_appender::non_blocking::WorkerGuard;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "isd", version, about = "X-ray diffraction image server")]
struct Args {
    /// Configuration file path (overrides `IS_CONFIG` and the built-in
    /// default location).
    #[arg(long = "config")]
    config: Option<PathBuf>,
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        AppStartup { log_guard: None }
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join("isd.log");
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, "isd.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
        {
            Ok(_) => self.log_guard = Some(guard),
            Err(_) => {
                // Global subscriber already installed (e.g. under test harnesses).
            }
        }
        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

fn load_auth_public_key(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(p) => std::fs::read(p).with_context(|| format!("reading auth public key {}", p.display())),
        None => {
            tracing::warn!(target: "startup", "no auth_public_key_path configured; using an empty pinned key");
            Ok(Vec::new())
        }
    }
}

fn main() -> Result<()> {
    let mut startup = AppStartup::new();
    startup.configure_logging()?;
    AppStartup::install_panic_hook();

    let args = Args::parse();
    let config = match args.config {
        Some(path) => is_config::Config::load(&path)?,
        None => is_config::Config::load_default()?,
    };

    tracing::info!(target: "startup", dealer_address = %config.dealer_address, dev_mode = config.dev_mode, "isd starting");

    pidfile::take_over(&config.pid_file).context("pid file takeover failed")?;
    let shutdown = ShutdownFlag::install().context("failed to install signal handlers")?;

    let auth_public_key = load_auth_public_key(config.auth_public_key_path.as_deref())?;

    let decoder_table: Vec<(FileType, Arc<dyn is_cache::ImageDecoder>)> =
        vec![(FileType::Tiff, Arc::new(decoders::TiffDecoder))];

    let encoder: Arc<dyn JpegEncoder> = Arc::new(encoder::BaselineJpegEncoder);
    let process_runner: Arc<dyn ProcessRunner> =
        Arc::new(SubprocessRunner::new(config.indexer_bin.clone(), config.local_store_url.clone()));

    let root_config = router::RootConfig {
        dealer_address: config.dealer_address,
        remote_store_url: config.remote_store_url,
        auth_public_key,
        dev_mode: config.dev_mode,
        worker_threads: config.worker_threads,
        max_buffers: config.max_buffers,
        decoders: decoder_table,
        encoder,
        process_runner,
    };

    router::run_root(shutdown, root_config)
}
