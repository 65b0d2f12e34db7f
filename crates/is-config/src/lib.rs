//! Daemon configuration: a TOML file loaded at a fixed path (overridable via
//! `IS_CONFIG`), with `serde`-derived defaults for everything that used to be
//! a compile-time constant in `is.h`.

use serde::Deserialize;
use std::path::{Path, PathBuf};

fn default_config_path() -> &'static str {
    "/etc/is/is.toml"
}

fn default_pid_file() -> PathBuf {
    PathBuf::from("/var/run/is.pid")
}

fn default_dealer_address() -> String {
    "tcp://10.1.253.10:60202".to_string()
}

fn default_worker_threads() -> usize {
    is_domain::request::DEFAULT_WORKER_THREADS
}

fn default_max_buffers() -> usize {
    is_domain::request::DEFAULT_MAX_BUFFERS
}

fn default_redis_ttl_secs() -> u64 {
    300
}

fn default_indexer_bin() -> String {
    "/usr/bin/is_indexer".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// The upstream dealer's well-known transport address.
    #[serde(default = "default_dealer_address")]
    pub dealer_address: String,

    /// Where this process's pid is recorded; a live pid found here at
    /// startup is killed before the new pid is written (spec §6).
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    /// Worker threads per per-identity child process.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Starting cache capacity before the first compaction doubling.
    #[serde(default = "default_max_buffers")]
    pub max_buffers: usize,

    /// Local key/value store connection string (RSYNCS persistence, per-
    /// thread connections for progress publication).
    #[serde(default)]
    pub local_store_url: Option<String>,

    /// Remote key/value store connection string (auth blob lookup, progress
    /// pub/sub).
    #[serde(default)]
    pub remote_store_url: Option<String>,

    /// How long an authenticated session stays valid in the remote store
    /// before re-validation is required.
    #[serde(default = "default_redis_ttl_secs")]
    pub redis_ttl_secs: u64,

    /// Path to the PEM-encoded public key used to verify signed auth blobs.
    #[serde(default)]
    pub auth_public_key_path: Option<PathBuf>,

    /// When set, authentication is bypassed with a synthetic `isAuth` blob.
    /// Never enable this in production (see SPEC_FULL.md §2).
    #[serde(default)]
    pub dev_mode: bool,

    /// The `index` operation's external indexer binary (spec §4.5).
    #[serde(default = "default_indexer_bin")]
    pub indexer_bin: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            dealer_address: default_dealer_address(),
            pid_file: default_pid_file(),
            worker_threads: default_worker_threads(),
            max_buffers: default_max_buffers(),
            local_store_url: None,
            remote_store_url: None,
            redis_ttl_secs: default_redis_ttl_secs(),
            auth_public_key_path: None,
            dev_mode: false,
            indexer_bin: default_indexer_bin(),
        }
    }
}

impl Config {
    /// Load from an explicit path.
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {e}", path.display()))?;
        let cfg: Config = toml::from_str(&text)
            .map_err(|e| anyhow::anyhow!("parsing config {}: {e}", path.display()))?;
        tracing::info!(target: "config", path = %path.display(), "loaded configuration");
        Ok(cfg)
    }

    /// Resolve the config path from `IS_CONFIG`, falling back to the fixed
    /// default location, then load it. Missing file at the default location
    /// yields built-in defaults rather than an error.
    pub fn load_default() -> anyhow::Result<Config> {
        let path = std::env::var("IS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(default_config_path()));

        if !path.exists() {
            tracing::warn!(target: "config", path = %path.display(), "no config file found, using defaults");
            return Ok(Config::default());
        }
        Config::load(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("is.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "dev_mode = true").unwrap();

        let cfg = Config::load(&path).unwrap();
        assert!(cfg.dev_mode);
        assert_eq!(cfg.worker_threads, is_domain::request::DEFAULT_WORKER_THREADS);
        assert_eq!(cfg.max_buffers, is_domain::request::DEFAULT_MAX_BUFFERS);
    }

    #[test]
    fn load_default_without_file_uses_builtin_defaults() {
        // SAFETY (test-only, single-threaded within this test): point at a
        // path that cannot exist rather than mutate shared process state.
        std::env::set_var("IS_CONFIG", "/nonexistent/is.toml");
        let cfg = Config::load_default().unwrap();
        assert_eq!(cfg.dealer_address, default_dealer_address());
        std::env::remove_var("IS_CONFIG");
    }
}
