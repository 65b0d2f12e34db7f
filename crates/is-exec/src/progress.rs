//! Progress line parsing and re-publication (spec §4.5 "Progress
//! re-publication"). Grounded on `isRsync.c`'s `to-chk` regex and its
//! `redisCommand(..., "PUBLISH ...")` calls.

use is_domain::error::{IsError, Result};
use is_domain::request::RemotePubSub;
use regex::Regex;
use std::sync::OnceLock;

fn to_chk_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)%.*to-chk=(\d+)/(\d+)").expect("valid regex"))
}

fn percent_only_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)%").expect("valid regex"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSample {
    pub percent: u32,
    pub files_remaining: Option<u64>,
    pub files_total: Option<u64>,
}

/// Parse one rsync `--info=progress2` line, preferring the `to-chk=R/T`
/// form and falling back to a bare `NN%`.
pub fn parse_progress_line(line: &str) -> Option<ProgressSample> {
    if let Some(caps) = to_chk_re().captures(line) {
        return Some(ProgressSample {
            percent: caps[1].parse().ok()?,
            files_remaining: caps[2].parse().ok(),
            files_total: caps[3].parse().ok(),
        });
    }
    let caps = percent_only_re().captures(line)?;
    Some(ProgressSample {
        percent: caps[1].parse().ok()?,
        files_remaining: None,
        files_total: None,
    })
}

/// Build the JSON object published to the remote channel, per spec §4.5.
pub fn progress_payload(sample: Option<&ProgressSample>, tag: &str, stdout_line: &str, done: bool) -> serde_json::Value {
    serde_json::json!({
        "progress": sample.map(|s| s.percent),
        "files_remaining": sample.and_then(|s| s.files_remaining),
        "files_total": sample.and_then(|s| s.files_total),
        "done": done,
        "tag": tag,
        "stdout": stdout_line,
    })
}

/// Publish one progress (or done) sample to the remote pub/sub coordinates,
/// if any were given. A missing `channel` is not an error: progress
/// re-publication is opt-in per request (spec §3).
pub fn publish(conn: &mut redis::Connection, target: &RemotePubSub, payload: &serde_json::Value) -> Result<()> {
    let Some(channel) = target.channel.as_deref() else {
        return Ok(());
    };
    let body = serde_json::to_string(payload)
        .map_err(|e| IsError::TransportError(format!("failed to serialize progress: {e}")))?;
    redis::cmd("PUBLISH")
        .arg(channel)
        .arg(body)
        .query::<i64>(conn)
        .map_err(|e| IsError::TransportError(format!("redis PUBLISH failed: {e}")))?;
    Ok(())
}
