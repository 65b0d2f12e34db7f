//! The concrete `ProcessRunner` (spec §4.5): wires `subprocess::run`,
//! `progress` parsing/re-publication, and `indexer::stage` together to
//! satisfy `is_ops::ProcessRunner` for `index`, `transfer`, and
//! `connection-test`. Grounded on `isWorker.c`'s worker thread, which is
//! the caller of `isSubProcess`/`isIndexImages`/the rsync transfer routine.

use crate::indexer;
use crate::progress::{self, ProgressSample};
use crate::subprocess::{self, FdSpec};
use is_domain::error::Result;
use is_domain::request::RemotePubSub;
use is_ops::{ProcessJob, ProcessOutcome, ProcessRunner};

const JSON_FD: i32 = 3;
const PROGRESS_FD: i32 = 4;

/// Runs external helpers for one worker thread. One instance is shared
/// (behind an `Arc`) across all threads in a per-identity child process.
pub struct SubprocessRunner {
    indexer_bin: String,
    local_store_url: Option<String>,
}

impl SubprocessRunner {
    pub fn new(indexer_bin: impl Into<String>, local_store_url: Option<String>) -> Self {
        SubprocessRunner {
            indexer_bin: indexer_bin.into(),
            local_store_url,
        }
    }

    fn local_conn(&self) -> Option<redis::Connection> {
        let url = self.local_store_url.as_deref()?;
        redis::Client::open(url)
            .and_then(|c| c.get_connection())
            .map_err(|e| tracing::warn!(error = %e, "failed to open local store connection"))
            .ok()
    }

    fn progress_conn(target: &RemotePubSub) -> Option<redis::Connection> {
        let address = target.address.as_deref()?;
        let port = target.port.unwrap_or(6379);
        redis::Client::open(format!("redis://{address}:{port}/"))
            .and_then(|c| c.get_connection())
            .map_err(|e| tracing::warn!(error = %e, "failed to open progress store connection"))
            .ok()
    }

    fn publish_progress(
        conn: &mut Option<redis::Connection>,
        target: Option<&RemotePubSub>,
        sample: Option<&ProgressSample>,
        tag: &str,
        stdout_line: &str,
        done: bool,
    ) {
        let (Some(target), Some(conn)) = (target, conn.as_mut()) else {
            return;
        };
        let payload = progress::progress_payload(sample, tag, stdout_line, done);
        if let Err(e) = progress::publish(conn, target, &payload) {
            tracing::warn!(error = %e, tag = %tag, "failed to publish progress");
        }
    }

    fn run_indexer(&self, job: &ProcessJob) -> Result<ProcessOutcome> {
        let inputs: Vec<&str> = job.args.first().map(|s| s.as_str()).into_iter().collect();
        let staging = indexer::stage(&self.indexer_bin, &inputs, JSON_FD, PROGRESS_FD)?;

        let fds = vec![
            FdSpec { child_fd: JSON_FD, line_oriented: false },
            FdSpec { child_fd: PROGRESS_FD, line_oriented: true },
        ];

        let mut conn = job.progress.as_ref().and_then(Self::progress_conn);
        let tag = job.tag.clone();
        let target = job.progress.clone();

        let outcome = subprocess::run(
            staging.wrapper_script.to_string_lossy().as_ref(),
            &job.args[1..],
            &fds,
            |i, line| {
                if i != 1 {
                    return;
                }
                let sample = progress::parse_progress_line(line);
                Self::publish_progress(&mut conn, target.as_ref(), sample.as_ref(), &tag, line, false);
            },
        );

        std::fs::remove_dir_all(&staging.dir).ok();
        let outcome = outcome?;

        Self::publish_progress(&mut conn, target.as_ref(), None, &tag, "", true);

        let exit_ok = outcome.exit_code == Some(0);
        let json_result = if exit_ok {
            serde_json::from_slice(&outcome.buffers[0]).ok()
        } else {
            None
        };

        Ok(ProcessOutcome {
            exit_ok,
            stdout: Vec::new(),
            stderr: Vec::new(),
            json_result,
        })
    }

    fn run_transfer(&self, job: &ProcessJob) -> Result<ProcessOutcome> {
        let fds = vec![
            FdSpec { child_fd: 1, line_oriented: true },
            FdSpec { child_fd: 2, line_oriented: false },
        ];

        let mut progress_conn = job.progress.as_ref().and_then(Self::progress_conn);
        let tag = job.tag.clone();
        let target = job.progress.clone();

        let mut local_conn = self.local_conn();
        let rsyncs_record = local_conn.as_mut().map(|_| {
            serde_json::json!({ "job": job_as_json(job), "uid": current_uid(), "gid": current_gid() })
        });

        let outcome = subprocess::run_with_spawn_hook(
            &job.program,
            &job.args,
            &fds,
            |i, line| {
                if i != 0 {
                    return;
                }
                let sample = progress::parse_progress_line(line);
                Self::publish_progress(&mut progress_conn, target.as_ref(), sample.as_ref(), &tag, line, false);
            },
            |pid| {
                if let (Some(conn), Some(mut record)) = (local_conn.as_mut(), rsyncs_record.clone()) {
                    record["childPid"] = serde_json::json!(pid);
                    let body = record.to_string();
                    let _: redis::RedisResult<()> =
                        redis::cmd("HSET").arg("RSYNCS").arg(&tag).arg(body).query(conn);
                }
            },
        )?;

        if let Some(conn) = local_conn.as_mut() {
            let _: redis::RedisResult<()> = redis::cmd("HDEL").arg("RSYNCS").arg(&tag).query(conn);
        }

        Self::publish_progress(&mut progress_conn, target.as_ref(), None, &tag, "", true);

        Ok(ProcessOutcome {
            exit_ok: outcome.exit_code == Some(0),
            stdout: outcome.buffers[0].clone(),
            stderr: outcome.buffers[1].clone(),
            json_result: None,
        })
    }

    fn run_plain(&self, job: &ProcessJob) -> Result<ProcessOutcome> {
        let fds = vec![
            FdSpec { child_fd: 1, line_oriented: false },
            FdSpec { child_fd: 2, line_oriented: false },
        ];
        let outcome = subprocess::run(&job.program, &job.args, &fds, |_, _| {})?;
        Ok(ProcessOutcome {
            exit_ok: outcome.exit_code == Some(0),
            stdout: outcome.buffers[0].clone(),
            stderr: outcome.buffers[1].clone(),
            json_result: None,
        })
    }
}

impl ProcessRunner for SubprocessRunner {
    fn run(&self, job: &ProcessJob) -> Result<ProcessOutcome> {
        match job.program.as_str() {
            "is_indexing_wrapper.sh" => self.run_indexer(job),
            "rsync" => self.run_transfer(job),
            _ => self.run_plain(job),
        }
    }
}

fn job_as_json(job: &ProcessJob) -> serde_json::Value {
    serde_json::json!({
        "program": job.program,
        "args": job.args,
        "tag": job.tag,
    })
}

fn current_uid() -> u32 {
    // SAFETY: getuid takes no arguments and cannot fail.
    unsafe { libc::getuid() }
}

fn current_gid() -> u32 {
    // SAFETY: getgid takes no arguments and cannot fail.
    unsafe { libc::getgid() }
}
