//! `connection-test` dispatch (spec §4.4/§4.5): checks reachability of a
//! remote destination by running `ssh user@host "mkdir -p destDir && df -h
//! destDir"` as an external helper. Grounded on `isRsync.c`'s
//! `isRsyncConnectionTest`.

use crate::context::{OpsContext, ProcessJob};
use is_domain::error::{IsError, Result};
use is_domain::request::RequestFingerprint;
use is_proto::Reply;

pub fn handle_connection_test(ctx: &OpsContext, req: &RequestFingerprint, raw: &[u8], echoed_request: Vec<u8>) -> Result<Reply> {
    let value: serde_json::Value = serde_json::from_slice(raw)
        .map_err(|e| IsError::BadRequest(format!("invalid JSON: {e}")))?;

    let host = value
        .get("remoteHostName")
        .and_then(|v| v.as_str())
        .ok_or_else(|| IsError::BadRequest("connection-test request missing 'remoteHostName'".into()))?;
    let user = value
        .get("remoteUserName")
        .and_then(|v| v.as_str())
        .ok_or_else(|| IsError::BadRequest("connection-test request missing 'remoteUserName'".into()))?;
    let dest_dir = value
        .get("remoteDirName")
        .and_then(|v| v.as_str())
        .ok_or_else(|| IsError::BadRequest("connection-test request missing 'remoteDirName'".into()))?;

    let job = ProcessJob {
        program: "ssh".to_string(),
        args: vec![
            format!("{user}@{host}"),
            format!("mkdir -p {dest_dir} && df -h {dest_dir}"),
        ],
        tag: req.tag.clone(),
        progress: None,
    };

    let outcome = ctx.process_runner.run(&job)?;

    let metadata = serde_json::json!({
        "remoteHostName": host,
        "reachable": outcome.exit_ok,
        "stdout": String::from_utf8_lossy(&outcome.stdout),
        "stderr": String::from_utf8_lossy(&outcome.stderr),
    });

    Ok(Reply::Metadata {
        echoed_request,
        metadata: serde_json::to_vec(&metadata).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ProcessOutcome, ProcessRunner};
    use is_cache::{Context as CacheContext, ImageBuf};
    use is_domain::request::{ContrastParams, LabelParams, Operation, ReductionParams};
    use is_reduce::render::JpegEncoder;
    use std::sync::Arc;

    struct FailingRunner;
    impl ProcessRunner for FailingRunner {
        fn run(&self, _job: &ProcessJob) -> Result<ProcessOutcome> {
            Ok(ProcessOutcome {
                exit_ok: false,
                stderr: b"ssh: connect to host bogus port 22: Connection refused".to_vec(),
                ..Default::default()
            })
        }
    }

    struct FakeEncoder;
    impl JpegEncoder for FakeEncoder {
        fn encode(&self, rgb: &[u8], _w: u32, _h: u32, _q: u8) -> Result<Vec<u8>> {
            Ok(rgb.to_vec())
        }
    }

    #[test]
    fn unreachable_host_reports_failure_in_metadata_not_error() {
        let cache = CacheContext::new(1000, 16);
        let reducer = |buf: &ImageBuf, _: &ReductionParams| Ok(buf.clone());
        let encoder = FakeEncoder;
        let ctx = OpsContext {
            cache: &cache,
            reducer: &reducer,
            encoder: &encoder,
            process_runner: Arc::new(FailingRunner),
        };

        let req = RequestFingerprint {
            op: Operation::ConnectionTest,
            path: String::new(),
            frame: 1,
            reduction: ReductionParams::normalized(1.0, 0.0, 0.0, 16, 16),
            contrast: ContrastParams::auto(),
            label: LabelParams::default(),
            session_id: "S".into(),
            esaf: 0,
            tag: "t1".into(),
            progress: Default::default(),
        };

        let raw = br#"{"type":"connection-test","remoteHostName":"bogus","remoteUserName":"u","remoteDirName":"/data"}"#;
        let reply = handle_connection_test(&ctx, &req, raw, raw.to_vec()).unwrap();
        match reply {
            Reply::Metadata { metadata, .. } => {
                let v: serde_json::Value = serde_json::from_slice(&metadata).unwrap();
                assert_eq!(v["reachable"], false);
            }
            _ => panic!("expected metadata reply"),
        }
    }
}
