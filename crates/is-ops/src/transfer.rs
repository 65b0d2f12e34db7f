//! `transfer` dispatch (spec §4.4/§4.5): delegates to the external-process
//! collaborator to run `rsync` against a remote host. Grounded on
//! `isRsync.c`'s transfer routine (the `rsync -rt --info=progress2 ...
//! user@host:destDir` invocation and its progress re-publication).

use crate::context::{OpsContext, ProcessJob};
use is_domain::error::{IsError, Result};
use is_domain::request::{RemotePubSub, RequestFingerprint};
use is_proto::Reply;

fn require_str<'a>(value: &'a serde_json::Value, field: &str) -> Result<&'a str> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| IsError::BadRequest(format!("transfer request missing '{field}'")))
}

pub fn handle_transfer(ctx: &OpsContext, req: &RequestFingerprint, raw: &[u8], echoed_request: Vec<u8>) -> Result<Reply> {
    let value: serde_json::Value = serde_json::from_slice(raw)
        .map_err(|e| IsError::BadRequest(format!("invalid JSON: {e}")))?;

    let host = require_str(&value, "remoteHostName")?;
    let user = require_str(&value, "remoteUserName")?;
    let dest_dir = require_str(&value, "remoteDirName")?;
    let local_dir = require_str(&value, "localDirName")?;

    let args = vec![
        "-rt".to_string(),
        "--info=progress2".to_string(),
        "--info=name0".to_string(),
        "--partial".to_string(),
        "--partial-dir=.rsync_partial".to_string(),
        "-e".to_string(),
        "ssh -o StrictHostKeyChecking=no -o PasswordAuthentication=no -o KbdInteractiveDevices=none".to_string(),
        local_dir.to_string(),
        format!("{user}@{host}:{dest_dir}"),
    ];

    let progress = RemotePubSub {
        address: value
            .get("progressAddress")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| req.progress.address.clone()),
        port: value
            .get("progressPort")
            .and_then(|v| v.as_u64())
            .map(|p| p as u16)
            .or(req.progress.port),
        channel: value
            .get("progressPublisher")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| req.progress.channel.clone()),
    };

    let job = ProcessJob {
        program: "rsync".to_string(),
        args,
        tag: req.tag.clone(),
        progress: Some(progress),
    };

    let outcome = ctx.process_runner.run(&job)?;
    if !outcome.exit_ok {
        return Err(IsError::SubprocessRuntimeError(format!(
            "rsync failed: {}",
            String::from_utf8_lossy(&outcome.stderr)
        )));
    }

    let metadata = serde_json::json!({
        "localDirName": local_dir,
        "remoteHostName": host,
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

    struct SucceedingRunner;
    impl ProcessRunner for SucceedingRunner {
        fn run(&self, job: &ProcessJob) -> Result<ProcessOutcome> {
            assert_eq!(job.program, "rsync");
            Ok(ProcessOutcome {
                exit_ok: true,
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
    fn transfer_builds_ssh_rsync_destination() {
        let cache = CacheContext::new(1000, 16);
        let reducer = |buf: &ImageBuf, _: &ReductionParams| Ok(buf.clone());
        let encoder = FakeEncoder;
        let ctx = OpsContext {
            cache: &cache,
            reducer: &reducer,
            encoder: &encoder,
            process_runner: Arc::new(SucceedingRunner),
        };

        let req = RequestFingerprint {
            op: Operation::Transfer,
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

        let raw = br#"{"type":"transfer","remoteHostName":"h","remoteUserName":"u","remoteDirName":"/data","localDirName":"/pf/data"}"#;
        let reply = handle_transfer(&ctx, &req, raw, raw.to_vec()).unwrap();
        assert!(matches!(reply, Reply::Metadata { .. }));
    }

    #[test]
    fn transfer_rejects_missing_fields() {
        let cache = CacheContext::new(1000, 16);
        let reducer = |buf: &ImageBuf, _: &ReductionParams| Ok(buf.clone());
        let encoder = FakeEncoder;
        let ctx = OpsContext {
            cache: &cache,
            reducer: &reducer,
            encoder: &encoder,
            process_runner: Arc::new(SucceedingRunner),
        };

        let req = RequestFingerprint {
            op: Operation::Transfer,
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

        let raw = br#"{"type":"transfer"}"#;
        assert!(handle_transfer(&ctx, &req, raw, raw.to_vec()).is_err());
    }
}
