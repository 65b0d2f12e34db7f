//! `index` dispatch (spec §4.4/§4.5): delegates to the external-process
//! collaborator to run the detector's indexing binary. Grounded on
//! `isIndex.c`'s `isIndexImages` (temp dir, wrapper script, json-fd as the
//! authoritative result).

use crate::context::{OpsContext, ProcessJob};
use is_domain::error::{IsError, Result};
use is_domain::request::RequestFingerprint;
use is_proto::Reply;

pub fn handle_index(ctx: &OpsContext, req: &RequestFingerprint, raw: &[u8], echoed_request: Vec<u8>) -> Result<Reply> {
    let value: serde_json::Value = serde_json::from_slice(raw)
        .map_err(|e| IsError::BadRequest(format!("invalid JSON: {e}")))?;

    let fn1 = value
        .get("fn1")
        .and_then(|v| v.as_str())
        .unwrap_or(&req.path)
        .to_string();
    let fn2 = value.get("fn2").and_then(|v| v.as_str()).map(str::to_string);
    let frame1 = value.get("frame1").and_then(|v| v.as_u64()).unwrap_or(req.frame as u64);
    let frame2 = value.get("frame2").and_then(|v| v.as_u64());

    let mut args = vec![fn1, frame1.to_string()];
    if let Some(fn2) = fn2 {
        args.push(fn2);
    }
    if let Some(frame2) = frame2 {
        args.push(frame2.to_string());
    }

    let job = ProcessJob {
        program: "is_indexing_wrapper.sh".to_string(),
        args,
        tag: req.tag.clone(),
        progress: Some(req.progress.clone()),
    };

    let outcome = ctx.process_runner.run(&job)?;
    if !outcome.exit_ok {
        return Err(IsError::SubprocessRuntimeError(format!(
            "indexer failed: {}",
            String::from_utf8_lossy(&outcome.stderr)
        )));
    }

    let result = outcome
        .json_result
        .ok_or_else(|| IsError::SubprocessRuntimeError("indexer produced no json result".into()))?;

    Ok(Reply::WithPayload {
        echoed_request,
        metadata: b"{}".to_vec(),
        payload: serde_json::to_vec(&result).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ProcessOutcome, ProcessRunner};
    use is_cache::{Context as CacheContext, ImageBuf};
    use is_domain::request::{ContrastParams, LabelParams, Operation, ReductionParams, RemotePubSub};
    use is_reduce::render::JpegEncoder;
    use std::sync::Arc;

    struct SucceedingRunner;
    impl ProcessRunner for SucceedingRunner {
        fn run(&self, _job: &ProcessJob) -> Result<ProcessOutcome> {
            Ok(ProcessOutcome {
                exit_ok: true,
                stdout: Vec::new(),
                stderr: Vec::new(),
                json_result: Some(serde_json::json!({"solution": "P1"})),
            })
        }
    }

    struct FakeEncoder;
    impl JpegEncoder for FakeEncoder {
        fn encode(&self, rgb: &[u8], _w: u32, _h: u32, _q: u8) -> Result<Vec<u8>> {
            Ok(rgb.to_vec())
        }
    }

    fn fingerprint() -> RequestFingerprint {
        RequestFingerprint {
            op: Operation::Index,
            path: "/data/f.h5".into(),
            frame: 1,
            reduction: ReductionParams::normalized(1.0, 0.0, 0.0, 16, 16),
            contrast: ContrastParams::auto(),
            label: LabelParams::default(),
            session_id: "S".into(),
            esaf: 0,
            tag: "t1".into(),
            progress: RemotePubSub::default(),
        }
    }

    #[test]
    fn index_returns_json_payload() {
        let cache = CacheContext::new(1000, 16);
        let reducer = |buf: &ImageBuf, _: &ReductionParams| Ok(buf.clone());
        let encoder = FakeEncoder;
        let ctx = OpsContext {
            cache: &cache,
            reducer: &reducer,
            encoder: &encoder,
            process_runner: Arc::new(SucceedingRunner),
        };

        let req = fingerprint();
        let raw = br#"{"type":"index","fn1":"/data/f.h5","frame1":1}"#;
        let reply = handle_index(&ctx, &req, raw, raw.to_vec()).unwrap();
        match reply {
            Reply::WithPayload { payload, .. } => {
                let v: serde_json::Value = serde_json::from_slice(&payload).unwrap();
                assert_eq!(v["solution"], "P1");
            }
            _ => panic!("expected payload reply"),
        }
    }
}
