//! `jpeg`, `blank`, and `spots` dispatch (spec §4.4). Grounded on `isJpeg.c`'s
//! `isJpeg`/`isJpegBlank` and `isSpots.c`'s `isSpots`.

use crate::context::OpsContext;
use is_domain::error::Result;
use is_domain::request::RequestFingerprint;
use is_proto::Reply;
use is_reduce::render::{self, compose_label_text, compute_contrast, with_label};

pub fn handle_jpeg(ctx: &OpsContext, req: &RequestFingerprint, echoed_request: Vec<u8>) -> Result<Reply> {
    let handle = ctx.cache.reduce(&req.path, req.frame, &req.reduction, ctx.reducer)?;
    let buf = handle.buffer().expect("populated on success");

    let levels = compute_contrast(handle.metadata(), &req.contrast);
    let rgb = render::render_rgb(buf, levels);

    let label_text = compose_label_text(&req.label, req.frame, handle.metadata());
    let (rgb, height) = with_label(rgb, buf.width, buf.height, &req.label, &label_text);

    let metadata = handle.metadata().cloned().unwrap_or_default();
    let payload = render::encode(ctx.encoder, &rgb, buf.width, height)?;

    ctx.cache.release(handle);

    Ok(Reply::WithPayload {
        echoed_request,
        metadata: serde_json::to_vec(&metadata).unwrap_or_default(),
        payload,
    })
}

/// `blank` (spec §4.4): same pixel policy as `jpeg` applied to a uniform
/// canvas, used when the requested file is missing. No cache involvement.
pub fn handle_blank(ctx: &OpsContext, req: &RequestFingerprint, echoed_request: Vec<u8>) -> Result<Reply> {
    let width = req.reduction.out_w;
    let height = req.reduction.out_h;
    let rgb = render::render_blank_rgb(width, height);

    let label_text = compose_label_text(&req.label, req.frame, None);
    let (rgb, height) = with_label(rgb, width, height, &req.label, &label_text);

    let payload = render::encode(ctx.encoder, &rgb, width, height)?;

    Ok(Reply::WithPayload {
        echoed_request,
        metadata: b"{}".to_vec(),
        payload,
    })
}

/// `spots` (spec §4.4): force a full-frame reduction, reply with metadata
/// only (no payload).
pub fn handle_spots(ctx: &OpsContext, req: &RequestFingerprint, echoed_request: Vec<u8>) -> Result<Reply> {
    let handle = ctx.cache.reduce(&req.path, req.frame, &req.reduction, ctx.reducer)?;
    let metadata = handle.metadata().cloned().unwrap_or_default();
    ctx.cache.release(handle);

    Ok(Reply::Metadata {
        echoed_request,
        metadata: serde_json::to_vec(&metadata).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ProcessJob, ProcessOutcome, ProcessRunner};
    use is_cache::{Context as CacheContext, FileType, ImageBuf, ImageDecoder, Provenance};
    use is_domain::request::{ContrastParams, LabelParams, Operation, ReductionParams, RemotePubSub};
    use is_reduce::render::JpegEncoder;
    use std::sync::Arc;

    struct NoopRunner;
    impl ProcessRunner for NoopRunner {
        fn run(&self, _job: &ProcessJob) -> Result<ProcessOutcome> {
            Ok(ProcessOutcome::default())
        }
    }

    struct FixedDecoder;

    impl ImageDecoder for FixedDecoder {
        fn decode_metadata(&self, _path: &str) -> Result<serde_json::Value> {
            Ok(serde_json::json!({"mean": 100.0, "stddev": 10.0}))
        }

        fn decode_frame(&self, _path: &str, _frame: u32) -> Result<ImageBuf> {
            Ok(ImageBuf {
                metadata: Some(serde_json::json!({"mean": 100.0, "stddev": 10.0})),
                buf: vec![0u8; 16 * 16 * 2],
                width: 16,
                height: 16,
                depth: 2,
                bad_pixel_map: None,
                provenance: Provenance::Decoded,
            })
        }
    }

    struct FakeEncoder;
    impl JpegEncoder for FakeEncoder {
        fn encode(&self, rgb: &[u8], _w: u32, _h: u32, _q: u8) -> Result<Vec<u8>> {
            Ok(rgb.to_vec())
        }
    }

    fn fingerprint(op: Operation) -> RequestFingerprint {
        RequestFingerprint {
            op,
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
    fn jpeg_produces_payload_reply() {
        let mut cache = CacheContext::new(1000, 16);
        cache.register_decoder(FileType::NexusHdf5, Arc::new(FixedDecoder));
        let reducer = |buf: &ImageBuf, _: &ReductionParams| Ok(buf.clone());
        let encoder = FakeEncoder;
        let ctx = OpsContext {
            cache: &cache,
            reducer: &reducer,
            encoder: &encoder,
            process_runner: Arc::new(NoopRunner),
        };

        let req = fingerprint(Operation::Jpeg);
        let reply = handle_jpeg(&ctx, &req, b"{}".to_vec()).unwrap();
        match reply {
            Reply::WithPayload { payload, .. } => assert!(!payload.is_empty()),
            _ => panic!("expected payload reply"),
        }
    }

    #[test]
    fn blank_never_touches_cache() {
        let cache = CacheContext::new(1000, 16);
        let reducer = |buf: &ImageBuf, _: &ReductionParams| Ok(buf.clone());
        let encoder = FakeEncoder;
        let ctx = OpsContext {
            cache: &cache,
            reducer: &reducer,
            encoder: &encoder,
            process_runner: Arc::new(NoopRunner),
        };

        let req = fingerprint(Operation::Blank);
        let reply = handle_blank(&ctx, &req, b"{}".to_vec()).unwrap();
        assert!(matches!(reply, Reply::WithPayload { .. }));
    }

    #[test]
    fn spots_has_no_payload() {
        let mut cache = CacheContext::new(1000, 16);
        cache.register_decoder(FileType::NexusHdf5, Arc::new(FixedDecoder));
        let reducer = |buf: &ImageBuf, _: &ReductionParams| Ok(buf.clone());
        let encoder = FakeEncoder;
        let ctx = OpsContext {
            cache: &cache,
            reducer: &reducer,
            encoder: &encoder,
            process_runner: Arc::new(NoopRunner),
        };

        let mut req = fingerprint(Operation::Spots);
        req.reduction = ReductionParams::full_frame(64);
        let reply = handle_spots(&ctx, &req, b"{}".to_vec()).unwrap();
        assert!(matches!(reply, Reply::Metadata { .. }));
    }
}
