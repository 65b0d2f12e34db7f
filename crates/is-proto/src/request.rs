//! Parses the request wire format (spec §6) into an `is_domain::RequestFingerprint`.

use is_domain::error::{IsError, Result};
use is_domain::request::{
    ContrastParams, LabelParams, Operation, ReductionParams, RemotePubSub, RequestFingerprint,
};
use serde::Deserialize;

/// Raw shape of the request JSON object, before normalization.
#[derive(Debug, Deserialize)]
struct RawRequest {
    #[serde(rename = "type")]
    kind: String,
    pid: Option<String>,
    esaf: Option<u32>,
    tag: Option<String>,
    frame: Option<u32>,
    xsize: Option<u32>,
    ysize: Option<u32>,
    zoom: Option<f64>,
    segcol: Option<f64>,
    segrow: Option<f64>,
    wval: Option<i64>,
    contrast: Option<i64>,
    label: Option<String>,
    #[serde(rename = "labelHeight")]
    label_height: Option<i64>,
    #[serde(rename = "progressAddress")]
    progress_address: Option<String>,
    #[serde(rename = "progressPort")]
    progress_port: Option<u16>,
    #[serde(rename = "progressPublisher")]
    progress_publisher: Option<String>,
}

// `fn` is a reserved word, so the filename is pulled out of the generic
// JSON value before the rest of the fields are deserialized through
// `RawRequest`.
fn extract_fn(v: &serde_json::Value) -> Option<String> {
    v.get("fn").and_then(|x| x.as_str()).map(|s| s.to_string())
}

/// Parse a raw JSON payload into a normalized `RequestFingerprint`.
///
/// `fn` is pulled out of the generic `serde_json::Value` first (it can't be
/// a Rust field name) and spliced back in before the rest of the fields are
/// deserialized through `RawRequest`.
pub fn parse_request(payload: &[u8]) -> Result<RequestFingerprint> {
    let value: serde_json::Value = serde_json::from_slice(payload)
        .map_err(|e| IsError::BadRequest(format!("invalid JSON: {e}")))?;

    let filename = extract_fn(&value);
    let raw: RawRequest = serde_json::from_value(value)
        .map_err(|e| IsError::BadRequest(format!("malformed request: {e}")))?;

    let op = Operation::parse(&raw.kind)
        .ok_or_else(|| IsError::BadRequest(format!("unknown request type: {}", raw.kind)))?;

    let path = filename.unwrap_or_default();
    let frame = raw.frame.unwrap_or(1).max(1);

    let out_w = raw.xsize.unwrap_or(256);
    let out_h = raw.ysize.unwrap_or(out_w);
    let reduction = match op {
        Operation::Spots => ReductionParams::full_frame(
            raw.xsize.unwrap_or(is_domain::request::DEFAULT_SPOT_IMAGE_WIDTH),
        ),
        _ => ReductionParams::normalized(
            raw.zoom.unwrap_or(1.0),
            raw.segcol.unwrap_or(0.0),
            raw.segrow.unwrap_or(0.0),
            out_w,
            out_h,
        ),
    };

    let contrast = ContrastParams {
        wval: raw.wval.unwrap_or(-1),
        contrast: raw.contrast.unwrap_or(-1),
    };

    let label = LabelParams::clamped(raw.label, raw.label_height.unwrap_or(0));

    let progress = RemotePubSub {
        address: raw.progress_address,
        port: raw.progress_port,
        channel: raw.progress_publisher,
    };

    Ok(RequestFingerprint {
        op,
        path,
        frame,
        reduction,
        contrast,
        label,
        session_id: raw.pid.unwrap_or_default(),
        esaf: raw.esaf.unwrap_or(0),
        tag: raw.tag.unwrap_or_default(),
        progress,
    })
}
