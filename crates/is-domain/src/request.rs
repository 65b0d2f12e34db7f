//! Request fingerprint: the normalized, immutable description of a unit of
//! work, per spec §3.

use serde::{Deserialize, Serialize};

/// Default output width used by the `spots` operation when the request
/// doesn't specify `xsize` (original: `IS_DEFAULT_SPOT_IMAGE_WIDTH`).
pub const DEFAULT_SPOT_IMAGE_WIDTH: u32 = 1024;

/// Keep this many decoded/reduced buffers in memory per worker process
/// before the first compaction pass (original: `N_IMAGE_BUFFERS`).
pub const DEFAULT_MAX_BUFFERS: usize = 1024;

/// Threads in each per-identity worker pool (original: `N_WORKER_THREADS`).
pub const DEFAULT_WORKER_THREADS: usize = 8;

/// Smallest/largest permitted output dimension (spec §4.2/§8).
pub const MIN_OUT_DIM: u32 = 8;
pub const MAX_OUT_DIM: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Jpeg,
    Spots,
    Index,
    Metadata,
    Transfer,
    #[serde(rename = "connection-test")]
    ConnectionTest,
    #[serde(rename = "directory-stats")]
    DirectoryStats,
    Blank,
}

impl Operation {
    /// Case-insensitive parse of the request's `type` field, per spec §4.4.
    pub fn parse(s: &str) -> Option<Operation> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" => Some(Operation::Jpeg),
            "spots" => Some(Operation::Spots),
            "index" => Some(Operation::Index),
            "metadata" => Some(Operation::Metadata),
            "transfer" => Some(Operation::Transfer),
            "connection-test" => Some(Operation::ConnectionTest),
            "directory-stats" => Some(Operation::DirectoryStats),
            "blank" => Some(Operation::Blank),
            _ => None,
        }
    }
}

/// Zoom/segment/output window, normalized per spec §4.2.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReductionParams {
    pub zoom: f64,
    pub segcol: f64,
    pub segrow: f64,
    pub out_w: u32,
    pub out_h: u32,
}

impl ReductionParams {
    /// Snap zoom to one decimal and clamp to >= 1.0, per spec §4.2.
    pub fn normalized(zoom: f64, segcol: f64, segrow: f64, out_w: u32, out_h: u32) -> Self {
        let snapped = (zoom * 10.0).round() / 10.0;
        let zoom = if snapped < 1.0 { 1.0 } else { snapped };
        ReductionParams {
            zoom,
            segcol,
            segrow,
            out_w: out_w.clamp(MIN_OUT_DIM, MAX_OUT_DIM),
            out_h: out_h.clamp(MIN_OUT_DIM, MAX_OUT_DIM),
        }
    }

    /// The `spots` operation forces a full-frame view (spec §4.4).
    pub fn full_frame(out_w: u32) -> Self {
        ReductionParams::normalized(1.0, 0.0, 0.0, out_w, out_w)
    }

    pub fn is_out_of_range(out_w: u32, out_h: u32) -> bool {
        !(MIN_OUT_DIM..=MAX_OUT_DIM).contains(&out_w) || !(MIN_OUT_DIM..=MAX_OUT_DIM).contains(&out_h)
    }
}

/// White/contrast levels; negative/non-positive mean "autoscale" (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContrastParams {
    pub wval: i64,
    pub contrast: i64,
}

impl ContrastParams {
    pub fn auto() -> Self {
        ContrastParams {
            wval: -1,
            contrast: -1,
        }
    }
}

/// Optional on-image label strip (spec §3, §4.4).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelParams {
    pub text: Option<String>,
    pub height: u32,
}

impl LabelParams {
    /// Clamp height to `[0, 64]`; out-of-range values are dropped (treated
    /// as zero), per `isJpeg.c`.
    pub fn clamped(text: Option<String>, height: i64) -> Self {
        let height = if (0..=64).contains(&height) {
            height as u32
        } else {
            0
        };
        LabelParams { text, height }
    }

    pub fn is_active(&self) -> bool {
        self.height > 0 && self.text.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Remote pub/sub coordinates used for progress re-publication (spec §3/§4.5).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemotePubSub {
    pub address: Option<String>,
    pub port: Option<u16>,
    pub channel: Option<String>,
}

/// The fully normalized, immutable description of one unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestFingerprint {
    pub op: Operation,
    pub path: String,
    pub frame: u32,
    pub reduction: ReductionParams,
    pub contrast: ContrastParams,
    pub label: LabelParams,
    pub session_id: String,
    pub esaf: u32,
    pub tag: String,
    pub progress: RemotePubSub,
}

impl RequestFingerprint {
    pub fn frame_default() -> u32 {
        1
    }
}
