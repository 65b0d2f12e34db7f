//! JPEG rendering pixel policy, per spec §4.4. Grounded on `isJpeg.c`'s
//! `isJpeg`/`isJpegBlank` pixel loops: saturation sentinel maps to red,
//! white/contrast levels autoscale from mean/stddev (falling back to rms
//! when stddev is non-positive, observed for some 32-bit formats), and the
//! remainder is a linear inverted-grayscale ramp.

use crate::font;
use crate::pixel::{read_pixel, saturation_value};
use is_cache::ImageBuf;
use is_domain::error::{IsError, Result};
use is_domain::request::{ContrastParams, LabelParams};

/// Fallible JPEG encoder boundary (spec.md §1: `encode_rgb_to_jpeg` is an
/// out-of-scope external collaborator). The original's libjpeg error path
/// unwinds via `setjmp`/`longjmp`; here that becomes an ordinary `Result`
/// (spec.md §9 "Long-jump error handling from the encoder").
pub trait JpegEncoder: Send + Sync {
    fn encode(&self, rgb: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContrastLevels {
    pub white: i64,
    pub black: i64,
}

/// Resolve `wval`/`contrast` into concrete white/black levels, autoscaling
/// from the source metadata's `mean`/`stddev` (or `rms` fallback) when
/// unset.
pub fn compute_contrast(meta: Option<&serde_json::Value>, params: &ContrastParams) -> ContrastLevels {
    let mean = meta.and_then(|m| m.get("mean")).and_then(|v| v.as_f64()).unwrap_or(0.0);
    let mut stddev = meta.and_then(|m| m.get("stddev")).and_then(|v| v.as_f64()).unwrap_or(0.0);
    if stddev <= 0.0 {
        stddev = meta.and_then(|m| m.get("rms")).and_then(|v| v.as_f64()).unwrap_or(0.0);
    }

    let mut white = if params.wval < 0 {
        (mean - stddev) as i64
    } else {
        params.wval
    };
    let mut black = if params.contrast <= 0 {
        (mean + stddev) as i64
    } else {
        params.contrast
    };

    white = white.max(0);
    if black <= white {
        black = white + 1;
    }

    ContrastLevels { white, black }
}

/// Map one detector buffer to an RGB image per the contrast levels.
pub fn render_rgb(buf: &ImageBuf, levels: ContrastLevels) -> Vec<u8> {
    let sat = saturation_value(buf.depth);
    let mut rgb = vec![0u8; buf.width as usize * buf.height as usize * 3];

    for row in 0..buf.height {
        for col in 0..buf.width {
            let v = read_pixel(buf, row as i64, col as i64).unwrap_or(0);
            let (r, g, b) = pixel_color(v, sat, levels);
            let idx = (row as usize * buf.width as usize + col as usize) * 3;
            rgb[idx] = r;
            rgb[idx + 1] = g;
            rgb[idx + 2] = b;
        }
    }

    rgb
}

fn pixel_color(v: u64, sat: u64, levels: ContrastLevels) -> (u8, u8, u8) {
    if v == sat {
        return (0xff, 0, 0);
    }
    let v = v as i64;
    if v <= levels.white {
        return (0xff, 0xff, 0xff);
    }
    if v >= levels.black {
        return (0, 0, 0);
    }
    let span = (levels.black - levels.white) as f64;
    let gray = 255.0 - ((v - levels.white) as f64 / span) * 255.0;
    let gray = gray.round().clamp(0.0, 255.0) as u8;
    (gray, gray, gray)
}

/// A uniform light-gray canvas used for the `blank` operation (spec §4.4).
pub fn render_blank_rgb(width: u32, height: u32) -> Vec<u8> {
    vec![0xf0u8; width as usize * height as usize * 3]
}

/// Render a frame number suffix onto a label only when the source spans
/// more than one frame (`isJpeg.c`: compares `first_frame`/`last_frame`).
pub fn compose_label_text(label: &LabelParams, frame: u32, meta: Option<&serde_json::Value>) -> String {
    let Some(text) = label.text.as_deref().filter(|t| !t.is_empty()) else {
        return String::new();
    };
    let multi_frame = meta
        .and_then(|m| {
            let first = m.get("first_frame")?.as_i64()?;
            let last = m.get("last_frame")?.as_i64()?;
            Some(first != last)
        })
        .unwrap_or(false);

    if multi_frame {
        format!("{text} {frame}")
    } else {
        text.to_string()
    }
}

/// Prepend a rendered label strip above `image_rgb` (same width, `label
/// height` extra rows), or return `image_rgb` unchanged if the label isn't
/// active.
pub fn with_label(image_rgb: Vec<u8>, width: u32, image_height: u32, label: &LabelParams, label_text: &str) -> (Vec<u8>, u32) {
    if !label.is_active() || label_text.is_empty() {
        return (image_rgb, image_height);
    }

    let strip = font::render_label_rgb(label_text, width, label.height);
    let mut out = Vec::with_capacity(strip.len() + image_rgb.len());
    out.extend_from_slice(&strip);
    out.extend_from_slice(&image_rgb);
    (out, image_height + label.height)
}

/// Minimum output buffer size for the encoder, per `is.h`'s `MIN_JPEG_BUFFER`.
pub const MIN_JPEG_BUFFER: usize = 2048;

pub fn encode(
    encoder: &dyn JpegEncoder,
    rgb: &[u8],
    width: u32,
    height: u32,
) -> Result<Vec<u8>> {
    if rgb.len() != width as usize * height as usize * 3 {
        return Err(IsError::DecodeError("rgb buffer size mismatch".into()));
    }
    encoder.encode(rgb, width, height, 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn autoscale_uses_mean_and_stddev() {
        let meta = serde_json::json!({"mean": 100.0, "stddev": 10.0});
        let levels = compute_contrast(Some(&meta), &ContrastParams::auto());
        assert_eq!(levels.white, 90);
        assert_eq!(levels.black, 110);
    }

    #[test]
    fn stddev_falls_back_to_rms_when_non_positive() {
        let meta = serde_json::json!({"mean": 50.0, "stddev": 0.0, "rms": 4.0});
        let levels = compute_contrast(Some(&meta), &ContrastParams::auto());
        assert_eq!(levels.white, 46);
        assert_eq!(levels.black, 54);
    }

    #[test]
    fn black_is_always_strictly_above_white() {
        let params = ContrastParams { wval: 5, contrast: 5 };
        let levels = compute_contrast(None, &params);
        assert!(levels.black > levels.white);
    }

    #[test]
    fn saturated_pixel_is_red() {
        assert_eq!(pixel_color(0xffff, 0xffff, ContrastLevels { white: 0, black: 100 }), (0xff, 0, 0));
    }

    #[test]
    fn below_white_is_pure_white() {
        assert_eq!(pixel_color(5, 0xffff, ContrastLevels { white: 10, black: 100 }), (0xff, 0xff, 0xff));
    }

    #[test]
    fn above_black_is_pure_black() {
        assert_eq!(pixel_color(200, 0xffff, ContrastLevels { white: 10, black: 100 }), (0, 0, 0));
    }

    #[test]
    fn frame_suffix_only_for_multi_frame_sources() {
        let label = LabelParams::clamped(Some("Run A".into()), 16);
        let single = serde_json::json!({"first_frame": 1, "last_frame": 1});
        let multi = serde_json::json!({"first_frame": 1, "last_frame": 10});
        assert_eq!(compose_label_text(&label, 3, Some(&single)), "Run A");
        assert_eq!(compose_label_text(&label, 3, Some(&multi)), "Run A 3");
    }
}
