//! A concrete `is_reduce::render::JpegEncoder`. Encoding to JPEG is named an
//! out-of-scope external collaborator by spec.md §1 (mirroring the
//! original's libjpeg dependency); as with `is-auth`'s `HmacSha256Verifier`
//! for the out-of-scope signature primitive, a minimal real implementation
//! is supplied here so the system is exercisable end to end rather than
//! stuck behind an uninstantiable trait object.

use is_domain::error::{IsError, Result};
use is_reduce::render::JpegEncoder;
use jpeg_encoder::{ColorType, Encoder};

pub struct BaselineJpegEncoder;

impl JpegEncoder for BaselineJpegEncoder {
    fn encode(&self, rgb: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>> {
        let width = u16::try_from(width)
            .map_err(|_| IsError::DecodeError(format!("jpeg width {width} exceeds u16")))?;
        let height = u16::try_from(height)
            .map_err(|_| IsError::DecodeError(format!("jpeg height {height} exceeds u16")))?;

        let mut out = Vec::new();
        let encoder = Encoder::new(&mut out, quality);
        encoder
            .encode(rgb, width, height, ColorType::Rgb)
            .map_err(|e| IsError::DecodeError(format!("jpeg encode failed: {e}")))?;
        Ok(out)
    }
}
