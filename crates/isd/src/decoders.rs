//! A concrete `is_cache::ImageDecoder` for baseline TIFF detector files.
//! Decoding is named an out-of-scope external collaborator by spec.md §1
//! (the original delegates to HDF5/CBF/MarCCD vendor libraries this
//! workspace has no equivalent of); TIFF is the one format with a real
//! pure-Rust decoder available, so it gets a concrete implementation here
//! while `NexusHdf5`/`Cbf`/`RayonixMarCcd` remain genuinely unregistered.

use is_cache::{ImageBuf, ImageDecoder, Provenance};
use is_domain::error::{IsError, Result};
use tiff::decoder::{Decoder, DecodingResult};

pub struct TiffDecoder;

impl TiffDecoder {
    fn open(path: &str) -> Result<Decoder<std::fs::File>> {
        let file = std::fs::File::open(path)
            .map_err(|e| IsError::NotFound(format!("{path}: {e}")))?;
        Decoder::new(file).map_err(|e| IsError::DecodeError(format!("{path}: {e}")))
    }

    fn read_u16(path: &str) -> Result<(u32, u32, Vec<u16>)> {
        let mut decoder = Self::open(path)?;
        let (width, height) = decoder
            .dimensions()
            .map_err(|e| IsError::DecodeError(format!("{path}: {e}")))?;
        let image = decoder
            .read_image()
            .map_err(|e| IsError::DecodeError(format!("{path}: {e}")))?;
        match image {
            DecodingResult::U16(data) => Ok((width, height, data)),
            other => Err(IsError::Unsupported(format!(
                "{path}: unsupported TIFF sample format {other:?}"
            ))),
        }
    }

    fn stats(samples: &[u16]) -> (f64, f64) {
        if samples.is_empty() {
            return (0.0, 0.0);
        }
        let n = samples.len() as f64;
        let mean = samples.iter().map(|&v| v as f64).sum::<f64>() / n;
        let variance = samples.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
        (mean, variance.sqrt())
    }
}

impl ImageDecoder for TiffDecoder {
    fn decode_metadata(&self, path: &str) -> Result<serde_json::Value> {
        let (width, height, samples) = Self::read_u16(path)?;
        let (mean, stddev) = Self::stats(&samples);
        Ok(serde_json::json!({
            "width": width,
            "height": height,
            "mean": mean,
            "stddev": stddev,
            "first_frame": 1,
            "last_frame": 1,
        }))
    }

    fn decode_frame(&self, path: &str, _frame: u32) -> Result<ImageBuf> {
        let (width, height, samples) = Self::read_u16(path)?;
        let (mean, stddev) = Self::stats(&samples);

        let mut buf = Vec::with_capacity(samples.len() * 2);
        for s in &samples {
            buf.extend_from_slice(&s.to_ne_bytes());
        }

        Ok(ImageBuf {
            metadata: Some(serde_json::json!({
                "width": width,
                "height": height,
                "mean": mean,
                "stddev": stddev,
                "first_frame": 1,
                "last_frame": 1,
            })),
            buf,
            width,
            height,
            depth: 2,
            bad_pixel_map: None,
            provenance: Provenance::Decoded,
        })
    }
}
