//! Pixel reduction and JPEG rendering (spec §4.2/§4.4): depth-generic pixel
//! access, the window/downsample pipeline, the embedded label font, and the
//! contrast/grayscale pixel-mapping policy.

pub mod font;
pub mod pixel;
pub mod reduce;
pub mod render;

pub use reduce::reduce;
pub use render::{compose_label_text, compute_contrast, render_blank_rgb, render_rgb, with_label, ContrastLevels, JpegEncoder};
