//! Grayscale, half-opacity watermark filter.
//!
//! Turns an arbitrary watermark image into a luminance-only RGBA image whose
//! alpha channel is a constant [`FILTER_ALPHA`], whatever the source alpha was.

use std::path::Path;

use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};

use crate::engine::decode_image;
use crate::error::{Error, Result};

/// Constant alpha written by the filter (50% opacity).
pub const FILTER_ALPHA: u8 = 128;

/// ITU-R 601 luma in 16.16 fixed point: `0.299 R + 0.587 G + 0.114 B`.
#[allow(clippy::cast_possible_truncation)]
fn luma_601(px: Rgba<u8>) -> u8 {
    let [r, g, b, _] = px.0;
    let l = u32::from(r) * 19595 + u32::from(g) * 38470 + u32::from(b) * 7471 + 0x8000;
    (l >> 16) as u8
}

/// Derive a single-channel luminance image. Source alpha is ignored.
fn luminance(rgba: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        Luma([luma_601(*rgba.get_pixel(x, y))])
    })
}

/// Apply the filter to an already decoded image.
///
/// The source is normalized to RGBA, reduced to luminance, and merged back
/// as `(L, L, L, 128)` for every pixel.
#[must_use]
pub fn grayscale_half_opacity(source: &DynamicImage) -> RgbaImage {
    let rgba = source.to_rgba8();
    let luma = luminance(&rgba);
    let alpha = GrayImage::from_pixel(rgba.width(), rgba.height(), Luma([FILTER_ALPHA]));

    RgbaImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let l = luma.get_pixel(x, y)[0];
        Rgba([l, l, l, alpha.get_pixel(x, y)[0]])
    })
}

/// Decode the watermark at `path` and apply [`grayscale_half_opacity`].
///
/// # Errors
///
/// Returns [`Error::WatermarkFilter`] if the file is missing, corrupt, or in
/// a format the decoder does not support.
pub fn load_filtered(path: &Path) -> Result<RgbaImage> {
    let source = decode_image(path).map_err(Error::WatermarkFilter)?;
    Ok(grayscale_half_opacity(&source))
}
