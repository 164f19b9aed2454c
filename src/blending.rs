//! Alpha blending for watermark application.
//!
//! Two operations are used by the compositor:
//!
//! - [`paste_with_mask`]: image watermarks are pasted using their own alpha
//!   as a blend mask, `out = base * (1 - m) + overlay * m`, on all four channels.
//! - [`alpha_composite`]: text layers are merged with the Porter-Duff "over"
//!   operator.

use image::{Rgba, RgbaImage};

use crate::geometry::Placement;

/// Blend one channel by an 8-bit mask with rounding.
#[allow(clippy::cast_possible_truncation)]
fn mix(base: u8, over: u8, mask: u8) -> u8 {
    let m = u32::from(mask);
    ((u32::from(base) * (255 - m) + u32::from(over) * m + 127) / 255) as u8
}

/// Intersection of an overlay at `placement` with the base canvas.
///
/// Returns `(x0, y0, x1, y1)` in base coordinates, or `None` when the overlay
/// lies entirely outside.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn visible_region(
    base_w: u32,
    base_h: u32,
    overlay_w: u32,
    overlay_h: u32,
    placement: Placement,
) -> Option<(u32, u32, u32, u32)> {
    let x0 = placement.x.max(0);
    let y0 = placement.y.max(0);
    let x1 = (placement.x + i64::from(overlay_w)).min(i64::from(base_w));
    let y1 = (placement.y + i64::from(overlay_h)).min(i64::from(base_h));

    if x0 >= x1 || y0 >= y1 {
        return None;
    }

    // All four values are within [0, base dimension] here.
    Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
}

/// Paste `overlay` onto `base` at `placement`, using the overlay's alpha
/// channel as the blend mask.
///
/// Every channel, including alpha, is mixed by the mask. Parts of the overlay
/// falling outside the base are clipped; negative placements are allowed.
pub fn paste_with_mask(base: &mut RgbaImage, overlay: &RgbaImage, placement: Placement) {
    let Some((x0, y0, x1, y1)) = visible_region(
        base.width(),
        base.height(),
        overlay.width(),
        overlay.height(),
        placement,
    ) else {
        return;
    };

    for by in y0..y1 {
        for bx in x0..x1 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let src = *overlay.get_pixel(
                (i64::from(bx) - placement.x) as u32,
                (i64::from(by) - placement.y) as u32,
            );
            let mask = src[3];
            if mask == 0 {
                continue;
            }

            let px = base.get_pixel_mut(bx, by);
            for ch in 0..4 {
                px[ch] = mix(px[ch], src[ch], mask);
            }
        }
    }
}

/// Porter-Duff "over" for a single pixel.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn over(bottom: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    let top_a = f32::from(top[3]) / 255.0;
    if top_a <= 0.0 {
        return bottom;
    }
    let bottom_a = f32::from(bottom[3]) / 255.0;
    let out_a = top_a + bottom_a * (1.0 - top_a);

    let channel = |t: u8, b: u8| -> u8 {
        let t = f32::from(t) / 255.0;
        let b = f32::from(b) / 255.0;
        let v = (t * top_a + b * bottom_a * (1.0 - top_a)) / out_a;
        (v * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(top[0], bottom[0]),
        channel(top[1], bottom[1]),
        channel(top[2], bottom[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

/// Composite `layer` over `base` in place.
///
/// Both images are expected to share dimensions; only the overlapping area is
/// touched otherwise.
pub fn alpha_composite(base: &mut RgbaImage, layer: &RgbaImage) {
    let w = base.width().min(layer.width());
    let h = base.height().min(layer.height());

    for y in 0..h {
        for x in 0..w {
            let top = *layer.get_pixel(x, y);
            if top[3] == 0 {
                continue;
            }
            let px = base.get_pixel_mut(x, y);
            *px = over(*px, top);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mix_hits_endpoints_and_midpoint() {
        assert_eq!(mix(10, 250, 0), 10);
        assert_eq!(mix(10, 250, 255), 250);
        assert_eq!(mix(0, 255, 128), 128);
        assert_eq!(mix(255, 255, 77), 255);
    }

    #[test]
    fn paste_blends_by_overlay_alpha() {
        let mut base = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        let overlay = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 128]));
        paste_with_mask(&mut base, &overlay, Placement::new(3, 4));

        assert_eq!(*base.get_pixel(3, 4), Rgba([128, 128, 128, 191]));
        assert_eq!(*base.get_pixel(4, 5), Rgba([128, 128, 128, 191]));
        assert_eq!(*base.get_pixel(2, 4), Rgba([0, 0, 0, 255]));
        assert_eq!(*base.get_pixel(5, 4), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn paste_opaque_overlay_replaces_pixels() {
        let mut base = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
        let overlay = RgbaImage::from_pixel(2, 2, Rgba([9, 8, 7, 255]));
        paste_with_mask(&mut base, &overlay, Placement::new(0, 0));
        assert_eq!(*base.get_pixel(1, 1), Rgba([9, 8, 7, 255]));
        assert_eq!(*base.get_pixel(2, 2), Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn paste_clips_negative_and_overflowing_placements() {
        let mut base = RgbaImage::from_pixel(5, 5, Rgba([0, 0, 0, 255]));
        let overlay = RgbaImage::from_pixel(4, 4, Rgba([200, 200, 200, 255]));

        paste_with_mask(&mut base, &overlay, Placement::new(-2, -3));
        assert_eq!(base.get_pixel(0, 0)[0], 200);
        assert_eq!(base.get_pixel(1, 0)[0], 200);
        assert_eq!(base.get_pixel(2, 0)[0], 0);
        assert_eq!(base.get_pixel(0, 1)[0], 0);

        paste_with_mask(&mut base, &overlay, Placement::new(3, 3));
        assert_eq!(base.get_pixel(4, 4)[0], 200);
        assert_eq!(base.get_pixel(2, 4)[0], 0);
    }

    #[test]
    fn paste_entirely_outside_is_a_no_op() {
        let mut base = RgbaImage::from_pixel(5, 5, Rgba([7, 7, 7, 255]));
        let before = base.clone();
        let overlay = RgbaImage::from_pixel(3, 3, Rgba([255, 0, 0, 255]));
        paste_with_mask(&mut base, &overlay, Placement::new(-10, 2));
        paste_with_mask(&mut base, &overlay, Placement::new(5, 0));
        paste_with_mask(&mut base, &overlay, Placement::new(0, 40));
        assert_eq!(base, before);
    }

    #[test]
    fn composite_over_opaque_base_stays_opaque() {
        let mut base = RgbaImage::from_pixel(3, 3, Rgba([0, 0, 0, 255]));
        let mut layer = RgbaImage::new(3, 3);
        layer.put_pixel(1, 1, Rgba([255, 255, 255, 128]));
        alpha_composite(&mut base, &layer);

        assert_eq!(*base.get_pixel(1, 1), Rgba([128, 128, 128, 255]));
        assert_eq!(*base.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn composite_over_transparent_base_takes_layer() {
        let mut base = RgbaImage::new(2, 2);
        let layer = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 128]));
        alpha_composite(&mut base, &layer);
        assert_eq!(*base.get_pixel(0, 1), Rgba([255, 255, 255, 128]));
    }
}
