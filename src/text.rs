//! Text watermark rasterization.
//!
//! Text is laid out on a single line with kerning, measured by its ink
//! bounding box, and drawn onto a transparent layer so that the ink box's
//! top-left corner lands exactly on the requested placement.
//!
//! Fonts are loaded from a TrueType/OpenType file. When that file is missing
//! or unparsable the embedded DejaVu Sans Mono face is used instead; a missing
//! font is never an error.

use std::path::{Path, PathBuf};

use ab_glyph::{point, Font, FontArc, GlyphId, OutlinedGlyph, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use tracing::debug;

use crate::error::{Error, Result};
use crate::geometry::Placement;

/// Fallback face shipped inside the binary.
const EMBEDDED_FONT: &[u8] = include_bytes!("fonts/DejaVuSansMono.ttf");

/// Where a [`FontFace`] was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontSource {
    /// Read from a font file on disk.
    File(PathBuf),
    /// The embedded fallback face.
    Embedded,
}

/// Ink bounding box of a laid-out line of text.
///
/// `left`/`top` are relative to the layout origin (start of the line at the
/// ascender), in whole pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextBounds {
    /// Left edge of the ink relative to the origin.
    pub left: i64,
    /// Top edge of the ink relative to the origin.
    pub top: i64,
    /// Ink width in pixels.
    pub width: u32,
    /// Ink height in pixels.
    pub height: u32,
}

/// A loaded font face used for measuring and drawing watermark text.
#[derive(Clone)]
pub struct FontFace {
    font: FontArc,
    source: FontSource,
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFace")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl FontFace {
    /// Load the font at `path`, falling back to the embedded face.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmbeddedFont`] only if the embedded fallback itself
    /// cannot be parsed (a corrupted build).
    pub fn load(path: &Path) -> Result<Self> {
        let loaded = std::fs::read(path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| FontArc::try_from_vec(bytes).map_err(|e| e.to_string()));

        match loaded {
            Ok(font) => {
                debug!(path = %path.display(), "loaded watermark font");
                Ok(Self {
                    font,
                    source: FontSource::File(path.to_path_buf()),
                })
            }
            Err(reason) => {
                debug!(path = %path.display(), %reason, "font unavailable, using embedded face");
                Self::embedded()
            }
        }
    }

    /// The embedded DejaVu Sans Mono face.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmbeddedFont`] if the embedded data is corrupt.
    pub fn embedded() -> Result<Self> {
        let font = FontArc::try_from_slice(EMBEDDED_FONT).map_err(Error::EmbeddedFont)?;
        Ok(Self {
            font,
            source: FontSource::Embedded,
        })
    }

    /// Where this face came from.
    #[must_use]
    pub fn source(&self) -> &FontSource {
        &self.source
    }

    /// Scale for a font size given as em size in pixels.
    #[allow(clippy::cast_precision_loss)]
    fn px_scale(&self, size: u32) -> PxScale {
        let size = size as f32;
        match self.font.units_per_em() {
            Some(upem) if upem > 0.0 => PxScale::from(size * self.font.height_unscaled() / upem),
            _ => PxScale::from(size),
        }
    }

    /// Lay out `text` on one line with the origin at the ascender.
    fn layout(&self, text: &str, size: u32) -> Vec<OutlinedGlyph> {
        let scale = self.px_scale(size);
        let scaled = self.font.as_scaled(scale);
        let baseline = scaled.ascent();

        let mut caret = 0.0f32;
        let mut prev: Option<GlyphId> = None;
        let mut glyphs = Vec::with_capacity(text.len());

        for c in text.chars().filter(|c| !c.is_control()) {
            let id = scaled.glyph_id(c);
            if let Some(prev) = prev {
                caret += scaled.kern(prev, id);
            }
            let glyph = id.with_scale_and_position(scale, point(caret, baseline));
            caret += scaled.h_advance(id);
            prev = Some(id);

            if let Some(outlined) = self.font.outline_glyph(glyph) {
                glyphs.push(outlined);
            }
        }

        glyphs
    }

    /// Measure the ink bounding box of `text` at `size` pixels.
    ///
    /// Text without any visible glyph (e.g. only spaces) measures as zero.
    #[must_use]
    pub fn measure(&self, text: &str, size: u32) -> TextBounds {
        ink_bounds(&self.layout(text, size)).unwrap_or_default()
    }

    /// Draw `text` onto `layer` so that its ink box starts at `placement`.
    ///
    /// Each pixel gets `color` with alpha scaled by glyph coverage. Pixels
    /// outside the layer are clipped.
    pub fn draw(
        &self,
        layer: &mut RgbaImage,
        text: &str,
        size: u32,
        placement: Placement,
        color: Rgba<u8>,
    ) {
        let glyphs = self.layout(text, size);
        let Some(bounds) = ink_bounds(&glyphs) else {
            return;
        };
        let (w, h) = (i64::from(layer.width()), i64::from(layer.height()));

        for glyph in &glyphs {
            let gb = glyph.px_bounds();
            #[allow(clippy::cast_possible_truncation)]
            let (ox, oy) = (
                placement.x + gb.min.x as i64 - bounds.left,
                placement.y + gb.min.y as i64 - bounds.top,
            );

            glyph.draw(|px, py, coverage| {
                let x = ox + i64::from(px);
                let y = oy + i64::from(py);
                if x < 0 || y < 0 || x >= w || y >= h {
                    return;
                }
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let alpha = (coverage.clamp(0.0, 1.0) * f32::from(color[3])).round() as u8;
                if alpha == 0 {
                    return;
                }
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let dst = layer.get_pixel_mut(x as u32, y as u32);
                // Overlapping glyph edges keep the stronger coverage.
                if alpha > dst[3] {
                    *dst = Rgba([color[0], color[1], color[2], alpha]);
                }
            });
        }
    }
}

/// Union of the pixel bounds of all outlined glyphs.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn ink_bounds(glyphs: &[OutlinedGlyph]) -> Option<TextBounds> {
    let mut iter = glyphs.iter().map(OutlinedGlyph::px_bounds);
    let first = iter.next()?;
    let (mut x0, mut y0, mut x1, mut y1) = (first.min.x, first.min.y, first.max.x, first.max.y);
    for r in iter {
        x0 = x0.min(r.min.x);
        y0 = y0.min(r.min.y);
        x1 = x1.max(r.max.x);
        y1 = y1.max(r.max.y);
    }

    let (left, top) = (x0.floor() as i64, y0.floor() as i64);
    let (right, bottom) = (x1.ceil() as i64, y1.ceil() as i64);
    Some(TextBounds {
        left,
        top,
        width: (right - left).max(0) as u32,
        height: (bottom - top).max(0) as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE_HALF: Rgba<u8> = Rgba([255, 255, 255, 128]);

    #[test]
    fn missing_font_file_falls_back_to_embedded() {
        let face = FontFace::load(Path::new("no/such/font.ttf")).unwrap();
        assert_eq!(face.source(), &FontSource::Embedded);
    }

    #[test]
    fn garbage_font_file_falls_back_to_embedded() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").unwrap();

        let face = FontFace::load(&path).unwrap();
        assert_eq!(face.source(), &FontSource::Embedded);
    }

    #[test]
    fn font_file_on_disk_is_used() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("face.ttf");
        std::fs::write(&path, EMBEDDED_FONT).unwrap();

        let face = FontFace::load(&path).unwrap();
        assert_eq!(face.source(), &FontSource::File(path));
    }

    #[test]
    fn larger_sizes_measure_larger() {
        let face = FontFace::embedded().unwrap();
        let small = face.measure("@Brand", 12);
        let large = face.measure("@Brand", 48);
        assert!(small.width > 0 && small.height > 0);
        assert!(large.width > small.width);
        assert!(large.height > small.height);
    }

    #[test]
    fn blank_text_measures_zero() {
        let face = FontFace::embedded().unwrap();
        assert_eq!(face.measure("   ", 30), TextBounds::default());
        assert_eq!(face.measure("", 30), TextBounds::default());
    }

    #[test]
    fn drawn_ink_stays_inside_measured_box() {
        let face = FontFace::embedded().unwrap();
        let size = 40;
        let bounds = face.measure("Hg@", size);
        let mut layer = RgbaImage::new(300, 120);
        let at = Placement::new(17, 23);
        face.draw(&mut layer, "Hg@", size, at, WHITE_HALF);

        let mut inked = 0;
        for (x, y, px) in layer.enumerate_pixels() {
            if px[3] == 0 {
                continue;
            }
            inked += 1;
            assert!(px[3] <= 128);
            assert_eq!((px[0], px[1], px[2]), (255, 255, 255));
            let (x, y) = (i64::from(x), i64::from(y));
            assert!(x >= at.x && x < at.x + i64::from(bounds.width));
            assert!(y >= at.y && y < at.y + i64::from(bounds.height));
        }
        assert!(inked > 0);
        assert!(layer.pixels().any(|p| p[3] == 128));
    }

    #[test]
    fn drawing_off_canvas_is_clipped() {
        let face = FontFace::embedded().unwrap();
        let mut layer = RgbaImage::new(20, 20);
        face.draw(&mut layer, "WWWW", 30, Placement::new(-15, -10), WHITE_HALF);
        face.draw(&mut layer, "WWWW", 30, Placement::new(500, 500), WHITE_HALF);
    }
}
