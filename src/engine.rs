//! Core watermark compositing engine.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, ImageReader, ImageResult, Rgba, RgbaImage};
use tracing::debug;

use crate::blending;
use crate::error::{Error, Result};
use crate::filter;
use crate::geometry::{self, Anchor};
use crate::job::{WatermarkJob, WatermarkKind};
use crate::text::FontFace;

/// Text watermarks are drawn white at 50% opacity.
pub const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 128]);

/// The base font size is the image height divided by this.
const FONT_SCALE_DIVISOR: u32 = 15;

/// Font size used when the scaled size comes out as zero.
const MIN_FONT_SIZE: u32 = 5;

/// Options controlling rendering and encoding, independent of the job.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// TrueType font for text watermarks; the embedded face is used if absent.
    pub font_path: PathBuf,
    /// JPEG encoder quality (1-100).
    pub jpeg_quality: u8,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            font_path: PathBuf::from("fonts/arial.ttf"),
            jpeg_quality: 75,
        }
    }
}

/// Result of processing a single input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// The watermarked image was written.
    Written,
    /// The input could not be decoded; nothing was written.
    Skipped,
}

/// Font size for a text watermark on an image `base_height` pixels tall.
///
/// `floor(floor(base_height / 15) * size_percent / 100)`, with a zero result
/// replaced by 5.
#[must_use]
pub fn text_font_size(base_height: u32, size_percent: u32) -> u32 {
    let base = u64::from(base_height / FONT_SCALE_DIVISOR);
    let size = base * u64::from(size_percent) / 100;
    if size == 0 {
        MIN_FONT_SIZE
    } else {
        u32::try_from(size).unwrap_or(u32::MAX)
    }
}

/// Target size of an image watermark on a base `base_width` pixels wide.
///
/// The width is `size_percent` of the base width; the height keeps the
/// watermark's aspect ratio. Both are floored.
#[must_use]
pub fn watermark_target_size(
    base_width: u32,
    wm_width: u32,
    wm_height: u32,
    size_percent: u32,
) -> (u32, u32) {
    let target_w = u64::from(base_width) * u64::from(size_percent) / 100;
    let target_h = if wm_width == 0 {
        0
    } else {
        u64::from(wm_height) * target_w / u64::from(wm_width)
    };
    (
        u32::try_from(target_w).unwrap_or(u32::MAX),
        u32::try_from(target_h).unwrap_or(u32::MAX),
    )
}

/// Resize `watermark` relative to `base`, then paste it at `anchor` using
/// its own alpha as the mask.
///
/// A watermark that scales down to zero pixels leaves `base` untouched.
pub fn apply_image_watermark(
    base: &mut RgbaImage,
    watermark: &RgbaImage,
    size_percent: u32,
    anchor: Anchor,
) {
    let (target_w, target_h) = watermark_target_size(
        base.width(),
        watermark.width(),
        watermark.height(),
        size_percent,
    );
    if target_w == 0 || target_h == 0 {
        debug!(size_percent, "watermark scaled to zero pixels, nothing to paste");
        return;
    }

    let resized = imageops::resize(watermark, target_w, target_h, FilterType::CatmullRom);
    let at = geometry::resolve(base.width(), base.height(), target_w, target_h, anchor);
    blending::paste_with_mask(base, &resized, at);
}

/// Render `text` onto a transparent layer and composite it over `base`.
pub fn apply_text_watermark(
    base: &mut RgbaImage,
    text: &str,
    font: &FontFace,
    size_percent: u32,
    anchor: Anchor,
) {
    let (width, height) = base.dimensions();
    let size = text_font_size(height, size_percent);
    let bounds = font.measure(text, size);
    let at = geometry::resolve(width, height, bounds.width, bounds.height, anchor);

    let mut layer = RgbaImage::new(width, height);
    font.draw(&mut layer, text, size, at, TEXT_COLOR);
    blending::alpha_composite(base, &layer);
}

/// The prepared watermark for a job.
enum Mark {
    Text {
        text: String,
        font: FontFace,
    },
    Image {
        path: PathBuf,
        filter: bool,
        /// Decoded on first use, then reused for every file in the batch.
        cached: Option<RgbaImage>,
    },
}

/// Applies one job's watermark to images.
///
/// Create once per batch with [`WatermarkEngine::new()`]. For image
/// watermarks the source file is decoded (and filtered) lazily on the first
/// image that needs it, so a bad watermark is reported at that point.
pub struct WatermarkEngine {
    mark: Mark,
    size_percent: u32,
    anchor: Anchor,
    jpeg_quality: u8,
}

impl WatermarkEngine {
    /// Prepare an engine for `job`.
    ///
    /// Text jobs load their font here (falling back to the embedded face).
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmbeddedFont`] if the embedded fallback font is corrupt.
    pub fn new(job: &WatermarkJob, opts: &ProcessOptions) -> Result<Self> {
        let mark = match job.kind() {
            WatermarkKind::Text(text) => Mark::Text {
                text: text.clone(),
                font: FontFace::load(&opts.font_path)?,
            },
            WatermarkKind::Image { path, filter } => Mark::Image {
                path: path.clone(),
                filter: *filter,
                cached: None,
            },
        };

        Ok(Self {
            mark,
            size_percent: job.size_percent(),
            anchor: job.anchor(),
            jpeg_quality: opts.jpeg_quality,
        })
    }

    /// Watermark an in-memory image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WatermarkFilter`] or [`Error::WatermarkSource`] if
    /// the watermark image cannot be decoded.
    pub fn apply(&mut self, base: &mut RgbaImage) -> Result<()> {
        let (size_percent, anchor) = (self.size_percent, self.anchor);
        match &mut self.mark {
            Mark::Text { text, font } => {
                apply_text_watermark(base, text, font, size_percent, anchor);
            }
            Mark::Image {
                path,
                filter,
                cached,
            } => {
                let watermark = cached_watermark(cached, path, *filter)?;
                apply_image_watermark(base, watermark, size_percent, anchor);
            }
        }
        Ok(())
    }

    /// Process a single image file: load, watermark, save.
    ///
    /// An input that cannot be decoded is skipped without error.
    ///
    /// # Errors
    ///
    /// Any error returned here is fatal for the whole batch: the watermark
    /// source is unreadable, or the output could not be encoded or written.
    pub fn process_file(&mut self, input: &Path, output: &Path) -> Result<FileOutcome> {
        let mut base = match decode_image(input) {
            Ok(img) => img.to_rgba8(),
            Err(e) => {
                debug!(file = %input.display(), error = %e, "skipping undecodable image");
                return Ok(FileOutcome::Skipped);
            }
        };

        self.apply(&mut base)?;
        save_image(base, output, self.jpeg_quality)?;
        debug!(file = %output.display(), "wrote watermarked image");
        Ok(FileOutcome::Written)
    }
}

/// Decode the watermark once and hand out the cached copy afterwards.
fn cached_watermark<'a>(
    cached: &'a mut Option<RgbaImage>,
    path: &Path,
    filter: bool,
) -> Result<&'a RgbaImage> {
    match cached {
        Some(img) => Ok(&*img),
        None => {
            debug!(path = %path.display(), filter, "loading watermark image");
            let img = if filter {
                filter::load_filtered(path)?
            } else {
                decode_image(path).map_err(Error::WatermarkSource)?.to_rgba8()
            };
            Ok(&*cached.insert(img))
        }
    }
}

/// Decode the image at `path`, picking the codec from the file's leading
/// bytes. The extension is only consulted when the content is unrecognized.
pub(crate) fn decode_image(path: &Path) -> ImageResult<DynamicImage> {
    ImageReader::open(path)?.with_guessed_format()?.decode()
}

/// Check if a file has a supported image extension (case-insensitive).
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "bmp"
        ),
        None => false,
    }
}

/// Save a composited RGBA image in the format implied by `path`.
///
/// JPEG has no alpha channel, so the alpha is dropped before encoding.
/// PNG and BMP are written with alpha.
///
/// # Errors
///
/// Returns an error if the format is unsupported or writing fails.
pub fn save_image(img: RgbaImage, path: &Path, jpeg_quality: u8) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    match format {
        ImageFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(img).to_rgb8();
            let file = BufWriter::new(File::create(path)?);
            let mut encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(file, jpeg_quality.clamp(1, 100));
            encoder.encode_image(&rgb)?;
        }
        ImageFormat::Png | ImageFormat::Bmp => {
            img.save_with_format(path, format)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(())
}
