//! Validated, immutable description of one watermarking batch.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::geometry::Anchor;

/// Name of the output folder created inside the input folder.
pub const OUTPUT_DIR_NAME: &str = "watermarked_output";

/// What gets stamped onto each image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatermarkKind {
    /// A line of text, rendered white at 50% opacity.
    Text(String),
    /// An image file overlaid using its own alpha channel.
    Image {
        /// Path of the watermark image (ideally a PNG with alpha).
        path: PathBuf,
        /// Convert the watermark to grayscale at 50% opacity first.
        filter: bool,
    },
}

impl WatermarkKind {
    /// Size percentage used when the caller gives none: 100% of the base
    /// font scale for text, 15% of the image width for image watermarks.
    #[must_use]
    pub fn default_size_percent(&self) -> u32 {
        match self {
            WatermarkKind::Text(_) => 100,
            WatermarkKind::Image { .. } => 15,
        }
    }
}

/// A watermarking job, validated once and never mutated.
///
/// Built with [`WatermarkJob::new`] and consumed by exactly one batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkJob {
    input_dir: PathBuf,
    kind: WatermarkKind,
    size_percent: u32,
    anchor: Anchor,
}

impl WatermarkJob {
    /// Validate the parameters and build a job.
    ///
    /// Text is trimmed before the emptiness check.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidJob`] if the input folder does not exist, the
    /// text is blank, the watermark image is not a file, or `size_percent`
    /// is zero.
    pub fn new(
        input_dir: impl Into<PathBuf>,
        kind: WatermarkKind,
        size_percent: u32,
        anchor: Anchor,
    ) -> Result<Self> {
        let input_dir = input_dir.into();
        if !input_dir.is_dir() {
            return Err(Error::InvalidJob(
                "Please select a valid input folder.".to_string(),
            ));
        }

        let kind = match kind {
            WatermarkKind::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(Error::InvalidJob("Please enter watermark text.".to_string()));
                }
                WatermarkKind::Text(text.to_string())
            }
            WatermarkKind::Image { path, filter } => {
                if !path.is_file() {
                    return Err(Error::InvalidJob(
                        "Please select a valid PNG watermark file.".to_string(),
                    ));
                }
                WatermarkKind::Image { path, filter }
            }
        };

        if size_percent == 0 {
            return Err(Error::InvalidJob(
                "Watermark size must be greater than 0%.".to_string(),
            ));
        }

        Ok(Self {
            input_dir,
            kind,
            size_percent,
            anchor,
        })
    }

    /// Folder whose images are watermarked.
    #[must_use]
    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    /// Text or image watermark.
    #[must_use]
    pub fn kind(&self) -> &WatermarkKind {
        &self.kind
    }

    /// Watermark scale in percent.
    #[must_use]
    pub fn size_percent(&self) -> u32 {
        self.size_percent
    }

    /// Anchor position on each image.
    #[must_use]
    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    /// `<input_dir>/watermarked_output`.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.input_dir.join(OUTPUT_DIR_NAME)
    }

    /// Whether the output folder exists yet, e.g. before offering to open it.
    #[must_use]
    pub fn output_dir_exists(&self) -> bool {
        self.output_dir().is_dir()
    }
}
