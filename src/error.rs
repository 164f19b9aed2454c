//! Error types for the batch-watermark crate.

/// Errors that can occur while validating a job or running a batch.
///
/// Every variant is batch-fatal: undecodable input images are not errors,
/// they are skipped (see [`FileOutcome::Skipped`](crate::FileOutcome)).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The watermark job was built from invalid input.
    #[error("{0}")]
    InvalidJob(String),

    /// The input directory contains no file with a supported extension.
    #[error("No supported image files found in the selected folder.")]
    NoSupportedImages,

    /// The watermark image could not be decoded for the grayscale filter.
    #[error("Failed to apply filter to watermark image: {0}")]
    WatermarkFilter(image::ImageError),

    /// The watermark image could not be decoded.
    #[error("Failed to load watermark image: {0}")]
    WatermarkSource(image::ImageError),

    /// The embedded fallback font could not be parsed.
    #[error("failed to parse embedded font: {0}")]
    EmbeddedFont(ab_glyph::InvalidFont),

    /// The output extension maps to a format this crate does not write.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An I/O error occurred while enumerating, reading or writing files.
    #[error("An error occurred during batch processing: {0}")]
    Io(#[from] std::io::Error),

    /// An error occurred while encoding an output image.
    #[error("An error occurred during batch processing: {0}")]
    Image(#[from] image::ImageError),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
