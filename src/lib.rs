//! Batch-apply visible watermarks to every image in a folder.
//!
//! A [`WatermarkJob`] names an input folder, a text or image watermark, a
//! size percentage and an [`Anchor`]. Running it writes a watermarked copy of
//! each `.jpg`, `.jpeg`, `.png` and `.bmp` file into a `watermarked_output`
//! folder inside the input folder.
//!
//! # Quick Start
//!
//! ```no_run
//! use batch_watermark::{Anchor, BatchRunner, NoopObserver, ProcessOptions, WatermarkJob, WatermarkKind};
//!
//! let job = WatermarkJob::new(
//!     "photos",
//!     WatermarkKind::Text("@MyBrand".to_string()),
//!     100,
//!     Anchor::BottomRight,
//! )
//! .expect("invalid job");
//! let summary = BatchRunner::new(job, ProcessOptions::default())
//!     .run(&mut NoopObserver)
//!     .expect("batch failed");
//! println!("{summary}");
//! ```
//!
//! # Image watermarks
//!
//! Image watermarks are scaled to a percentage of each image's width, keep
//! their aspect ratio, and are pasted using their own alpha channel. With the
//! filter enabled they are first converted to grayscale at 50% opacity.
//!
//! ```no_run
//! use batch_watermark::{Anchor, WatermarkEngine, ProcessOptions, WatermarkJob, WatermarkKind};
//!
//! let kind = WatermarkKind::Image { path: "logo.png".into(), filter: true };
//! let job = WatermarkJob::new("photos", kind, 15, Anchor::TopLeft).unwrap();
//! let mut engine = WatermarkEngine::new(&job, &ProcessOptions::default()).unwrap();
//! let mut img = image::open("photos/a.png").unwrap().to_rgba8();
//! engine.apply(&mut img).unwrap();
//! img.save("a_marked.png").unwrap();
//! ```

#![deny(missing_docs)]

pub mod batch;
pub mod blending;
mod engine;
pub mod error;
pub mod filter;
pub mod geometry;
mod job;
pub mod text;

pub use batch::{
    spawn, BatchEvent, BatchHandle, BatchObserver, BatchRunner, BatchSummary, NoopObserver,
};
pub use engine::{
    apply_image_watermark, apply_text_watermark, is_supported_image, save_image,
    text_font_size, watermark_target_size, FileOutcome, ProcessOptions, WatermarkEngine,
    TEXT_COLOR,
};
pub use error::{Error, Result};
pub use geometry::{Anchor, Placement, MARGIN};
pub use job::{WatermarkJob, WatermarkKind, OUTPUT_DIR_NAME};
