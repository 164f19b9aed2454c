//! Overlay placement for the five anchor positions.
//!
//! Placement depends only on the base size, the overlay size, the anchor and
//! a fixed [`MARGIN`]. Nothing is clamped: a large overlay yields negative or
//! out-of-canvas coordinates and the blending routines clip it.

use std::fmt;
use std::str::FromStr;

/// Inset from the image edge used by the four corner anchors, in pixels.
pub const MARGIN: i64 = 20;

/// Where the watermark is anchored on the base image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Anchor {
    /// Top-left corner, inset by the margin.
    TopLeft,
    /// Top-right corner, inset by the margin.
    TopRight,
    /// Bottom-left corner, inset by the margin.
    BottomLeft,
    /// Bottom-right corner, inset by the margin.
    #[default]
    BottomRight,
    /// Centered on both axes.
    Center,
}

impl Anchor {
    /// All anchors, in the order a selection list offers them.
    pub const ALL: [Anchor; 5] = [
        Anchor::BottomRight,
        Anchor::TopLeft,
        Anchor::TopRight,
        Anchor::BottomLeft,
        Anchor::Center,
    ];

    /// Human-readable label, e.g. `"Bottom-Right"`.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Anchor::TopLeft => "Top-Left",
            Anchor::TopRight => "Top-Right",
            Anchor::BottomLeft => "Bottom-Left",
            Anchor::BottomRight => "Bottom-Right",
            Anchor::Center => "Center",
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Anchor {
    type Err = String;

    /// Accepts labels (`Top-Left`) as well as `top-left`, `top_left` and `topleft`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "topleft" => Ok(Anchor::TopLeft),
            "topright" => Ok(Anchor::TopRight),
            "bottomleft" => Ok(Anchor::BottomLeft),
            "bottomright" => Ok(Anchor::BottomRight),
            "center" | "centre" => Ok(Anchor::Center),
            _ => Err(format!("unknown position: {s}")),
        }
    }
}

/// Top-left offset of an overlay in the base image's pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Placement {
    /// Horizontal offset; negative values start left of the canvas.
    pub x: i64,
    /// Vertical offset; negative values start above the canvas.
    pub y: i64,
}

impl Placement {
    /// Create a placement at `(x, y)`.
    #[must_use]
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Compute where an `overlay_w` x `overlay_h` overlay goes on a
/// `base_w` x `base_h` image for the given anchor.
///
/// `Center` floors the midpoint, also when it is negative.
#[must_use]
pub fn resolve(base_w: u32, base_h: u32, overlay_w: u32, overlay_h: u32, anchor: Anchor) -> Placement {
    let (bw, bh) = (i64::from(base_w), i64::from(base_h));
    let (ow, oh) = (i64::from(overlay_w), i64::from(overlay_h));

    match anchor {
        Anchor::TopLeft => Placement::new(MARGIN, MARGIN),
        Anchor::TopRight => Placement::new(bw - ow - MARGIN, MARGIN),
        Anchor::BottomLeft => Placement::new(MARGIN, bh - oh - MARGIN),
        Anchor::BottomRight => Placement::new(bw - ow - MARGIN, bh - oh - MARGIN),
        Anchor::Center => Placement::new((bw - ow).div_euclid(2), (bh - oh).div_euclid(2)),
    }
}
