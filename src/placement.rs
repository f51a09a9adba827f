//! Category placement policy.
//!
//! Each [`OverlayCategory`] maps to exactly one [`PlacementRule`] describing how an overlay of that
//! category is sized and anchored relative to a face. The rules are plain data; the
//! [`OverlayEngine`][crate::overlay::OverlayEngine] interprets all of them the same way.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// The kinds of overlay a user can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayCategory {
    /// Glasses, masks and other things worn across the eyes.
    Eyes,
    /// Hats, crowns, ears.
    Head,
    /// A picture frame around the whole image.
    Frame,
    /// A decorative border around the whole image.
    Border,
    /// Anything else. Placed like [`OverlayCategory::Eyes`] with a different size.
    General,
}

impl OverlayCategory {
    pub const ALL: [OverlayCategory; 5] = [
        OverlayCategory::Eyes,
        OverlayCategory::Head,
        OverlayCategory::Frame,
        OverlayCategory::Border,
        OverlayCategory::General,
    ];

    /// Returns the placement rule of this category.
    pub fn rule(self) -> &'static PlacementRule {
        match self {
            OverlayCategory::Eyes => &EYES,
            OverlayCategory::Head => &HEAD,
            OverlayCategory::Frame => &FRAME,
            OverlayCategory::Border => &BORDER,
            OverlayCategory::General => &GENERAL,
        }
    }

    /// Stacking order of overlays of this category. Higher values are drawn on top.
    pub fn z_index(self) -> i32 {
        match self {
            OverlayCategory::Frame | OverlayCategory::Border => 80,
            OverlayCategory::Head => 90,
            OverlayCategory::Eyes | OverlayCategory::General => 100,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OverlayCategory::Eyes => "eyes",
            OverlayCategory::Head => "head",
            OverlayCategory::Frame => "frame",
            OverlayCategory::Border => "border",
            OverlayCategory::General => "general",
        }
    }
}

impl fmt::Display for OverlayCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCategoryError {
    input: String,
}

impl fmt::Display for ParseCategoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown overlay category '{}' (expected one of eyes, head, frame, border, general)",
            self.input
        )
    }
}

impl std::error::Error for ParseCategoryError {}

impl FromStr for OverlayCategory {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        OverlayCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseCategoryError {
                input: s.to_string(),
            })
    }
}

/// The point of the face an overlay is centered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Horizontally at the nose tip, vertically halfway between forehead and chin. Full-screen
    /// rules ignore the face and use the center of the video frame instead.
    Center,
    /// The eye midpoint, displaced along the face's vertical axis by
    /// [`PlacementRule::vertical_offset`].
    Top,
    /// The eye midpoint.
    Eyes,
}

/// How an overlay is sized and positioned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementRule {
    /// Overlay width as a multiple of the distance between the eyes.
    pub width_ratio: f32,
    /// Overlay height as a multiple of the forehead-to-chin distance.
    pub height_ratio: f32,
    pub anchor: Anchor,
    /// Displacement of a [`Anchor::Top`] anchor, as a multiple of the face height. Negative values
    /// move towards the top of the head.
    pub vertical_offset: f32,
    /// Whether the overlay covers the whole video frame, independent of any face.
    pub use_full_screen: bool,
    /// Whether the overlay image must keep its aspect ratio inside the computed box.
    pub maintain_aspect_ratio: bool,
}

static EYES: PlacementRule = PlacementRule {
    width_ratio: 2.2,
    height_ratio: 0.9,
    anchor: Anchor::Eyes,
    vertical_offset: 0.0,
    use_full_screen: false,
    maintain_aspect_ratio: true,
};

static HEAD: PlacementRule = PlacementRule {
    width_ratio: 2.6,
    height_ratio: 1.4,
    anchor: Anchor::Top,
    vertical_offset: -0.65,
    use_full_screen: false,
    maintain_aspect_ratio: false,
};

static FRAME: PlacementRule = PlacementRule {
    width_ratio: 1.0,
    height_ratio: 1.0,
    anchor: Anchor::Center,
    vertical_offset: 0.0,
    use_full_screen: true,
    maintain_aspect_ratio: false,
};

static BORDER: PlacementRule = PlacementRule {
    width_ratio: 1.0,
    height_ratio: 1.0,
    anchor: Anchor::Center,
    vertical_offset: 0.0,
    use_full_screen: true,
    maintain_aspect_ratio: false,
};

static GENERAL: PlacementRule = PlacementRule {
    width_ratio: 2.0,
    height_ratio: 1.0,
    anchor: Anchor::Eyes,
    vertical_offset: 0.0,
    use_full_screen: false,
    maintain_aspect_ratio: false,
};
