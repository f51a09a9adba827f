//! Still capture.
//!
//! When the user takes a picture, [`composite`] renders the current camera frame together with
//! the overlays that are on screen at that moment. Overlay placement is taken from the transforms
//! the [`OverlayEngine`][crate::overlay::OverlayEngine] last produced, scaled from display space
//! up to the native resolution of the frame.

use std::{fmt, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    image::{Format, Image, RotatedRect},
    overlay::RenderTransform,
    placement::OverlayCategory,
    resolution::Resolution,
};

/// The overlay currently selected in the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedOverlay {
    pub image_url: String,
    pub category: OverlayCategory,
}

#[derive(Debug, Clone)]
enum Pixels {
    Readable(Image),
    /// The overlay can be displayed, but its pixels can't be read back.
    Restricted,
}

/// An overlay image together with what it was selected as.
#[derive(Debug, Clone)]
pub struct OverlayImage {
    selection: SelectedOverlay,
    resolution: Resolution,
    pixels: Pixels,
}

impl OverlayImage {
    /// Loads an overlay from a PNG or JPEG file.
    pub fn load<P: AsRef<Path>>(path: P, category: OverlayCategory) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let image = Image::load(path)?;
        Ok(Self::from_image(
            image,
            SelectedOverlay {
                image_url: path.display().to_string(),
                category,
            },
        ))
    }

    pub fn from_image(image: Image, selection: SelectedOverlay) -> Self {
        Self {
            selection,
            resolution: image.resolution(),
            pixels: Pixels::Readable(image),
        }
    }

    /// Registers an overlay whose pixels are not accessible, such as an image served from a
    /// foreign origin. It can be shown in the live preview, but not captured.
    pub fn restricted(selection: SelectedOverlay, resolution: Resolution) -> Self {
        Self {
            selection,
            resolution,
            pixels: Pixels::Restricted,
        }
    }

    pub fn selection(&self) -> &SelectedOverlay {
        &self.selection
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Returns the pixel data, or [`CaptureError::ReadbackDenied`] if it can't be read.
    pub fn pixels(&self) -> Result<&Image, CaptureError> {
        match &self.pixels {
            Pixels::Readable(image) => Ok(image),
            Pixels::Restricted => Err(CaptureError::ReadbackDenied {
                image_url: self.selection.image_url.clone(),
            }),
        }
    }
}

/// Errors that can occur while compositing a still image.
///
/// None of these affect the live preview; the capture can simply be retried, for example with a
/// different overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The overlay's pixels may not be read, so it can't be drawn into the still.
    ReadbackDenied { image_url: String },
    /// The display or frame has a width or height of zero.
    InvalidDimensions {
        display: Resolution,
        frame: Resolution,
    },
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::ReadbackDenied { image_url } => write!(
                f,
                "cannot save photo with this filter: pixels of overlay '{image_url}' are not readable"
            ),
            CaptureError::InvalidDimensions { display, frame } => write!(
                f,
                "cannot capture with display size {display} and frame size {frame}"
            ),
        }
    }
}

impl std::error::Error for CaptureError {}

/// A composited photo.
#[derive(Debug, Clone)]
pub struct Still {
    image: Image,
}

impl Still {
    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn into_image(self) -> Image {
        self.image
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, crate::Error> {
        self.image.encode(Format::Png)
    }

    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, crate::Error> {
        self.image.encode(Format::Jpeg(quality))
    }
}

/// Renders `frame` mirrored, with `overlay` drawn at every transform in `transforms`.
///
/// `transforms` are in the display space of a preview of size `display`. The output has the
/// resolution of `frame`. Overlays of full-screen categories are stretched over the whole output
/// and drawn only once, face-relative overlays are rotated around their center.
pub fn composite(
    frame: &Image,
    transforms: &[RenderTransform],
    overlay: &OverlayImage,
    display: Resolution,
) -> Result<Still, CaptureError> {
    let out_res = frame.resolution();
    let invalid = || CaptureError::InvalidDimensions {
        display,
        frame: out_res,
    };
    if out_res.is_empty() {
        return Err(invalid());
    }
    let (sx, sy) = display.scale_factors_to(out_res).ok_or_else(invalid)?;

    let mut out = frame.flip_horizontal();
    if transforms.is_empty() {
        return Ok(Still { image: out });
    }
    let src = overlay.pixels()?;

    let mut ordered = transforms.to_vec();
    ordered.sort_by_key(|t| t.z_index);

    let mut drew_full_screen = false;
    for t in &ordered {
        let rule = t.category.rule();
        if rule.use_full_screen {
            if !drew_full_screen {
                let full = out.rect();
                out.blend_from(src, full);
                drew_full_screen = true;
            }
            continue;
        }

        let t = t.scaled(sx, sy);
        let (mut w, mut h) = (t.width, t.height);
        if rule.maintain_aspect_ratio {
            (w, h) = fit_aspect(w, h, src.resolution());
        }
        let dest = RotatedRect::new(t.center_x, t.center_y, w, h, t.angle_deg.to_radians());
        log::trace!("drawing {} overlay at {dest:?}", t.category);
        out.blend_from(src, dest);
    }

    Ok(Still { image: out })
}

/// Shrinks a `w x h` box to the aspect ratio of `image`, keeping it centered.
fn fit_aspect(w: f32, h: f32, image: Resolution) -> (f32, f32) {
    let Some(ratio) = image.aspect_ratio() else {
        return (w, h);
    };
    if h <= 0.0 {
        return (w, h);
    }
    let aspect = ratio.as_f32();
    if w / h > aspect {
        (h * aspect, h)
    } else {
        (w, w / aspect)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::image::Color;

    use super::*;

    fn solid(w: u32, h: u32, color: Color) -> Image {
        let mut image = Image::new(w, h);
        image.clear(color);
        image
    }

    fn overlay(image: Image, category: OverlayCategory) -> OverlayImage {
        OverlayImage::from_image(
            image,
            SelectedOverlay {
                image_url: "overlays/test.png".into(),
                category,
            },
        )
    }

    fn transform(category: OverlayCategory, cx: f32, cy: f32, w: f32, h: f32) -> RenderTransform {
        RenderTransform {
            center_x: cx,
            center_y: cy,
            angle_deg: 0.0,
            width: w,
            height: h,
            z_index: category.z_index(),
            category,
        }
    }

    /// A frame whose left half is red and right half is blue.
    fn split_frame() -> Image {
        let mut frame = solid(8, 4, Color::BLUE);
        for y in 0..4 {
            for x in 0..4 {
                frame.set(x, y, Color::RED);
            }
        }
        frame
    }

    #[test]
    fn frame_is_mirrored() {
        let still = composite(
            &split_frame(),
            &[],
            &overlay(solid(1, 1, Color::GREEN), OverlayCategory::Eyes),
            Resolution::new(8, 4),
        )
        .unwrap();
        assert_eq!(still.image().get(0, 0), Color::BLUE);
        assert_eq!(still.image().get(7, 3), Color::RED);
    }

    #[test]
    fn scales_display_to_frame() {
        let frame = solid(40, 20, Color::BLACK);
        // Display is half the frame size; the overlay covers display pixels 2..6 x 2..6.
        let t = transform(OverlayCategory::General, 4.0, 4.0, 4.0, 4.0);
        let still = composite(
            &frame,
            &[t],
            &overlay(solid(2, 2, Color::GREEN), OverlayCategory::General),
            Resolution::new(20, 10),
        )
        .unwrap();
        let img = still.image();
        assert_eq!(img.get(4, 4), Color::GREEN);
        assert_eq!(img.get(11, 11), Color::GREEN);
        assert_eq!(img.get(3, 4), Color::BLACK);
        assert_eq!(img.get(12, 4), Color::BLACK);
    }

    #[test]
    fn full_screen_overlay_covers_output() {
        let frame = solid(10, 6, Color::BLACK);
        let t = transform(OverlayCategory::Border, 2.5, 1.5, 5.0, 3.0);
        let still = composite(
            &frame,
            &[t, t],
            &overlay(solid(1, 1, Color::RED), OverlayCategory::Border),
            Resolution::new(5, 3),
        )
        .unwrap();
        for (x, y) in [(0, 0), (9, 5), (5, 3)] {
            assert_eq!(still.image().get(x, y), Color::RED);
        }
    }

    #[test]
    fn restricted_overlay_fails() {
        let selection = SelectedOverlay {
            image_url: "https://cdn.example.com/hat.png".into(),
            category: OverlayCategory::Head,
        };
        let restricted = OverlayImage::restricted(selection, Resolution::new(16, 16));
        let frame = solid(4, 4, Color::BLACK);
        let t = transform(OverlayCategory::Head, 2.0, 2.0, 2.0, 2.0);

        let err = composite(&frame, &[t], &restricted, Resolution::new(4, 4)).unwrap_err();
        assert_eq!(
            err,
            CaptureError::ReadbackDenied {
                image_url: "https://cdn.example.com/hat.png".into()
            }
        );
        assert!(err.to_string().contains("cannot save"));

        // Without anything on screen there's nothing to read back.
        assert!(composite(&frame, &[], &restricted, Resolution::new(4, 4)).is_ok());
    }

    #[test]
    fn invalid_dimensions() {
        let frame = solid(4, 4, Color::BLACK);
        let o = overlay(solid(1, 1, Color::RED), OverlayCategory::Eyes);
        assert!(matches!(
            composite(&frame, &[], &o, Resolution::new(0, 4)),
            Err(CaptureError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn aspect_fit() {
        let (w, h) = fit_aspect(100.0, 20.0, Resolution::new(4, 2));
        assert_relative_eq!(w, 40.0);
        assert_relative_eq!(h, 20.0);
        let (w, h) = fit_aspect(10.0, 20.0, Resolution::new(4, 2));
        assert_relative_eq!(w, 10.0);
        assert_relative_eq!(h, 5.0);
    }

    #[test]
    fn eyes_overlay_keeps_aspect() {
        let frame = solid(20, 20, Color::BLACK);
        // Box is 16x4, a square overlay shrinks to 4x4 around (10, 10).
        let t = transform(OverlayCategory::Eyes, 10.0, 10.0, 16.0, 4.0);
        let still = composite(
            &frame,
            &[t],
            &overlay(solid(3, 3, Color::GREEN), OverlayCategory::Eyes),
            Resolution::new(20, 20),
        )
        .unwrap();
        assert_eq!(still.image().get(8, 8), Color::GREEN);
        assert_eq!(still.image().get(11, 11), Color::GREEN);
        assert_eq!(still.image().get(7, 10), Color::BLACK);
        assert_eq!(still.image().get(12, 10), Color::BLACK);
    }

    #[test]
    fn encodes() {
        let still = Still {
            image: solid(3, 2, Color::WHITE),
        };
        let png = still.encode_png().unwrap();
        assert_eq!(&png[1..4], b"PNG");
        let jpeg = still.encode_jpeg(90).unwrap();
        assert_eq!(&jpeg[..2], &[0xFFu8, 0xD8]);
    }
}
