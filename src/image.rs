//! Image manipulation for still capture.
//!
//! This module provides:
//!
//! - The [`Image`] type, an owned RGBA image.
//! - [`Rect`] and [`RotatedRect`], rectangles describing where something goes in an image.
//! - [`Blend`], a blending operation that draws a source image into a (possibly rotated)
//!   destination rectangle.

mod blend;
mod rect;


use std::{fmt, io::Cursor, path::Path};

use image::{ImageBuffer, ImageOutputFormat, Rgba, RgbaImage};

use crate::resolution::Resolution;

pub use blend::*;
pub use rect::*;

/// Encoding formats supported by [`Image::encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Png,
    /// JPEG with a quality value between 1 and 100.
    Jpeg(u8),
}

impl Format {
    fn from_path(path: &Path) -> Result<Self, crate::Error> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("jpg" | "jpeg") => Ok(Self::Jpeg(90)),
            Some("png") => Ok(Self::Png),
            _ => Err(format!(
                "invalid image path '{}' (must have one of the supported extensions)",
                path.display()
            )
            .into()),
        }
    }
}

/// An 8-bit sRGB image with alpha channel.
#[derive(Clone, PartialEq)]
pub struct Image {
    pub(crate) buf: RgbaImage,
}

impl Image {
    /// Creates an empty image of a specified size.
    ///
    /// The image will start out black and fully transparent.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: ImageBuffer::new(width, height),
        }
    }

    /// Loads an image from the filesystem.
    ///
    /// The path must have a supported file extension (`jpeg`, `jpg` or `png`).
    pub fn load<A: AsRef<Path>>(path: A) -> Result<Self, crate::Error> {
        Self::load_impl(path.as_ref())
    }

    fn load_impl(path: &Path) -> Result<Self, crate::Error> {
        let format = match Format::from_path(path)? {
            Format::Png => image::ImageFormat::Png,
            Format::Jpeg(_) => image::ImageFormat::Jpeg,
        };
        let data = std::fs::read(path)?;
        Self::decode(&data, format)
    }

    /// Decodes an encoded PNG or JPEG image from a byte slice.
    pub fn decode(data: &[u8], format: image::ImageFormat) -> Result<Self, crate::Error> {
        let buf = image::load_from_memory_with_format(data, format)?.to_rgba8();
        Ok(Self { buf })
    }

    /// Encodes the image into an in-memory byte buffer.
    pub fn encode(&self, format: Format) -> Result<Vec<u8>, crate::Error> {
        let mut out = Cursor::new(Vec::new());
        match format {
            Format::Png => self.buf.write_to(&mut out, ImageOutputFormat::Png)?,
            Format::Jpeg(quality) => {
                // JPEG has no alpha channel.
                let rgb = image::DynamicImage::ImageRgba8(self.buf.clone()).to_rgb8();
                rgb.write_to(&mut out, ImageOutputFormat::Jpeg(quality.clamp(1, 100)))?;
            }
        }
        Ok(out.into_inner())
    }

    /// Saves an image to the file system.
    ///
    /// The path must have a supported file extension (`jpeg`, `jpg` or `png`).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), crate::Error> {
        let path = path.as_ref();
        let data = self.encode(Format::from_path(path)?)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Returns the width of this image, in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    /// Returns the height of this image, in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    /// Returns the size of this image.
    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Returns a [`Rect`] covering this image.
    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::from_top_left(0, 0, self.width(), self.height())
    }

    /// Gets the image color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Color {
        Color(self.buf[(x, y)].0)
    }

    /// Sets the image color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.buf[(x, y)] = Rgba(color.0);
    }

    /// Returns a horizontally mirrored copy of this image.
    pub fn flip_horizontal(&self) -> Image {
        Image {
            buf: image::imageops::flip_horizontal(&self.buf),
        }
    }

    /// Draws `src` into the area of `self` covered by `dest`, stretching or shrinking `src` to
    /// the size of `dest` and rotating it along with `dest`.
    ///
    /// The operation is performed when the returned [`Blend`] is dropped. By default, this
    /// performs alpha blending.
    pub fn blend_from<'a>(&'a mut self, src: &'a Image, dest: impl Into<RotatedRect>) -> Blend<'a> {
        Blend::new(self, src, dest.into())
    }

    /// Clears the image, setting every pixel value to `color`.
    pub fn clear(&mut self, color: Color) {
        self.buf.pixels_mut().for_each(|pix| pix.0 = color.0);
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} Image", self.width(), self.height())
    }
}

/// An 8-bit sRGB color with alpha channel.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Color(pub(crate) [u8; 4]);

impl Color {
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);
    pub const RED: Self = Self([255, 0, 0, 255]);
    pub const GREEN: Self = Self([0, 255, 0, 255]);
    pub const BLUE: Self = Self([0, 0, 255, 255]);

    #[inline]
    pub fn r(&self) -> u8 {
        self.0[0]
    }

    #[inline]
    pub fn g(&self) -> u8 {
        self.0[1]
    }

    #[inline]
    pub fn b(&self) -> u8 {
        self.0[2]
    }

    #[inline]
    pub fn a(&self) -> u8 {
        self.0[3]
    }

    pub fn with_alpha(mut self, a: u8) -> Color {
        self.0[3] = a;
        self
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02x}{:02x}{:02x}{:02x}",
            self.r(),
            self.g(),
            self.b(),
            self.a(),
        )
    }
}
