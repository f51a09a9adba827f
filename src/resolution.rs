//! Types for representing video, display and image resolutions.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Resolution (`width x height`) of a video frame, display container, or image.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    /// Creates a new [`Resolution`] of `width x height`.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the width of this [`Resolution`].
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height of this [`Resolution`].
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns whether either dimension is zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Computes the [`AspectRatio`] of this [`Resolution`].
    ///
    /// If `self` has a width or height of 0, `None` is returned.
    pub fn aspect_ratio(&self) -> Option<AspectRatio> {
        AspectRatio::new(self.width(), self.height())
    }

    /// Returns the per-axis factors that scale coordinates in `self` to coordinates in `target`.
    ///
    /// Returns `None` if `self` has no pixels. The two factors generally differ when the aspect
    /// ratios differ.
    pub fn scale_factors_to(&self, target: Resolution) -> Option<(f32, f32)> {
        if self.is_empty() {
            return None;
        }
        Some((
            target.width as f32 / self.width as f32,
            target.height as f32 / self.height as f32,
        ))
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Error returned when parsing a [`Resolution`] from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResolutionError {
    input: String,
}

impl fmt::Display for ParseResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid resolution '{}' (expected `<width>x<height>`)",
            self.input
        )
    }
}

impl std::error::Error for ParseResolutionError {}

/// Parses resolutions in `WIDTHxHEIGHT` notation, eg. `1280x720`.
impl FromStr for Resolution {
    type Err = ParseResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseResolutionError {
            input: s.to_string(),
        };
        let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(err)?;
        let width = w.parse().map_err(|_| err())?;
        let height = h.parse().map_err(|_| err())?;
        Ok(Self::new(width, height))
    }
}

/// Ratio of a width to a height of an image.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct AspectRatio {
    // Invariant: `width` and `height` are nonzero and their GCD is 1.
    width: u32,
    height: u32,
}

impl AspectRatio {
    /// Creates the aspect ratio representing `width:height`.
    ///
    /// If either `width` or `height` is `0`, returns `None`.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }

        let gcd = gcd(width, height);
        Some(Self {
            width: width / gcd,
            height: height / gcd,
        })
    }

    /// Returns the `f32` corresponding to this ratio.
    #[inline]
    pub fn as_f32(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl fmt::Debug for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

const fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b > 0 {
        let t = b;
        b = a % b;
        a = t;
    }

    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_ratio_is_reduced() {
        let ratio1 = AspectRatio::new(1920, 1080).unwrap();
        let ratio2 = AspectRatio::new(1280, 720).unwrap();
        assert_eq!(ratio1, ratio2);
        assert_eq!(ratio1.to_string(), "16:9");
        assert_eq!(AspectRatio::new(0, 7), None);
    }

    #[test]
    fn scale_factors_are_per_axis() {
        let video = Resolution::new(640, 480);
        assert_eq!(
            video.scale_factors_to(Resolution::new(320, 240)),
            Some((0.5, 0.5))
        );
        assert_eq!(
            video.scale_factors_to(Resolution::new(640, 240)),
            Some((1.0, 0.5))
        );
        assert_eq!(Resolution::new(0, 480).scale_factors_to(video), None);
    }

    #[test]
    fn parse() {
        assert_eq!("1280x720".parse(), Ok(Resolution::new(1280, 720)));
        assert_eq!(" 64X48 ".parse(), Ok(Resolution::new(64, 48)));
        assert!("1280".parse::<Resolution>().is_err());
        assert!("ax720".parse::<Resolution>().is_err());
    }
}
