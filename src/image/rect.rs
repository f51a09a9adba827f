use std::fmt;

use itertools::{Itertools, MinMaxResult};
use nalgebra::{Point2, Rotation2, Vector2};

/// An axis-aligned rectangle.
///
/// This rectangle type uses (signed) integer coordinates and is meant to be used with the
/// [`crate::image`] module. Rectangles are allowed to have zero height and/or width.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
}

impl Rect {
    /// Creates a rectangle extending downwards and right from a point.
    #[inline]
    pub fn from_top_left(top_left_x: i32, top_left_y: i32, width: u32, height: u32) -> Self {
        Self {
            x: top_left_x,
            y: top_left_y,
            width,
            height,
        }
    }

    #[inline]
    pub fn x(&self) -> i32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> i32 {
        self.y
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Computes the intersection of `self` and `other`.
    ///
    /// Returns `None` when the rectangles don't overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x_min = self.x.max(other.x);
        let y_min = self.y.max(other.y);
        let x_end = (i64::from(self.x) + i64::from(self.width))
            .min(i64::from(other.x) + i64::from(other.width));
        let y_end = (i64::from(self.y) + i64::from(self.height))
            .min(i64::from(other.y) + i64::from(other.height));

        if x_end <= i64::from(x_min) || y_end <= i64::from(y_min) {
            return None;
        }

        Some(Rect {
            x: x_min,
            y: y_min,
            width: (x_end - i64::from(x_min)) as u32,
            height: (y_end - i64::from(y_min)) as u32,
        })
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (x, y, w, h) = (self.x, self.y, self.width, self.height);
        let bx = i64::from(x) + i64::from(w);
        let by = i64::from(y) + i64::from(h);
        write!(f, "Rect @ ({x},{y})-({bx},{by})/{w}x{h}")
    }
}

/// A rectangle with sub-pixel position and size, rotated around its center.
///
/// The rotation is clockwise in image coordinates (where Y points down), matching the angle
/// convention of [`RenderTransform`][crate::overlay::RenderTransform].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    center: Point2<f32>,
    size: Vector2<f32>,
    radians: f32,
}

impl RotatedRect {
    /// Creates a rotated rectangle of `width x height` centered on `(x_center, y_center)`.
    pub fn new(x_center: f32, y_center: f32, width: f32, height: f32, radians: f32) -> Self {
        Self {
            center: Point2::new(x_center, y_center),
            size: Vector2::new(width.max(0.0), height.max(0.0)),
            radians,
        }
    }

    #[inline]
    pub fn center(&self) -> Point2<f32> {
        self.center
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.size.x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.size.y
    }

    /// Transforms a point in the surrounding image into the rectangle's local coordinate system.
    ///
    /// In local coordinates, `(0, 0)` is the rectangle's (rotated) top left corner, and
    /// `(width, height)` its bottom right corner.
    pub fn transform_in(&self, x: f32, y: f32) -> [f32; 2] {
        let rel = Rotation2::new(-self.radians) * (Point2::new(x, y) - self.center);
        [rel.x + self.size.x / 2.0, rel.y + self.size.y / 2.0]
    }

    /// Transforms a point in the rectangle's local coordinate system back into image coordinates.
    pub fn transform_out(&self, x: f32, y: f32) -> [f32; 2] {
        let rel = Vector2::new(x - self.size.x / 2.0, y - self.size.y / 2.0);
        let out = self.center + Rotation2::new(self.radians) * rel;
        [out.x, out.y]
    }

    /// Returns the 4 corners of the rectangle in image coordinates, clockwise from the top left.
    pub fn corners(&self) -> [[f32; 2]; 4] {
        let (w, h) = (self.size.x, self.size.y);
        [
            self.transform_out(0.0, 0.0),
            self.transform_out(w, 0.0),
            self.transform_out(w, h),
            self.transform_out(0.0, h),
        ]
    }

    /// Returns the smallest axis-aligned [`Rect`] containing every pixel touched by `self`.
    pub fn bounding_rect(&self) -> Rect {
        // Absorbs rounding noise from the rotation so exact edges don't grow by a pixel.
        const EPS: f32 = 1e-3;

        let corners = self.corners();
        let (x_min, x_max) = float_minmax(corners.iter().map(|c| c[0]));
        let (y_min, y_max) = float_minmax(corners.iter().map(|c| c[1]));
        let (x0, y0) = ((x_min + EPS).floor() as i32, (y_min + EPS).floor() as i32);
        let (x1, y1) = ((x_max - EPS).ceil() as i32, (y_max - EPS).ceil() as i32);
        Rect::from_top_left(x0, y0, (x1 - x0).max(0) as u32, (y1 - y0).max(0) as u32)
    }
}

fn float_minmax(iter: impl Iterator<Item = f32>) -> (f32, f32) {
    match iter.minmax_by(f32::total_cmp) {
        MinMaxResult::NoElements => (0.0, 0.0),
        MinMaxResult::OneElement(v) => (v, v),
        MinMaxResult::MinMax(min, max) => (min, max),
    }
}

impl From<Rect> for RotatedRect {
    fn from(rect: Rect) -> Self {
        Self::new(
            rect.x() as f32 + rect.width() as f32 / 2.0,
            rect.y() as f32 + rect.height() as f32 / 2.0,
            rect.width() as f32,
            rect.height() as f32,
            0.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_intersection() {
        assert_eq!(
            Rect::from_top_left(0, 0, 11, 11).intersection(&Rect::from_top_left(5, 5, 1, 1)),
            Some(Rect::from_top_left(5, 5, 1, 1))
        );
        assert_eq!(
            Rect::from_top_left(5, 5, 1, 1).intersection(&Rect::from_top_left(0, 0, 11, 11)),
            Some(Rect::from_top_left(5, 5, 1, 1))
        );
        assert_eq!(
            Rect::from_top_left(5, 5, 1, 1).intersection(&Rect::from_top_left(6, 0, 5, 11)),
            None,
        );
    }

    #[test]
    fn rotated_rect_round_trips_points() {
        let rect = RotatedRect::new(10.0, 20.0, 8.0, 4.0, 0.7);
        let [lx, ly] = rect.transform_in(13.0, 18.5);
        let [x, y] = rect.transform_out(lx, ly);
        assert_relative_eq!(x, 13.0, epsilon = 1e-4);
        assert_relative_eq!(y, 18.5, epsilon = 1e-4);
    }

    #[test]
    fn quarter_turn_swaps_extents() {
        let rect = RotatedRect::new(0.0, 0.0, 8.0, 2.0, std::f32::consts::FRAC_PI_2);
        let bounds = rect.bounding_rect();
        assert_eq!(bounds.width(), 2);
        assert_eq!(bounds.height(), 8);

        // Local top left ends up at the top right after a clockwise quarter turn.
        let [x, y] = rect.transform_out(0.0, 0.0);
        assert_relative_eq!(x, 1.0, epsilon = 1e-4);
        assert_relative_eq!(y, -4.0, epsilon = 1e-4);
    }

    #[test]
    fn unrotated_rect_converts_exactly() {
        let rect = RotatedRect::from(Rect::from_top_left(2, 3, 4, 6));
        assert_eq!(rect.center(), Point2::new(4.0, 6.0));
        assert_eq!(rect.bounding_rect(), Rect::from_top_left(2, 3, 4, 6));
    }
}
