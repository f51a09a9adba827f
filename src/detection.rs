//! Per-frame face detection results.

use serde::{Deserialize, Serialize};

use crate::landmark::{Keypoint, Keypoints};

/// An axis-aligned box in detector pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BoundingBox {
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Computes the bounding box of all finite keypoints in `keypoints`.
    pub fn enclosing(keypoints: &Keypoints) -> Option<Self> {
        keypoints
            .iter()
            .filter(|kp| kp.is_finite())
            .fold(None, |acc: Option<BoundingBox>, kp| {
                Some(match acc {
                    None => BoundingBox::new(kp.x, kp.y, kp.x, kp.y),
                    Some(b) => BoundingBox::new(
                        b.x_min.min(kp.x),
                        b.y_min.min(kp.y),
                        b.x_max.max(kp.x),
                        b.y_max.max(kp.y),
                    ),
                })
            })
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.y_max - self.y_min
    }

    #[inline]
    pub fn center(&self) -> Keypoint {
        Keypoint::new(
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    /// Returns whether `kp` lies inside (or on the edge of) this box.
    pub fn contains(&self, kp: &Keypoint) -> bool {
        kp.x >= self.x_min && kp.x <= self.x_max && kp.y >= self.y_min && kp.y <= self.y_max
    }

    /// Returns whether the coordinates are finite and the box has a non-negative extent.
    pub fn is_valid(&self) -> bool {
        [self.x_min, self.y_min, self.x_max, self.y_max]
            .iter()
            .all(|v| v.is_finite())
            && self.width() >= 0.0
            && self.height() >= 0.0
    }
}

/// A face found in a single video frame.
///
/// Faces carry no identity across frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    pub keypoints: Keypoints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

impl DetectedFace {
    pub fn new(keypoints: Keypoints) -> Self {
        Self {
            keypoints,
            bounding_box: None,
        }
    }

    pub fn with_bounding_box(self, bounding_box: BoundingBox) -> Self {
        Self {
            bounding_box: Some(bounding_box),
            ..self
        }
    }
}
