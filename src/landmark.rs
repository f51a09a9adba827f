//! Facial keypoints in the dense face mesh layout.
//!
//! Detectors report faces as a list of [`Keypoint`]s indexed like MediaPipe's [Face Mesh]: 468
//! entries, of which a handful carry a meaning that the placement code relies on (see
//! [`FaceIdx`]).
//!
//! [Face Mesh]: https://google.github.io/mediapipe/solutions/face_mesh.html

use std::ops::Index;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Number of keypoints in a complete face mesh.
pub const NUM_KEYPOINTS: usize = 468;

/// A landmark position in detector pixel space.
///
/// `z` is carried along for completeness but ignored by 2D placement.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Keypoint {
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Returns the 2D position of this keypoint.
    #[inline]
    pub fn xy(&self) -> Point2<f32> {
        Point2::new(self.x, self.y)
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Assigns a name to the keypoint indices used for overlay placement.
///
/// "Left" and "Right" are relative to the input image, not from the PoV of the depicted person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceIdx {
    NoseTip = 1,
    Forehead = 10,
    LeftEye = 33,
    Chin = 152,
    LeftEar = 234,
    RightEye = 263,
    RightEar = 454,
}

impl FaceIdx {
    pub const ALL: [FaceIdx; 7] = [
        FaceIdx::NoseTip,
        FaceIdx::Forehead,
        FaceIdx::LeftEye,
        FaceIdx::Chin,
        FaceIdx::LeftEar,
        FaceIdx::RightEye,
        FaceIdx::RightEar,
    ];

    /// Minimum number of keypoints a face needs for every named index to be present.
    pub const MIN_KEYPOINTS: usize = FaceIdx::RightEar as usize + 1;
}

impl From<FaceIdx> for usize {
    #[inline]
    fn from(idx: FaceIdx) -> usize {
        idx as usize
    }
}

/// An ordered list of keypoints describing one face.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Keypoints {
    points: Vec<Keypoint>,
}

impl Keypoints {
    /// Creates a full face mesh with every keypoint set to `fill`.
    pub fn filled(fill: Keypoint) -> Self {
        Self {
            points: vec![fill; NUM_KEYPOINTS],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Keypoint> + '_ {
        self.points.iter()
    }

    /// Returns the keypoint at `index`, if present.
    #[inline]
    pub fn get(&self, index: impl Into<usize>) -> Option<&Keypoint> {
        self.points.get(index.into())
    }

    /// Returns a named keypoint if it is present and has finite coordinates.
    pub fn named(&self, idx: FaceIdx) -> Option<Keypoint> {
        self.get(idx).copied().filter(Keypoint::is_finite)
    }

    /// Overwrites the keypoint at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn set(&mut self, index: impl Into<usize>, keypoint: Keypoint) {
        let index = index.into();
        self.points[index] = keypoint;
    }

    /// Applies `f` to every keypoint.
    pub fn map_positions(&mut self, mut f: impl FnMut(Keypoint) -> Keypoint) {
        for kp in &mut self.points {
            *kp = f(*kp);
        }
    }
}

impl From<Vec<Keypoint>> for Keypoints {
    fn from(points: Vec<Keypoint>) -> Self {
        Self { points }
    }
}

impl FromIterator<Keypoint> for Keypoints {
    fn from_iter<T: IntoIterator<Item = Keypoint>>(iter: T) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl Index<FaceIdx> for Keypoints {
    type Output = Keypoint;

    fn index(&self, index: FaceIdx) -> &Self::Output {
        &self.points[index as usize]
    }
}

impl Index<usize> for Keypoints {
    type Output = Keypoint;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}
