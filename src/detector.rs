//! Adapter between external face detectors and the placement engine.
//!
//! Face finding is split into two stages, as in MediaPipe's face mesh pipeline: a cheap
//! [`CoarseDetector`] locates faces as bounding boxes, and a [`DenseDetector`] computes the full
//! keypoint mesh. The models themselves live outside of this crate; anything implementing the
//! traits (including plain closures) can be plugged in.
//!
//! When the coarse stage sees faces but the dense stage produces nothing (for example because the
//! landmark model is still loading), [`DetectorHandle`] synthesizes an approximate mesh from each
//! bounding box so that overlays stay attached to the face.

use crate::{
    config::FallbackOffsets,
    detection::{BoundingBox, DetectedFace},
    image::Image,
    landmark::{FaceIdx, Keypoint, Keypoints},
    timer::Timer,
    video::VideoFrame,
    Error,
};

/// Locates faces in an image.
pub trait CoarseDetector: Send {
    /// Returns one bounding box per face, in image pixel coordinates.
    fn detect(&mut self, image: &Image) -> Result<Vec<BoundingBox>, Error>;
}

impl<F> CoarseDetector for F
where
    F: FnMut(&Image) -> Result<Vec<BoundingBox>, Error> + Send,
{
    fn detect(&mut self, image: &Image) -> Result<Vec<BoundingBox>, Error> {
        self(image)
    }
}

/// Computes dense facial keypoints.
pub trait DenseDetector: Send {
    /// Returns the keypoints of every face found in `image`, in image pixel coordinates.
    ///
    /// `faces` holds the boxes found by the [`CoarseDetector`] for the same image. Implementations
    /// may use them as regions of interest or ignore them.
    fn landmarks(&mut self, image: &Image, faces: &[BoundingBox]) -> Result<Vec<Keypoints>, Error>;
}

impl<F> DenseDetector for F
where
    F: FnMut(&Image, &[BoundingBox]) -> Result<Vec<Keypoints>, Error> + Send,
{
    fn landmarks(&mut self, image: &Image, faces: &[BoundingBox]) -> Result<Vec<Keypoints>, Error> {
        self(image, faces)
    }
}

/// Owns the detectors and turns their output into [`DetectedFace`]s.
pub struct DetectorHandle {
    coarse: Box<dyn CoarseDetector>,
    dense: Box<dyn DenseDetector>,
    fallback: FallbackOffsets,
    t_coarse: Timer,
    t_dense: Timer,
    boxes: Vec<BoundingBox>,
    faces: Vec<DetectedFace>,
}

impl DetectorHandle {
    pub fn new<C, D>(coarse: C, dense: D) -> Self
    where
        C: CoarseDetector + 'static,
        D: DenseDetector + 'static,
    {
        Self {
            coarse: Box::new(coarse),
            dense: Box::new(dense),
            fallback: FallbackOffsets::default(),
            t_coarse: Timer::new("coarse"),
            t_dense: Timer::new("dense"),
            boxes: Vec::new(),
            faces: Vec::new(),
        }
    }

    /// Sets the offsets used to synthesize keypoints when the dense detector finds nothing.
    pub fn with_fallback(self, fallback: FallbackOffsets) -> Self {
        Self { fallback, ..self }
    }

    /// Runs both detection stages on `frame`.
    ///
    /// Never fails: a frame that isn't ready yields no faces, and detector errors are logged and
    /// treated as if no face had been found.
    pub fn detect(&mut self, frame: &VideoFrame) -> &[DetectedFace] {
        self.faces.clear();
        self.boxes.clear();

        if !frame.is_ready() {
            log::trace!("frame not ready ({:?}), skipping detection", frame.state());
            return &self.faces;
        }
        let image = frame.image();

        match self.t_coarse.time(|| self.coarse.detect(image)) {
            Ok(boxes) => self.boxes.extend(boxes.into_iter().filter(|b| {
                let valid = b.is_valid();
                if !valid {
                    log::trace!("discarding degenerate bounding box {b:?}");
                }
                valid
            })),
            Err(e) => {
                log::warn!("coarse face detection failed: {e}");
                return &self.faces;
            }
        }
        if self.boxes.is_empty() {
            return &self.faces;
        }

        let dense = match self.t_dense.time(|| self.dense.landmarks(image, &self.boxes)) {
            Ok(dense) => dense,
            Err(e) => {
                log::warn!("dense landmark detection failed: {e}");
                return &self.faces;
            }
        };

        if dense.is_empty() {
            log::trace!(
                "no dense landmarks for {} face(s), synthesizing from bounding boxes",
                self.boxes.len()
            );
            let fallback = &self.fallback;
            self.faces.extend(self.boxes.iter().map(|bbox| {
                DetectedFace::new(synthesize(bbox, fallback)).with_bounding_box(*bbox)
            }));
        } else {
            // Coarse boxes can only be attributed to meshes when both stages agree on the face
            // count. Otherwise each mesh gets the box enclosing its own keypoints.
            let by_order = dense.len() == self.boxes.len();
            for (i, keypoints) in dense.into_iter().enumerate() {
                let bounding_box = if by_order {
                    Some(self.boxes[i])
                } else {
                    BoundingBox::enclosing(&keypoints)
                };
                self.faces.push(DetectedFace {
                    keypoints,
                    bounding_box,
                });
            }
        }

        log::trace!("detected {} face(s)", self.faces.len());
        &self.faces
    }

    /// Returns profiling timers for the coarse and dense stages.
    pub fn timers(&self) -> impl IntoIterator<Item = &Timer> + '_ {
        [&self.t_coarse, &self.t_dense]
    }
}

/// Builds an approximate face mesh from a bounding box.
///
/// All keypoints are placed at the box center, except for the named ones in [`FaceIdx`], which
/// are placed at `offsets` (fractions of the box size, relative to its center).
pub fn synthesize(bbox: &BoundingBox, offsets: &FallbackOffsets) -> Keypoints {
    let center = bbox.center();
    let (w, h) = (bbox.width(), bbox.height());
    let at = |[dx, dy]: [f32; 2]| Keypoint::new(center.x + dx * w, center.y + dy * h);

    let mut keypoints = Keypoints::filled(center);
    for idx in FaceIdx::ALL {
        let offset = match idx {
            FaceIdx::LeftEye => offsets.left_eye,
            FaceIdx::RightEye => offsets.right_eye,
            FaceIdx::NoseTip => offsets.nose_tip,
            FaceIdx::Forehead => offsets.forehead,
            FaceIdx::Chin => offsets.chin,
            FaceIdx::LeftEar => offsets.left_ear,
            FaceIdx::RightEar => offsets.right_ear,
        };
        keypoints.set(idx, at(offset));
    }
    keypoints
}
