//! Overlay placement and stabilization.
//!
//! [`OverlayEngine::compute_transforms`] is called once per published detection batch. For every
//! face it derives the overlay's center, roll angle and size in detector space (according to the
//! selected category's [`PlacementRule`]), smooths them over time, and maps the result into the
//! mirrored display space of the camera preview.

use nalgebra::{Point2, Vector2};
use serde::Serialize;

use crate::{
    config::SmoothingFactors,
    detection::DetectedFace,
    filter::{AngleEma, Ema, Filter},
    landmark::{FaceIdx, Keypoints},
    placement::{Anchor, OverlayCategory, PlacementRule},
    resolution::Resolution,
    timer::Timer,
};

/// Where and how to draw one overlay, in display-space pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RenderTransform {
    pub center_x: f32,
    pub center_y: f32,
    /// Clockwise rotation around the center, in degrees.
    pub angle_deg: f32,
    pub width: f32,
    pub height: f32,
    pub z_index: i32,
    /// The category this transform was computed for.
    pub category: OverlayCategory,
}

impl RenderTransform {
    /// Returns this transform with all positions and sizes scaled by `(sx, sy)`.
    ///
    /// The angle is kept as-is, which is only exact for uniform scaling.
    pub fn scaled(&self, sx: f32, sy: f32) -> Self {
        Self {
            center_x: self.center_x * sx,
            center_y: self.center_y * sy,
            width: self.width * sx,
            height: self.height * sy,
            ..*self
        }
    }
}

/// The engine's memory of the previous frame.
///
/// Positions are in detector space and the angle is the unmirrored roll angle of the face.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SmoothingState {
    pub last_position: Option<Point2<f32>>,
    pub last_angle_deg: Option<f32>,
    pub last_scale: Option<Vector2<f32>>,
}

/// Maps detector space to the mirrored display space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayMapping {
    container_width: f32,
    sx: f32,
    sy: f32,
}

impl DisplayMapping {
    /// Returns `None` if either resolution is empty.
    pub fn new(video: Resolution, container: Resolution) -> Option<Self> {
        if container.is_empty() {
            return None;
        }
        let (sx, sy) = video.scale_factors_to(container)?;
        Some(Self {
            container_width: container.width() as f32,
            sx,
            sy,
        })
    }

    pub fn map_point(&self, p: Point2<f32>) -> Point2<f32> {
        Point2::new(self.container_width - p.x * self.sx, p.y * self.sy)
    }

    pub fn map_size(&self, size: Vector2<f32>) -> Vector2<f32> {
        Vector2::new(size.x * self.sx, size.y * self.sy)
    }

    /// Mirroring reverses the direction of rotation.
    pub fn map_angle(&self, deg: f32) -> f32 {
        crate::filter::normalize_degrees(-deg)
    }
}

/// The named keypoints of a face that placement depends on.
#[derive(Debug, Clone, Copy)]
struct FaceGeometry {
    left_eye: Point2<f32>,
    right_eye: Point2<f32>,
    nose_tip: Point2<f32>,
    forehead: Point2<f32>,
    chin: Point2<f32>,
}

impl FaceGeometry {
    /// Returns `None` if any named keypoint is missing or not finite.
    fn extract(kps: &Keypoints) -> Option<Self> {
        let pt = |idx| kps.named(idx).map(|kp| kp.xy());
        // Ears aren't used for placement, but a face without them is malformed.
        pt(FaceIdx::LeftEar)?;
        pt(FaceIdx::RightEar)?;
        Some(Self {
            left_eye: pt(FaceIdx::LeftEye)?,
            right_eye: pt(FaceIdx::RightEye)?,
            nose_tip: pt(FaceIdx::NoseTip)?,
            forehead: pt(FaceIdx::Forehead)?,
            chin: pt(FaceIdx::Chin)?,
        })
    }

    fn eye_midpoint(&self) -> Point2<f32> {
        nalgebra::center(&self.left_eye, &self.right_eye)
    }

    fn face_width(&self) -> f32 {
        nalgebra::distance(&self.left_eye, &self.right_eye)
    }

    fn face_height(&self) -> f32 {
        nalgebra::distance(&self.chin, &self.forehead)
    }

    /// In-plane roll of the face in degrees, clockwise.
    fn roll_deg(&self) -> f32 {
        let d = self.right_eye - self.left_eye;
        d.y.atan2(d.x).to_degrees()
    }
}

/// An unsmoothed placement in detector space.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Placement {
    position: Point2<f32>,
    angle_deg: f32,
    size: Vector2<f32>,
}

impl Placement {
    /// Returns `None` if the face lacks a named keypoint or its geometry is not finite.
    fn compute(kps: &Keypoints, rule: &PlacementRule, video: Resolution) -> Option<Self> {
        let geom = FaceGeometry::extract(kps)?;

        if rule.use_full_screen {
            let (w, h) = (video.width() as f32, video.height() as f32);
            return Some(Self {
                position: Point2::new(w / 2.0, h / 2.0),
                angle_deg: 0.0,
                size: Vector2::new(w, h),
            });
        }

        let angle_deg = geom.roll_deg();
        let face_height = geom.face_height();
        let position = match rule.anchor {
            Anchor::Top => {
                // Move along the face's own vertical axis so the overlay follows head tilt.
                let (sin, cos) = angle_deg.to_radians().sin_cos();
                let down = Vector2::new(-sin, cos);
                geom.eye_midpoint() + down * (face_height * rule.vertical_offset)
            }
            Anchor::Eyes => geom.eye_midpoint(),
            Anchor::Center => Point2::new(
                geom.nose_tip.x,
                (geom.forehead.y + geom.chin.y) / 2.0,
            ),
        };

        let placement = Self {
            position,
            angle_deg,
            size: Vector2::new(
                geom.face_width() * rule.width_ratio,
                face_height * rule.height_ratio,
            ),
        };
        // Far out-of-frame keypoints can overflow the geometry even when they are finite.
        placement.is_finite().then_some(placement)
    }

    fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.size.iter().all(|v| v.is_finite())
            && self.angle_deg.is_finite()
    }
}

/// Computes stabilized overlay transforms from detected faces.
///
/// The engine keeps one set of smoothing filters. Faces carry no identity across frames, so only
/// the first usable face of each batch is smoothed; any further faces are placed from their raw
/// keypoints.
pub struct OverlayEngine {
    position: Ema,
    angle: AngleEma,
    scale: Ema,
    state: SmoothingState,
    video_res: Option<Resolution>,
    transforms: Vec<RenderTransform>,
    t_place: Timer,
}

impl Default for OverlayEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlayEngine {
    /// Creates an engine using the default [`SmoothingFactors`].
    pub fn new() -> Self {
        Self::with_factors(SmoothingFactors::default())
    }

    /// # Panics
    ///
    /// Panics if any factor lies outside of `0.0..=1.0` (see [`SmoothingFactors::validate`]).
    pub fn with_factors(factors: SmoothingFactors) -> Self {
        Self {
            position: Ema::new(factors.position),
            angle: AngleEma::new(factors.angle),
            scale: Ema::new(factors.scale),
            state: SmoothingState::default(),
            video_res: None,
            transforms: Vec::new(),
            t_place: Timer::new("place"),
        }
    }

    /// Computes one [`RenderTransform`] per usable face in `faces`.
    ///
    /// `video` is the resolution of the frame the faces were detected in, `container` the size
    /// of the element displaying the (mirrored) preview. Faces with missing or non-finite named
    /// keypoints are skipped. If either resolution is empty, no transforms are produced.
    ///
    /// The returned slice stays available through [`OverlayEngine::last_transforms`] until the
    /// next call.
    pub fn compute_transforms(
        &mut self,
        faces: &[DetectedFace],
        category: OverlayCategory,
        video: Resolution,
        container: Resolution,
    ) -> &[RenderTransform] {
        let _guard = self.t_place.start();
        self.transforms.clear();

        let Some(mapping) = DisplayMapping::new(video, container) else {
            log::trace!("degenerate dimensions (video {video}, container {container})");
            return &self.transforms;
        };

        if self.video_res != Some(video) {
            if let Some(prev) = self.video_res {
                log::debug!("video resolution changed from {prev} to {video}, resetting smoothing");
            }
            self.state = SmoothingState::default();
            self.video_res = Some(video);
        }

        let rule = category.rule();
        let mut smoothed = false;
        for (i, face) in faces.iter().enumerate() {
            let Some(mut placement) = Placement::compute(&face.keypoints, rule, video) else {
                log::trace!("skipping face #{i}: missing or out-of-range named keypoints");
                continue;
            };

            if !rule.use_full_screen && !smoothed {
                let state = &mut self.state;
                placement.position = self
                    .position
                    .filter(&mut state.last_position, placement.position);
                placement.angle_deg = self
                    .angle
                    .filter(&mut state.last_angle_deg, placement.angle_deg);
                placement.size = self.scale.filter(&mut state.last_scale, placement.size);
                smoothed = true;
            }

            let center = mapping.map_point(placement.position);
            let size = mapping.map_size(placement.size);
            self.transforms.push(RenderTransform {
                center_x: center.x,
                center_y: center.y,
                angle_deg: mapping.map_angle(placement.angle_deg),
                width: size.x,
                height: size.y,
                z_index: category.z_index(),
                category,
            });
        }

        log::trace!("{} transform(s) for {category}", self.transforms.len());
        &self.transforms
    }

    /// Returns the batch produced by the most recent [`OverlayEngine::compute_transforms`] call.
    pub fn last_transforms(&self) -> &[RenderTransform] {
        &self.transforms
    }

    /// Forgets all smoothing history. The next face placed will snap to its raw position.
    pub fn reset(&mut self) {
        self.state = SmoothingState::default();
        self.video_res = None;
        self.transforms.clear();
    }

    pub fn smoothing_state(&self) -> &SmoothingState {
        &self.state
    }

    /// Returns the profiling timer for transform computation.
    pub fn timers(&self) -> impl IntoIterator<Item = &Timer> + '_ {
        [&self.t_place]
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::{
        landmark::Keypoint,
        test::{face, frontal_face, scaled_face, tilted_face, translated_face, VIDEO},
    };

    use super::*;

    fn one(engine: &mut OverlayEngine, kps: Keypoints, cat: OverlayCategory) -> RenderTransform {
        let t = engine.compute_transforms(&[face(kps)], cat, VIDEO, VIDEO);
        assert_eq!(t.len(), 1);
        t[0]
    }

    #[test]
    fn cold_start_is_raw() {
        let mut engine = OverlayEngine::new();
        let t = one(&mut engine, frontal_face(), OverlayCategory::Eyes);
        // Eye midpoint (320, 220), mirrored in a display of the same size.
        assert_relative_eq!(t.center_x, 320.0);
        assert_relative_eq!(t.center_y, 220.0);
        assert_relative_eq!(t.angle_deg, 0.0);
        assert_relative_eq!(t.width, 80.0 * 2.2, epsilon = 1e-3);
        assert_relative_eq!(t.height, 170.0 * 0.9, epsilon = 1e-3);
        assert_eq!(t.z_index, 100);
        assert_eq!(t.category, OverlayCategory::Eyes);

        let state = engine.smoothing_state();
        assert_eq!(state.last_position, Some(Point2::new(320.0, 220.0)));
        assert_eq!(state.last_angle_deg, Some(0.0));
    }

    #[test]
    fn smoothing_converges() {
        let mut engine = OverlayEngine::new();
        one(&mut engine, frontal_face(), OverlayCategory::Eyes);

        // Mirrored: a move to the right in the camera image is a move to the left on screen, so
        // the overlay approaches x = 220 from above.
        let target = 220.0;
        let mut xs = Vec::new();
        for _ in 0..4 {
            let t = one(&mut engine, translated_face(100.0, 0.0), OverlayCategory::Eyes);
            xs.push(t.center_x);
        }
        assert_relative_eq!(xs[0], 320.0 - 70.0, epsilon = 1e-3);

        let mut remaining = 100.0f32;
        for x in &xs {
            assert!(*x > target, "overshot to {x}: {xs:?}");
            let dist = x - target;
            assert!(dist < remaining, "not converging: {xs:?}");
            remaining = dist;
        }
        assert!(remaining < 1.0, "{remaining} px of 100 px left after 4 frames");
    }

    #[test]
    fn scale_is_smoothed_on_its_own() {
        let mut engine = OverlayEngine::new();
        let prev = one(&mut engine, frontal_face(), OverlayCategory::Eyes);
        let t = one(&mut engine, scaled_face(2.0), OverlayCategory::Eyes);

        let (raw_w, raw_h) = (160.0 * 2.2, 340.0 * 0.9);
        assert_relative_eq!(t.width, prev.width + (raw_w - prev.width) * 0.6, epsilon = 1e-3);
        assert_relative_eq!(t.height, prev.height + (raw_h - prev.height) * 0.6, epsilon = 1e-3);
        // The eye midpoint and roll are unchanged by the zoom.
        assert_relative_eq!(t.center_x, prev.center_x, epsilon = 1e-3);
        assert_relative_eq!(t.center_y, prev.center_y, epsilon = 1e-3);
        assert_relative_eq!(t.angle_deg, 0.0, epsilon = 1e-3);

        let scale = engine.smoothing_state().last_scale.unwrap();
        assert_relative_eq!(scale.x, t.width, epsilon = 1e-3);
        assert_relative_eq!(scale.y, t.height, epsilon = 1e-3);
    }

    #[test]
    fn angle_is_smoothed_on_its_own() {
        let mut engine = OverlayEngine::new();
        let prev = one(&mut engine, frontal_face(), OverlayCategory::Eyes);
        let t = one(&mut engine, tilted_face(30.0), OverlayCategory::Eyes);

        // 0 + (30 - 0) * 0.8, negated on the mirrored display.
        assert_relative_eq!(engine.smoothing_state().last_angle_deg.unwrap(), 24.0, epsilon = 1e-3);
        assert_relative_eq!(t.angle_deg, -24.0, epsilon = 1e-3);
        // Rotating around the eye midpoint moves neither the anchor nor the eye distance.
        assert_relative_eq!(t.center_x, prev.center_x, epsilon = 1e-3);
        assert_relative_eq!(t.center_y, prev.center_y, epsilon = 1e-3);
        assert_relative_eq!(t.width, prev.width, epsilon = 1e-2);
    }

    #[test]
    fn jitter_is_damped() {
        let mut rng = fastrand::Rng::with_seed(0x5eed);
        let mut engine = OverlayEngine::new();
        let mut raw_travel = 0.0f32;
        let mut smooth_travel = 0.0f32;
        let mut prev_raw = 0.0f32;
        let mut prev_smooth: Option<f32> = None;
        for _ in 0..50 {
            let dx = rng.f32() * 10.0 - 5.0;
            let t = one(&mut engine, translated_face(dx, 0.0), OverlayCategory::Eyes);
            raw_travel += (dx - prev_raw).abs();
            prev_raw = dx;
            if let Some(prev) = prev_smooth {
                smooth_travel += (t.center_x - prev).abs();
            }
            prev_smooth = Some(t.center_x);
        }
        assert!(smooth_travel < raw_travel, "{smooth_travel} >= {raw_travel}");
    }

    #[test]
    fn angle_wraps_short_way() {
        let mut engine = OverlayEngine::new();
        let t = one(&mut engine, tilted_face(179.0), OverlayCategory::Eyes);
        assert_relative_eq!(t.angle_deg, -179.0, epsilon = 1e-2);

        one(&mut engine, tilted_face(-179.0), OverlayCategory::Eyes);
        let smoothed = engine.smoothing_state().last_angle_deg.unwrap();
        // 179 + 2 * 0.8 = 180.6, i.e. -179.4
        assert_relative_eq!(smoothed, -179.4, epsilon = 1e-2);
    }

    #[test]
    fn eyes_anchor_at_eye_midpoint() {
        let mut engine = OverlayEngine::with_factors(SmoothingFactors::NONE);
        for cat in [OverlayCategory::Eyes, OverlayCategory::General] {
            let t = one(&mut engine, translated_face(-100.0, 30.0), cat);
            assert_relative_eq!(t.center_x, 640.0 - 220.0);
            assert_relative_eq!(t.center_y, 250.0);
        }
    }

    #[test]
    fn head_anchor_above_eyes() {
        let mut engine = OverlayEngine::with_factors(SmoothingFactors::NONE);
        let t = one(&mut engine, frontal_face(), OverlayCategory::Head);
        assert_relative_eq!(t.center_x, 320.0);
        assert_relative_eq!(t.center_y, 220.0 - 0.65 * 170.0, epsilon = 1e-3);
        assert_eq!(t.z_index, 90);
    }

    #[test]
    fn head_anchor_follows_tilt() {
        let mut engine = OverlayEngine::with_factors(SmoothingFactors::NONE);
        // Turned 90° clockwise, the top of the head points towards +x in the camera image, so
        // towards -x on the mirrored display.
        let t = one(&mut engine, tilted_face(90.0), OverlayCategory::Head);
        assert_relative_eq!(t.center_x, 320.0 - 0.65 * 170.0, epsilon = 1e-2);
        assert_relative_eq!(t.center_y, 220.0, epsilon = 1e-2);
        assert_relative_eq!(t.angle_deg, -90.0, epsilon = 1e-3);
    }

    #[test]
    fn full_screen_ignores_face() {
        let mut engine = OverlayEngine::new();
        for cat in [OverlayCategory::Frame, OverlayCategory::Border] {
            for kps in [translated_face(-150.0, 40.0), tilted_face(30.0)] {
                let t = one(&mut engine, kps, cat);
                assert_eq!(
                    (t.center_x, t.center_y, t.width, t.height, t.angle_deg),
                    (320.0, 240.0, 640.0, 480.0, 0.0)
                );
                assert_eq!(t.z_index, 80);
            }
        }
        assert_eq!(*engine.smoothing_state(), SmoothingState::default());
    }

    #[test]
    fn center_anchor_between_forehead_and_chin() {
        let rule = PlacementRule {
            use_full_screen: false,
            ..*OverlayCategory::Frame.rule()
        };
        let p = Placement::compute(&translated_face(10.0, 0.0), &rule, VIDEO).unwrap();
        assert_eq!(p.position, Point2::new(330.0, 245.0));
        assert_relative_eq!(p.size.x, 80.0);
        assert_relative_eq!(p.size.y, 170.0);
    }

    #[test]
    fn maps_to_smaller_display() {
        let mut engine = OverlayEngine::new();
        let container = Resolution::new(320, 240);
        let t = engine.compute_transforms(
            &[face(frontal_face())],
            OverlayCategory::Frame,
            VIDEO,
            container,
        );
        assert_eq!((t[0].center_x, t[0].center_y), (160.0, 120.0));
        assert_eq!((t[0].width, t[0].height), (320.0, 240.0));

        let t = engine.compute_transforms(
            &[face(frontal_face())],
            OverlayCategory::Eyes,
            VIDEO,
            Resolution::new(320, 480),
        );
        // Per-axis scaling: only X is halved.
        assert_relative_eq!(t[0].center_x, 320.0 - 160.0);
        assert_relative_eq!(t[0].center_y, 220.0);
        assert_relative_eq!(t[0].width, 88.0, epsilon = 1e-3);
        assert_relative_eq!(t[0].height, 153.0, epsilon = 1e-3);
    }

    #[test]
    fn sparse_faces_are_skipped() {
        let mut engine = OverlayEngine::new();
        let short: Keypoints = (0..100).map(|_| Keypoint::new(1.0, 1.0)).collect();
        let mut nan = frontal_face();
        nan.set(FaceIdx::Chin, Keypoint::new(f32::NAN, 0.0));

        let faces = [face(short), face(nan), face(frontal_face())];
        let t = engine.compute_transforms(&faces, OverlayCategory::Eyes, VIDEO, VIDEO);
        assert_eq!(t.len(), 1);
        assert_relative_eq!(t[0].center_y, 220.0);

        let t = engine.compute_transforms(&faces[..2], OverlayCategory::Eyes, VIDEO, VIDEO);
        assert!(t.is_empty());
    }

    #[test]
    fn overflowing_face_does_not_poison_smoothing() {
        let mut engine = OverlayEngine::new();
        one(&mut engine, frontal_face(), OverlayCategory::Eyes);

        let mut far_chin = frontal_face();
        far_chin.set(FaceIdx::Chin, Keypoint::new(320.0, 1e20));
        let mut tall = frontal_face();
        tall.set(FaceIdx::Forehead, Keypoint::new(320.0, -3e38));
        tall.set(FaceIdx::Chin, Keypoint::new(320.0, 3e38));
        for kps in [far_chin, tall] {
            for cat in [OverlayCategory::Eyes, OverlayCategory::Head] {
                let t = engine.compute_transforms(&[face(kps.clone())], cat, VIDEO, VIDEO);
                assert!(t.is_empty(), "{cat}: {t:?}");
            }
        }

        for _ in 0..5 {
            let t = one(&mut engine, frontal_face(), OverlayCategory::Eyes);
            for v in [t.center_x, t.center_y, t.angle_deg, t.width, t.height] {
                assert!(v.is_finite(), "{t:?}");
            }
            assert_relative_eq!(t.height, 170.0 * 0.9, epsilon = 1e-3);
        }

        let state = engine.smoothing_state();
        assert!(state.last_position.unwrap().coords.iter().all(|v| v.is_finite()));
        assert!(state.last_scale.unwrap().iter().all(|v| v.is_finite()));
        assert!(state.last_angle_deg.unwrap().is_finite());
    }

    #[test]
    fn only_first_face_is_smoothed() {
        let mut engine = OverlayEngine::new();
        let faces = [face(frontal_face()), face(translated_face(-200.0, 0.0))];
        engine.compute_transforms(&faces, OverlayCategory::Eyes, VIDEO, VIDEO);

        let faces = [
            face(translated_face(50.0, 0.0)),
            face(translated_face(-150.0, 0.0)),
        ];
        let t = engine.compute_transforms(&faces, OverlayCategory::Eyes, VIDEO, VIDEO);
        assert_eq!(t.len(), 2);
        assert_relative_eq!(t[0].center_x, 320.0 - 35.0, epsilon = 1e-3);
        assert_relative_eq!(t[1].center_x, 640.0 - 170.0, epsilon = 1e-3);
    }

    #[test]
    fn video_resize_resets_smoothing() {
        let mut engine = OverlayEngine::new();
        one(&mut engine, frontal_face(), OverlayCategory::Eyes);
        one(&mut engine, translated_face(100.0, 0.0), OverlayCategory::Eyes);

        let video = Resolution::new(1280, 720);
        let t = engine.compute_transforms(
            &[face(translated_face(100.0, 0.0))],
            OverlayCategory::Eyes,
            video,
            video,
        );
        assert_relative_eq!(t[0].center_x, 1280.0 - 420.0);
    }

    #[test]
    fn degenerate_dimensions() {
        let mut engine = OverlayEngine::new();
        let faces = [face(frontal_face())];
        let empty = Resolution::new(0, 480);
        assert!(engine
            .compute_transforms(&faces, OverlayCategory::Eyes, empty, VIDEO)
            .is_empty());
        assert!(engine
            .compute_transforms(&faces, OverlayCategory::Eyes, VIDEO, empty)
            .is_empty());
        assert_eq!(*engine.smoothing_state(), SmoothingState::default());
    }

    #[test]
    fn reset_forgets_history() {
        let mut engine = OverlayEngine::new();
        one(&mut engine, frontal_face(), OverlayCategory::Eyes);
        assert_eq!(engine.last_transforms().len(), 1);

        engine.reset();
        assert!(engine.last_transforms().is_empty());
        let t = one(&mut engine, translated_face(100.0, 0.0), OverlayCategory::Eyes);
        assert_relative_eq!(t.center_x, 220.0);
    }
}
