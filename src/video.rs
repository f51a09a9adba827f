//! Video frames and the sources they are pulled from.

use std::sync::{Arc, Mutex, PoisonError};

use crate::{image::Image, resolution::Resolution, Error};

/// How much data a video element has buffered for the current playback position.
///
/// Mirrors the readiness levels of an HTML media element. Only [`ReadyState::HaveEnoughData`]
/// guarantees a decodable frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    HaveNothing = 0,
    HaveMetadata = 1,
    HaveCurrentData = 2,
    HaveFutureData = 3,
    HaveEnoughData = 4,
}

/// A single frame of the camera feed, in detector pixel space.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    image: Image,
    state: ReadyState,
}

impl VideoFrame {
    /// Creates a frame that is ready for detection.
    pub fn new(image: Image) -> Self {
        Self::with_state(image, ReadyState::HaveEnoughData)
    }

    pub fn with_state(image: Image, state: ReadyState) -> Self {
        Self { image, state }
    }

    #[inline]
    pub fn image(&self) -> &Image {
        &self.image
    }

    #[inline]
    pub fn state(&self) -> ReadyState {
        self.state
    }

    /// Returns whether the frame holds enough data to run detection on.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state == ReadyState::HaveEnoughData
    }

    /// The intrinsic video dimensions.
    #[inline]
    pub fn resolution(&self) -> Resolution {
        self.image.resolution()
    }
}

/// Pull-based access to the most recent video frame.
pub trait FrameSource: Send {
    /// Returns the current frame, or `None` if no frame is available yet.
    fn current_frame(&mut self) -> Result<Option<VideoFrame>, Error>;
}

impl<F> FrameSource for F
where
    F: FnMut() -> Result<Option<VideoFrame>, Error> + Send,
{
    fn current_frame(&mut self) -> Result<Option<VideoFrame>, Error> {
        self()
    }
}

/// A shared slot holding the latest camera frame.
///
/// The camera side calls [`FrameSlot::publish`] whenever a new frame is decoded; a clone of the
/// slot handed to the detection loop reads it. Readers always see the most recent frame, older
/// frames are discarded.
#[derive(Clone, Default)]
pub struct FrameSlot {
    frame: Arc<Mutex<Option<VideoFrame>>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current frame.
    pub fn publish(&self, frame: VideoFrame) {
        *self.frame.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
    }

    /// Removes the current frame, e.g. when the camera stops.
    pub fn clear(&self) {
        self.frame.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    /// Returns a copy of the current frame, if any.
    pub fn latest(&self) -> Option<VideoFrame> {
        self.frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl FrameSource for FrameSlot {
    fn current_frame(&mut self) -> Result<Option<VideoFrame>, Error> {
        Ok(self.latest())
    }
}
