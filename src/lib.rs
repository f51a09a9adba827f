//! Face-tracked overlay placement for photobooth filters.
//!
//! The crate takes facial keypoints produced by an external landmark detector and turns them into
//! stable, display-ready transforms for overlay images (glasses, hats, frames, borders), and
//! composites those overlays onto captured stills.
//!
//! The moving parts, from the camera towards the screen:
//!
//! - [`detector::DetectorHandle`] runs a coarse and a dense detector on a [`video::VideoFrame`]
//!   and normalizes their output into [`detection::DetectedFace`]s.
//! - [`driver`] runs the detector once per display refresh on a dedicated thread and publishes
//!   each batch of faces.
//! - [`overlay::OverlayEngine`] derives anchor geometry per face, smooths it over time, and maps
//!   it into display space according to the [`placement`] table.
//! - [`capture::composite`] renders the last transform batch onto a full-resolution still.
//!
//! # Coordinates
//!
//! Detector space and display space both have their origin in the top left corner, with X
//! pointing right and Y pointing *down*. Angles are in degrees and grow clockwise on screen.
//! Display space is mirrored horizontally relative to detector space, since the camera preview is
//! shown like a mirror.
//!
//! # Environment Variables
//!
//! * `PHOTOBOOTH_CONFIG`: path to a TOML file loaded by [`config::Config::from_env`]. If unset,
//!   built-in defaults are used.
//! * `RUST_LOG`: overrides the log filter installed by [`init_logger!`].

use log::LevelFilter;

pub mod capture;
pub mod config;
pub mod detection;
pub mod detector;
pub mod driver;
pub mod filter;
pub mod image;
pub mod landmark;
pub mod overlay;
pub mod placement;
pub mod resolution;
pub mod timer;
pub mod video;

mod drop;


/// Type-erased error used at the boundary to external collaborators (detectors, frame sources).
pub type Error = Box<dyn std::error::Error + Sync + Send>;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// If `cfg!(debug_assertions)` is enabled, the calling crate and this library will log at *trace*
/// level. Otherwise, they will log at *debug* level.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
