//! Replays recorded face detections onto a still frame.
//!
//! ```text
//! photobooth --frame frame.jpg --faces faces.json --overlay glasses.png --category eyes -o out.png
//! ```
//!
//! `faces.json` holds a list of detection batches, one per video frame, each a list of faces as
//! produced by the detector adapter. All batches are fed through the placement engine in order,
//! and the transforms computed for the last one are composited onto the mirrored frame.

use std::{fs, path::PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use photobooth::{
    capture::{composite, OverlayImage},
    config::Config,
    detection::DetectedFace,
    image::Image,
    overlay::OverlayEngine,
    placement::OverlayCategory,
    resolution::Resolution,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Camera frame to draw onto (PNG or JPEG)
    #[arg(long)]
    frame: PathBuf,

    /// JSON file with recorded detection batches
    #[arg(long)]
    faces: PathBuf,

    /// Overlay image (PNG or JPEG)
    #[arg(long)]
    overlay: PathBuf,

    /// Overlay category: eyes, head, frame, border or general
    #[arg(long, default_value_t = OverlayCategory::Eyes)]
    category: OverlayCategory,

    /// Size of the preview display as WIDTHxHEIGHT (defaults to the frame size)
    #[arg(long)]
    display: Option<Resolution>,

    /// Configuration file (overrides $PHOTOBOOTH_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the final transforms as JSON
    #[arg(long, default_value_t = false)]
    print_transforms: bool,

    /// Output path (PNG or JPEG)
    #[arg(short, long)]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    photobooth::init_logger!();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path),
        None => Config::from_env(),
    }
    .context("failed to load configuration")?;

    let frame = Image::load(&args.frame)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("failed to load frame '{}'", args.frame.display()))?;
    let overlay = OverlayImage::load(&args.overlay, args.category)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("failed to load overlay '{}'", args.overlay.display()))?;

    let json = fs::read_to_string(&args.faces)
        .with_context(|| format!("failed to read '{}'", args.faces.display()))?;
    let batches: Vec<Vec<DetectedFace>> = serde_json::from_str(&json)
        .with_context(|| format!("failed to parse '{}'", args.faces.display()))?;
    if batches.is_empty() {
        bail!("'{}' contains no detection batches", args.faces.display());
    }

    let video = frame.resolution();
    let display = args.display.unwrap_or(video);
    log::info!(
        "replaying {} batch(es), video {video}, display {display}, category {}",
        batches.len(),
        args.category,
    );

    let mut engine = OverlayEngine::with_factors(config.smoothing);
    for batch in &batches {
        engine.compute_transforms(batch, args.category, video, display);
    }
    let transforms = engine.last_transforms();
    log::debug!("{} transform(s) in final batch", transforms.len());
    if args.print_transforms {
        println!("{}", serde_json::to_string_pretty(transforms)?);
    }

    let still = composite(&frame, transforms, &overlay, display)?;
    still
        .image()
        .save(&args.output)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("failed to write '{}'", args.output.display()))?;

    Ok(())
}
