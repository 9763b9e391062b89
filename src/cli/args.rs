//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::selection::DEFAULT_DISTANCE_THRESHOLD;

/// Capture chessboard images for camera calibration
#[derive(Parser, Debug)]
#[command(name = "calib-capture")]
#[command(version, about = "Capture chessboard images for calibration", long_about = None)]
#[command(after_help = "EXAMPLES:
    # Auto-detect the external camera, 9x7 board
    calib-capture

    # Explicit device and board, settings file on top
    calib-capture --video_id 2 --chessboard_size_column 11 --chessboard_size_row 8 --config capture.yaml

    # No preview window; press q anywhere or Ctrl+C to stop
    calib-capture --headless")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to YAML config file (its values override the flags below)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Camera name prefix for images
    #[arg(long = "camera_name", default_value = "Elp")]
    pub camera_name: String,

    /// Camera resolution width
    #[arg(long, default_value_t = 640, value_parser = clap::value_parser!(u32).range(1..))]
    pub width: u32,

    /// Camera resolution height
    #[arg(long, default_value_t = 480, value_parser = clap::value_parser!(u32).range(1..))]
    pub height: u32,

    /// Directory to save captured images
    #[arg(long = "save_dir", default_value = "test_images")]
    pub save_dir: PathBuf,

    /// Number of inner corners per chessboard row
    #[arg(long = "chessboard_size_column", default_value_t = 9, value_parser = clap::value_parser!(u32).range(1..))]
    pub chessboard_size_column: u32,

    /// Number of inner corners per chessboard column
    #[arg(long = "chessboard_size_row", default_value_t = 7, value_parser = clap::value_parser!(u32).range(1..))]
    pub chessboard_size_row: u32,

    /// Video device ID (e.g., 0 for /dev/video0). If not provided, tries to auto-detect.
    #[arg(long = "video_id")]
    pub video_id: Option<u32>,

    /// Minimum pattern movement in pixels between saved frames
    #[arg(long = "distance_threshold", default_value_t = DEFAULT_DISTANCE_THRESHOLD)]
    pub distance_threshold: f64,

    /// Run without a preview window
    #[arg(long)]
    pub headless: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// List V4L2 video devices and show which one auto-detection picks
    ListDevices,
}
