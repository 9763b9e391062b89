//! Wiring: configuration in, capture session out.

use std::process::ExitCode;

use crate::camera::{CameraCapture, CameraError, CameraSettings, FrameSource};
use crate::cli::{Args, Command};
use crate::config::{CaptureConfig, ConfigError};
use crate::detect::ChessboardPatternDetector;
use crate::devices::{self, DeviceError, DeviceResolver, FixedDevice, V4l2Resolver};
use crate::hotkeys::QuitKeyListener;
use crate::preview::{
    setup_ctrlc_handler, FfplayPreview, HeadlessPreview, PreviewError, PreviewSurface, StopSignal,
    WINDOW_TITLE,
};
use crate::selection::SelectionPolicy;
use crate::session::{CaptureSession, SessionSummary};
use crate::storage::{FrameStore, StorageError};

/// Any failure that ends the program.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Preview(#[from] PreviewError),
}

impl AppError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::FAILURE
    }
}

/// Entry point shared by the binary: dispatch subcommands or capture.
pub fn main_with_args(args: Args) -> ExitCode {
    let result = match &args.command {
        Some(Command::ListDevices) => list_devices(),
        None => capture(&args).map(|_| ()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            e.exit_code()
        }
    }
}

fn list_devices() -> Result<(), AppError> {
    let devices = devices::list_v4l2_devices()?;
    devices::print_devices(&devices);
    Ok(())
}

/// Pick the device resolver for the configured selector.
pub fn device_resolver(config: &CaptureConfig) -> Box<dyn DeviceResolver> {
    match config.video_id {
        Some(id) => Box::new(FixedDevice(id)),
        None => Box::new(V4l2Resolver),
    }
}

/// Run a full capture session with real camera, detector and preview.
pub fn capture(args: &Args) -> Result<SessionSummary, AppError> {
    let config = CaptureConfig::load(args)?;
    config.log_summary();

    // resolve before touching any device or directory
    let device_index = device_resolver(&config).resolve()?;

    if !config.headless {
        FfplayPreview::probe()?;
    }

    let store = FrameStore::create_session(&config.save_dir, &config.camera_name, &chrono::Local::now())?;
    log::info!("Saving images to {}", store.dir().display());

    let camera = CameraCapture::open(CameraSettings {
        device_index,
        resolution: config.resolution,
        ..CameraSettings::default()
    })?;
    log::info!("Opened camera {} at {}", device_index, camera.actual_resolution());

    let stop = StopSignal::new();
    if let Err(e) = setup_ctrlc_handler(stop.clone()) {
        log::warn!("Could not install Ctrl+C handler: {}", e);
    }

    let mut listener = QuitKeyListener::new(stop.clone());
    let preview: Box<dyn PreviewSurface> = if config.headless {
        if let Err(e) = listener.start() {
            log::warn!("{}", e);
        }
        log::info!("Capturing camera feed. Press 'q' or Ctrl+C to quit.");
        Box::new(HeadlessPreview)
    } else {
        log::info!("Capturing camera feed. Press 'q' in the preview window to quit.");
        Box::new(FfplayPreview::new(WINDOW_TITLE))
    };

    let source: Box<dyn FrameSource> = Box::new(camera);
    let session = CaptureSession::new(
        source,
        ChessboardPatternDetector::new(config.chessboard),
        preview,
        store,
        SelectionPolicy::new(config.distance_threshold),
        config.chessboard,
        stop,
    );
    let summary = session.run()?;
    listener.stop();
    Ok(summary)
}
