//! Blocking camera capture handle.

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat as NokhwaFrameFormat, RequestedFormat,
    RequestedFormatType,
};
use nokhwa::Camera;

use super::frame_utils::convert_to_rgb;
use super::types::{CameraError, CameraSettings, Frame, Resolution};
use super::FrameSource;

/// Consecutive undecodable frames tolerated before the stream counts as ended.
const MAX_DECODE_FAILURES: u32 = 30;

/// Camera capture handle.
///
/// Wraps a nokhwa `Camera` with an open stream. Frames are read on the
/// caller's thread: `next_frame()` blocks until the driver delivers one.
/// The stream is stopped by `release()` or on drop, whichever comes first.
pub struct CameraCapture {
    camera: Option<Camera>,
    settings: CameraSettings,
    actual_resolution: Resolution,
}

impl std::fmt::Debug for CameraCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraCapture")
            .field("settings", &self.settings)
            .field("actual_resolution", &self.actual_resolution)
            .field("is_open", &self.is_open())
            .finish()
    }
}

impl CameraCapture {
    /// Open the camera and start its stream.
    ///
    /// # Errors
    /// * `CameraError::PermissionDenied` - If the device node is not accessible
    /// * `CameraError::OpenFailed` - If the camera fails to open for other reasons
    /// * `CameraError::StreamFailed` - If the stream cannot be started
    pub fn open(settings: CameraSettings) -> Result<Self, CameraError> {
        let index = CameraIndex::Index(settings.device_index);
        let mut camera = open_camera_with_fallback(&index, &settings)?;

        camera
            .open_stream()
            .map_err(|e| CameraError::StreamFailed(e.to_string()))?;

        let res = camera.resolution();
        let actual_resolution = Resolution {
            width: res.width(),
            height: res.height(),
        };
        if actual_resolution != settings.resolution {
            log::warn!(
                "Camera delivers {} instead of requested {}",
                actual_resolution,
                settings.resolution
            );
        }

        Ok(Self {
            camera: Some(camera),
            settings,
            actual_resolution,
        })
    }

    /// Resolution negotiated with the driver.
    pub fn actual_resolution(&self) -> Resolution {
        self.actual_resolution
    }

    pub fn is_open(&self) -> bool {
        self.camera.is_some()
    }
}

impl FrameSource for CameraCapture {
    fn next_frame(&mut self) -> Option<Frame> {
        let camera = self.camera.as_mut()?;
        let mut failures = 0;

        loop {
            let raw = match camera.frame() {
                Ok(raw) => raw,
                Err(e) => {
                    log::info!("Camera stream ended: {}", e);
                    return None;
                }
            };

            if let Some(frame) = convert_to_rgb(&raw) {
                return Some(frame);
            }

            failures += 1;
            log::warn!("Skipping undecodable frame ({}/{})", failures, MAX_DECODE_FAILURES);
            if failures >= MAX_DECODE_FAILURES {
                log::error!("Too many undecodable frames, treating stream as ended");
                return None;
            }
        }
    }

    fn release(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                log::warn!("Failed to stop camera stream: {}", e);
            }
            log::debug!("Camera {} released", self.settings.device_index);
        }
    }
}

impl Drop for CameraCapture {
    fn drop(&mut self) {
        self.release();
    }
}

/// Try to open a camera with multiple format fallback strategies.
fn open_camera_with_fallback(
    index: &CameraIndex,
    settings: &CameraSettings,
) -> Result<Camera, CameraError> {
    // 1. Closest match with MJPEG (what most USB calibration cameras stream)
    // 2. Closest match with YUYV (uncompressed, lower fps)
    // 3. Whatever the driver offers at the highest resolution
    let requested_resolution =
        nokhwa::utils::Resolution::new(settings.resolution.width, settings.resolution.height);
    let format_attempts: Vec<RequestedFormat> = vec![
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            requested_resolution,
            NokhwaFrameFormat::MJPEG,
            settings.fps,
        ))),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            requested_resolution,
            NokhwaFrameFormat::YUYV,
            settings.fps,
        ))),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution),
    ];

    let mut last_error = String::from("no format attempted");

    for requested in format_attempts {
        match Camera::new(index.clone(), requested) {
            Ok(cam) => return Ok(cam),
            Err(e) => {
                log::debug!("Camera format attempt failed: {}", e);
                last_error = e.to_string();
            }
        }
    }

    let msg = last_error.to_lowercase();
    if msg.contains("permission") || msg.contains("denied") {
        Err(CameraError::PermissionDenied)
    } else {
        Err(CameraError::OpenFailed {
            index: settings.device_index,
            message: last_error,
        })
    }
}
