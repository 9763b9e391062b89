//! Camera types and data structures.

use std::fmt;

use image::RgbImage;

/// Camera resolution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// VGA (640x480), the default for calibration captures
    pub const VGA: Resolution = Resolution {
        width: 640,
        height: 480,
    };
}

impl Default for Resolution {
    fn default() -> Self {
        Self::VGA
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {}", self.width, self.height)
    }
}

/// A captured camera frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw pixel data, RGB, row-major
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl Frame {
    /// Wrap an already decoded RGB image.
    pub fn from_rgb(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width,
            height,
        }
    }

    /// Copy the pixel data into an `RgbImage`.
    ///
    /// Returns `None` if the buffer length does not match the dimensions.
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }
}

/// Settings for camera capture.
#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// Camera device index (N in /dev/videoN)
    pub device_index: u32,
    /// Requested capture resolution
    pub resolution: Resolution,
    /// Target FPS (actual may vary)
    pub fps: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device_index: 0,
            resolution: Resolution::default(),
            fps: 30,
        }
    }
}

/// Errors that can occur during camera operations.
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    /// Failed to open camera
    #[error("Cannot open camera {index}: {message}")]
    OpenFailed { index: u32, message: String },
    /// Camera permission denied
    #[error("Camera permission denied. Check that your user can access /dev/video* (e.g. the 'video' group)")]
    PermissionDenied,
    /// Failed to start video stream
    #[error("Failed to start camera stream: {0}")]
    StreamFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_default_is_vga() {
        let res = Resolution::default();
        assert_eq!(res.width, 640);
        assert_eq!(res.height, 480);
        assert_eq!(res.to_string(), "640 x 480");
    }

    #[test]
    fn test_camera_settings_default() {
        let settings = CameraSettings::default();
        assert_eq!(settings.device_index, 0);
        assert_eq!(settings.resolution, Resolution::VGA);
        assert_eq!(settings.fps, 30);
    }

    #[test]
    fn test_camera_error_display() {
        let err = CameraError::OpenFailed {
            index: 2,
            message: "busy".to_string(),
        };
        assert_eq!(err.to_string(), "Cannot open camera 2: busy");
        assert!(CameraError::PermissionDenied
            .to_string()
            .contains("permission denied"));
    }

    #[test]
    fn test_frame_image_conversions() {
        let rgb = RgbImage::from_pixel(3, 2, image::Rgb([255, 255, 255]));
        let frame = Frame::from_rgb(rgb);
        assert_eq!((frame.width, frame.height), (3, 2));
        assert_eq!(frame.data.len(), 18);

        let back = frame.to_rgb_image().unwrap();
        assert_eq!(back.dimensions(), (3, 2));
        assert_eq!(back.get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn test_frame_with_truncated_buffer() {
        let frame = Frame {
            data: vec![0; 5],
            width: 2,
            height: 1,
        };
        assert!(frame.to_rgb_image().is_none());
    }
}
