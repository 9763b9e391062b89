//! Frame conversion utilities.

use nokhwa::pixel_format::RgbFormat;

use super::types::Frame;

/// Convert a nokhwa buffer to our RGB Frame format.
///
/// Handles the common V4L2 formats (MJPEG, YUYV, NV12) through nokhwa's
/// `decode_image`, which converts from the camera's native format to RGB.
///
/// Returns `None` if the conversion fails (unsupported format or corrupt data).
pub fn convert_to_rgb(buffer: &nokhwa::Buffer) -> Option<Frame> {
    let decoded = buffer.decode_image::<RgbFormat>().ok()?;
    let resolution = buffer.resolution();

    let frame = Frame {
        data: decoded.into_raw(),
        width: resolution.width(),
        height: resolution.height(),
    };

    // a short MJPEG payload can decode into fewer pixels than advertised
    if frame.data.len() != (frame.width as usize) * (frame.height as usize) * 3 {
        return None;
    }
    Some(frame)
}

