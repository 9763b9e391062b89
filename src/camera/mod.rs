//! Camera capture module.
//!
//! - Blocking capture via [`CameraCapture`]
//! - Configuration via [`CameraSettings`] and [`Resolution`]
//! - The [`FrameSource`] seam the capture loop reads from

mod capture;
mod frame_utils;
mod types;

pub use capture::CameraCapture;
pub use types::{CameraError, CameraSettings, Frame, Resolution};

/// A blocking stream of frames.
///
/// `None` from `next_frame` means the stream has ended (device unplugged,
/// read failure, end of file). The capture loop treats it as a normal
/// termination, not an error.
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<Frame>;

    /// Release the underlying device. Must be idempotent.
    fn release(&mut self) {}
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Option<Frame> {
        (**self).next_frame()
    }

    fn release(&mut self) {
        (**self).release()
    }
}
