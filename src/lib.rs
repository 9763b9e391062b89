//! calib-capture library crate.
//!
//! Streams a camera, finds a chessboard in each frame, and keeps the frames
//! where the board has moved far enough since the last kept one.

pub mod app;
pub mod camera;
pub mod cli;
pub mod config;
pub mod detect;
pub mod devices;
pub mod hotkeys;
pub mod overlay;
pub mod preview;
pub mod selection;
pub mod session;
pub mod storage;
