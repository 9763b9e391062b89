//! Live preview window and cancellation plumbing.
//!
//! The preview is an `ffplay` process reading raw RGB frames from its stdin.
//! Pressing `q` or Esc in the ffplay window closes it; the capture loop sees
//! the closed pipe and stops, the same way it stops on Ctrl+C.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use image::RgbImage;

/// Title of the preview window.
pub const WINDOW_TITLE: &str = "Calibration Camera Stream";

/// Errors that can occur while driving the preview player
#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    /// ffplay executable not found
    #[error("ffplay not found. Install FFmpeg (e.g. `sudo apt install ffmpeg`) or run with --headless")]
    PlayerNotFound,
    /// Failed to spawn the player process
    #[error("Failed to spawn ffplay: {0}")]
    SpawnFailed(#[source] std::io::Error),
    /// I/O error talking to the player
    #[error("Preview I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What the loop should do after presenting a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewStatus {
    Open,
    /// The user closed the preview window
    Closed,
}

/// A display surface for annotated frames.
pub trait PreviewSurface {
    fn present(&mut self, frame: &RgbImage) -> Result<PreviewStatus, PreviewError>;

    /// Close the surface. Must be idempotent.
    fn close(&mut self) {}
}

impl<P: PreviewSurface + ?Sized> PreviewSurface for Box<P> {
    fn present(&mut self, frame: &RgbImage) -> Result<PreviewStatus, PreviewError> {
        (**self).present(frame)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Discards frames. Used with `--headless` and in tests.
#[derive(Debug, Default)]
pub struct HeadlessPreview;

impl PreviewSurface for HeadlessPreview {
    fn present(&mut self, _frame: &RgbImage) -> Result<PreviewStatus, PreviewError> {
        Ok(PreviewStatus::Open)
    }
}

/// Command-line arguments for an ffplay reading `width`x`height` rgb24 from stdin.
pub fn ffplay_args(width: u32, height: u32, title: &str) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pixel_format".into(),
        "rgb24".into(),
        "-video_size".into(),
        format!("{}x{}", width, height),
        "-window_title".into(),
        title.into(),
        "-fflags".into(),
        "nobuffer".into(),
        "-".into(),
    ]
}

struct Player {
    child: Child,
    stdin: Option<ChildStdin>,
    width: u32,
    height: u32,
    stderr_thread: Option<JoinHandle<()>>,
}

/// ffplay-backed preview window.
///
/// The player is spawned lazily on the first frame, sized to that frame.
pub struct FfplayPreview {
    title: String,
    player: Option<Player>,
    closed: bool,
}

impl FfplayPreview {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            player: None,
            closed: false,
        }
    }

    /// Check that ffplay can be executed at all.
    pub fn probe() -> Result<(), PreviewError> {
        let status = Command::new("ffplay")
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(spawn_error)?;
        log::debug!("ffplay -version exited with {}", status);
        Ok(())
    }

    fn spawn(&self, width: u32, height: u32) -> Result<Player, PreviewError> {
        let mut child = Command::new("ffplay")
            .args(ffplay_args(width, height, &self.title))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        let stdin = child.stdin.take();
        let stderr_thread = child.stderr.take().map(|stderr| {
            thread::spawn(move || {
                let reader = BufReader::new(stderr);
                for line in reader.lines().map_while(Result::ok) {
                    log::debug!("[ffplay] {}", line);
                }
            })
        });

        log::debug!("Spawned ffplay (pid {}) for {}x{}", child.id(), width, height);
        Ok(Player {
            child,
            stdin,
            width,
            height,
            stderr_thread,
        })
    }
}

fn spawn_error(e: std::io::Error) -> PreviewError {
    if e.kind() == std::io::ErrorKind::NotFound {
        PreviewError::PlayerNotFound
    } else {
        PreviewError::SpawnFailed(e)
    }
}

impl PreviewSurface for FfplayPreview {
    fn present(&mut self, frame: &RgbImage) -> Result<PreviewStatus, PreviewError> {
        if self.closed {
            return Ok(PreviewStatus::Closed);
        }
        if self.player.is_none() {
            self.player = Some(self.spawn(frame.width(), frame.height())?);
        }
        let Some(player) = self.player.as_mut() else {
            return Ok(PreviewStatus::Closed);
        };

        if matches!(player.child.try_wait(), Ok(Some(_))) {
            log::info!("Preview window closed");
            self.closed = true;
            return Ok(PreviewStatus::Closed);
        }

        if frame.dimensions() != (player.width, player.height) {
            log::warn!(
                "Frame size {}x{} differs from preview {}x{}, not displayed",
                frame.width(),
                frame.height(),
                player.width,
                player.height
            );
            return Ok(PreviewStatus::Open);
        }

        let Some(stdin) = player.stdin.as_mut() else {
            return Ok(PreviewStatus::Closed);
        };
        match stdin.write_all(frame.as_raw()).and_then(|()| stdin.flush()) {
            Ok(()) => Ok(PreviewStatus::Open),
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                log::info!("Preview window closed");
                self.closed = true;
                Ok(PreviewStatus::Closed)
            }
            Err(e) => Err(PreviewError::Io(e)),
        }
    }

    fn close(&mut self) {
        self.closed = true;
        if let Some(mut player) = self.player.take() {
            // closing stdin lets ffplay drain, but it keeps the window open
            drop(player.stdin.take());
            if let Err(e) = shutdown(&mut player.child) {
                log::warn!("Failed to stop ffplay: {}", e);
            }
            if let Some(handle) = player.stderr_thread.take() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for FfplayPreview {
    fn drop(&mut self) {
        self.close();
    }
}

/// Ask the player to exit with SIGINT, escalating to a kill after 2 seconds.
fn shutdown(child: &mut Child) -> std::io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }

    #[cfg(unix)]
    {
        unsafe {
            libc::kill(child.id() as i32, libc::SIGINT);
        }
    }

    #[cfg(not(unix))]
    {
        let _ = child.kill();
    }

    let start = Instant::now();
    let timeout = Duration::from_secs(2);
    loop {
        match child.try_wait()? {
            Some(status) => return Ok(status),
            None if start.elapsed() > timeout => {
                let _ = child.kill();
                return child.wait();
            }
            None => thread::sleep(Duration::from_millis(50)),
        }
    }
}

/// Cooperative cancellation flag, polled once per loop iteration.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Route Ctrl+C into `stop`.
///
/// This should be called once at program startup.
pub fn setup_ctrlc_handler(stop: StopSignal) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        log::info!("Received Ctrl+C, shutting down...");
        stop.request_stop();
    })
}
