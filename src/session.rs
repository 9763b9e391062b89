//! The capture-and-select loop.
//!
//! One frame at a time: read, detect, decide, maybe save, draw, present,
//! then poll for cancellation. Nothing here runs concurrently; the
//! selection state and the index counter have a single owner.

use image::RgbImage;

use crate::camera::{Frame, FrameSource};
use crate::detect::{ChessboardGeometry, PatternDetection, PatternDetector};
use crate::overlay;
use crate::preview::{PreviewError, PreviewStatus, PreviewSurface, StopSignal};
use crate::selection::{Decision, SelectionPolicy};
use crate::storage::{FrameStore, SavedImage};

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The frame source ran dry or the camera stopped delivering
    EndOfStream,
    /// Quit key or Ctrl+C
    Cancelled,
    /// The preview window was closed
    PreviewClosed,
}

/// What happened to a single frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Frame buffer could not be interpreted as an image
    Unreadable,
    NoPattern,
    Skipped { displacement: f64 },
    Saved(SavedImage),
    /// Selected, but writing failed; selection state is unchanged
    SaveFailed,
}

/// Counters and records for a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub reason: StopReason,
    pub frames: u64,
    pub detections: u64,
    pub saved: Vec<SavedImage>,
}

/// Owns everything one capture run touches.
pub struct CaptureSession<S, D, P> {
    source: S,
    detector: D,
    preview: P,
    store: FrameStore,
    policy: SelectionPolicy,
    geometry: ChessboardGeometry,
    stop: StopSignal,
    saved: Vec<SavedImage>,
}

impl<S, D, P> CaptureSession<S, D, P>
where
    S: FrameSource,
    D: PatternDetector,
    P: PreviewSurface,
{
    pub fn new(
        source: S,
        detector: D,
        preview: P,
        store: FrameStore,
        policy: SelectionPolicy,
        geometry: ChessboardGeometry,
        stop: StopSignal,
    ) -> Self {
        Self {
            source,
            detector,
            preview,
            store,
            policy,
            geometry,
            stop,
            saved: Vec::new(),
        }
    }

    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }

    pub fn store(&self) -> &FrameStore {
        &self.store
    }

    /// Run until the stream ends, the user quits, or presenting fails.
    ///
    /// The camera and preview are released on every exit path.
    pub fn run(mut self) -> Result<SessionSummary, PreviewError> {
        let result = self.run_loop();
        self.source.release();
        self.preview.close();

        let (reason, frames, detections) = result?;
        log::info!(
            "Capture finished ({:?}): {} frame(s), {} detection(s), {} saved to {}",
            reason,
            frames,
            detections,
            self.saved.len(),
            self.store.dir().display()
        );
        Ok(SessionSummary {
            reason,
            frames,
            detections,
            saved: self.saved,
        })
    }

    fn run_loop(&mut self) -> Result<(StopReason, u64, u64), PreviewError> {
        let mut frames = 0u64;
        let mut detections = 0u64;

        loop {
            let Some(frame) = self.source.next_frame() else {
                return Ok((StopReason::EndOfStream, frames, detections));
            };
            frames += 1;

            let (outcome, display) = self.process_frame(&frame);
            if !matches!(outcome, FrameOutcome::NoPattern | FrameOutcome::Unreadable) {
                detections += 1;
            }

            if let Some(display) = display {
                if self.preview.present(&display)? == PreviewStatus::Closed {
                    return Ok((StopReason::PreviewClosed, frames, detections));
                }
            }

            if self.stop.is_stop_requested() {
                return Ok((StopReason::Cancelled, frames, detections));
            }
        }
    }

    /// Detect, decide and persist one frame. Returns the annotated preview image.
    pub fn process_frame(&mut self, frame: &Frame) -> (FrameOutcome, Option<RgbImage>) {
        let Some(rgb) = frame.to_rgb_image() else {
            log::warn!("Dropping malformed {}x{} frame", frame.width, frame.height);
            return (FrameOutcome::Unreadable, None);
        };
        let gray = image::imageops::grayscale(&rgb);

        let detection = self.detector.detect(&gray);
        let outcome = match &detection {
            Some(detection) => self.select(detection, &rgb),
            None => FrameOutcome::NoPattern,
        };

        let mut display = rgb;
        if let Some(detection) = &detection {
            overlay::draw_pattern(&mut display, detection, self.geometry);
        }
        overlay::draw_trail(&mut display, self.policy.history());

        (outcome, Some(display))
    }

    fn select(&mut self, detection: &PatternDetection, clean: &RgbImage) -> FrameOutcome {
        let Some(centroid) = detection.centroid() else {
            return FrameOutcome::NoPattern;
        };

        match self.policy.evaluate(centroid) {
            Decision::Skip { displacement } => {
                log::trace!("Pattern at {} moved {:.1}px, skipping", centroid, displacement);
                FrameOutcome::Skipped { displacement }
            }
            Decision::Save { displacement } => match self.store.save(clean, centroid) {
                Ok(saved) => {
                    match displacement {
                        Some(d) => log::info!(
                            "Saved image at {:.1}px movement -> {}",
                            d,
                            saved.path.display()
                        ),
                        None => log::info!("Saved first image -> {}", saved.path.display()),
                    }
                    self.policy.record(centroid);
                    self.saved.push(saved.clone());
                    FrameOutcome::Saved(saved)
                }
                Err(e) => {
                    log::error!("{}", e);
                    FrameOutcome::SaveFailed
                }
            },
        }
    }
}
