//! Chessboard pattern detection.
//!
//! The capture loop only needs a found/not-found answer and the corner
//! positions. [`PatternDetector`] is that contract; [`ChessboardPatternDetector`]
//! fulfils it with the ChESS corner detector and grid assembler from
//! `calib-targets`.

use std::fmt;

use calib_targets::chessboard;
use calib_targets::detect::{self as targets, ChessConfig};
use calib_targets::GridCoords;
use image::GrayImage;

use crate::selection::Centroid;

/// Number of inner corners of the printed chessboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChessboardGeometry {
    /// Inner corners per row
    pub columns: u32,
    /// Inner corners per column
    pub rows: u32,
}

impl ChessboardGeometry {
    pub fn new(columns: u32, rows: u32) -> Self {
        Self { columns, rows }
    }

    /// Number of corners a complete detection must contain.
    pub fn corner_count(&self) -> usize {
        self.columns as usize * self.rows as usize
    }
}

impl Default for ChessboardGeometry {
    fn default() -> Self {
        Self::new(9, 7)
    }
}

impl fmt::Display for ChessboardGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cols x {} rows", self.columns, self.rows)
    }
}

/// Corner positions of one complete pattern detection, in pixels.
///
/// The order is detector-defined but consistent in count. Detectors that
/// know the grid layout report corners row-major so that consecutive
/// corners are neighbours on the board.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternDetection {
    pub corners: Vec<[f32; 2]>,
}

impl PatternDetection {
    pub fn new(corners: Vec<[f32; 2]>) -> Self {
        Self { corners }
    }

    /// Arithmetic mean of all corner positions.
    ///
    /// Returns `None` for an empty detection.
    pub fn centroid(&self) -> Option<Centroid> {
        if self.corners.is_empty() {
            return None;
        }
        let n = self.corners.len() as f64;
        let (sx, sy) = self
            .corners
            .iter()
            .fold((0.0f64, 0.0f64), |(sx, sy), [x, y]| {
                (sx + f64::from(*x), sy + f64::from(*y))
            });
        Some(Centroid::new(sx / n, sy / n))
    }
}

/// Finds the calibration pattern in a grayscale frame.
///
/// Not finding the pattern is a valid answer (`None`), never an error.
pub trait PatternDetector {
    fn detect(&mut self, gray: &GrayImage) -> Option<PatternDetection>;
}

impl<D: PatternDetector + ?Sized> PatternDetector for Box<D> {
    fn detect(&mut self, gray: &GrayImage) -> Option<PatternDetection> {
        (**self).detect(gray)
    }
}

/// Full-board chessboard detector backed by `calib-targets`.
///
/// Partial grids are reported as "not found", so every detection carries
/// exactly `columns * rows` corners.
pub struct ChessboardPatternDetector {
    geometry: ChessboardGeometry,
    chess_cfg: ChessConfig,
    detector: chessboard::Detector,
}

impl ChessboardPatternDetector {
    pub fn new(geometry: ChessboardGeometry) -> Self {
        Self {
            geometry,
            chess_cfg: targets::default_chess_config(),
            detector: chessboard::Detector::new(chessboard::DetectorParams::default()),
        }
    }
}

impl PatternDetector for ChessboardPatternDetector {
    fn detect(&mut self, gray: &GrayImage) -> Option<PatternDetection> {
        let raw = targets::detect_corners(gray, &self.chess_cfg);
        let mut corners = self.detector.detect(&raw)?.target.corners;

        if corners.len() != self.geometry.corner_count() {
            log::trace!(
                "Partial chessboard: {} of {} corners",
                corners.len(),
                self.geometry.corner_count()
            );
            return None;
        }
        let order = grid_order(corners.iter().map(|c| c.grid.as_ref()), self.geometry)?;

        // row-major: rows run along whichever grid axis spans `columns`
        corners.sort_by_key(|c| {
            c.grid.as_ref().map(|g| match order {
                GridOrder::RowsAlongI => (g.j, g.i),
                GridOrder::RowsAlongJ => (g.i, g.j),
            })
        });

        Some(PatternDetection::new(
            corners
                .iter()
                .map(|c| [c.position.x, c.position.y])
                .collect(),
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GridOrder {
    /// `i` counts columns, `j` counts rows
    RowsAlongI,
    /// `i` counts rows, `j` counts columns
    RowsAlongJ,
}

/// Check that the labelled grid spans exactly `columns x rows` in either
/// orientation, and report which axis the rows run along.
fn grid_order<'a>(
    grid: impl IntoIterator<Item = Option<&'a GridCoords>>,
    geometry: ChessboardGeometry,
) -> Option<GridOrder> {
    let mut coords = grid.into_iter();
    let first = coords.next()??;
    let (mut min_i, mut max_i, mut min_j, mut max_j) = (first.i, first.i, first.j, first.j);
    for g in coords {
        let g = g?;
        min_i = min_i.min(g.i);
        max_i = max_i.max(g.i);
        min_j = min_j.min(g.j);
        max_j = max_j.max(g.j);
    }

    let span_i = i64::from(max_i) - i64::from(min_i) + 1;
    let span_j = i64::from(max_j) - i64::from(min_j) + 1;
    let (cols, rows) = (i64::from(geometry.columns), i64::from(geometry.rows));
    if (span_i, span_j) == (cols, rows) {
        Some(GridOrder::RowsAlongI)
    } else if (span_i, span_j) == (rows, cols) {
        Some(GridOrder::RowsAlongJ)
    } else {
        log::trace!("Chessboard grid spans {} x {}, expected {}", span_i, span_j, geometry);
        None
    }
}
