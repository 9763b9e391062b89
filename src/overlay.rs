//! Preview overlay: detected corners and the trail of saved positions.
//!
//! Drawing only ever touches the preview copy of a frame. Saved images are
//! written before any of this runs.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut};

use crate::detect::{ChessboardGeometry, PatternDetection};
use crate::selection::Centroid;

const CORNER_RADIUS: i32 = 5;
const TRAIL_MARKER_RADIUS: i32 = 4;
const TRAIL_MARKER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const TRAIL_LINE_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

/// Per-row corner colors, cycled for boards with more rows.
const ROW_COLORS: [Rgb<u8>; 7] = [
    Rgb([255, 0, 0]),
    Rgb([255, 128, 0]),
    Rgb([200, 200, 0]),
    Rgb([0, 255, 0]),
    Rgb([0, 200, 200]),
    Rgb([0, 0, 255]),
    Rgb([255, 0, 255]),
];

fn row_color(row: usize) -> Rgb<u8> {
    ROW_COLORS[row % ROW_COLORS.len()]
}

/// Draw the detected corners and the polyline joining them in scan order.
pub fn draw_pattern(frame: &mut RgbImage, detection: &PatternDetection, geometry: ChessboardGeometry) {
    let per_row = (geometry.columns as usize).max(1);

    for (i, pair) in detection.corners.windows(2).enumerate() {
        let color = row_color((i + 1) / per_row);
        draw_line_segment_mut(frame, (pair[0][0], pair[0][1]), (pair[1][0], pair[1][1]), color);
    }

    for (i, [x, y]) in detection.corners.iter().enumerate() {
        let center = (*x as i32, *y as i32);
        draw_hollow_circle_mut(frame, center, CORNER_RADIUS, row_color(i / per_row));
    }
}

/// Draw a marker at every saved centroid and connect consecutive ones.
pub fn draw_trail(frame: &mut RgbImage, history: &[Centroid]) {
    for pair in history.windows(2) {
        let (x0, y0) = pair[0].to_pixel();
        let (x1, y1) = pair[1].to_pixel();
        // 2px wide
        for offset in [0.0f32, 1.0] {
            draw_line_segment_mut(
                frame,
                (x0 as f32, y0 as f32 + offset),
                (x1 as f32, y1 as f32 + offset),
                TRAIL_LINE_COLOR,
            );
        }
    }

    for centroid in history {
        draw_filled_circle_mut(frame, centroid.to_pixel(), TRAIL_MARKER_RADIUS, TRAIL_MARKER_COLOR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    #[test]
    fn test_trail_marks_saved_centroids() {
        let mut frame = RgbImage::from_pixel(100, 100, BLACK);
        let history = [Centroid::new(20.4, 20.9), Centroid::new(80.0, 20.0)];
        draw_trail(&mut frame, &history);

        assert_eq!(*frame.get_pixel(20, 20), TRAIL_MARKER_COLOR);
        assert_eq!(*frame.get_pixel(80, 20), TRAIL_MARKER_COLOR);
        // midpoint of the connecting segment
        assert_eq!(*frame.get_pixel(50, 20), TRAIL_LINE_COLOR);
        assert_eq!(*frame.get_pixel(50, 80), BLACK);
    }

    #[test]
    fn test_empty_trail_leaves_frame_untouched() {
        let mut frame = RgbImage::from_pixel(10, 10, BLACK);
        draw_trail(&mut frame, &[]);
        assert!(frame.pixels().all(|p| *p == BLACK));
    }

    #[test]
    fn test_pattern_draws_on_corners() {
        let mut frame = RgbImage::from_pixel(100, 100, BLACK);
        let detection = PatternDetection::new(vec![
            [20.0, 20.0],
            [40.0, 20.0],
            [20.0, 40.0],
            [40.0, 40.0],
        ]);
        draw_pattern(&mut frame, &detection, ChessboardGeometry::new(2, 2));

        // first row segment
        assert_eq!(*frame.get_pixel(30, 20), row_color(0));
        // second row segment
        assert_eq!(*frame.get_pixel(30, 40), row_color(1));
        // far corner of the image untouched
        assert_eq!(*frame.get_pixel(90, 90), BLACK);
    }

    #[test]
    fn test_corners_outside_frame_do_not_panic() {
        let mut frame = RgbImage::from_pixel(10, 10, BLACK);
        let detection = PatternDetection::new(vec![[-50.0, -50.0], [500.0, 500.0]]);
        draw_pattern(&mut frame, &detection, ChessboardGeometry::new(2, 1));
    }
}
