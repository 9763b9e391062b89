//! Movement-gated frame selection.
//!
//! A frame is worth keeping only if the board has moved far enough since
//! the last kept frame. Distances are measured against the last *saved*
//! centroid, not the previous frame, so slow drifts still add up to a save.

use std::fmt;

/// Default minimum centroid displacement between saves, in pixels.
pub const DEFAULT_DISTANCE_THRESHOLD: f64 = 50.0;

/// Mean position of a detected pattern, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Centroid {
    pub x: f64,
    pub y: f64,
}

impl Centroid {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Centroid) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Integer pixel position, truncated toward zero.
    pub fn to_pixel(&self) -> (i32, i32) {
        (self.x as i32, self.y as i32)
    }
}

impl fmt::Display for Centroid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// Centroid of the most recently saved frame in this run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LastSaved {
    #[default]
    Unset,
    Set(Centroid),
}

/// Outcome of evaluating one detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// Persist the frame. `displacement` is `None` for the first save of a run.
    Save { displacement: Option<f64> },
    /// Too close to the last saved position.
    Skip { displacement: f64 },
}

impl Decision {
    pub fn is_save(&self) -> bool {
        matches!(self, Decision::Save { .. })
    }
}

/// Stateful save/skip policy for one capture run.
#[derive(Debug, Clone)]
pub struct SelectionPolicy {
    threshold: f64,
    last_saved: LastSaved,
    history: Vec<Centroid>,
}

impl SelectionPolicy {
    /// Create a policy with the given displacement threshold in pixels.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            last_saved: LastSaved::Unset,
            history: Vec::new(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn last_saved(&self) -> LastSaved {
        self.last_saved
    }

    /// Centroids of all saved frames, oldest first.
    pub fn history(&self) -> &[Centroid] {
        &self.history
    }

    /// Decide whether a frame with this centroid should be saved.
    ///
    /// The comparison is strict: a displacement equal to the threshold skips.
    pub fn evaluate(&self, centroid: Centroid) -> Decision {
        match self.last_saved {
            LastSaved::Unset => Decision::Save { displacement: None },
            LastSaved::Set(last) => {
                let displacement = centroid.distance(&last);
                if displacement > self.threshold {
                    Decision::Save {
                        displacement: Some(displacement),
                    }
                } else {
                    Decision::Skip { displacement }
                }
            }
        }
    }

    /// Record that a frame with this centroid has been persisted.
    pub fn record(&mut self, centroid: Centroid) {
        self.last_saved = LastSaved::Set(centroid);
        self.history.push(centroid);
    }
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_DISTANCE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Run the policy over a detection sequence, returning saved positions.
    fn saved_positions(policy: &mut SelectionPolicy, centroids: &[Centroid]) -> Vec<usize> {
        let mut saved = Vec::new();
        for (i, c) in centroids.iter().enumerate() {
            if policy.evaluate(*c).is_save() {
                policy.record(*c);
                saved.push(i);
            }
        }
        saved
    }

    #[test]
    fn test_first_detection_always_saved() {
        let policy = SelectionPolicy::new(50.0);
        assert_eq!(
            policy.evaluate(Centroid::new(3.0, 4.0)),
            Decision::Save { displacement: None }
        );
    }

    #[test]
    fn test_first_detection_saved_with_huge_threshold() {
        let policy = SelectionPolicy::new(f64::MAX);
        assert!(policy.evaluate(Centroid::new(0.0, 0.0)).is_save());
    }

    #[test]
    fn test_just_above_threshold_saves() {
        let mut policy = SelectionPolicy::new(50.0);
        policy.record(Centroid::new(100.0, 100.0));
        assert_eq!(
            policy.evaluate(Centroid::new(100.0, 151.0)),
            Decision::Save {
                displacement: Some(51.0)
            }
        );
    }

    #[test]
    fn test_exactly_at_threshold_skips() {
        let mut policy = SelectionPolicy::new(50.0);
        policy.record(Centroid::new(100.0, 100.0));
        assert_eq!(
            policy.evaluate(Centroid::new(100.0, 150.0)),
            Decision::Skip { displacement: 50.0 }
        );
    }

    #[test]
    fn test_static_pattern_saved_once() {
        let mut policy = SelectionPolicy::new(50.0);
        let frozen = vec![Centroid::new(320.0, 240.0); 10];
        assert_eq!(saved_positions(&mut policy, &frozen), vec![0]);
        assert_eq!(policy.history().len(), 1);
    }

    #[test]
    fn test_distance_measured_from_last_saved_not_previous_frame() {
        let mut policy = SelectionPolicy::new(50.0);
        // creeping 30px per frame: each step is below threshold, but the
        // accumulated drift from the last save is not
        let centroids: Vec<Centroid> = (0..6)
            .map(|i| Centroid::new(f64::from(i) * 30.0, 0.0))
            .collect();
        assert_eq!(saved_positions(&mut policy, &centroids), vec![0, 2, 4]);
        assert_eq!(
            policy.history(),
            &[
                Centroid::new(0.0, 0.0),
                Centroid::new(60.0, 0.0),
                Centroid::new(120.0, 0.0)
            ]
        );
    }

    #[test]
    fn test_record_updates_last_saved() {
        let mut policy = SelectionPolicy::default();
        assert_eq!(policy.last_saved(), LastSaved::Unset);
        policy.record(Centroid::new(1.0, 2.0));
        assert_eq!(policy.last_saved(), LastSaved::Set(Centroid::new(1.0, 2.0)));
        assert_eq!(policy.threshold(), DEFAULT_DISTANCE_THRESHOLD);
    }

    #[test]
    fn test_centroid_to_pixel_truncates() {
        assert_eq!(Centroid::new(10.9, 3.2).to_pixel(), (10, 3));
    }
}
