//! # Heading error estimation
//!
//! The heading errors are the ground plane angles between the vehicle's heading and the vectors
//! from the vehicle to each of the lookahead waypoints. Only the error to the `next` waypoint is
//! signed, using the vertical component of the cross product between the heading and target
//! vectors: a positive component gives a negative error.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::warn;
use nalgebra::Vector3;
use serde::Serialize;

use crate::loc::{Lookahead, Pose, Waypoint};
use util::maths::clamped_acos;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Ground distances below this are treated as the target coinciding with the vehicle.
///
/// Units: meters
pub const MIN_TARGET_DIST_M: f64 = 1e-6;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The three heading errors for one tick.
///
/// Units: radians
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct HeadingErrors {
    /// Signed error to the `next` waypoint, the PID input
    pub signed: f64,

    /// Unsigned error to the `close` waypoint
    pub wide: f64,

    /// Unsigned error to the `far` waypoint
    pub sharp: f64,
}

/// Result of one estimation.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ErrorEstimate {
    pub errors: HeadingErrors,

    /// True if any waypoint coincided with the vehicle and its previous error was reused
    pub degenerate: bool,
}

/// Computes heading errors, remembering the last good value of each so that a waypoint sitting
/// on top of the vehicle reuses the previous tick's error instead of producing NaN.
#[derive(Debug, Clone, Default)]
pub struct ErrorEstimator {
    last: HeadingErrors,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ErrorEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Estimate the heading errors for the given pose and lookahead waypoints.
    pub fn estimate(&mut self, pose: &Pose, lookahead: &Lookahead) -> ErrorEstimate {
        let heading = pose.forward_ground();
        let mut degenerate = false;

        let signed = match angle_to(&heading, pose, &lookahead.next) {
            Some((angle, cross_y)) if cross_y > 0.0 => -angle,
            Some((angle, _)) => angle,
            None => {
                degenerate = true;
                self.last.signed
            }
        };

        let wide = match angle_to(&heading, pose, &lookahead.close) {
            Some((angle, _)) => angle,
            None => {
                degenerate = true;
                self.last.wide
            }
        };

        let sharp = match angle_to(&heading, pose, &lookahead.far) {
            Some((angle, _)) => angle,
            None => {
                degenerate = true;
                self.last.sharp
            }
        };

        if degenerate {
            warn!(
                "Lookahead waypoint coincides with vehicle position {:?}, reusing previous error",
                pose.position
            );
        }

        self.last = HeadingErrors { signed, wide, sharp };

        ErrorEstimate {
            errors: self.last,
            degenerate,
        }
    }

    /// The errors produced by the last estimation.
    pub fn last(&self) -> HeadingErrors {
        self.last
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the angle between the heading and the ground vector to the target, along with the vertical
/// component of `heading x target`.
///
/// Returns `None` if the target is (nearly) at the vehicle's ground position.
fn angle_to(heading: &Vector3<f64>, pose: &Pose, target: &Waypoint) -> Option<(f64, f64)> {
    let to_target = pose.ground_vector_to(target);
    let dist_m = to_target.norm();

    if !dist_m.is_finite() || dist_m < MIN_TARGET_DIST_M {
        return None;
    }

    let target_dir = to_target / dist_m;
    let angle = clamped_acos(heading.dot(&target_dir));
    let cross_y = heading.cross(&target_dir)[1];

    Some((angle, cross_y))
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    fn lookahead(next: (f64, f64), close: (f64, f64), far: (f64, f64)) -> Lookahead {
        Lookahead {
            next: Waypoint::from_position(next.0, 0.0, next.1),
            close: Waypoint::from_position(close.0, 0.0, close.1),
            far: Waypoint::from_position(far.0, 0.0, far.1),
        }
    }

    #[test]
    fn test_straight_ahead() {
        // Yaw 0 faces -Z
        let pose = Pose::default();
        let mut est = ErrorEstimator::new();
        let e = est.estimate(&pose, &lookahead((0.0, -5.0), (0.0, -20.0), (0.0, -50.0)));

        assert!(!e.degenerate);
        assert!(e.errors.signed.abs() < 1e-12);
        assert!(e.errors.wide.abs() < 1e-12);
        assert!(e.errors.sharp.abs() < 1e-12);
    }

    #[test]
    fn test_sign_follows_cross_product() {
        let pose = Pose::default();
        let mut est = ErrorEstimator::new();

        // Towards -X (the direction of positive yaw): cross y is positive so the error is negative
        let e = est.estimate(&pose, &lookahead((-5.0, -5.0), (-5.0, -5.0), (-5.0, -5.0)));
        assert!((e.errors.signed + FRAC_PI_4).abs() < 1e-12);
        assert!((e.errors.wide - FRAC_PI_4).abs() < 1e-12);
        assert!((e.errors.sharp - FRAC_PI_4).abs() < 1e-12);

        // Towards +X
        let e = est.estimate(&pose, &lookahead((5.0, -5.0), (5.0, 0.0), (5.0, -5.0)));
        assert!((e.errors.signed - FRAC_PI_4).abs() < 1e-12);
        assert!((e.errors.wide - FRAC_PI_2).abs() < 1e-12);
        assert!(e.errors.wide >= 0.0 && e.errors.sharp >= 0.0);
    }

    #[test]
    fn test_height_is_ignored() {
        let pose = Pose::from_position(0.0, 10.0, 0.0);
        let mut est = ErrorEstimator::new();
        let la = Lookahead {
            next: Waypoint::from_position(0.0, -40.0, -5.0),
            close: Waypoint::from_position(0.0, 100.0, -10.0),
            far: Waypoint::from_position(0.0, 0.0, -15.0),
        };
        let e = est.estimate(&pose, &la);
        assert!(e.errors.signed.abs() < 1e-12);
        assert!(e.errors.wide.abs() < 1e-12);
    }

    #[test]
    fn test_collinear_never_nan() {
        // Heading at an awkward angle with a target exactly along it, the dot product may round
        // to just over 1
        let mut pose = Pose::from_position(3.7, 0.0, -12.1);
        pose.rotation.yaw = 33.3;
        let fwd = pose.forward_ground();

        let mut est = ErrorEstimator::new();
        for dist in &[0.1, 1.0, 7.3, 1234.5] {
            let target = Waypoint::from_position(
                pose.position[0] + fwd[0] * dist,
                0.0,
                pose.position[2] + fwd[2] * dist,
            );
            let e = est.estimate(
                &pose,
                &Lookahead { next: target, close: target, far: target },
            );
            assert!(!e.errors.signed.is_nan());
            assert!(e.errors.sharp.abs() < 1e-6);
        }
    }

    #[test]
    fn test_degenerate_reuses_previous() {
        let pose = Pose::default();
        let mut est = ErrorEstimator::new();

        // First tick with a coincident waypoint falls back to zero
        let e = est.estimate(&pose, &lookahead((0.0, 0.0), (0.0, -5.0), (0.0, -5.0)));
        assert!(e.degenerate);
        assert_eq!(e.errors.signed, 0.0);

        let e = est.estimate(&pose, &lookahead((5.0, -5.0), (5.0, -5.0), (5.0, -5.0)));
        assert!(!e.degenerate);

        // All waypoints on top of the vehicle now, last values are held
        let e = est.estimate(&pose, &lookahead((0.0, 0.0), (0.0, 0.0), (0.0, 0.0)));
        assert!(e.degenerate);
        assert!((e.errors.signed - FRAC_PI_4).abs() < 1e-12);
        assert!((e.errors.wide - FRAC_PI_4).abs() < 1e-12);
        assert!((e.errors.sharp - FRAC_PI_4).abs() < 1e-12);
    }
}
