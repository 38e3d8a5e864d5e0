//! Lateral controller state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{trace, warn};
use serde::Serialize;

// Internal
use super::{ErrorEstimator, ErrorHistory, Gains, HeadingErrors, Params};
use crate::loc::{Lookahead, Pose};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// PID steering controller acting on the signed heading error.
#[derive(Debug, Clone)]
pub struct LatCtrl {
    steer_min: f64,
    steer_max: f64,

    estimator: ErrorEstimator,

    history: ErrorHistory
}

/// Output of one lateral control step.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct LatCtrlOutput {
    /// Steering demand, within the steering bounds
    pub steering: f64,

    /// Raw heading errors
    pub errors: HeadingErrors,

    /// Derivative of the signed error
    pub derivative: f64,

    /// Windowed integral of the signed error
    pub integral: f64,

    /// True if a waypoint coincided with the vehicle this step
    pub degenerate: bool
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LatCtrl {
    /// Create a new controller with the given steering bounds.
    ///
    /// Bounds given the wrong way around are swapped. Bounds must be finite, see
    /// `ctrl_loop::Params::validate`.
    pub fn new(steer_min: f64, steer_max: f64) -> Self {
        let (steer_min, steer_max) = if steer_min <= steer_max {
            (steer_min, steer_max)
        } else {
            warn!(
                "Steering bounds [{}, {}] are reversed, swapping them",
                steer_min, steer_max
            );
            (steer_max, steer_min)
        };

        Self {
            steer_min,
            steer_max,
            estimator: ErrorEstimator::new(),
            history: ErrorHistory::new()
        }
    }

    /// Create a new controller from the parameters.
    pub fn from_params(params: &Params) -> Self {
        Self::new(params.steer_min, params.steer_max)
    }

    /// Run one step of the controller.
    ///
    /// Estimates the heading errors, appends the signed error to the history and combines the
    /// proportional, derivative and integral terms into a clamped steering demand.
    pub fn step(
        &mut self,
        pose: &Pose,
        lookahead: &Lookahead,
        gains: Gains,
        dt_s: f64
    ) -> LatCtrlOutput {
        let estimate = self.estimator.estimate(pose, lookahead);
        let errors = estimate.errors;

        self.history.push(errors.signed);

        let derivative = self.history.derivative(dt_s);
        let integral = self.history.integral(dt_s);

        let raw = gains.k_p * errors.signed
            + gains.k_d * derivative
            + gains.k_i * integral;

        // NaN can only come from a degenerate dt, hold the wheel straight rather than pass it on
        let raw = if raw.is_nan() {
            warn!("Steering demand is NaN (dt = {} s), using 0", dt_s);
            0.0
        } else {
            raw
        };

        // max/min rather than clamp, a NaN bound must not abort the tick
        let steering = raw.max(self.steer_min).min(self.steer_max);

        trace!(
            "LatCtrl: err = {:.4}, de = {:.4}, ie = {:.4}, gains = {:?}, steer = {:.4}",
            errors.signed, derivative, integral, gains, steering
        );

        LatCtrlOutput {
            steering,
            errors,
            derivative,
            integral,
            degenerate: estimate.degenerate
        }
    }

    /// The signed error history, oldest first.
    pub fn history(&self) -> &ErrorHistory {
        &self.history
    }

    pub fn steering_bounds(&self) -> (f64, f64) {
        (self.steer_min, self.steer_max)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::loc::Waypoint;

    fn lookahead_at(x: f64, z: f64) -> Lookahead {
        let wp = Waypoint::from_position(x, 0.0, z);
        Lookahead { next: wp, close: wp, far: wp }
    }

    #[test]
    fn test_first_step_is_proportional_only() {
        let mut ctrl = LatCtrl::new(-1.0, 1.0);
        let gains = Gains { k_p: 0.5, k_d: 10.0, k_i: 10.0 };

        let out = ctrl.step(&Pose::default(), &lookahead_at(5.0, -5.0), gains, 0.03);

        assert_eq!(out.derivative, 0.0);
        assert_eq!(out.integral, 0.0);
        assert!((out.steering - 0.5 * std::f64::consts::FRAC_PI_4).abs() < 1e-12);
        assert_eq!(ctrl.history().len(), 1);
    }

    #[test]
    fn test_pid_terms() {
        let mut ctrl = LatCtrl::new(-10.0, 10.0);
        let gains = Gains { k_p: 1.0, k_d: 0.1, k_i: 0.5 };
        let dt = 0.03;

        let first = ctrl.step(&Pose::default(), &lookahead_at(5.0, -5.0), gains, dt);
        let second = ctrl.step(&Pose::default(), &lookahead_at(0.0, -5.0), gains, dt);

        let e0 = first.errors.signed;
        let e1 = second.errors.signed;
        let de = (e1 - e0) / dt;
        let ie = (e0 + e1) * dt;

        assert!((second.derivative - de).abs() < 1e-9);
        assert!((second.integral - ie).abs() < 1e-12);
        assert!((second.steering - (e1 + 0.1 * de + 0.5 * ie)).abs() < 1e-9);
    }

    #[test]
    fn test_steering_always_within_bounds() {
        let mut ctrl = LatCtrl::new(-0.4, 0.6);
        let gains = Gains { k_p: 5.0, k_d: 2.0, k_i: 3.0 };

        let mut pose = Pose::default();
        for i in 0..200 {
            pose.rotation.yaw = (i as f64 * 37.0) % 360.0;
            let x = ((i * 7) % 13) as f64 - 6.0;
            let z = ((i * 5) % 11) as f64 - 5.0;
            let out = ctrl.step(&pose, &lookahead_at(x, z), gains, 0.03);
            assert!(out.steering >= -0.4 && out.steering <= 0.6);
            assert!(ctrl.history().len() <= 10);
        }
    }

    #[test]
    fn test_zero_dt_does_not_escape_bounds() {
        let mut ctrl = LatCtrl::new(-1.0, 1.0);
        let gains = Gains { k_p: 1.0, k_d: 1.0, k_i: 0.0 };

        ctrl.step(&Pose::default(), &lookahead_at(5.0, -5.0), gains, 0.0);
        let out = ctrl.step(&Pose::default(), &lookahead_at(5.0, -5.0), gains, 0.0);
        assert!(out.steering >= -1.0 && out.steering <= 1.0);
    }

    #[test]
    fn test_nan_bound_does_not_abort_step() {
        let mut ctrl = LatCtrl::new(f64::NAN, 1.0);
        let gains = Gains { k_p: 0.5, k_d: 0.0, k_i: 0.0 };

        let out = ctrl.step(&Pose::default(), &lookahead_at(5.0, -5.0), gains, 0.03);
        assert!(!out.steering.is_nan());
    }

    #[test]
    fn test_reversed_bounds_are_swapped() {
        let ctrl = LatCtrl::new(1.0, -1.0);
        assert_eq!(ctrl.steering_bounds(), (-1.0, 1.0));
    }
}
