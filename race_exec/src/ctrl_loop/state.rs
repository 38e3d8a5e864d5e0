//! Implementations for the control loop state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace};
use serde::Serialize;

// Internal
use super::{CtrlLoopInitError, Params};
use crate::lat_ctrl::LatCtrl;
use crate::loc::{Lookahead, Pose, Waypoint};
use crate::region_policy::{RegionPolicy, RegionTable};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Gear selected whenever the policy demands full reverse throttle.
pub const REVERSE_GEAR: i32 = -1;

/// Lowest forward gear.
pub const MIN_FORWARD_GEAR: i32 = 1;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The vehicle control loop.
///
/// Owns the lateral controller, the region policy and its waypoint queues. One call to
/// [`CtrlLoop::tick`] produces one command.
#[derive(Debug, Clone)]
pub struct CtrlLoop {
    params: Params,

    lat_ctrl: LatCtrl,

    region_policy: RegionPolicy,

    num_ticks: u64,

    report: StatusReport,
}

/// Input data to one tick.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct TickInput {
    /// Current vehicle pose
    pub pose: Pose,

    /// Current speed
    ///
    /// Units: km/h
    pub speed_kmh: f64,

    /// Lookahead waypoints for this tick
    pub lookahead: Lookahead,
}

/// The command sent to the vehicle.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct ControlCommand {
    /// Between -1 and +1, negative is reverse
    pub throttle: f64,

    /// Within the lateral controller's steering bounds
    pub steering: f64,

    /// Between 0 and +1
    pub brake: f64,

    /// -1 for reverse, otherwise at least 1
    pub gear: i32,
}

/// Status report for one tick.
///
/// All fields are scalars so the report can be archived as a CSV row.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct StatusReport {
    /// Number of this tick, starting at 1
    pub tick: u64,

    /// Region the command was decided in
    pub region_index: usize,

    /// Brake counter after the tick
    pub brake_counter: u32,

    pub pulse_active: bool,

    pub braking_triggered: bool,

    /// True if the vehicle moved to the next region at the end of the tick
    pub region_advanced: bool,

    pub region_waypoints_left: usize,

    pub braking_waypoints_left: usize,

    pub signed_error: f64,
    pub wide_error: f64,
    pub sharp_error: f64,

    /// Rounded absolute errors the region rules were evaluated against
    pub wide_rule_input: f64,
    pub sharp_rule_input: f64,

    pub k_p: f64,
    pub k_d: f64,
    pub k_i: f64,

    /// Steering demand from the lateral controller, before any region override
    pub lat_steering: f64,

    pub steering_overridden: bool,

    /// True if a lookahead waypoint coincided with the vehicle
    pub degenerate_geometry: bool,

    /// 1-based stage and rule indices of the rule that produced the pedals
    pub rule_stage: Option<usize>,
    pub rule_index: Option<usize>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CtrlLoop {
    /// Create a new control loop starting in region 1.
    ///
    /// The parameters are validated first, the table is expected to be validated already.
    pub fn new(
        params: Params,
        table: RegionTable,
        region_waypoints: Vec<Waypoint>,
        braking_waypoints: Vec<Waypoint>,
    ) -> Result<Self, CtrlLoopInitError> {
        params.validate()?;

        let lat_ctrl = LatCtrl::from_params(&params.lat_ctrl);
        let region_policy = RegionPolicy::new(
            table,
            region_waypoints,
            braking_waypoints,
            params.region_advance_radius_m,
        );

        Ok(Self {
            params,
            lat_ctrl,
            region_policy,
            num_ticks: 0,
            report: StatusReport::default(),
        })
    }

    /// Create a new control loop from parameter files in the parameters directory.
    pub fn init(
        params_file: &str,
        region_table_file: &str,
        region_waypoints: Vec<Waypoint>,
        braking_waypoints: Vec<Waypoint>,
    ) -> Result<Self, CtrlLoopInitError> {
        let params: Params =
            util::params::load(params_file).map_err(CtrlLoopInitError::ParamLoadError)?;
        let table =
            RegionTable::load(region_table_file).map_err(CtrlLoopInitError::RegionTableError)?;

        debug!(
            "CtrlLoop params: {:?}, {} regions",
            params,
            table.len()
        );

        Self::new(params, table, region_waypoints, braking_waypoints)
    }

    /// Run one tick of the control loop.
    pub fn tick(&mut self, input: &TickInput) -> ControlCommand {
        self.num_ticks += 1;
        let region_index = self.region_policy.state().region_index;

        // ---- LATERAL CONTROL ----

        let gains = self.params.lat_ctrl.gains.lookup(input.speed_kmh);
        let lat = self.lat_ctrl.step(
            &input.pose,
            &input.lookahead,
            gains,
            self.params.lat_ctrl.dt_s,
        );

        // ---- LONGITUDINAL CONTROL ----

        let decision = self
            .region_policy
            .evaluate(&input.pose, input.speed_kmh, &lat.errors);

        let (steer_min, steer_max) = self.lat_ctrl.steering_bounds();
        let steering = match decision.steering {
            Some(s) => s.max(steer_min).min(steer_max),
            None => lat.steering,
        };

        let throttle = decision.throttle.clamp(-1.0, 1.0);
        let brake = decision.brake.clamp(0.0, 1.0);

        let gear = gear(
            input.speed_kmh,
            input.lookahead.next.rotation.pitch,
            throttle,
            &self.params,
        );

        // ---- REGION ADVANCE ----

        let region_advanced = self.region_policy.advance(&input.pose);

        // ---- REPORT ----

        let region_state = self.region_policy.state();

        self.report = StatusReport {
            tick: self.num_ticks,
            region_index,
            brake_counter: region_state.brake_counter,
            pulse_active: decision.inputs.pulse_active,
            braking_triggered: decision.braking_triggered,
            region_advanced,
            region_waypoints_left: self.region_policy.region_queue().remaining(),
            braking_waypoints_left: self.region_policy.braking_queue().remaining(),
            signed_error: lat.errors.signed,
            wide_error: lat.errors.wide,
            sharp_error: lat.errors.sharp,
            wide_rule_input: decision.inputs.wide_error,
            sharp_rule_input: decision.inputs.sharp_error,
            k_p: gains.k_p,
            k_d: gains.k_d,
            k_i: gains.k_i,
            lat_steering: lat.steering,
            steering_overridden: decision.steering.is_some(),
            degenerate_geometry: lat.degenerate,
            rule_stage: decision.rule.map(|r| r.stage),
            rule_index: decision.rule.map(|r| r.rule),
        };

        let cmd = ControlCommand {
            throttle,
            steering,
            brake,
            gear,
        };

        trace!("CtrlLoop tick {} in region {}: {:?}", self.num_ticks, region_index, cmd);

        cmd
    }

    /// The status report of the last tick.
    pub fn report(&self) -> &StatusReport {
        &self.report
    }

    /// Number of ticks run so far.
    pub fn num_ticks(&self) -> u64 {
        self.num_ticks
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn lat_ctrl(&self) -> &LatCtrl {
        &self.lat_ctrl
    }

    pub fn region_policy(&self) -> &RegionPolicy {
        &self.region_policy
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Select the gear for the given speed and next waypoint pitch.
///
/// Full reverse throttle always selects reverse. Otherwise the gear is
/// `max(1, trunc((speed - pitch_factor * pitch) / speed_divisor))`.
pub fn gear(speed_kmh: f64, next_pitch_deg: f64, throttle: f64, params: &Params) -> i32 {
    if throttle == -1.0 {
        return REVERSE_GEAR;
    }

    let raw = ((speed_kmh - params.gear_pitch_factor * next_pitch_deg)
        / params.gear_speed_divisor)
        .trunc();

    // Float to int casts saturate, NaN gives 0
    (raw as i32).max(MIN_FORWARD_GEAR)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::region_policy::reference_table;

    fn params() -> Params {
        util::params::load_str(include_str!("../../../params/ctrl_loop.toml")).unwrap()
    }

    /// Two region table for exercising the loop without the shipped calibration.
    fn small_table() -> RegionTable {
        RegionTable::from_toml_str(
            r#"
            [[regions]]
            name = "first"
            [[regions.stages]]
            rules = [
                { when = { all = ["speed > 100"] }, then = { throttle = -1.0, brake = 1.0 } },
                { then = { throttle = 1.0, brake = 0.0 } },
            ]

            [[regions]]
            name = "second"
            steering = 0.25
            [[regions.stages]]
            rules = [ { then = { throttle = 0.5, brake = 0.0 } } ]
            "#,
        )
        .unwrap()
    }

    /// Vehicle at the origin facing -Z with the lookahead laid out along `target`.
    fn input(speed_kmh: f64, target: (f64, f64, f64)) -> TickInput {
        let wp = |s: f64| Waypoint::from_position(target.0 * s, target.1 * s, target.2 * s);
        TickInput {
            pose: Pose::default(),
            speed_kmh,
            lookahead: Lookahead {
                next: wp(1.0),
                close: wp(2.0),
                far: wp(3.0),
            },
        }
    }

    #[test]
    fn test_gear() {
        let p = params();

        assert_eq!(gear(130.0, 5.0, 1.0, &p), 2);
        assert_eq!(gear(130.0, 5.0, -1.0, &p), REVERSE_GEAR);
        assert_eq!(gear(50.0, 0.0, 1.0, &p), 1);
        assert_eq!(gear(0.0, 0.0, 0.0, &p), 1);
        assert_eq!(gear(185.0, 0.0, -0.5, &p), 3);

        // Climbing lowers the gear, descending raises it
        assert_eq!(gear(130.0, 10.0, 1.0, &p), 1);
        assert_eq!(gear(110.0, -10.0, 1.0, &p), 2);

        assert_eq!(gear(f64::NAN, 0.0, 1.0, &p), 1);
    }

    #[test]
    fn test_new_rejects_non_finite_steering_bounds() {
        let mut p = params();
        p.lat_ctrl.steer_min = f64::NAN;

        assert!(matches!(
            CtrlLoop::new(p, small_table(), vec![], vec![]),
            Err(CtrlLoopInitError::NonFiniteSteeringBounds(_, _))
        ));
    }

    #[test]
    fn test_tick_straight_ahead() {
        let mut ctrl = CtrlLoop::new(params(), reference_table(), vec![], vec![]).unwrap();

        let cmd = ctrl.tick(&input(50.0, (0.0, 0.0, -10.0)));

        assert_eq!(cmd.throttle, 1.0);
        assert_eq!(cmd.brake, 0.0);
        assert!(cmd.steering.abs() < 1e-9);
        assert_eq!(cmd.gear, 1);

        let report = ctrl.report();
        assert_eq!(report.tick, 1);
        assert_eq!(report.region_index, 1);
        assert!(!report.region_advanced);
        assert!(!report.steering_overridden);
        assert_eq!(report.rule_stage, Some(1));
        assert_eq!(report.rule_index, Some(1));
    }

    #[test]
    fn test_tick_sharp_turn_at_speed() {
        let mut ctrl = CtrlLoop::new(params(), reference_table(), vec![], vec![]).unwrap();

        // Target 90 degrees to the side, sharp error is pi/2
        let cmd = ctrl.tick(&input(120.0, (10.0, 0.0, 0.0)));

        assert_eq!(cmd.throttle, -0.55);
        assert_eq!(cmd.brake, 1.0);
        assert_eq!(cmd.gear, 2);
        assert!(cmd.steering >= -1.0 && cmd.steering <= 1.0);
        assert!((ctrl.report().sharp_error - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        assert_eq!(ctrl.report().sharp_rule_input, 1.571);
    }

    #[test]
    fn test_reverse_gear_on_full_reverse() {
        let mut ctrl = CtrlLoop::new(params(), small_table(), vec![], vec![]).unwrap();

        let cmd = ctrl.tick(&input(150.0, (0.0, 0.0, -10.0)));
        assert_eq!(cmd.throttle, -1.0);
        assert_eq!(cmd.brake, 1.0);
        assert_eq!(cmd.gear, REVERSE_GEAR);
    }

    #[test]
    fn test_region_advance_and_steering_override() {
        let mut ctrl = CtrlLoop::new(
            params(),
            small_table(),
            vec![Waypoint::from_position(0.0, 0.0, -5.0)],
            vec![],
        )
        .unwrap();

        // Decided in region 1, then the boundary is reached
        let cmd = ctrl.tick(&input(50.0, (0.0, 0.0, -10.0)));
        assert_eq!(cmd.throttle, 1.0);
        assert_eq!(ctrl.report().region_index, 1);
        assert!(ctrl.report().region_advanced);
        assert_eq!(ctrl.report().region_waypoints_left, 0);
        assert_eq!(ctrl.region_policy().state().region_index, 2);

        // Region 2 fixes the steering regardless of the heading error
        let cmd = ctrl.tick(&input(50.0, (10.0, 0.0, 0.0)));
        assert_eq!(cmd.throttle, 0.5);
        assert_eq!(cmd.steering, 0.25);
        assert_eq!(ctrl.report().region_index, 2);
        assert!(ctrl.report().steering_overridden);
        assert!(ctrl.report().lat_steering != 0.25);

        // Last region, nothing more to advance to
        ctrl.tick(&input(50.0, (0.0, 0.0, -10.0)));
        assert!(!ctrl.report().region_advanced);
        assert_eq!(ctrl.region_policy().state().region_index, 2);
    }

    #[test]
    fn test_boundary_out_of_range() {
        let mut ctrl = CtrlLoop::new(
            params(),
            small_table(),
            vec![Waypoint::from_position(0.0, 0.0, -50.0)],
            vec![],
        )
        .unwrap();

        ctrl.tick(&input(50.0, (0.0, 0.0, -10.0)));
        assert!(!ctrl.report().region_advanced);
        assert_eq!(ctrl.region_policy().state().region_index, 1);
    }

    #[test]
    fn test_fixed_steering_region_6() {
        let boundaries = vec![Waypoint::from_position(0.0, 0.0, -5.0); 5];
        let mut ctrl = CtrlLoop::new(params(), reference_table(), boundaries, vec![]).unwrap();

        // One region per tick
        for i in 1..=5 {
            ctrl.tick(&input(50.0, (0.0, 0.0, -10.0)));
            assert_eq!(ctrl.report().region_index, i);
            assert!(ctrl.report().region_advanced);
        }

        let cmd = ctrl.tick(&input(50.0, (10.0, 0.0, 0.0)));
        assert_eq!(ctrl.report().region_index, 6);
        assert_eq!(cmd.steering, 0.03);
        assert_eq!(cmd.throttle, 1.0);
        assert_eq!(cmd.brake, 0.0);
        assert!(ctrl.report().steering_overridden);
        assert_eq!(ctrl.num_ticks(), 6);
    }

    #[test]
    fn test_braking_pulse_through_loop() {
        let boundaries = vec![Waypoint::from_position(0.0, 0.0, -5.0); 3];
        let braking = vec![Waypoint::from_position(0.0, 0.0, -4.0)];
        let mut ctrl = CtrlLoop::new(params(), reference_table(), boundaries, braking).unwrap();

        for _ in 0..3 {
            ctrl.tick(&input(50.0, (0.0, 0.0, -10.0)));
        }
        assert_eq!(ctrl.region_policy().state().region_index, 4);

        // Three ticks of full reverse, then back to the normal rules
        for _ in 0..3 {
            let cmd = ctrl.tick(&input(50.0, (0.0, 0.0, -10.0)));
            assert_eq!(cmd.throttle, -1.0);
            assert_eq!(cmd.brake, 1.0);
            assert_eq!(cmd.gear, REVERSE_GEAR);
            assert!(ctrl.report().pulse_active);
        }
        assert_eq!(ctrl.report().braking_waypoints_left, 0);

        let cmd = ctrl.tick(&input(50.0, (0.0, 0.0, -10.0)));
        assert_eq!(cmd.throttle, 1.0);
        assert!(!ctrl.report().pulse_active);
    }
}
