//! Region policy state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, trace, warn};
use serde::Serialize;

// Internal
use super::{Pedals, RegionRules, RegionTable, RuleInputs, WaypointQueue};
use crate::lat_ctrl::HeadingErrors;
use crate::loc::{Pose, Waypoint};
use util::maths::round_dp;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Value the brake counter is set to when a braking pulse is triggered.
pub const BRAKE_COUNTER_START: u32 = 1;

/// The brake counter is reset to zero on reaching this value, giving a pulse of 3 ticks.
pub const BRAKE_COUNTER_END: u32 = 4;

/// Decimal places the rule input errors are rounded to.
const RULE_INPUT_DECIMAL_PLACES: usize = 3;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The persistent state of the region policy.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct RegionState {
    /// Current region, starting at 1. Never decreases.
    pub region_index: usize,

    /// Braking pulse counter, non-zero while a pulse is running.
    pub brake_counter: u32,
}

/// Which rule produced a decision.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct RuleRef {
    /// 1-based stage index
    pub stage: usize,

    /// 1-based rule index within the stage
    pub rule: usize,
}

/// The throttle and brake decision for one tick.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct RegionDecision {
    pub throttle: f64,

    pub brake: f64,

    /// Steering demand replacing the lateral controller's output, if any
    pub steering: Option<f64>,

    /// The inputs the rules were evaluated against
    pub inputs: RuleInputs,

    /// True if a braking waypoint came within range this tick
    pub braking_triggered: bool,

    /// The rule whose response was used, `None` if nothing matched
    pub rule: Option<RuleRef>,
}

/// Region based longitudinal policy.
///
/// Owns the region and braking waypoint queues and the region state. Every mutation happens
/// inside `evaluate` and `advance`, which take `&mut self`, so ticks cannot overlap.
#[derive(Debug, Clone)]
pub struct RegionPolicy {
    table: RegionTable,

    state: RegionState,

    region_queue: WaypointQueue,

    braking_queue: WaypointQueue,

    /// Distance to the region queue head at which the next region is entered.
    ///
    /// Units: meters
    advance_radius_m: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for RegionState {
    fn default() -> Self {
        Self {
            region_index: 1,
            brake_counter: 0,
        }
    }
}

impl RegionDecision {
    fn unmatched(inputs: RuleInputs, steering: Option<f64>, braking_triggered: bool) -> Self {
        Self {
            throttle: Pedals::FULL_THROTTLE.throttle,
            brake: Pedals::FULL_THROTTLE.brake,
            steering,
            inputs,
            braking_triggered,
            rule: None,
        }
    }
}

impl RegionPolicy {
    /// Create a new policy starting in region 1.
    pub fn new(
        table: RegionTable,
        region_waypoints: Vec<Waypoint>,
        braking_waypoints: Vec<Waypoint>,
        advance_radius_m: f64,
    ) -> Self {
        Self {
            table,
            state: RegionState::default(),
            region_queue: WaypointQueue::new(region_waypoints),
            braking_queue: WaypointQueue::new(braking_waypoints),
            advance_radius_m,
        }
    }

    /// Decide throttle and brake for the current region.
    ///
    /// In braking regions this may consume the head of the braking queue and steps the brake
    /// counter.
    pub fn evaluate(&mut self, pose: &Pose, speed_kmh: f64, errors: &HeadingErrors) -> RegionDecision {
        let rules = match self.table.get(self.state.region_index) {
            Some(r) => r,
            None => {
                warn!(
                    "No rules for region {}, holding full throttle",
                    self.state.region_index
                );
                return RegionDecision::unmatched(
                    rule_inputs(speed_kmh, errors, false),
                    None,
                    false,
                );
            }
        };

        let braking_dist_m = if rules.is_braking() {
            self.braking_queue.distance_to_head(pose)
        } else {
            None
        };

        let (state, decision) = decide(rules, self.state, speed_kmh, errors, braking_dist_m);

        if decision.braking_triggered {
            self.braking_queue.pop();
            info!(
                "Braking pulse triggered in region {} ({} braking waypoints left)",
                self.state.region_index,
                self.braking_queue.remaining()
            );
        }

        self.state = state;

        decision
    }

    /// Move to the next region if the head of the region queue is within the advance radius.
    ///
    /// The terminal region is never left, and nothing happens once the queue is exhausted.
    /// Returns true if the region changed.
    pub fn advance(&mut self, pose: &Pose) -> bool {
        if self.state.region_index >= self.table.len() {
            return false;
        }

        match self.region_queue.distance_to_head(pose) {
            Some(d) if d <= self.advance_radius_m => {
                self.region_queue.pop();
                self.state.region_index += 1;

                info!(
                    "Entered region {} ({:?})",
                    self.state.region_index,
                    self.table
                        .get(self.state.region_index)
                        .map(|r| r.name.as_str())
                        .unwrap_or("")
                );

                true
            }
            Some(_) => false,
            None => {
                debug!("Region queue exhausted, staying in region {}", self.state.region_index);
                false
            }
        }
    }

    pub fn state(&self) -> RegionState {
        self.state
    }

    pub fn table(&self) -> &RegionTable {
        &self.table
    }

    /// Read-only view of the region boundary queue.
    pub fn region_queue(&self) -> &WaypointQueue {
        &self.region_queue
    }

    /// Read-only view of the braking queue.
    pub fn braking_queue(&self) -> &WaypointQueue {
        &self.braking_queue
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Evaluate one region's rules.
///
/// This is the pure core of the policy: given the state before the tick and the distance to the
/// braking queue head (if any) it returns the state after the tick and the decision. The caller
/// is responsible for consuming the braking waypoint when `braking_triggered` is set.
///
/// Braking regions first check the trigger, which (re)starts the counter, then step a running
/// pulse. The counter is only stepped in braking regions.
pub fn decide(
    rules: &RegionRules,
    mut state: RegionState,
    speed_kmh: f64,
    errors: &HeadingErrors,
    braking_dist_m: Option<f64>,
) -> (RegionState, RegionDecision) {
    let mut braking_triggered = false;
    let mut pulse_active = false;

    if let Some(trigger_m) = rules.braking_trigger_m {
        if braking_dist_m.map_or(false, |d| d <= trigger_m) {
            state.brake_counter = BRAKE_COUNTER_START;
            braking_triggered = true;
        }

        if state.brake_counter > 0 {
            pulse_active = true;
            state.brake_counter += 1;
            if state.brake_counter >= BRAKE_COUNTER_END {
                state.brake_counter = 0;
            }
        }
    }

    let inputs = rule_inputs(speed_kmh, errors, pulse_active);

    let mut steering = rules.steering;
    let mut chosen: Option<(Pedals, RuleRef)> = None;

    for (i, stage) in rules.stages.iter().enumerate() {
        if let Some(j) = stage.first_match(&inputs) {
            let rule = &stage.rules[j];

            chosen = Some((
                rule.then.pedals(&inputs),
                RuleRef { stage: i + 1, rule: j + 1 },
            ));

            if rule.steering.is_some() {
                steering = rule.steering;
            }
        }
    }

    let decision = match chosen {
        Some((pedals, rule)) => RegionDecision {
            throttle: pedals.throttle,
            brake: pedals.brake,
            steering,
            inputs,
            braking_triggered,
            rule: Some(rule),
        },
        None => {
            trace!(
                "No rule matched in region {} for {:?}, holding full throttle",
                state.region_index, inputs
            );
            RegionDecision::unmatched(inputs, steering, braking_triggered)
        }
    };

    (state, decision)
}

/// Build the rule inputs from the raw errors.
fn rule_inputs(speed_kmh: f64, errors: &HeadingErrors, pulse_active: bool) -> RuleInputs {
    RuleInputs {
        sharp_error: round_dp(errors.sharp, RULE_INPUT_DECIMAL_PLACES).abs(),
        wide_error: round_dp(errors.wide, RULE_INPUT_DECIMAL_PLACES).abs(),
        speed: speed_kmh,
        pulse_active,
    }
}
