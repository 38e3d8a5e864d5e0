//! Control loop parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
use super::CtrlLoopInitError;
use crate::lat_ctrl;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the control loop
#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Lateral controller parameters
    pub lat_ctrl: lat_ctrl::Params,

    /// Distance to the next region boundary waypoint at which the next region is entered.
    ///
    /// Units: meters
    #[serde(default = "default_region_advance_radius_m")]
    pub region_advance_radius_m: f64,

    /// Speed span of one gear.
    ///
    /// Units: km/h
    #[serde(default = "default_gear_speed_divisor")]
    pub gear_speed_divisor: f64,

    /// Multiplier applied to the next waypoint's pitch before it is taken off the speed when
    /// choosing the gear.
    #[serde(default = "default_gear_pitch_factor")]
    pub gear_pitch_factor: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Check the parameters are usable.
    pub fn validate(&self) -> Result<(), CtrlLoopInitError> {
        let lat = &self.lat_ctrl;

        if !lat.steer_min.is_finite() || !lat.steer_max.is_finite() {
            return Err(CtrlLoopInitError::NonFiniteSteeringBounds(
                lat.steer_min,
                lat.steer_max,
            ));
        }

        if !lat.dt_s.is_finite() || lat.dt_s <= 0.0 {
            return Err(CtrlLoopInitError::InvalidTickDuration(lat.dt_s));
        }

        if !self.region_advance_radius_m.is_finite() || self.region_advance_radius_m < 0.0 {
            return Err(CtrlLoopInitError::InvalidAdvanceRadius(
                self.region_advance_radius_m,
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn default_region_advance_radius_m() -> f64 {
    10.0
}

fn default_gear_speed_divisor() -> f64 {
    60.0
}

fn default_gear_pitch_factor() -> f64 {
    2.0
}
