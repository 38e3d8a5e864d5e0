//! # Control loop module
//!
//! Runs one tick of the vehicle controller. Each tick the loop:
//!
//! 1. Steps the lateral controller with the gains scheduled for the current speed
//! 2. Evaluates the region policy for throttle and brake, which may override steering
//! 3. Derives the gear from speed and the pitch of the next waypoint
//! 4. Checks whether the vehicle has reached the next region boundary
//! 5. Emits the control command
//!
//! The loop owns all mutable controller state. Ticks are sequential, the next tick starts only
//! once the previous one has returned.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use params::*;
pub use state::*;

use crate::region_policy::RegionTableLoadError;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur while initialising the control loop.
#[derive(Debug, thiserror::Error)]
pub enum CtrlLoopInitError {
    #[error("Could not load the control loop parameters: {0}")]
    ParamLoadError(util::params::LoadError),

    #[error("Could not load the region table: {0}")]
    RegionTableError(RegionTableLoadError),

    #[error("Steering bounds must be finite, found [{0}, {1}]")]
    NonFiniteSteeringBounds(f64, f64),

    #[error("Tick duration must be finite and positive, found {0} s")]
    InvalidTickDuration(f64),

    #[error("Region advance radius must be finite and non-negative, found {0} m")]
    InvalidAdvanceRadius(f64),
}
