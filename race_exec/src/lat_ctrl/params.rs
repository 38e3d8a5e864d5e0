//! Lateral control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
use super::GainTable;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for lateral control
#[derive(Deserialize, Debug, Clone)]
pub struct Params {

    /// Fixed tick duration used for the derivative and integral terms.
    ///
    /// Units: seconds
    pub dt_s: f64,

    /// Minimum steering demand
    pub steer_min: f64,

    /// Maximum steering demand
    pub steer_max: f64,

    /// Speed scheduled gains, probed in order
    #[serde(default)]
    pub gains: GainTable
}
