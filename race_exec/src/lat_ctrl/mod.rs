//! # Lateral control module
//!
//! Lateral control keeps the vehicle pointed at the path. Each tick it measures three heading
//! errors, the angles between the vehicle's heading and the ground vectors to the `next`,
//! `close` and `far` lookahead waypoints. The signed error to `next` is passed through a PID
//! controller whose gains are scheduled on speed. The two unsigned errors, named wide and sharp,
//! are not used for steering but are handed on to the region policy which uses them to anticipate
//! upcoming curvature.
//!
//! The derivative and integral terms are computed over a short history of the signed error with
//! a fixed tick duration, rather than measured time.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod error_estimator;
pub mod gain_schedule;
pub mod history;
pub mod params;
pub mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use error_estimator::*;
pub use gain_schedule::*;
pub use history::*;
pub use params::Params;
pub use state::*;
