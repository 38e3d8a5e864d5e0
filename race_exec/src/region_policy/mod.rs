//! # Region policy module
//!
//! The longitudinal half of the controller. The track is split by hand into regions, each with
//! its own throttle and brake behaviour. The vehicle starts in region 1 and moves to the next
//! region each time it comes within range of the next waypoint in the region boundary queue.
//!
//! Some regions are braking regions. These watch a second queue of braking waypoints and when
//! the vehicle comes within the region's trigger distance of its head, the waypoint is consumed
//! and a braking pulse of full reverse throttle and full brake runs for three ticks.
//!
//! The behaviour of each region is calibration data, see [`table`].

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod queue;
pub mod state;
pub mod table;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use queue::WaypointQueue;
pub use state::*;
pub use table::*;

/// The shipped calibration table.
#[cfg(test)]
pub(crate) fn reference_table() -> RegionTable {
    RegionTable::from_toml_str(include_str!("../../../params/region_policy.toml"))
        .expect("shipped region table is invalid")
}
