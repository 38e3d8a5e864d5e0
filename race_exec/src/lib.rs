//! # Race control library.
//!
//! This library provides the real-time control core of the racing vehicle: the gain-scheduled
//! lateral (steering) controller, the region based longitudinal (throttle/brake) policy and the
//! control loop that ties them together into one command per tick.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Control loop - runs one tick of lateral and longitudinal control
pub mod ctrl_loop;

/// Lateral control module - converts heading error into a steering demand
pub mod lat_ctrl;

/// Localisation types - vehicle pose and path waypoints
pub mod loc;

/// Region policy - per track region throttle and brake decisions
pub mod region_policy;

/// Waypoint list loading
pub mod waypoints;
