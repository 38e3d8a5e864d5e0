//! # Waypoint queue
//!
//! An ordered list of trigger waypoints consumed from the front. Consumption moves a cursor
//! rather than removing items, so the full list and the consumed count stay available for
//! telemetry.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::loc::{Pose, Waypoint};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct WaypointQueue {
    waypoints: Vec<Waypoint>,

    /// Index of the current head
    cursor: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl WaypointQueue {
    pub fn new(waypoints: Vec<Waypoint>) -> Self {
        Self {
            waypoints,
            cursor: 0,
        }
    }

    /// The next waypoint to be consumed, or `None` once exhausted.
    pub fn head(&self) -> Option<&Waypoint> {
        self.waypoints.get(self.cursor)
    }

    /// Consume the head.
    pub fn pop(&mut self) -> Option<Waypoint> {
        let head = self.waypoints.get(self.cursor).copied();
        if head.is_some() {
            self.cursor += 1;
        }
        head
    }

    /// Distance from the pose to the head, or `None` once exhausted.
    pub fn distance_to_head(&self, pose: &Pose) -> Option<f64> {
        self.head().map(|wp| pose.distance(wp))
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.waypoints.len()
    }

    /// Number of waypoints not yet consumed.
    pub fn remaining(&self) -> usize {
        self.waypoints.len().saturating_sub(self.cursor)
    }

    /// Number of waypoints consumed so far.
    pub fn consumed(&self) -> usize {
        self.cursor
    }

    /// The waypoints not yet consumed, head first.
    pub fn pending(&self) -> &[Waypoint] {
        &self.waypoints[self.cursor.min(self.waypoints.len())..]
    }
}
