//! # Localisation types
//!
//! Poses are expressed in the simulator world frame, where the ground plane is XZ and Y is up.
//! Orientation angles are in degrees.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Orientation of a body as euler angles.
///
/// Units: degrees
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

/// The position and orientation of the vehicle (or of a waypoint) in the world frame.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position in the world frame
    ///
    /// Units: meters
    pub position: Vector3<f64>,

    /// Orientation in the world frame
    pub rotation: Rotation,
}

/// A target point on the path.
///
/// Only the position is used for steering. The pitch of the `next` waypoint feeds the gear
/// calculation, other orientation fields are usually zero.
pub type Waypoint = Pose;

/// The three lookahead waypoints supplied each tick, nearest first.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lookahead {
    /// Nearest waypoint, drives the signed steering error
    pub next: Waypoint,

    /// Medium distance waypoint, drives the wide turn error
    pub close: Waypoint,

    /// Farthest waypoint, drives the sharp turn error
    pub far: Waypoint,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    /// Create a pose with the given position and zero orientation.
    pub fn from_position(x: f64, y: f64, z: f64) -> Self {
        Self {
            position: Vector3::new(x, y, z),
            rotation: Rotation::default(),
        }
    }

    /// Straight line distance between this pose and another.
    pub fn distance(&self, other: &Pose) -> f64 {
        (self.position - other.position).norm()
    }

    /// Unit vector in the ground plane pointing along the pose's heading.
    pub fn forward_ground(&self) -> Vector3<f64> {
        let yaw_rad = self.rotation.yaw.to_radians();
        Vector3::new(-yaw_rad.sin(), 0.0, -yaw_rad.cos())
    }

    /// Vector from this pose to the target, projected onto the ground plane.
    pub fn ground_vector_to(&self, target: &Pose) -> Vector3<f64> {
        Vector3::new(
            target.position[0] - self.position[0],
            0.0,
            target.position[2] - self.position[2],
        )
    }
}
