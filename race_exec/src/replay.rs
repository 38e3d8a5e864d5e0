//! # Telemetry replay
//!
//! Telemetry files are CSV with a header row, one row per tick, holding the vehicle state and the
//! three lookahead waypoints the vehicle saw on that tick.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use race_lib::{
    ctrl_loop::{ControlCommand, TickInput},
    loc::{Lookahead, Pose, Rotation, Waypoint},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One row of a telemetry file.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
pub struct TelemetryRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,

    /// Units: degrees
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,

    pub speed_kmh: f64,

    pub next_x: f64,
    pub next_y: f64,
    pub next_z: f64,

    /// Pitch of the next waypoint, used for gear selection.
    ///
    /// Units: degrees
    #[serde(default)]
    pub next_pitch: f64,

    pub close_x: f64,
    pub close_y: f64,
    pub close_z: f64,

    pub far_x: f64,
    pub far_y: f64,
    pub far_z: f64,
}

/// A command as archived, tagged with its tick number.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct CommandRecord {
    pub tick: u64,
    pub throttle: f64,
    pub steering: f64,
    pub brake: f64,
    pub gear: i32,
}

/// Summary of a replay, saved into the session directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplaySummary {
    pub telemetry_path: String,
    pub num_ticks: u64,
    pub final_region: usize,
    pub regions_entered: u64,
    pub braking_pulses: u64,
    pub degenerate_ticks: u64,
    pub region_waypoints_left: usize,
    pub braking_waypoints_left: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl From<&TelemetryRecord> for TickInput {
    fn from(r: &TelemetryRecord) -> Self {
        let mut next = Waypoint::from_position(r.next_x, r.next_y, r.next_z);
        next.rotation.pitch = r.next_pitch;

        TickInput {
            pose: Pose {
                position: Vector3::new(r.x, r.y, r.z),
                rotation: Rotation {
                    pitch: r.pitch,
                    yaw: r.yaw,
                    roll: r.roll,
                },
            },
            speed_kmh: r.speed_kmh,
            lookahead: Lookahead {
                next,
                close: Waypoint::from_position(r.close_x, r.close_y, r.close_z),
                far: Waypoint::from_position(r.far_x, r.far_y, r.far_z),
            },
        }
    }
}

impl CommandRecord {
    pub fn new(tick: u64, cmd: &ControlCommand) -> Self {
        Self {
            tick,
            throttle: cmd.throttle,
            steering: cmd.steering,
            brake: cmd.brake,
            gear: cmd.gear,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const TELEMETRY: &str = "\
x,y,z,pitch,yaw,roll,speed_kmh,next_x,next_y,next_z,next_pitch,close_x,close_y,close_z,far_x,far_y,far_z
1.0,2.0,3.0,4.0,90.0,0.5,120.0,10.0,2.0,3.0,5.0,20.0,2.0,3.0,30.0,2.0,3.0
";

    #[test]
    fn test_record_to_input() {
        let mut rdr = csv::Reader::from_reader(TELEMETRY.as_bytes());
        let records: Vec<TelemetryRecord> =
            rdr.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 1);

        let input = TickInput::from(&records[0]);
        assert_eq!(input.pose, Pose {
            position: Vector3::new(1.0, 2.0, 3.0),
            rotation: Rotation { pitch: 4.0, yaw: 90.0, roll: 0.5 },
        });
        assert_eq!(input.speed_kmh, 120.0);
        assert_eq!(input.lookahead.next.rotation.pitch, 5.0);
        assert_eq!(input.lookahead.close, Waypoint::from_position(20.0, 2.0, 3.0));
        assert_eq!(input.lookahead.far, Waypoint::from_position(30.0, 2.0, 3.0));
    }

    #[test]
    fn test_command_record() {
        let cmd = ControlCommand {
            throttle: -1.0,
            steering: 0.25,
            brake: 1.0,
            gear: -1,
        };

        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.serialize(CommandRecord::new(7, &cmd)).unwrap();
        let out = String::from_utf8(wtr.into_inner().unwrap()).unwrap();

        assert_eq!(out, "tick,throttle,steering,brake,gear\n7,-1.0,0.25,1.0,-1\n");
    }
}
