//! # Waypoint list loading
//!
//! Waypoint lists (region boundaries, braking points) are plain text files with one waypoint per
//! line written as `x,y,z`. Any further columns are ignored and orientation is left at zero.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use csv::{ReaderBuilder, Trim};
use log::debug;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

use crate::loc::Waypoint;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur while loading a waypoint list.
#[derive(Debug, Error)]
pub enum WaypointLoadError {
    #[error("Cannot open the waypoint file: {0}")]
    FileOpenError(std::io::Error),

    #[error("Cannot read the waypoint list: {0}")]
    ReadError(csv::Error),

    #[error("Waypoint on line {0} has {1} columns, expected at least 3")]
    TooFewColumns(u64, usize),

    #[error("Waypoint on line {0} has an invalid coordinate {1:?}")]
    InvalidCoordinate(u64, String),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a waypoint list from a file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Vec<Waypoint>, WaypointLoadError> {
    let file = File::open(path.as_ref()).map_err(WaypointLoadError::FileOpenError)?;
    let waypoints = parse(file)?;

    debug!("Loaded {} waypoints from {:?}", waypoints.len(), path.as_ref());

    Ok(waypoints)
}

/// Parse a waypoint list from a reader.
pub fn parse<R: Read>(reader: R) -> Result<Vec<Waypoint>, WaypointLoadError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut waypoints = Vec::new();

    for result in rdr.records() {
        let record = result.map_err(WaypointLoadError::ReadError)?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        if record.len() < 3 {
            return Err(WaypointLoadError::TooFewColumns(line, record.len()));
        }

        let mut coords = [0f64; 3];
        for (i, c) in coords.iter_mut().enumerate() {
            *c = record[i]
                .parse()
                .map_err(|_| WaypointLoadError::InvalidCoordinate(line, record[i].to_string()))?;
        }

        waypoints.push(Waypoint::from_position(coords[0], coords[1], coords[2]));
    }

    Ok(waypoints)
}
