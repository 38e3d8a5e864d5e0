//! Race controller replay executable.
//!
//! # Architecture
//!
//! The executable drives the control loop from recorded telemetry:
//!
//!     - Initialise the session and logging
//!     - Load parameters, the region table and the waypoint lists
//!     - Main loop, one tick per telemetry record:
//!         - Control loop processing
//!         - Archiving of the command and status report
//!     - Save a summary of the run into the session directory

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use race_lib::{
    ctrl_loop::{self, CtrlLoop, TickInput},
    lat_ctrl::GainTable,
    region_policy::RegionTable,
    waypoints,
};

mod replay;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use replay::{CommandRecord, ReplaySummary, TelemetryRecord};
use util::{
    archive::Archiver,
    logger::{logger_init, LevelFilter},
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Replay recorded telemetry through the race controller.
#[derive(Debug, StructOpt)]
#[structopt(name = "race_exec")]
struct Opt {
    /// Telemetry CSV file, one row per tick
    #[structopt(parse(from_os_str))]
    telemetry: PathBuf,

    /// Region boundary waypoint list
    #[structopt(parse(from_os_str))]
    region_waypoints: PathBuf,

    /// Braking waypoint list
    #[structopt(parse(from_os_str))]
    braking_waypoints: PathBuf,

    /// JSON gain file replacing the gains in the control loop parameters
    #[structopt(long, parse(from_os_str))]
    gains: Option<PathBuf>,

    /// Pace ticks at the control period instead of running flat out
    #[structopt(long)]
    realtime: bool,

    /// Minimum log level, at least as verbose as `info`
    #[structopt(long, default_value = "debug")]
    log_level: LevelFilter,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("race_exec", "sessions")
        .wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(opt.log_level, &session).wrap_err("Failed to initialise logging")?;

    info!("Race Controller Replay Executable\n");
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI arguments: {:?}", opt);

    // ---- LOAD PARAMETERS ----

    let mut params: ctrl_loop::Params =
        util::params::load("ctrl_loop.toml").wrap_err("Could not load control loop params")?;

    if let Some(ref path) = opt.gains {
        let json = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Could not read gain file {:?}", path))?;
        params.lat_ctrl.gains = GainTable::from_json_str(&json)
            .wrap_err_with(|| format!("Invalid gain file {:?}", path))?;
        info!("Gains loaded from {:?}", path);
    }

    if params.lat_ctrl.gains.is_empty() {
        warn!("Gain table is empty, neutral gains will be used at every speed");
    }

    let table = RegionTable::load("region_policy.toml").wrap_err("Could not load region table")?;

    info!("Parameters loaded, {} regions", table.len());

    // ---- LOAD WAYPOINTS ----

    let region_wps = waypoints::load(&opt.region_waypoints)
        .wrap_err("Could not load the region boundary waypoints")?;
    let braking_wps = waypoints::load(&opt.braking_waypoints)
        .wrap_err("Could not load the braking waypoints")?;

    info!(
        "Loaded {} region boundaries and {} braking points",
        region_wps.len(),
        braking_wps.len()
    );

    // ---- INITIALISE MODULES ----

    let dt_s = params.lat_ctrl.dt_s;
    let mut ctrl = CtrlLoop::new(params, table, region_wps, braking_wps)
        .wrap_err("Invalid control loop parameters")?;

    let mut arch_cmd = Archiver::from_path(&session, "ctrl_loop/command.csv")
        .wrap_err("Failed to create the command archive")?;
    let mut arch_report = Archiver::from_path(&session, "ctrl_loop/status_report.csv")
        .wrap_err("Failed to create the status report archive")?;

    let mut rdr = csv::Reader::from_path(&opt.telemetry)
        .wrap_err_with(|| format!("Could not open telemetry file {:?}", opt.telemetry))?;

    info!("Initialisation complete, starting replay\n");

    // ---- MAIN LOOP ----

    let mut summary = ReplaySummary {
        telemetry_path: opt.telemetry.display().to_string(),
        ..Default::default()
    };

    let cycle_period = if dt_s.is_finite() && dt_s > 0.0 {
        Duration::from_secs_f64(dt_s)
    } else {
        Duration::from_secs(0)
    };

    for result in rdr.deserialize() {
        let cycle_start = Instant::now();

        let record: TelemetryRecord = result.wrap_err("Invalid telemetry record")?;
        let cmd = ctrl.tick(&TickInput::from(&record));
        let report = *ctrl.report();

        arch_cmd
            .serialise(&CommandRecord::new(report.tick, &cmd))
            .wrap_err("Failed to archive the command")?;
        arch_report
            .serialise(&report)
            .wrap_err("Failed to archive the status report")?;

        if report.region_advanced {
            summary.regions_entered += 1;
        }
        if report.braking_triggered {
            summary.braking_pulses += 1;
        }
        if report.degenerate_geometry {
            summary.degenerate_ticks += 1;
        }

        // Pace to the control period
        if opt.realtime {
            match cycle_period.checked_sub(cycle_start.elapsed()) {
                Some(d) => thread::sleep(d),
                None => warn!(
                    "Tick {} overran by {:.06} s",
                    report.tick,
                    cycle_start.elapsed().as_secs_f64() - dt_s
                ),
            }
        }
    }

    // ---- SHUTDOWN ----

    summary.num_ticks = ctrl.num_ticks();
    summary.final_region = ctrl.region_policy().state().region_index;
    summary.region_waypoints_left = ctrl.region_policy().region_queue().remaining();
    summary.braking_waypoints_left = ctrl.region_policy().braking_queue().remaining();

    session
        .save_json("summary.json", &summary)
        .wrap_err("Failed to save the replay summary")?;

    info!(
        "Replay of {} ticks complete in {:.03} s, finished in region {}",
        summary.num_ticks,
        session::get_elapsed_seconds(),
        summary.final_region
    );

    Ok(())
}
