//! Main coordinator executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Start the bus listener and publisher threads
//!     - Wait for the IMU to appear on the bus
//!     - Main loop:
//!         - Telecommand processing and handling
//!         - Coordinator cycle:
//!             - Frame, detection, heading and fix acquisition
//!             - Safety override
//!             - Mode dispatch (tracking control)
//!         - Cycle management
//!
//! Navigation runs on its own worker thread, started and stopped by the coordinator.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use std::{path::PathBuf, sync::Arc, time::Duration};
use structopt::StructOpt;

// Internal
use comms_if::net::{zmq, NetParams};
use coord_lib::{
    bus_client::BusClient,
    cmd_bus::{bus_channel, inbound_channels},
    coordinator::{self, Coordinator},
    nav_worker,
    tc_client::{TcClient, TcClientError},
    zone_mgr::{self, ZoneMgr},
};
use util::{
    host,
    logger::{logger_init, parse_level},
    params::LoadError,
    session::Session,
    time::{Clock, CycleTimer, SystemClock},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of consecutive overruns after which overruns are logged as errors.
const OVERRUN_ERROR_LIMIT: u64 = 20;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "coord_exec", about = "Fieldbot coordinator")]
struct Opt {
    /// Minimum log level (info, debug or trace)
    #[structopt(long, default_value = "info")]
    log_level: String,

    /// Directory to load parameter files from, instead of `$FIELDBOT_SW_ROOT/params`
    #[structopt(long, parse(from_os_str))]
    params: Option<PathBuf>,

    /// Skip waiting for the IMU at startup
    #[structopt(long)]
    no_imu_wait: bool,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    let session =
        Session::new("coord_exec", "sessions").wrap_err("Failed to create the session")?;

    let level = parse_level(&opt.log_level)
        .ok_or_else(|| eyre!("Invalid log level \"{}\"", opt.log_level))?;
    logger_init(level, &session).wrap_err("Failed to initialise logging")?;

    info!("Fieldbot Coordinator Executable\n");
    info!("Running on: {}", host::get_hostname());
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI options: {:?}", opt);

    // ---- LOAD PARAMETERS ----

    let net_params: NetParams =
        load_params(&opt, "net.toml").wrap_err("Could not load net params")?;
    let coord_params: coordinator::Params =
        load_params(&opt, "coord.toml").wrap_err("Could not load coordinator params")?;
    let zone_params: zone_mgr::Params =
        load_params(&opt, "zones.toml").wrap_err("Could not load zone params")?;
    let nav_params: nav_worker::Params =
        load_params(&opt, "nav.toml").wrap_err("Could not load navigation params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let (bus, outbound) = bus_channel();
    let (inbound_tx, inbound) = inbound_channels();

    let zones = ZoneMgr::new(zone_params, bus.clone()).wrap_err("Failed to initialise ZoneMgr")?;
    info!("ZoneMgr init complete ({} zones)", zones.zones().len());

    let cycle_period_s = coord_params.cycle_period_s;
    let sensor_detect_timeout_s = coord_params.sensor_detect_timeout_s;

    let mut coord = Coordinator::new(coord_params, nav_params, bus, inbound, clock.clone())
        .wrap_err("Failed to initialise the Coordinator")?;
    info!("Coordinator init complete, mode is {}", coord.mode());

    info!("Module initialisation complete\n");

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = zmq::Context::new();

    let bus_client = BusClient::start(&zmq_ctx, &net_params, inbound_tx, zones, outbound)
        .wrap_err("Failed to start the BusClient")?;
    info!("BusClient started");

    let tc_client =
        TcClient::new(&zmq_ctx, &net_params).wrap_err("Failed to initialise the TcClient")?;
    info!("TcClient initialised");

    info!("Network initialisation complete");

    // ---- SENSOR DETECTION ----

    if !opt.no_imu_wait {
        info!("Waiting up to {} s for the IMU", sensor_detect_timeout_s);

        match coord.wait_imu(Duration::from_secs_f64(sensor_detect_timeout_s)) {
            true => info!("IMU detected"),
            false => {
                bus_client.stop();
                return Err(eyre!(
                    "No IMU sample received within {} s",
                    sensor_detect_timeout_s
                ));
            }
        }
    }

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let mut timer = CycleTimer::new(cycle_period_s);

    let result = loop {
        timer.start(clock.as_ref());

        // ---- TELECOMMAND PROCESSING ----

        if let Err(e) = process_tcs(&tc_client, &mut coord) {
            break Err(e);
        }

        // ---- COORDINATOR CYCLE ----

        if let Err(e) = coord.step() {
            break Err(e).wrap_err("Error during the coordinator cycle");
        }

        // ---- CYCLE MANAGEMENT ----

        if let Some(overrun) = timer.finish(clock.as_ref()) {
            if timer.num_consec_overruns > OVERRUN_ERROR_LIMIT {
                error!(
                    "Cycle overran by {:.06} s ({} consecutive)",
                    overrun.as_secs_f64(),
                    timer.num_consec_overruns
                );
            } else {
                warn!("Cycle overran by {:.06} s", overrun.as_secs_f64());
            }
        }
    };

    // ---- SHUTDOWN ----

    if let Err(e) = coord.shutdown() {
        error!("Could not shut the coordinator down cleanly: {}", e);
    }
    bus_client.stop();

    info!("End of execution");

    result
}

/// Load a parameter file from the `--params` directory if given, or the software root otherwise.
fn load_params<P: DeserializeOwned>(opt: &Opt, file: &str) -> Result<P, LoadError> {
    match opt.params {
        Some(ref dir) => util::params::load_from(dir.join(file)),
        None => util::params::load(file),
    }
}

/// Receive and execute telecommands until none remain.
fn process_tcs(client: &TcClient, coord: &mut Coordinator) -> Result<(), Report> {
    loop {
        match client.recieve_tc() {
            Ok(Some(tc)) => {
                let response = coord.handle(tc);
                debug!("TC response: {:?}", response);

                if let Err(e) = client.send_response(response) {
                    warn!("Could not respond to TC: {}", e)
                }
            }
            Ok(None) => break Ok(()),
            Err(TcClientError::TcParseError(e)) => {
                warn!("Could not parse recieved TC: {}", e);
                break Ok(());
            }
            Err(TcClientError::NonUtf8Request) => {
                warn!("Recieved a TC which was not valid UTF-8");
                break Ok(());
            }
            Err(e) => {
                break Err(e).wrap_err("An error occured while receiving TCs")
            }
        }
    }
}
