//! # Mode coordinator
//!
//! The coordinator owns the operating mode, the tracking controller, the position/heading trace
//! and the navigation worker's lifecycle. It is driven from two directions:
//!
//! - [`Coordinator::handle`] executes a telecommand from the control surface and returns the
//!   response,
//! - [`Coordinator::step`] runs one control cycle: take the newest frame, detection, IMU sample
//!   and GPS report from the inbound queues, update the heading and trace, and then, unless the
//!   safety override is active, dispatch on the mode.
//!
//! Locomotion commands are only ever published through the [`SafetyFlag`]. While the override is
//! active every cycle publishes neutral. In AutoNavigate the coordinator never publishes and the
//! navigation worker is the only writer.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod params;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{Arc, PoisonError},
    time::Duration,
};

use comms_if::{
    bus::{BusMsg, Topic},
    eqpt::{
        ctrl::ControlCommand,
        imu::SensorSample,
        pump::{PumpCmd, RailCmd},
    },
    tc::{Tc, TcResponse, Waypoint, CODE_OK, CODE_REJECTED},
};
use image::DynamicImage;
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::json;
use util::{module::State, time::Clock};

use crate::{
    cmd_bus::{BusTx, CancelToken, CmdBusError, Inbound, OutputFrame, SafetyFlag},
    loc::{compute_heading, Estimator, EstimatorError, GpsFix, HeadingReading, Trace, TrackLog},
    mode::Mode,
    nav_worker::{self, NavContext, NavPose, NavWorker, NavWorkerError},
    pid::PidGains,
    track_ctrl::{self, TrackCtrl, TrackCtrlError},
};

pub use params::Params;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The mode coordinator.
pub struct Coordinator {
    params: Params,
    nav_params: nav_worker::Params,

    mode: Mode,

    safety: SafetyFlag,
    cancel: CancelToken,
    bus: BusTx,
    inbound: Inbound,
    clock: Arc<dyn Clock>,

    track_ctrl: TrackCtrl,

    trace: Trace,
    last_sample: Option<SensorSample>,
    last_fix: Option<GpsFix>,

    /// Clock time at which `last_fix` arrived
    last_fix_stamp: Duration,

    last_frame: DynamicImage,
    output_frame: OutputFrame,

    waypoints: Vec<Waypoint>,
    nav_worker: Option<NavWorker>,
}

/// What happened in one control cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    /// The locomotion command published by the coordinator, if any.
    pub emitted: Option<ControlCommand>,

    pub heading: Option<HeadingReading>,

    /// The fix recorded this cycle, if any.
    pub fix: Option<GpsFix>,

    pub track_status: Option<track_ctrl::StatusReport>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CoordError {
    #[error("TrackCtrl error: {0}")]
    TrackCtrlError(#[from] TrackCtrlError),

    #[error("Estimator error: {0}")]
    EstimatorError(#[from] EstimatorError),

    #[error("Navigation worker error: {0}")]
    NavWorkerError(#[from] NavWorkerError),

    #[error("Command bus error: {0}")]
    CmdBusError(#[from] CmdBusError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Coordinator {
    /// Create a new coordinator in Manual mode with the override inactive.
    pub fn new(
        params: Params,
        nav_params: nav_worker::Params,
        bus: BusTx,
        inbound: Inbound,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CoordError> {
        let mut track_params = params.track_ctrl.clone();
        track_params.frame_width = params.frame_width;

        let track_ctrl = TrackCtrl::init(track_params)?;
        let trace = Trace::new(Estimator::new(params.estimate_alpha)?);

        let output_frame = OutputFrame::new(params.frame_width, params.frame_height);

        Ok(Self {
            last_frame: DynamicImage::new_rgb8(params.frame_width, params.frame_height),
            output_frame,
            params,
            nav_params,
            mode: Mode::Manual,
            safety: SafetyFlag::new(),
            cancel: CancelToken::new(),
            bus,
            inbound,
            clock,
            track_ctrl,
            trace,
            last_sample: None,
            last_fix: None,
            last_fix_stamp: Duration::default(),
            waypoints: Vec::new(),
            nav_worker: None,
        })
    }

    // ---- ACCESSORS ----

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_overridden(&self) -> bool {
        self.safety.is_active()
    }

    pub fn track_ctrl(&self) -> &TrackCtrl {
        &self.track_ctrl
    }

    /// Handle to the position/heading trace, for readers.
    pub fn trace_handle(&self) -> TrackLog {
        self.trace.handle()
    }

    /// Handle to the output frame, for the video service.
    pub fn output_frame(&self) -> OutputFrame {
        self.output_frame.clone()
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn nav_running(&self) -> bool {
        self.nav_worker.is_some()
    }

    /// Block until an IMU sample arrives or the timeout expires. Returns whether one arrived.
    pub fn wait_imu(&mut self, timeout: Duration) -> bool {
        match self.inbound.wait_imu(timeout) {
            Some(s) => {
                self.last_sample = Some(s);
                true
            }
            None => false,
        }
    }

    // ---- TELECOMMANDS ----

    /// Execute a telecommand.
    pub fn handle(&mut self, tc: Tc) -> TcResponse {
        debug!("Handling TC {:?}", tc);

        match tc {
            Tc::EStop => match self.safety.activate(&self.bus) {
                Ok(changed) => {
                    if changed {
                        warn!("E-Stop activated");
                    }
                    TcResponse::ok("E-Stop activated")
                }
                Err(e) => {
                    error!("Could not publish the E-Stop neutral command: {}", e);
                    TcResponse::rejected("E-Stop activated but the bus is down")
                }
            },
            Tc::UndoEStop => {
                if self.safety.clear() {
                    info!("E-Stop deactivated, resuming in {} mode", self.mode);
                }
                TcResponse::ok("E-Stop deactivated")
            }

            Tc::MoveForward => self.manual_move(ControlCommand::FORWARD, "Moving forward"),
            Tc::MoveBackward => self.manual_move(ControlCommand::BACKWARD, "Moving backward"),
            Tc::MoveLeft => self.manual_move(ControlCommand::LEFT, "Turning left"),
            Tc::MoveRight => self.manual_move(ControlCommand::RIGHT, "Turning right"),
            Tc::StopRobot => self.manual_move(ControlCommand::NEUTRAL, "Robot stopped"),

            Tc::MoveRailForward => self.rail(RailCmd::Forward, "Moving rail forward"),
            Tc::MoveRailBackward => self.rail(RailCmd::Backward, "Moving rail backward"),
            Tc::StopRail => self.rail(RailCmd::Stop, "Rail stopped"),

            Tc::PumpOn => self.pump(PumpCmd::On, "Pump ON"),
            Tc::PumpOff => self.pump(PumpCmd::Off, "Pump OFF"),

            Tc::IncreaseFaceArea => {
                let a = self.track_ctrl.increase_area();
                info!("Desired face area increased to {}", a);
                TcResponse::ok("Face area increased")
            }
            Tc::DecreaseFaceArea => {
                let a = self.track_ctrl.decrease_area();
                info!("Desired face area decreased to {}", a);
                TcResponse::ok("Face area decreased")
            }
            Tc::MoveCenterLeft => {
                let o = self.track_ctrl.move_center_left();
                info!("Center offset moved left to {}", o);
                TcResponse::ok("Center moved left")
            }
            Tc::MoveCenterRight => {
                let o = self.track_ctrl.move_center_right();
                info!("Center offset moved right to {}", o);
                TcResponse::ok("Center moved right")
            }

            Tc::UpdatePid {
                kp: Some(kp),
                ki: Some(ki),
                kd: Some(kd),
            } => match self.track_ctrl.set_gains(PidGains::new(kp, ki, kd)) {
                Ok(()) => {
                    info!("Updated PID parameters: Kp={}, Ki={}, Kd={}", kp, ki, kd);
                    TcResponse::ok("PID parameters updated")
                }
                Err(e) => {
                    warn!("Rejected PID update: {}", e);
                    TcResponse::rejected("Invalid PID parameters")
                }
            },
            Tc::UpdatePid { .. } => TcResponse::rejected("Invalid PID parameters"),

            Tc::SetMode { mode } => match mode.parse::<Mode>() {
                Ok(m) => match self.set_mode(m) {
                    Ok(()) => TcResponse::ok(format!("Mode set to {}", m)),
                    Err(e) => {
                        error!("Could not change mode to {}: {}", m, e);
                        TcResponse::rejected(format!("Could not set mode to {}", m))
                    }
                },
                Err(e) => {
                    warn!("{}", e);
                    TcResponse::rejected("Invalid mode selected")
                }
            },

            Tc::SendCoordinates { coordinates } => self.set_waypoints(coordinates),

            Tc::GetTrace => {
                let log = self.trace.handle();
                let points = log.lock().unwrap_or_else(PoisonError::into_inner);
                let body = serde_json::to_value(&*points);
                drop(points);

                match body {
                    Ok(v) => TcResponse::data(CODE_OK, v),
                    Err(e) => {
                        error!("Could not serialize the trace: {}", e);
                        TcResponse::rejected("Trace unavailable")
                    }
                }
            }
            Tc::LatestFix => match self.last_fix {
                Some(f) => TcResponse::data(CODE_OK, json!({ "lat": f.lat, "lon": f.lon })),
                None => TcResponse::data(CODE_REJECTED, json!({ "lat": 0.0, "lon": 0.0 })),
            },
        }
    }

    /// Change the operating mode, managing the navigation worker.
    ///
    /// Any actual change of mode publishes neutral once, so the new mode always starts from a
    /// stopped robot. Leaving AutoNavigate cannot fail: a worker which exited with an error, or a
    /// neutral command which could not be queued, is logged and the new mode is still entered.
    /// Only starting the navigation worker can fail.
    pub fn set_mode(&mut self, mode: Mode) -> Result<(), CoordError> {
        let prev = self.mode;

        if prev == Mode::AutoNavigate && mode != Mode::AutoNavigate {
            self.stop_nav();
        }

        if prev != mode {
            if let Err(e) = self.safety.publish(&self.bus, ControlCommand::NEUTRAL) {
                error!("Could not publish neutral on mode change: {}", e);
            }
            info!("Mode changed from {} to {}", prev, mode);
        }

        if mode == Mode::AutoNavigate && self.nav_worker.is_none() {
            self.cancel.clear();
            let ctx = NavContext {
                bus: self.bus.clone(),
                safety: self.safety.clone(),
                cancel: self.cancel.observer(),
                clock: self.clock.clone(),
            };
            self.nav_worker = Some(NavWorker::start(
                &self.nav_params,
                self.waypoints.clone(),
                ctx,
            )?);
        }

        self.mode = mode;

        Ok(())
    }

    // ---- CYCLE ----

    /// Run one control cycle.
    pub fn step(&mut self) -> Result<CycleReport, CoordError> {
        let mut report = CycleReport::default();

        // ---- FRAMES ----

        if let Some(frame) = self.inbound.newest_frame() {
            self.last_frame = frame.image;
        }
        let out = if self.params.flip_frame {
            self.last_frame.fliph()
        } else {
            self.last_frame.clone()
        };
        self.output_frame.set(out);

        // ---- INPUTS ----

        let detection = self.inbound.newest_detection().and_then(|d| d.primary());

        if let Some(sample) = self.inbound.newest_imu() {
            self.last_sample = Some(sample);
        }
        let heading = match self.last_sample {
            Some(ref s) => compute_heading(s),
            None => HeadingReading::unavailable(),
        };
        if let Some(e) = heading.error {
            debug!("No heading this cycle: {}", e);
        }
        report.heading = Some(heading);

        if let Some(gps) = self.inbound.newest_gps() {
            match GpsFix::from_report(&gps) {
                Some(fix) => {
                    self.trace
                        .append(self.clock.utc(), &fix, heading.valid_deg());
                    self.last_fix = Some(fix);
                    self.last_fix_stamp = self.clock.now();
                    report.fix = Some(fix);
                }
                None => debug!("GPS report without a fix (mode {})", gps.mode),
            }
        }

        // The heading moves faster than the fixes arrive, so the worker gets a pose every cycle.
        // The stamp stays that of the fix so the worker can still tell when it is stale.
        if let Some(fix) = self.last_fix {
            self.forward_pose(&fix, &heading);
        }

        // ---- SAFETY ----

        if self.safety.is_active() {
            report.emitted = Some(self.safety.publish(&self.bus, ControlCommand::NEUTRAL)?);
            return Ok(report);
        }

        // ---- MODE DISPATCH ----

        match self.mode {
            Mode::Tracking => {
                let cmd = match self
                    .track_ctrl
                    .proc(&track_ctrl::InputData { detection })
                {
                    Ok((cmd, status)) => {
                        if status.target_lost {
                            debug!("No detection this cycle, stopping");
                        }
                        report.track_status = Some(status);
                        cmd
                    }
                    Err(e) => {
                        warn!("Error during TrackCtrl processing: {}", e);
                        ControlCommand::NEUTRAL
                    }
                };

                report.emitted = Some(self.safety.publish(&self.bus, cmd)?);
            }
            Mode::AutoNavigate => (),
            Mode::Manual => (),
        }

        Ok(report)
    }

    /// Stop navigation and publish neutral. Called once when the executable exits.
    pub fn shutdown(&mut self) -> Result<(), CoordError> {
        self.stop_nav();
        self.safety.publish(&self.bus, ControlCommand::NEUTRAL)?;
        info!("Coordinator shut down, neutral command sent");
        Ok(())
    }

    // ---- PRIVATE ----

    fn manual_move(&mut self, cmd: ControlCommand, status: &str) -> TcResponse {
        if self.mode != Mode::Manual {
            return TcResponse::rejected(if cmd.is_neutral() {
                "Cannot stop in current mode"
            } else {
                "Cannot move in current mode"
            });
        }

        match self.safety.publish_unless_overridden(&self.bus, cmd) {
            Ok(true) => TcResponse::ok(status),
            Ok(false) => TcResponse::rejected("E-Stop is active"),
            Err(e) => {
                error!("Could not publish manual command: {}", e);
                TcResponse::rejected("Command bus unavailable")
            }
        }
    }

    fn rail(&mut self, cmd: RailCmd, status: &str) -> TcResponse {
        if self.mode != Mode::Manual {
            return TcResponse::rejected(match cmd {
                RailCmd::Stop => "Cannot stop in current mode",
                _ => "Cannot move in current mode",
            });
        }

        let bus = &self.bus;
        match self
            .safety
            .with_inactive(|| bus.send(BusMsg::new(Topic::Rail, cmd.payload())))
        {
            Some(Ok(())) => TcResponse::ok(status),
            None => TcResponse::rejected("E-Stop is active"),
            Some(Err(e)) => {
                error!("Could not publish rail command: {}", e);
                TcResponse::rejected("Command bus unavailable")
            }
        }
    }

    fn pump(&mut self, cmd: PumpCmd, status: &str) -> TcResponse {
        if self.mode != Mode::Manual {
            return TcResponse::rejected("Cannot use the pump in current mode");
        }

        match self.bus.send(BusMsg::new(Topic::Pump, cmd.payload())) {
            Ok(()) => TcResponse::ok(status),
            Err(e) => {
                error!("Could not publish pump command: {}", e);
                TcResponse::rejected("Command bus unavailable")
            }
        }
    }

    fn set_waypoints(&mut self, coordinates: Vec<Waypoint>) -> TcResponse {
        if coordinates.is_empty() {
            return TcResponse::rejected("No coordinates received");
        }

        let valid = coordinates.iter().all(|w| {
            w.lat.is_finite()
                && w.lng.is_finite()
                && w.lat.abs() <= 90.0
                && w.lng.abs() <= 180.0
        });
        if !valid {
            return TcResponse::rejected("Invalid coordinates");
        }

        info!("Received {} waypoints", coordinates.len());
        self.waypoints = coordinates;

        if let Some(ref w) = self.nav_worker {
            if let Err(e) = w.set_waypoints(self.waypoints.clone()) {
                error!("Could not forward waypoints to the navigation worker: {}", e);
                return TcResponse::rejected("Navigation worker unavailable");
            }
        }

        TcResponse::ok("Coordinates received")
    }

    fn forward_pose(&mut self, fix: &GpsFix, heading: &HeadingReading) {
        let pose = NavPose {
            lat: fix.lat,
            lon: fix.lon,
            heading_deg: heading.valid_deg(),
            stamp: self.last_fix_stamp,
        };

        let failed = match self.nav_worker {
            Some(ref w) => w.send_pose(pose).is_err(),
            None => false,
        };

        // The worker only stops listening if it has exited
        if failed {
            error!("Navigation worker has stopped unexpectedly");
            self.stop_nav();
        }
    }

    /// Cancel and join the navigation worker, if running.
    fn stop_nav(&mut self) {
        if let Some(worker) = self.nav_worker.take() {
            self.cancel.cancel();
            if let Err(e) = worker.stop() {
                error!("Navigation worker exited with an error: {}", e);
            }
        }
    }
}
