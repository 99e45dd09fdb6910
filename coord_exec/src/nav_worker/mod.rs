//! # Navigation worker
//!
//! Drives the robot through a list of waypoints while the coordinator is in AutoNavigate. The
//! worker runs on its own thread with an explicit lifecycle:
//!
//! - [`NavWorker::start`] spawns it when AutoNavigate is entered,
//! - the coordinator forwards poses and waypoint lists as [`NavSignal`]s,
//! - [`NavWorker::stop`] (after the coordinator sets the cancel signal) joins it when
//!   AutoNavigate is left.
//!
//! While running the worker is the only publisher of locomotion commands. Each command goes
//! through the safety lock, so nothing is published while the override is active, and nothing is
//! published once the worker has seen the cancel signal.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod geo;
pub mod params;
mod worker;

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::{
    sync::{
        mpsc::{channel, SendError, Sender},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use comms_if::tc::Waypoint;
use log::{info, warn};
use util::time::Clock;

use crate::{
    cmd_bus::{BusTx, CancelObserver, CmdBusError, SafetyFlag},
    pid::PidError,
};

pub use params::Params;
pub use worker::{NavStep, Navigator};

// -----------------------------------------------------------------------------------------------
// STRUCTS
// -----------------------------------------------------------------------------------------------

/// Handle to a running navigation worker.
pub struct NavWorker {
    worker_jh: Option<JoinHandle<Result<(), NavWorkerError>>>,
    worker_sender: Sender<NavSignal>,
}

/// Everything the worker shares with the rest of the engine.
#[derive(Clone)]
pub struct NavContext {
    pub bus: BusTx,
    pub safety: SafetyFlag,
    pub cancel: CancelObserver,
    pub clock: Arc<dyn Clock>,
}

/// The robot's pose as forwarded to the worker.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NavPose {
    pub lat: f64,
    pub lon: f64,

    /// Compass heading, `None` if the heading was not available.
    pub heading_deg: Option<f64>,

    /// Clock time at which the position was measured.
    pub stamp: Duration,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

#[derive(Debug)]
pub enum NavSignal {
    /// The worker should stop it's operations
    Stop,

    /// A new pose is available.
    Pose(NavPose),

    /// Replace the waypoint list and start again from its first entry.
    Waypoints(Vec<Waypoint>),
}

#[derive(Debug, thiserror::Error)]
pub enum NavWorkerError {
    #[error("Invalid navigation controller configuration: {0}")]
    PidError(#[from] PidError),

    #[error("Invalid navigation parameters: {0}")]
    InvalidParams(&'static str),

    #[error("Could not spawn the worker thread: {0}")]
    SpawnError(std::io::Error),

    #[error("Failed to send signal {0:?} to the worker")]
    SendError(NavSignal),

    #[error("The worker thread panicked")]
    WorkerPanicked,

    #[error("The worker could not publish: {0}")]
    BusError(#[from] CmdBusError),
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl NavWorker {
    /// Spawn a worker navigating the given waypoints.
    pub fn start(
        params: &Params,
        waypoints: Vec<Waypoint>,
        ctx: NavContext,
    ) -> Result<Self, NavWorkerError> {
        let nav = Navigator::new(params.clone(), waypoints)?;

        let (worker_sender, rx) = channel();

        let worker_jh = thread::Builder::new()
            .name("nav_worker".into())
            .spawn(move || worker::worker_thread(nav, rx, ctx))
            .map_err(NavWorkerError::SpawnError)?;

        info!("Navigation worker started");

        Ok(Self {
            worker_jh: Some(worker_jh),
            worker_sender,
        })
    }

    /// Forward a pose to the worker.
    pub fn send_pose(&self, pose: NavPose) -> Result<(), NavWorkerError> {
        Ok(self.worker_sender.send(NavSignal::Pose(pose))?)
    }

    /// Replace the worker's waypoints.
    pub fn set_waypoints(&self, waypoints: Vec<Waypoint>) -> Result<(), NavWorkerError> {
        Ok(self.worker_sender.send(NavSignal::Waypoints(waypoints))?)
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// The caller must set the cancel signal first so the worker stops publishing even if it is
    /// mid-step.
    pub fn stop(mut self) -> Result<(), NavWorkerError> {
        self.join()
    }

    fn join(&mut self) -> Result<(), NavWorkerError> {
        let jh = match self.worker_jh.take() {
            Some(jh) => jh,
            None => return Ok(()),
        };

        // The worker may already have exited, in which case nobody is listening
        self.worker_sender.send(NavSignal::Stop).ok();

        let result = jh.join().map_err(|_| NavWorkerError::WorkerPanicked)?;
        info!("Navigation worker stopped");
        result
    }
}

impl Drop for NavWorker {
    fn drop(&mut self) {
        if let Err(e) = self.join() {
            warn!("Navigation worker exited with an error: {}", e);
        }
    }
}

impl From<SendError<NavSignal>> for NavWorkerError {
    fn from(e: SendError<NavSignal>) -> Self {
        Self::SendError(e.0)
    }
}
