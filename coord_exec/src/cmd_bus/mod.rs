//! # Command bus
//!
//! The in-process message passing layer between the coordinator, its workers and the network
//! threads:
//!
//! - [`Inbound`]: queues fed by the bus listener, drained without blocking by the control cycle,
//! - [`BusTx`]: the outbound side, every message published by the engine goes through it,
//! - [`SafetyFlag`]: the safety override, shared under a lock,
//! - [`CancelToken`]/[`CancelObserver`]: the navigation cancellation signal, set only by the
//!   coordinator and observed only by the worker,
//! - [`OutputFrame`]: the latest camera frame for the external video service.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod inbound;
mod safety;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{channel, Receiver, Sender},
    Arc, Mutex, PoisonError,
};

use comms_if::{
    bus::{BusMsg, Topic},
    eqpt::ctrl::ControlCommand,
};
use image::DynamicImage;

pub use inbound::{inbound_channels, Inbound, InboundTx};
pub use safety::SafetyFlag;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Sending half of the outbound bus.
#[derive(Debug, Clone)]
pub struct BusTx {
    tx: Sender<BusMsg>,
}

/// The coordinator's side of the navigation cancellation signal.
#[derive(Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

/// The worker's side of the navigation cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelObserver {
    flag: Arc<AtomicBool>,
}

/// The shared output frame.
#[derive(Debug, Clone)]
pub struct OutputFrame {
    frame: Arc<Mutex<DynamicImage>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CmdBusError {
    #[error("The outbound bus has been closed")]
    Disconnected,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Create the outbound bus. The receiver is owned by the publisher thread (or a test).
pub fn bus_channel() -> (BusTx, Receiver<BusMsg>) {
    let (tx, rx) = channel();
    (BusTx { tx }, rx)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl BusTx {
    pub fn send(&self, msg: BusMsg) -> Result<(), CmdBusError> {
        self.tx.send(msg).map_err(|_| CmdBusError::Disconnected)
    }

    /// Publish a locomotion command.
    ///
    /// Only the holder of the safety lock may call this, see [`SafetyFlag`].
    pub(crate) fn send_cmd(&self, cmd: ControlCommand) -> Result<(), CmdBusError> {
        self.send(BusMsg::new(Topic::Control, cmd.to_string()))
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an observer for a worker.
    pub fn observer(&self) -> CancelObserver {
        CancelObserver {
            flag: self.flag.clone(),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl CancelObserver {
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl OutputFrame {
    /// Create the frame, initially black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            frame: Arc::new(Mutex::new(DynamicImage::new_rgb8(width, height))),
        }
    }

    /// Replace the frame.
    pub fn set(&self, image: DynamicImage) {
        *self.frame.lock().unwrap_or_else(PoisonError::into_inner) = image;
    }

    /// Copy the current frame out.
    pub fn snapshot(&self) -> DynamicImage {
        self.frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
