//! # Bus client
//!
//! Two background threads connect the engine to the message broker:
//!
//! - the listener owns a SUB socket, parses every frame and routes it into the inbound queues.
//!   Camera frames are decoded here so the control cycle never pays for it, and moisture
//!   readings go straight to the [`ZoneMgr`] since irrigation does not depend on the cycle,
//! - the publisher owns the PUB socket and drains the outbound bus.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, RecvTimeoutError},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use comms_if::{
    bus::{BusMsg, Topic, SUBSCRIBED_TOPICS},
    eqpt::{
        cam::CamMsg, det::DetectionMsg, gps::GpsReport, imu::SensorSample, moisture::MoistureMsg,
    },
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
};
use log::{debug, error, info, trace, warn};

use crate::{
    cmd_bus::InboundTx,
    zone_mgr::{ZoneMgr, ZoneOutcome},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// How long the publisher waits for an outbound message before checking for shutdown.
const PUBLISH_POLL: Duration = Duration::from_millis(50);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Handle to the bus threads.
pub struct BusClient {
    listener_jh: Option<JoinHandle<()>>,
    publisher_jh: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum BusClientError {
    #[error("Socket error: {0}")]
    SocketError(#[from] MonitoredSocketError),

    #[error("Could not spawn the {0} thread: {1}")]
    SpawnError(&'static str, std::io::Error),
}

/// Why a message could not be routed.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("Invalid {0} payload: {1}")]
    InvalidPayload(Topic, String),

    #[error("The {0} queue has been closed")]
    QueueClosed(Topic),

    #[error("{0} is not an inbound topic")]
    NotInbound(Topic),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl BusClient {
    /// Connect to the broker and start the listener and publisher threads.
    pub fn start(
        ctx: &zmq::Context,
        params: &NetParams,
        inbound: InboundTx,
        zones: ZoneMgr,
        outbound: Receiver<BusMsg>,
    ) -> Result<Self, BusClientError> {
        let sub = MonitoredSocket::new(
            ctx,
            zmq::SUB,
            SocketOptions {
                block_on_first_connect: false,
                linger: 0,
                recv_timeout: 100,
                subscriptions: SUBSCRIBED_TOPICS
                    .iter()
                    .map(|t| t.as_str().to_string())
                    .collect(),
                ..Default::default()
            },
            &params.bus_sub_endpoint,
        )?;

        let publ = MonitoredSocket::new(
            ctx,
            zmq::PUB,
            SocketOptions {
                block_on_first_connect: false,
                linger: 100,
                send_timeout: 100,
                ..Default::default()
            },
            &params.bus_pub_endpoint,
        )?;

        let shutdown = Arc::new(AtomicBool::new(false));

        let listener_jh = {
            let shutdown = shutdown.clone();
            thread::Builder::new()
                .name("bus_listener".into())
                .spawn(move || listener_thread(sub, inbound, zones, shutdown))
                .map_err(|e| BusClientError::SpawnError("listener", e))?
        };

        let publisher_jh = {
            let shutdown = shutdown.clone();
            thread::Builder::new()
                .name("bus_publisher".into())
                .spawn(move || publisher_thread(publ, outbound, shutdown))
                .map_err(|e| BusClientError::SpawnError("publisher", e))?
        };

        Ok(Self {
            listener_jh: Some(listener_jh),
            publisher_jh: Some(publisher_jh),
            shutdown,
        })
    }

    /// Stop both threads.
    ///
    /// The publisher drains any messages already queued before it exits.
    pub fn stop(mut self) {
        self.join()
    }

    fn join(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        for jh in [self.listener_jh.take(), self.publisher_jh.take()]
            .iter_mut()
            .filter_map(Option::take)
        {
            if jh.join().is_err() {
                error!("A bus thread panicked");
            }
        }
    }
}

impl Drop for BusClient {
    fn drop(&mut self) {
        self.join()
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Route a single inbound message.
pub fn route(msg: BusMsg, inbound: &InboundTx, zones: &mut ZoneMgr) -> Result<(), RouteError> {
    let topic = msg.topic;
    let invalid = |e: &dyn std::fmt::Display| RouteError::InvalidPayload(topic, e.to_string());

    match topic {
        Topic::Detections => {
            let d = DetectionMsg::from_json(&msg.payload).map_err(|e| invalid(&e))?;
            inbound.detections.send(d).map_err(|_| RouteError::QueueClosed(topic))
        }
        Topic::Camera => {
            let frame = CamMsg::from_json(&msg.payload)
                .and_then(|m| m.decode())
                .map_err(|e| invalid(&e))?;
            inbound.frames.send(frame).map_err(|_| RouteError::QueueClosed(topic))
        }
        Topic::Imu => {
            let s = SensorSample::from_json(&msg.payload).map_err(|e| invalid(&e))?;
            inbound.imu.send(s).map_err(|_| RouteError::QueueClosed(topic))
        }
        Topic::Gps => {
            let r = GpsReport::from_json(&msg.payload).map_err(|e| invalid(&e))?;
            inbound.gps.send(r).map_err(|_| RouteError::QueueClosed(topic))
        }
        Topic::Moisture => {
            let m = MoistureMsg::from_json(&msg.payload).map_err(|e| invalid(&e))?;
            match zones.handle(&m) {
                Ok(ZoneOutcome::Commanded {
                    zone,
                    pump,
                    changed: true,
                }) => info!(
                    "Zone {} pump {} (moisture {})",
                    zone,
                    if pump { "ON" } else { "OFF" },
                    m.value
                ),
                Ok(ZoneOutcome::Commanded { .. }) => (),
                Ok(ZoneOutcome::UnknownDevice(mac)) => {
                    debug!("Moisture reading from unknown sensor {}", mac)
                }
                Err(e) => warn!("Could not handle moisture reading: {}", e),
            }
            Ok(())
        }
        t => Err(RouteError::NotInbound(t)),
    }
}

fn listener_thread(
    socket: MonitoredSocket,
    inbound: InboundTx,
    mut zones: ZoneMgr,
    shutdown: Arc<AtomicBool>,
) {
    let mut was_connected = false;

    while !shutdown.load(Ordering::Relaxed) {
        let connected = socket.connected();
        if connected != was_connected {
            if connected {
                info!("Connected to the message bus");
            } else {
                error!("Disconnected from the message bus");
            }
            was_connected = connected;
        }

        let frame = match socket.recv_bytes(0) {
            Ok(f) => f,
            Err(zmq::Error::EAGAIN) => continue,
            Err(e) => {
                error!("Bus receive error: {}", e);
                continue;
            }
        };

        let msg = match BusMsg::from_frame(&frame) {
            Ok(m) => m,
            Err(e) => {
                warn!("Dropping bus frame: {}", e);
                continue;
            }
        };

        trace!("Bus message on {}", msg.topic);

        match route(msg, &inbound, &mut zones) {
            Ok(()) => (),
            Err(RouteError::QueueClosed(t)) => {
                info!("The {} queue has been closed, stopping the listener", t);
                break;
            }
            Err(e) => warn!("{}", e),
        }
    }
}

fn publisher_thread(socket: MonitoredSocket, outbound: Receiver<BusMsg>, shutdown: Arc<AtomicBool>) {
    loop {
        match outbound.recv_timeout(PUBLISH_POLL) {
            Ok(msg) => {
                trace!("Publishing {}", msg.to_frame());
                if let Err(e) = socket.send(msg.to_frame().as_bytes(), 0) {
                    warn!("Could not publish on {}: {}", msg.topic, e);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        cmd_bus::{bus_channel, inbound_channels},
        zone_mgr::Params as ZoneParams,
    };

    #[test]
    fn test_route() {
        let (inbound_tx, inbound) = inbound_channels();
        let (bus, _rx) = bus_channel();
        let mut zones = ZoneMgr::new(ZoneParams::default(), bus).unwrap();

        route(
            BusMsg::new(
                Topic::Detections,
                r#"{"detections": [{"center": [320, 240], "area": 5000}]}"#,
            ),
            &inbound_tx,
            &mut zones,
        )
        .unwrap();
        assert_eq!(
            inbound.newest_detection().unwrap().primary().unwrap().area,
            5000.0
        );

        route(
            BusMsg::new(Topic::Gps, r#"{"mode": 3, "lat": 1.5, "lon": 2.5}"#),
            &inbound_tx,
            &mut zones,
        )
        .unwrap();
        assert_eq!(inbound.newest_gps().unwrap().lat, Some(1.5));

        assert!(matches!(
            route(BusMsg::new(Topic::Imu, "not json"), &inbound_tx, &mut zones),
            Err(RouteError::InvalidPayload(Topic::Imu, _))
        ));
        assert!(matches!(
            route(BusMsg::new(Topic::Control, "64 64"), &inbound_tx, &mut zones),
            Err(RouteError::NotInbound(Topic::Control))
        ));

        // Unknown sensors are not an error
        route(
            BusMsg::new(Topic::Moisture, r#"{"mac": "aa:bb", "value": 10}"#),
            &inbound_tx,
            &mut zones,
        )
        .unwrap();
    }
}
