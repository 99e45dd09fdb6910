//! # Zone irrigation manager
//!
//! Maps moisture telemetry onto the remote pumps. Each reading is attributed to the first zone
//! listing its sensor. A reading strictly below the zone's threshold turns the zone's pump on,
//! anything else turns it off. The pump command is published on every reading, but the pump
//! state only changes (and is only logged) when the demand changes.
//!
//! Irrigation is independent of the locomotion mode and of the safety override.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::HashSet;

use comms_if::{
    bus::{BusMsg, Topic},
    eqpt::{moisture::MoistureMsg, pump::RemotePumpCmd},
};
use log::{debug, info, warn};

use crate::cmd_bus::{BusTx, CmdBusError};

pub use params::{Params, ZoneParams};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An irrigation zone.
#[derive(Debug, Clone)]
pub struct Zone {
    pub id: String,
    pub devices: HashSet<String>,
    pub threshold: f64,

    /// Current pump demand.
    pub pump: bool,
}

/// The zone irrigation manager.
#[derive(Debug)]
pub struct ZoneMgr {
    zones: Vec<Zone>,
    bus: BusTx,
}

/// What happened to a reading.
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneOutcome {
    /// The reading belonged to a zone and the pump command was published.
    Commanded {
        zone: String,
        pump: bool,
        changed: bool,
    },

    /// No zone lists the sensor, the reading was dropped.
    UnknownDevice(String),
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ZoneError {
    #[error("Zone \"{0}\" is defined more than once")]
    DuplicateZone(String),

    #[error("Zone ids must be non-empty and contain no spaces, found \"{0}\"")]
    InvalidZoneId(String),

    #[error("Zone \"{0}\" has a non-finite threshold")]
    InvalidThreshold(String),

    #[error("Moisture value {0} is not a finite number")]
    InvalidValue(f64),

    #[error("Could not publish the pump command: {0}")]
    BusError(#[from] CmdBusError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ZoneMgr {
    /// Build the manager from its parameters. All pumps start off.
    pub fn new(params: Params, bus: BusTx) -> Result<Self, ZoneError> {
        let mut zones: Vec<Zone> = Vec::with_capacity(params.zones.len());

        for z in params.zones {
            if z.id.is_empty() || z.id.contains(char::is_whitespace) {
                return Err(ZoneError::InvalidZoneId(z.id));
            }
            if zones.iter().any(|existing| existing.id == z.id) {
                return Err(ZoneError::DuplicateZone(z.id));
            }
            if !z.threshold.is_finite() {
                return Err(ZoneError::InvalidThreshold(z.id));
            }

            zones.push(Zone {
                id: z.id,
                devices: z.devices.into_iter().collect(),
                threshold: z.threshold,
                pump: false,
            });
        }

        // Sensors claimed by more than one zone only ever drive the first
        for (i, z) in zones.iter().enumerate() {
            for d in z.devices.iter() {
                if let Some(first) = zones[..i].iter().find(|p| p.devices.contains(d)) {
                    warn!(
                        "Sensor {} is listed in zones {} and {}, only zone {} will use it",
                        d, first.id, z.id, first.id
                    );
                }
            }
        }

        Ok(Self { zones, bus })
    }

    /// Handle a moisture reading.
    pub fn handle(&mut self, msg: &MoistureMsg) -> Result<ZoneOutcome, ZoneError> {
        if !msg.value.is_finite() {
            return Err(ZoneError::InvalidValue(msg.value));
        }

        let zone = match self.zones.iter_mut().find(|z| z.devices.contains(&msg.mac)) {
            Some(z) => z,
            None => {
                warn!("Unknown moisture sensor {}, ignoring", msg.mac);
                return Ok(ZoneOutcome::UnknownDevice(msg.mac.clone()));
            }
        };

        let pump = msg.value < zone.threshold;

        let cmd = RemotePumpCmd {
            zone: zone.id.clone(),
            on: pump,
        };
        self.bus.send(BusMsg::new(Topic::RemotePump, cmd.payload()))?;

        let changed = zone.pump != pump;
        zone.pump = pump;

        if changed {
            info!(
                "Zone {}: moisture {} is {} threshold {}, pump {}",
                zone.id,
                msg.value,
                if pump { "below" } else { "at or above" },
                zone.threshold,
                if pump { "ON" } else { "OFF" }
            );
        } else {
            debug!("Zone {}: moisture {}, pump stays {}", zone.id, msg.value, pump);
        }

        Ok(ZoneOutcome::Commanded {
            zone: zone.id.clone(),
            pump,
            changed,
        })
    }

    /// The pump demand of a zone.
    pub fn pump_state(&self, zone_id: &str) -> Option<bool> {
        self.zones.iter().find(|z| z.id == zone_id).map(|z| z.pump)
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cmd_bus::bus_channel;

    fn params() -> Params {
        util::params::from_str(
            r#"
            [[zone]]
            id = "A"
            devices = ["C0:49:EF:69:BF:DC", "BB:BB:BB:BB:BB:BB"]
            threshold = 10

            [[zone]]
            id = "B"
            devices = ["AA:AA:AA:AA:AA:AA", "BB:BB:BB:BB:BB:BB"]
            threshold = 20
            "#,
        )
        .unwrap()
    }

    fn reading(mac: &str, value: f64) -> MoistureMsg {
        MoistureMsg {
            mac: mac.into(),
            value,
        }
    }

    #[test]
    fn test_threshold_and_idempotence() {
        let (tx, rx) = bus_channel();
        let mut mgr = ZoneMgr::new(params(), tx).unwrap();

        let out = mgr.handle(&reading("C0:49:EF:69:BF:DC", 7.0)).unwrap();
        assert_eq!(
            out,
            ZoneOutcome::Commanded {
                zone: "A".into(),
                pump: true,
                changed: true
            }
        );

        // A repeat low reading confirms "on" without toggling
        let out = mgr.handle(&reading("C0:49:EF:69:BF:DC", 5.0)).unwrap();
        assert_eq!(
            out,
            ZoneOutcome::Commanded {
                zone: "A".into(),
                pump: true,
                changed: false
            }
        );
        assert_eq!(mgr.pump_state("A"), Some(true));

        // Equal to the threshold is "off"
        mgr.handle(&reading("C0:49:EF:69:BF:DC", 10.0)).unwrap();
        assert_eq!(mgr.pump_state("A"), Some(false));

        let sent: Vec<BusMsg> = rx.try_iter().collect();
        assert_eq!(
            sent,
            vec![
                BusMsg::new(Topic::RemotePump, "A 1"),
                BusMsg::new(Topic::RemotePump, "A 1"),
                BusMsg::new(Topic::RemotePump, "A 0"),
            ]
        );
    }

    #[test]
    fn test_first_match_wins() {
        let (tx, rx) = bus_channel();
        let mut mgr = ZoneMgr::new(params(), tx).unwrap();

        mgr.handle(&reading("BB:BB:BB:BB:BB:BB", 15.0)).unwrap();

        // Zone A claims the shared sensor, 15 >= 10 so its pump is off and B is untouched
        assert_eq!(mgr.pump_state("A"), Some(false));
        assert_eq!(mgr.pump_state("B"), Some(false));
        assert_eq!(rx.try_recv().unwrap(), BusMsg::new(Topic::RemotePump, "A 0"));
    }

    #[test]
    fn test_unknown_and_invalid() {
        let (tx, rx) = bus_channel();
        let mut mgr = ZoneMgr::new(params(), tx).unwrap();

        assert_eq!(
            mgr.handle(&reading("00:00:00:00:00:00", 1.0)).unwrap(),
            ZoneOutcome::UnknownDevice("00:00:00:00:00:00".into())
        );
        assert!(mgr.handle(&reading("AA:AA:AA:AA:AA:AA", f64::NAN)).is_err());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_invalid_config() {
        let (tx, _rx) = bus_channel();
        let mut p = params();
        p.zones[1].id = "A".into();
        assert!(matches!(
            ZoneMgr::new(p, tx.clone()),
            Err(ZoneError::DuplicateZone(_))
        ));

        let mut p = params();
        p.zones[0].id = "zone A".into();
        assert!(matches!(
            ZoneMgr::new(p, tx),
            Err(ZoneError::InvalidZoneId(_))
        ));
    }
}
