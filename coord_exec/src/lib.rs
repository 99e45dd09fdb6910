//! # Coordinator library.
//!
//! This library allows the coordinator executable and the integration tests to access the items
//! defined inside the coordinator crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Actuator mapping - converts controller outputs into drive/steer levels
pub mod act_map;

/// Bus client - connects the engine to the message broker
pub mod bus_client;

/// Command bus - in-process queues, the safety override and the cancellation signal
pub mod cmd_bus;

/// Coordinator - owns the operating mode and runs the control cycle
pub mod coordinator;

/// Localisation module - heading, GPS fixes and the position/heading trace
pub mod loc;

/// Operating modes
pub mod mode;

/// Navigation worker - drives the robot through a list of waypoints
pub mod nav_worker;

/// PID controller
pub mod pid;

/// Telecommand client - serves the control surface
pub mod tc_client;

/// Tracking controller - keeps the detected target centred at the desired size
pub mod track_ctrl;

/// Zone manager - irrigation decisions from moisture telemetry
pub mod zone_mgr;
