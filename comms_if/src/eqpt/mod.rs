//! # Equipment Interface
//!
//! This module defines the payloads which are exchanged with equipment over the message bus.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod cam;
pub mod ctrl;
pub mod det;
pub mod gps;
pub mod imu;
pub mod moisture;
pub mod pump;
