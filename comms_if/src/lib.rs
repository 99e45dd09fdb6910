//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software: the message bus topics and
//! their payloads, the control-surface telecommands, and the network layer.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Message bus topics and framing
pub mod bus;

/// Payload definitions for equipment on the bus (actuators, sensors, cameras)
pub mod eqpt;

/// Network module
pub mod net;

/// Control-surface telecommands
pub mod tc;
