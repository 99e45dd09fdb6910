//! Parameters structure for ZoneMgr

use serde::Deserialize;

/// Zone configuration, loaded from `zones.toml`.
///
/// Zones are matched in file order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Params {
    #[serde(default, rename = "zone")]
    pub zones: Vec<ZoneParams>,
}

/// Configuration of a single zone.
#[derive(Debug, Clone, Deserialize)]
pub struct ZoneParams {
    /// Zone name, used in the remote pump payload.
    pub id: String,

    /// Sensor identifiers (MAC addresses) belonging to the zone.
    pub devices: Vec<String>,

    /// The pump runs while moisture is strictly below this value.
    pub threshold: f64,
}
