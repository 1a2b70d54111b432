//! Named per-zone waypoints.

use bevy::math::Vec3;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::host::ZoneId;

/// A recorded location. `location` is world space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub name: String,
    pub location: Vec3,
    #[serde(default)]
    pub description: String,
}

pub trait WaypointStore {
    /// Exact-name lookup within `zone`.
    fn waypoint(&self, zone: ZoneId, name: &str) -> Option<Waypoint>;

    /// All waypoints of `zone` in recording order.
    fn waypoints(&self, zone: ZoneId) -> Vec<Waypoint>;

    /// Record `waypoint`, replacing any existing one with the same name.
    fn add_waypoint(&mut self, zone: ZoneId, waypoint: Waypoint);
}

/// In-memory [`WaypointStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaypointBook {
    zones: FxHashMap<ZoneId, Vec<Waypoint>>,
}

impl WaypointBook {
    pub fn from_ron_str(contents: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(contents)
    }

    pub fn len(&self, zone: ZoneId) -> usize {
        self.zones.get(&zone).map_or(0, Vec::len)
    }
}

impl WaypointStore for WaypointBook {
    fn waypoint(&self, zone: ZoneId, name: &str) -> Option<Waypoint> {
        self.zones.get(&zone)?.iter().find(|w| w.name == name).cloned()
    }

    fn waypoints(&self, zone: ZoneId) -> Vec<Waypoint> {
        self.zones.get(&zone).cloned().unwrap_or_default()
    }

    fn add_waypoint(&mut self, zone: ZoneId, waypoint: Waypoint) {
        let entries = self.zones.entry(zone).or_default();
        match entries.iter_mut().find(|w| w.name == waypoint.name) {
            Some(existing) => *existing = waypoint,
            None => entries.push(waypoint),
        }
    }
}
