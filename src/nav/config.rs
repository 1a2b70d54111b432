use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::destination::NavigationOptions;

pub const NAV_CONFIG_PATH: &str = "assets/nav_config.ron";

/// Navigation tuning loaded once at startup.
///
/// Values are plain floats/millis so the RON file stays human readable;
/// the `Duration` accessors below are the single conversion point used by
/// the controller.
#[derive(Resource, Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct NavConfig {
    // Driver
    pub tick_rate: f64,

    // Path following
    pub replan_interval_ms: u64,
    pub waypoint_progression_distance: f32,
    pub link_progression_distance: f32,

    // Stuck recovery
    pub stuck_check_interval_ms: u64,
    pub stuck_displacement_ratio: f32,
    pub attempt_unstuck: bool,

    // Click on arrival
    pub click_radius: f32,
    pub click_cooldown_ms: u64,

    // Destination resolution
    pub z_filter: f32,
    pub use_spawn_floor_height: bool,

    // Orientation
    pub levitate_head_offset: f32,
    pub levitate_pitch_deg: f32,

    // Movement key handling
    pub autobreak: bool,
    pub autopause: bool,

    pub default_options: NavigationOptions,
}

impl NavConfig {
    pub fn from_ron_str(contents: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(contents)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1.0))
    }

    pub fn replan_interval(&self) -> Duration {
        Duration::from_millis(self.replan_interval_ms)
    }

    pub fn stuck_check_interval(&self) -> Duration {
        Duration::from_millis(self.stuck_check_interval_ms)
    }

    pub fn click_cooldown(&self) -> Duration {
        Duration::from_millis(self.click_cooldown_ms)
    }
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            replan_interval_ms: 2000,
            waypoint_progression_distance: 5.0,
            link_progression_distance: 1.0,
            stuck_check_interval_ms: 100,
            stuck_displacement_ratio: 1.0 / 60.0,
            attempt_unstuck: true,
            click_radius: 25.0,
            click_cooldown_ms: 500,
            z_filter: 10000.0,
            use_spawn_floor_height: false,
            levitate_head_offset: 5.0,
            levitate_pitch_deg: 45.0,
            autobreak: false,
            autopause: false,
            default_options: NavigationOptions::default(),
        }
    }
}

/// Read [`NavConfig`] from disk, falling back to defaults on any failure.
pub fn read_nav_config(path: &str) -> NavConfig {
    match std::fs::read_to_string(path) {
        Ok(contents) => match NavConfig::from_ron_str(&contents) {
            Ok(config) => {
                info!("Loaded navigation config from {}", path);
                config
            }
            Err(e) => {
                error!("Failed to parse navigation config: {}", e);
                error!("Using default NavConfig");
                NavConfig::default()
            }
        },
        Err(e) => {
            error!("Failed to read {}: {}", path, e);
            error!("Using default NavConfig");
            NavConfig::default()
        }
    }
}

/// Startup system: insert the config unless the app already provided one.
pub(crate) fn load_nav_config(mut commands: Commands, existing: Option<Res<NavConfig>>) {
    if existing.is_some() {
        return;
    }
    commands.insert_resource(read_nav_config(NAV_CONFIG_PATH));
}
