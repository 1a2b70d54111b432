//! Interfaces to the host application.
//!
//! The host owns world state and the low-level movement primitives; the
//! navigation core only talks to it through these traits. All positions
//! crossing this boundary are in world space (see [`super::math`]).

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

pub type ZoneId = u32;
pub type SpawnId = u32;

/// Snapshot of the controlled character.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentState {
    pub position: Vec3,
    pub floor_height: f32,
    /// Current movement speed in world units per second. Zero while rooted.
    pub speed: f32,
    pub submerged: bool,
    pub levitating: bool,
    pub stunned: bool,
    /// Host-side auto-run is already moving the agent forward.
    pub auto_running: bool,
    pub holding_cursor_item: bool,
}

impl Default for AgentState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            floor_height: 0.0,
            speed: 0.0,
            submerged: false,
            levitating: false,
            stunned: false,
            auto_running: false,
            holding_cursor_item: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpawnInfo {
    pub id: SpawnId,
    pub name: String,
    pub position: Vec3,
    pub floor_height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Door,
    GroundItem,
}

/// Stable handle to a door or ground item. Holding one never keeps the
/// object alive; it is re-looked-up whenever it is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub id: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorldObject {
    pub handle: ObjectRef,
    pub name: String,
    pub position: Vec3,
}

/// Orientation request in degrees: heading on the compass (0 = +y), pitch
/// positive upwards.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Facing {
    pub heading: f32,
    pub pitch: f32,
}

pub trait WorldQueries {
    fn zone(&self) -> Option<ZoneId>;

    /// `None` while the host is not in a playable state.
    fn agent(&self) -> Option<AgentState>;

    fn targeted_spawn(&self) -> Option<SpawnInfo>;
    fn spawn_by_id(&self, id: SpawnId) -> Option<SpawnInfo>;
    fn search_spawns(&self, query: &str) -> Option<SpawnInfo>;

    fn targeted_object(&self, kind: ObjectKind) -> Option<WorldObject>;
    fn objects(&self, kind: ObjectKind) -> Vec<WorldObject>;

    fn object(&self, handle: ObjectRef) -> Option<WorldObject> {
        self.objects(handle.kind)
            .into_iter()
            .find(|o| o.handle == handle)
    }

    fn line_of_sight(&self, from: Vec3, to: Vec3) -> bool;
}

pub trait MovementPrimitives {
    fn set_forward(&mut self, pressed: bool);
    fn set_jump(&mut self, pressed: bool);
    fn face(&mut self, facing: Facing);
    fn click(&mut self, object: &WorldObject);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NoticeLevel {
    Debug,
    Info,
    Warn,
    Error,
}

pub trait NotificationSink {
    fn notify(&mut self, level: NoticeLevel, message: &str);
}

/// Everything the controller needs from the host in one object.
pub trait NavHost: WorldQueries + MovementPrimitives + NotificationSink {}

impl<T: WorldQueries + MovementPrimitives + NotificationSink + ?Sized> NavHost for T {}

/// Caller-selected verbosity for user-visible notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifyLevel {
    Silent,
    ErrorsOnly,
    #[default]
    All,
}

impl NotifyLevel {
    pub fn admits(self, level: NoticeLevel) -> bool {
        match self {
            NotifyLevel::Silent => false,
            NotifyLevel::ErrorsOnly => level >= NoticeLevel::Error,
            NotifyLevel::All => level >= NoticeLevel::Info,
        }
    }
}

/// Log `message` and forward it to the host sink if `verbosity` admits it.
pub fn announce(
    sink: &mut (impl NotificationSink + ?Sized),
    verbosity: NotifyLevel,
    level: NoticeLevel,
    message: &str,
) {
    match level {
        NoticeLevel::Debug => debug!("{}", message),
        NoticeLevel::Info => info!("{}", message),
        NoticeLevel::Warn => warn!("{}", message),
        NoticeLevel::Error => error!("{}", message),
    }

    if verbosity.admits(level) {
        sink.notify(level, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Vec<(NoticeLevel, String)>);

    impl NotificationSink for Recorder {
        fn notify(&mut self, level: NoticeLevel, message: &str) {
            self.0.push((level, message.to_string()));
        }
    }

    #[test]
    fn verbosity_filters_forwarded_notices() {
        let mut sink = Recorder::default();
        announce(&mut sink, NotifyLevel::All, NoticeLevel::Debug, "dbg");
        announce(&mut sink, NotifyLevel::All, NoticeLevel::Info, "info");
        announce(&mut sink, NotifyLevel::ErrorsOnly, NoticeLevel::Warn, "warn");
        announce(&mut sink, NotifyLevel::ErrorsOnly, NoticeLevel::Error, "err");
        announce(&mut sink, NotifyLevel::Silent, NoticeLevel::Error, "silent");

        let forwarded: Vec<&str> = sink.0.iter().map(|(_, m)| m.as_str()).collect();
        assert_eq!(forwarded, vec!["info", "err"]);
    }
}
