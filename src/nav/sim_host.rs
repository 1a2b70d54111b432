//! A headless kinematic host.
//!
//! Walks the agent along its heading while forward is held and records every
//! command it receives. Used by the demo binary and the tests.

use bevy::prelude::*;

use super::host::{
    AgentState, Facing, MovementPrimitives, NoticeLevel, NotificationSink, ObjectKind, ObjectRef, SpawnId, SpawnInfo,
    WorldObject, WorldQueries, ZoneId,
};

#[derive(Resource, Debug, Clone)]
pub struct SimulatedHost {
    pub zone: Option<ZoneId>,
    /// `None` while not in game.
    pub agent: Option<AgentState>,
    /// World units per second while forward is held.
    pub walk_speed: f32,
    /// The agent presses against something and does not move.
    pub blocked: bool,
    pub spawns: Vec<SpawnInfo>,
    pub target: Option<SpawnId>,
    pub doors: Vec<WorldObject>,
    pub items: Vec<WorldObject>,
    pub door_target: Option<u32>,
    pub item_target: Option<u32>,
    pub line_of_sight: bool,

    pub forward: bool,
    pub jump_held: bool,
    pub jumps: u32,
    pub facing: Facing,
    pub clicks: Vec<ObjectRef>,
    pub notices: Vec<(NoticeLevel, String)>,
}

impl SimulatedHost {
    pub fn new(zone: ZoneId, position: Vec3) -> Self {
        Self {
            zone: Some(zone),
            agent: Some(AgentState {
                position,
                floor_height: position.z,
                ..default()
            }),
            walk_speed: 20.0,
            blocked: false,
            spawns: Vec::new(),
            target: None,
            doors: Vec::new(),
            items: Vec::new(),
            door_target: None,
            item_target: None,
            line_of_sight: true,
            forward: false,
            jump_held: false,
            jumps: 0,
            facing: Facing::default(),
            clicks: Vec::new(),
            notices: Vec::new(),
        }
    }

    pub fn position(&self) -> Vec3 {
        self.agent.as_ref().map_or(Vec3::ZERO, |a| a.position)
    }

    pub fn agent_mut(&mut self) -> Option<&mut AgentState> {
        self.agent.as_mut()
    }

    pub fn teleport(&mut self, position: Vec3) {
        if let Some(agent) = self.agent.as_mut() {
            agent.position = position;
            agent.floor_height = position.z;
        }
    }

    pub fn add_spawn(&mut self, id: SpawnId, name: &str, position: Vec3) {
        self.spawns.push(SpawnInfo {
            id,
            name: name.to_string(),
            position,
            floor_height: position.z,
        });
    }

    pub fn add_object(&mut self, kind: ObjectKind, id: u32, name: &str, position: Vec3) -> ObjectRef {
        let handle = ObjectRef { kind, id };
        let object = WorldObject {
            handle,
            name: name.to_string(),
            position,
        };
        match kind {
            ObjectKind::Door => self.doors.push(object),
            ObjectKind::GroundItem => self.items.push(object),
        }
        handle
    }

    pub fn remove_object(&mut self, handle: ObjectRef) {
        let list = match handle.kind {
            ObjectKind::Door => &mut self.doors,
            ObjectKind::GroundItem => &mut self.items,
        };
        list.retain(|o| o.handle != handle);
    }

    pub fn messages_at(&self, level: NoticeLevel) -> Vec<&str> {
        self.notices
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.as_str())
            .collect()
    }

    /// Advance the simulation by `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        let (forward, blocked, walk_speed, heading) = (self.forward, self.blocked, self.walk_speed, self.facing.heading);
        let Some(agent) = self.agent.as_mut() else {
            return;
        };

        agent.speed = if forward { walk_speed } else { 0.0 };
        if !forward || blocked || agent.stunned {
            return;
        }
        let radians = heading.to_radians();
        let direction = Vec3::new(radians.sin(), radians.cos(), 0.0);
        agent.position += direction * walk_speed * dt;
    }
}

impl WorldQueries for SimulatedHost {
    fn zone(&self) -> Option<ZoneId> {
        self.zone
    }

    fn agent(&self) -> Option<AgentState> {
        self.agent.clone()
    }

    fn targeted_spawn(&self) -> Option<SpawnInfo> {
        let id = self.target?;
        self.spawn_by_id(id)
    }

    fn spawn_by_id(&self, id: SpawnId) -> Option<SpawnInfo> {
        self.spawns.iter().find(|s| s.id == id).cloned()
    }

    fn search_spawns(&self, query: &str) -> Option<SpawnInfo> {
        let query = query.to_ascii_lowercase();
        let origin = self.position();
        self.spawns
            .iter()
            .filter(|s| s.name.to_ascii_lowercase().contains(&query))
            .min_by(|a, b| a.position.distance(origin).total_cmp(&b.position.distance(origin)))
            .cloned()
    }

    fn targeted_object(&self, kind: ObjectKind) -> Option<WorldObject> {
        let id = match kind {
            ObjectKind::Door => self.door_target?,
            ObjectKind::GroundItem => self.item_target?,
        };
        self.object(ObjectRef { kind, id })
    }

    fn objects(&self, kind: ObjectKind) -> Vec<WorldObject> {
        match kind {
            ObjectKind::Door => self.doors.clone(),
            ObjectKind::GroundItem => self.items.clone(),
        }
    }

    fn line_of_sight(&self, _from: Vec3, _to: Vec3) -> bool {
        self.line_of_sight
    }
}

impl MovementPrimitives for SimulatedHost {
    fn set_forward(&mut self, pressed: bool) {
        self.forward = pressed;
    }

    fn set_jump(&mut self, pressed: bool) {
        if pressed && !self.jump_held {
            self.jumps += 1;
        }
        self.jump_held = pressed;
    }

    fn face(&mut self, facing: Facing) {
        self.facing = facing;
    }

    fn click(&mut self, object: &WorldObject) {
        self.clicks.push(object.handle);
    }
}

impl NotificationSink for SimulatedHost {
    fn notify(&mut self, level: NoticeLevel, message: &str) {
        self.notices.push((level, message.to_string()));
    }
}
