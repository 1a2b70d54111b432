use bevy::math::Vec3;

use crate::nav::config::NavConfig;
use crate::nav::host::{AgentState, Facing};
use crate::nav::math::heading_towards;

/// Heading and pitch that point `agent` at `target` (world space).
///
/// Pitch depends on how the agent moves: swimming aims straight at the
/// target, levitating uses fixed up/level/down bands, walking stays level.
pub(super) fn facing_towards(agent: &AgentState, target: Vec3, config: &NavConfig) -> Facing {
    let heading = heading_towards(agent.position, target);

    let pitch = if agent.submerged {
        let distance = agent.position.distance(target);
        (target.z - agent.position.z).atan2(distance).to_degrees()
    } else if agent.levitating {
        if target.z < agent.floor_height {
            -config.levitate_pitch_deg
        } else if target.z > agent.position.z + config.levitate_head_offset {
            config.levitate_pitch_deg
        } else {
            0.0
        }
    } else {
        0.0
    };

    Facing { heading, pitch }
}
