use bevy::math::Vec3;
use std::time::Duration;

use crate::nav::config::NavConfig;
use crate::nav::host::AgentState;
use crate::nav::math::planar_distance;

/// Samples the agent's position at a fixed cadence and reports when it moved
/// less than its speed says it should have.
#[derive(Debug, Clone, Default)]
pub struct StuckDetector {
    last_position: Option<Vec3>,
    last_sample: Option<Duration>,
}

impl StuckDetector {
    /// Take a sample if the interval elapsed. Returns `true` when the agent
    /// should jump. `navigating` is false while idle or paused; samples are
    /// still recorded then so resuming starts from a fresh position.
    pub fn sample(&mut self, now: Duration, agent: &AgentState, navigating: bool, config: &NavConfig) -> bool {
        if !config.attempt_unstuck {
            return false;
        }

        let interval = config.stuck_check_interval();
        if let Some(last) = self.last_sample {
            if now.saturating_sub(last) < interval {
                return false;
            }
        }

        let expected = agent.speed * interval.as_secs_f32() * config.stuck_displacement_ratio;
        let stuck = navigating
            && agent.speed > 0.0
            && !agent.levitating
            && !agent.submerged
            && !agent.stunned
            && self
                .last_position
                .is_some_and(|last| planar_distance(last, agent.position) < expected);

        self.last_position = Some(agent.position);
        self.last_sample = Some(now);
        stuck
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
