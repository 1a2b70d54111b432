//! The navigation controller: command handling, the per-tick control loop
//! and the navigation state machine.
//!
//! The controller exclusively owns the active [`NavigationPath`] and the
//! click target. It is driven from two entry points, [`NavController::handle_command`]
//! and [`NavController::on_tick`], both called serially by the host. Every
//! call receives the collaborators it may touch through a [`NavEnv`].

mod observers;
mod orientation;
mod stuck;

#[cfg(test)]
mod tests;

use bevy::prelude::*;
use std::time::Duration;

use super::command::{NavCommand, OptionsCommand, HELP_LINES};
use super::config::NavConfig;
use super::destination::{resolve, DestinationInfo, NavRequest, NavigationOptions};
use super::error::NavError;
use super::host::{announce, AgentState, NavHost, NoticeLevel, NotifyLevel, ObjectRef, ZoneId};
use super::math::{planar_distance, swap_ground_axes};
use super::mesh::NavMeshQuery;
use super::path::NavigationPath;
use super::waypoints::{Waypoint, WaypointStore};

pub use observers::{ObserverId, PathEvent, PathObservers, PathSnapshot};
pub use stuck::StuckDetector;

/// Collaborators for one controller call.
pub struct NavEnv<'a> {
    pub host: &'a mut dyn NavHost,
    pub mesh: &'a mut dyn NavMeshQuery,
    pub waypoints: &'a mut dyn WaypointStore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavState {
    #[default]
    Idle,
    Active,
    Paused,
}

/// Why (or whether) the agent counts as arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    EnRoute,
    /// Every node of the path has been passed.
    EndOfPath,
    /// Within the requested stop distance (and in sight, when required).
    WithinStopDistance,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Paused,
    EnRoute,
    Arrived(Arrival),
    /// A re-plan found no path; navigation stopped.
    Lost,
}

#[derive(Resource, Debug)]
pub struct NavController {
    config: NavConfig,
    default_options: NavigationOptions,
    state: NavState,
    path: Option<NavigationPath>,
    click_target: Option<ObjectRef>,
    zone: Option<ZoneId>,
    last_replan: Duration,
    /// When a due re-plan was first held back because the agent was on a link.
    link_hold_since: Option<Duration>,
    last_click: Option<Duration>,
    current_waypoint: Option<Vec3>,
    stuck: StuckDetector,
    observers: PathObservers,
}

impl NavController {
    pub fn new(config: NavConfig) -> Self {
        Self {
            default_options: config.default_options,
            config,
            state: NavState::Idle,
            path: None,
            click_target: None,
            zone: None,
            last_replan: Duration::ZERO,
            link_hold_since: None,
            last_click: None,
            current_waypoint: None,
            stuck: StuckDetector::default(),
            observers: PathObservers::default(),
        }
    }

    // ============================================================================
    // Accessors
    // ============================================================================

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != NavState::Idle
    }

    pub fn is_paused(&self) -> bool {
        self.state == NavState::Paused
    }

    pub fn path(&self) -> Option<&NavigationPath> {
        self.path.as_ref()
    }

    pub fn click_target(&self) -> Option<ObjectRef> {
        self.click_target
    }

    pub fn zone(&self) -> Option<ZoneId> {
        self.zone
    }

    pub fn default_options(&self) -> NavigationOptions {
        self.default_options
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&PathEvent) + Send + Sync + 'static) -> ObserverId {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }

    // ============================================================================
    // Commands
    // ============================================================================

    /// Decode and run one command line.
    pub fn handle_line(&mut self, line: &str, env: &mut NavEnv, now: Duration) -> Result<(), NavError> {
        debug!("Handling command: {}", line);
        match NavCommand::parse(line) {
            Ok(command) => self.handle_command(command, env, now),
            Err(err) => Self::fail(env.host, NotifyLevel::All, err),
        }
    }

    /// Run one decoded command. Outcomes are announced through the host's
    /// notification sink as well as returned.
    pub fn handle_command(&mut self, command: NavCommand, env: &mut NavEnv, now: Duration) -> Result<(), NavError> {
        match command {
            NavCommand::Navigate(request) => self.begin_navigation(&request, env, now, NotifyLevel::All),
            NavCommand::Stop => self.stop(env),
            NavCommand::Pause => self.toggle_pause(env),
            NavCommand::Reload => self.reload_mesh(env),
            NavCommand::RecordWaypoint { name, description } => self.record_waypoint(&name, &description, env),
            NavCommand::ListWaypoints => self.list_waypoints(env).map(|_| ()),
            NavCommand::Options(OptionsCommand::Set(tokens)) => {
                self.set_default_options(&tokens, env);
                Ok(())
            }
            NavCommand::Options(OptionsCommand::Reset) => {
                self.reset_default_options(env);
                Ok(())
            }
            NavCommand::Help => {
                for line in HELP_LINES {
                    announce(env.host, NotifyLevel::All, NoticeLevel::Info, line);
                }
                Ok(())
            }
        }
    }

    /// Resolve `request` and start navigating towards it.
    ///
    /// A request that fails to resolve leaves the current navigation
    /// untouched. Anything past resolution replaces it.
    pub fn begin_navigation(
        &mut self,
        request: &NavRequest,
        env: &mut NavEnv,
        now: Duration,
        verbosity: NotifyLevel,
    ) -> Result<(), NavError> {
        let info = match self.resolve(request, env) {
            Ok(info) => info,
            Err(err) => return Self::fail(env.host, verbosity, err),
        };
        announce(env.host, verbosity, NoticeLevel::Info, &info.describe());

        self.teardown(env.host, false);

        if !env.mesh.is_loaded() {
            return Self::fail(env.host, verbosity, NavError::MeshUnavailable);
        }
        let Some(agent) = env.host.agent() else {
            return Self::fail(env.host, verbosity, NavError::NotInGame);
        };

        let click_target = info.click_target();
        let mut path = NavigationPath::new(info);
        if !path.find_path(agent.position, &*env.mesh) {
            return Self::fail(env.host, verbosity, NavError::NoPathFound);
        }

        self.observers.publish(&PathEvent::Updated(PathSnapshot::of(&path)));
        self.path = Some(path);
        self.state = NavState::Active;
        self.click_target = click_target;
        self.last_replan = now;
        self.link_hold_since = None;
        self.current_waypoint = None;
        Ok(())
    }

    pub fn stop(&mut self, env: &mut NavEnv) -> Result<(), NavError> {
        if !self.is_active() {
            return Self::fail(env.host, NotifyLevel::All, NavError::NotActive);
        }
        self.teardown(env.host, true);
        Ok(())
    }

    pub fn toggle_pause(&mut self, env: &mut NavEnv) -> Result<(), NavError> {
        match self.state {
            NavState::Idle => Self::fail(env.host, NotifyLevel::All, NavError::NotActiveForPause),
            NavState::Active => {
                self.state = NavState::Paused;
                env.host.set_forward(false);
                announce(env.host, NotifyLevel::All, NoticeLevel::Info, "Pausing navigation");
                Ok(())
            }
            NavState::Paused => {
                self.state = NavState::Active;
                announce(env.host, NotifyLevel::All, NoticeLevel::Info, "Resuming navigation");
                Ok(())
            }
        }
    }

    /// Reload the mesh from its source. An active path is searched again on
    /// the new mesh.
    pub fn reload_mesh(&mut self, env: &mut NavEnv) -> Result<(), NavError> {
        if let Err(err) = env.mesh.reload() {
            return Self::fail(env.host, NotifyLevel::All, NavError::Mesh(err));
        }
        announce(env.host, NotifyLevel::All, NoticeLevel::Info, "Navmesh reloaded");

        let Some(agent) = env.host.agent() else {
            return Ok(());
        };
        if let Some(path) = self.path.as_mut() {
            if path.find_path(agent.position, &*env.mesh) {
                self.observers.publish(&PathEvent::Updated(PathSnapshot::of(path)));
            } else {
                self.teardown(env.host, true);
                return Self::fail(env.host, NotifyLevel::All, NavError::NoPathFound);
            }
        }
        Ok(())
    }

    /// Record the agent's position as `name` in the current zone. An empty
    /// name only prints usage.
    pub fn record_waypoint(&mut self, name: &str, description: &str, env: &mut NavEnv) -> Result<(), NavError> {
        if name.is_empty() {
            announce(
                env.host,
                NotifyLevel::All,
                NoticeLevel::Info,
                "Usage: nav rwp <waypoint name> <waypoint description>",
            );
            return Ok(());
        }
        let (Some(agent), Some(zone)) = (env.host.agent(), env.host.zone()) else {
            return Self::fail(env.host, NotifyLevel::All, NavError::NotInGame);
        };

        env.waypoints.add_waypoint(
            zone,
            Waypoint {
                name: name.to_string(),
                location: agent.position,
                description: description.to_string(),
            },
        );
        let message = format!("Recorded waypoint: {} at {}", name, loc_string(agent.position));
        announce(env.host, NotifyLevel::All, NoticeLevel::Info, &message);
        Ok(())
    }

    /// Waypoints of the current zone, also announced one per line.
    pub fn list_waypoints(&self, env: &mut NavEnv) -> Result<Vec<Waypoint>, NavError> {
        let Some(zone) = env.host.zone() else {
            return Self::fail(env.host, NotifyLevel::All, NavError::NotInGame);
        };
        let waypoints = env.waypoints.waypoints(zone);

        let header = format!("{} waypoint(s) for zone {}:", waypoints.len(), zone);
        announce(env.host, NotifyLevel::All, NoticeLevel::Info, &header);
        for wp in &waypoints {
            let line = format!("  {}: {} {}", wp.name, wp.description, loc_string(wp.location));
            announce(env.host, NotifyLevel::All, NoticeLevel::Info, &line);
        }
        Ok(waypoints)
    }

    pub fn set_default_options(&mut self, tokens: &[String], env: &mut NavEnv) {
        let issues = self.default_options.apply_tokens(tokens.iter().map(String::as_str));
        for issue in issues {
            debug!("Ignoring option '{}': {}", issue.token, issue.reason);
        }
        let message = format!(
            "Default options: distance={} los={}",
            self.default_options.distance,
            if self.default_options.line_of_sight { "on" } else { "off" }
        );
        announce(env.host, NotifyLevel::All, NoticeLevel::Info, &message);
    }

    pub fn reset_default_options(&mut self, env: &mut NavEnv) {
        self.default_options = self.config.default_options;
        announce(env.host, NotifyLevel::All, NoticeLevel::Info, "Default options reset");
    }

    // ============================================================================
    // Queries that never touch the active navigation
    // ============================================================================

    /// Length of a path to `request`, or `None` when it cannot be resolved
    /// or reached. Only errors are announced.
    pub fn path_length(&self, request: &NavRequest, env: &mut NavEnv) -> Option<f32> {
        let path = self.throwaway_path(request, env)?;
        Some(path.traversal_distance())
    }

    pub fn can_navigate_to(&self, request: &NavRequest, env: &mut NavEnv) -> bool {
        self.throwaway_path(request, env).is_some()
    }

    fn throwaway_path(&self, request: &NavRequest, env: &mut NavEnv) -> Option<NavigationPath> {
        let info = match self.resolve(request, env) {
            Ok(info) => info,
            Err(err) => {
                announce(env.host, NotifyLevel::ErrorsOnly, NoticeLevel::Error, &err.to_string());
                return None;
            }
        };
        if !env.mesh.is_loaded() {
            return None;
        }
        let agent = env.host.agent()?;
        let mut path = NavigationPath::new(info);
        path.find_path(agent.position, &*env.mesh).then_some(path)
    }

    fn resolve(&self, request: &NavRequest, env: &NavEnv) -> Result<DestinationInfo, NavError> {
        resolve(request, &*env.host, &*env.waypoints, &self.config, self.default_options)
    }

    // ============================================================================
    // Host events
    // ============================================================================

    /// Zone transitions drop any navigation and the click target.
    pub fn on_zone_change(&mut self, zone: Option<ZoneId>, env: &mut NavEnv) {
        self.teardown(env.host, false);
        self.stuck.reset();
        if self.zone != zone {
            match zone {
                Some(id) => debug!("Switching to zone: {}", id),
                None => debug!("Resetting zone"),
            }
            self.zone = zone;
        }
    }

    pub fn on_movement_key_pressed(&mut self, env: &mut NavEnv) {
        if !self.is_active() {
            return;
        }
        if self.config.autobreak {
            self.teardown(env.host, true);
        } else if self.config.autopause && self.state == NavState::Active {
            self.state = NavState::Paused;
            env.host.set_forward(false);
            announce(env.host, NotifyLevel::All, NoticeLevel::Info, "Pausing navigation");
        }
    }

    /// A door or item despawned. Navigation continues towards its last
    /// known position but nothing will be clicked.
    pub fn on_object_removed(&mut self, object: ObjectRef) {
        if self.click_target == Some(object) {
            debug!("Click target {:?} removed", object);
            self.click_target = None;
        }
    }

    // ============================================================================
    // Control loop
    // ============================================================================

    /// One simulation tick.
    pub fn on_tick(&mut self, env: &mut NavEnv, now: Duration) -> TickOutcome {
        let Some(agent) = env.host.agent() else {
            return if self.is_active() { TickOutcome::EnRoute } else { TickOutcome::Idle };
        };

        let outcome = match self.state {
            NavState::Idle => TickOutcome::Idle,
            NavState::Paused => TickOutcome::Paused,
            NavState::Active => self.drive(&agent, env, now),
        };

        let navigating = self.state == NavState::Active;
        if self.stuck.sample(now, &agent, navigating, &self.config) {
            debug!("Stuck at {}, jumping", agent.position);
            env.host.set_jump(true);
            env.host.set_jump(false);
        }

        outcome
    }

    fn drive(&mut self, agent: &AgentState, env: &mut NavEnv, now: Duration) -> TickOutcome {
        let interval = self.config.replan_interval();
        let on_link = self.path.as_ref().is_some_and(NavigationPath::traversing_link);
        if !on_link {
            self.link_hold_since = None;
        }
        let due = now.saturating_sub(self.last_replan) >= interval;
        // A due re-plan waits at most one more interval for a link to finish.
        let held = on_link && due && now.saturating_sub(*self.link_hold_since.get_or_insert(now)) < interval;
        if due && !held {
            self.last_replan = now;
            self.link_hold_since = None;
            if on_link {
                debug!("Link crossing overdue at {}, searching a fresh path", agent.position);
            }
            if let Some(path) = self.path.as_mut() {
                path.update_path(agent.position, &*env.mesh, on_link, !on_link);
                if path.is_empty() {
                    announce(env.host, NotifyLevel::All, NoticeLevel::Warn, "Lost the path to the destination");
                    self.teardown(env.host, true);
                    return TickOutcome::Lost;
                }
                self.observers.publish(&PathEvent::Updated(PathSnapshot::of(path)));
            }
        }

        if let Some(target) = self.click_target {
            if env.host.object(target).is_none() {
                self.on_object_removed(target);
            }
        }

        let arrival = self.evaluate_arrival(agent, env.host);
        if arrival != Arrival::EnRoute {
            self.arrive(agent, env, now, arrival);
            return TickOutcome::Arrived(arrival);
        }

        self.step(agent, env);

        let arrival = self.evaluate_arrival(agent, env.host);
        if arrival != Arrival::EnRoute {
            self.arrive(agent, env, now, arrival);
            return TickOutcome::Arrived(arrival);
        }
        TickOutcome::EnRoute
    }

    /// End of path wins over the stop radius; the radius only counts when
    /// the destination is in sight or sight is not required.
    pub fn evaluate_arrival(&self, agent: &AgentState, host: &dyn NavHost) -> Arrival {
        let Some(path) = self.path.as_ref() else {
            return Arrival::EnRoute;
        };
        if path.is_empty() {
            return Arrival::EnRoute;
        }
        if path.is_at_end() {
            return Arrival::EndOfPath;
        }

        let options = path.destination_info().options;
        if options.distance > 0
            && planar_distance(agent.position, path.destination()) < options.distance as f32
            && (!options.line_of_sight || path.can_see_destination(host))
        {
            return Arrival::WithinStopDistance;
        }
        Arrival::EnRoute
    }

    fn step(&mut self, agent: &AgentState, env: &mut NavEnv) {
        if !agent.auto_running {
            env.host.set_forward(true);
        }

        let Some(path) = self.path.as_mut() else {
            return;
        };
        let Some(mut next) = path.next_node() else {
            return;
        };

        let link = path.next_is_link();
        let threshold = if link {
            self.config.link_progression_distance
        } else {
            self.config.waypoint_progression_distance
        };

        if planar_distance(agent.position, next.position) < threshold {
            path.increment();
            // Re-planning on top of a link would pull the agent back to it.
            if !path.is_at_end() && !link {
                path.update_path(agent.position, &*env.mesh, false, true);
                self.observers.publish(&PathEvent::Updated(PathSnapshot::of(path)));
            }
            if let Some(following) = path.next_node() {
                next = following;
            }
        }

        if self.current_waypoint != Some(next.position) {
            self.current_waypoint = Some(next.position);
            debug!("Moving towards: {}", loc_string(next.position));
        }

        env.host.face(orientation::facing_towards(agent, next.position, &self.config));
    }

    fn arrive(&mut self, agent: &AgentState, env: &mut NavEnv, now: Duration, arrival: Arrival) {
        let Some(destination) = self.path.as_ref().map(NavigationPath::destination) else {
            return;
        };
        let message = format!("Reached destination at: {}", loc_string(destination));
        announce(env.host, NotifyLevel::All, NoticeLevel::Info, &message);
        debug!("Arrival: {:?}", arrival);

        env.host.face(orientation::facing_towards(agent, destination, &self.config));
        self.attempt_click(agent, env, now);
        self.teardown(env.host, true);
    }

    fn attempt_click(&mut self, agent: &AgentState, env: &mut NavEnv, now: Duration) {
        let Some(target) = self.click_target else {
            return;
        };
        if agent.holding_cursor_item {
            debug!("Not clicking with an item on the cursor");
            return;
        }
        if self
            .last_click
            .is_some_and(|last| now < last + self.config.click_cooldown())
        {
            return;
        }
        self.last_click = Some(now);

        let Some(object) = env.host.object(target) else {
            return;
        };
        if planar_distance(agent.position, object.position) < self.config.click_radius {
            env.host.click(&object);
        }
    }

    /// Drop the active path. `announce_stop` releases forward movement and
    /// tells the user; zone changes and replaced requests skip the message.
    fn teardown(&mut self, host: &mut dyn NavHost, announce_stop: bool) {
        if self.is_active() {
            if announce_stop {
                announce(host, NotifyLevel::All, NoticeLevel::Info, "Stopping navigation");
            }
            host.set_forward(false);
        }
        if self.path.take().is_some() {
            self.observers.publish(&PathEvent::Cleared);
        }
        self.state = NavState::Idle;
        self.click_target = None;
        self.current_waypoint = None;
    }

    fn fail<T>(host: &mut dyn NavHost, verbosity: NotifyLevel, err: NavError) -> Result<T, NavError> {
        let level = match err {
            NavError::NotActiveForPause => NoticeLevel::Warn,
            _ => NoticeLevel::Error,
        };
        announce(host, verbosity, level, &err.to_string());
        Err(err)
    }
}

/// World position printed in the host's `y, x, z` display order.
fn loc_string(position: Vec3) -> String {
    let p = swap_ground_axes(position);
    format!("({:.2}, {:.2}, {:.2})", p.x, p.y, p.z)
}
