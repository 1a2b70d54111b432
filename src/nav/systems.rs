use bevy::prelude::*;
use std::path::Path;

use super::controller::{NavController, NavEnv, TickOutcome};
use super::host::NavHost;
use super::mesh::PolyNavMesh;
use super::profiling::profile;
use super::sim_host::SimulatedHost;
use super::{
    MovementKeyPressed, NavClock, NavCommandLine, NavCommandMessage, NavConfig, NavMesh, NavigationFinished,
    ObjectRemoved, PathChanged, PathEventRelay, Waypoints, ZoneChanged,
};
use crate::profile_log;

fn nav_env<'a>(host: &'a mut dyn NavHost, mesh: &'a mut NavMesh, waypoints: &'a mut Waypoints) -> NavEnv<'a> {
    NavEnv {
        host,
        mesh: &mut *mesh.0,
        waypoints: &mut *waypoints.0,
    }
}

/// Create the controller from the loaded config and hook its path events
/// up to the relay.
pub(crate) fn init_controller(
    mut commands: Commands,
    config: Res<NavConfig>,
    relay: Res<PathEventRelay>,
    existing: Option<Res<NavController>>,
    mut clock: ResMut<NavClock>,
    mut fixed_time: ResMut<Time<Fixed>>,
) {
    fixed_time.set_timestep_hz(config.tick_rate);
    clock.set_tick_duration(config.tick_duration());
    info!("Navigation tick rate {} Hz", config.tick_rate);

    if existing.is_some() {
        return;
    }
    let mut controller = NavController::new(config.clone());
    let relay = relay.clone();
    controller.subscribe(move |event| relay.push(event.clone()));
    commands.insert_resource(controller);
}

pub(crate) fn load_nav_mesh(file: Option<&Path>, mut mesh: ResMut<NavMesh>) {
    let Some(file) = file else {
        return;
    };
    match PolyNavMesh::load(file) {
        Ok(loaded) => mesh.0 = Box::new(loaded),
        Err(e) => {
            error!("Failed to load navmesh {}: {}", file.display(), e);
            error!("Navigation stays unavailable until a mesh is reloaded");
        }
    }
}

pub(crate) fn handle_zone_changes<H: NavHost + Resource>(
    mut zones: MessageReader<ZoneChanged>,
    mut controller: ResMut<NavController>,
    mut host: ResMut<H>,
    mut mesh: ResMut<NavMesh>,
    mut waypoints: ResMut<Waypoints>,
) {
    for ZoneChanged(zone) in zones.read() {
        let mut env = nav_env(&mut *host, &mut mesh, &mut waypoints);
        controller.on_zone_change(*zone, &mut env);
    }
}

pub(crate) fn handle_nav_commands<H: NavHost + Resource>(
    clock: Res<NavClock>,
    mut lines: MessageReader<NavCommandLine>,
    mut decoded: MessageReader<NavCommandMessage>,
    mut controller: ResMut<NavController>,
    mut host: ResMut<H>,
    mut mesh: ResMut<NavMesh>,
    mut waypoints: ResMut<Waypoints>,
) {
    let mut env = nav_env(&mut *host, &mut mesh, &mut waypoints);

    for NavCommandLine(line) in lines.read() {
        if let Err(e) = controller.handle_line(line, &mut env, clock.now()) {
            debug!("Command '{}' failed: {}", line, e);
        }
    }
    for NavCommandMessage(command) in decoded.read() {
        if let Err(e) = controller.handle_command(command.clone(), &mut env, clock.now()) {
            debug!("Command {:?} failed: {}", command, e);
        }
    }
}

pub(crate) fn handle_host_events<H: NavHost + Resource>(
    mut keys: MessageReader<MovementKeyPressed>,
    mut removed: MessageReader<ObjectRemoved>,
    mut controller: ResMut<NavController>,
    mut host: ResMut<H>,
    mut mesh: ResMut<NavMesh>,
    mut waypoints: ResMut<Waypoints>,
) {
    for ObjectRemoved(object) in removed.read() {
        controller.on_object_removed(*object);
    }
    if keys.read().count() > 0 {
        let mut env = nav_env(&mut *host, &mut mesh, &mut waypoints);
        controller.on_movement_key_pressed(&mut env);
    }
}

/// One control loop tick.
#[profile(2)]
pub(crate) fn drive_navigation<H: NavHost + Resource>(
    mut clock: ResMut<NavClock>,
    mut controller: ResMut<NavController>,
    mut host: ResMut<H>,
    mut mesh: ResMut<NavMesh>,
    mut waypoints: ResMut<Waypoints>,
    mut finished: MessageWriter<NavigationFinished>,
) {
    clock.advance();
    let now = clock.now();

    let mut env = nav_env(&mut *host, &mut mesh, &mut waypoints);
    let outcome = controller.on_tick(&mut env, now);
    if matches!(outcome, TickOutcome::Arrived(_) | TickOutcome::Lost) {
        finished.write(NavigationFinished(outcome));
    }

    profile_log!(
        clock,
        "[NAV STATUS] Tick: {} | State: {:?} | Nodes: {}",
        clock.ticks(),
        controller.state(),
        controller.path().map_or(0, |p| p.len())
    );
}

pub(crate) fn relay_path_events(relay: Res<PathEventRelay>, mut changed: MessageWriter<PathChanged>) {
    for event in relay.drain() {
        changed.write(PathChanged(event));
    }
}

/// Moves a [`SimulatedHost`] agent by one navigation tick. Apps using the
/// simulated host schedule this after [`super::NavSet::Output`].
pub fn step_simulated_host(mut host: ResMut<SimulatedHost>, clock: Res<NavClock>) {
    host.step(clock.tick_duration().as_secs_f32());
}
