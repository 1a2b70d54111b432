/// Tests for the navigation controller: command handling, the tick loop and
/// the state machine.
use super::*;
use crate::nav::host::{ObjectKind, WorldQueries};
use crate::nav::mesh::{NodeKind, PolyNavMesh};
use crate::nav::sim_host::SimulatedHost;
use crate::nav::waypoints::WaypointBook;
use std::sync::{Arc, Mutex};

const DT: f32 = 1.0 / 60.0;

struct Rig {
    host: SimulatedHost,
    mesh: PolyNavMesh,
    book: WaypointBook,
    controller: NavController,
    now: Duration,
}

impl Rig {
    /// 100 x 100 open floor at z = 0, agent near the origin.
    fn new() -> Self {
        Self::with_mesh(PolyNavMesh::grid(20, 20, 5.0, Vec3::ZERO, |_, _| true))
    }

    fn with_mesh(mesh: PolyNavMesh) -> Self {
        Self {
            host: SimulatedHost::new(1, Vec3::new(5.0, 5.0, 0.0)),
            mesh,
            book: WaypointBook::default(),
            controller: NavController::new(NavConfig::default()),
            now: Duration::ZERO,
        }
    }

    fn with_env<R>(&mut self, f: impl FnOnce(&mut NavController, &mut NavEnv, Duration) -> R) -> R {
        let mut env = NavEnv {
            host: &mut self.host,
            mesh: &mut self.mesh,
            waypoints: &mut self.book,
        };
        f(&mut self.controller, &mut env, self.now)
    }

    fn command(&mut self, line: &str) -> Result<(), NavError> {
        self.with_env(|c, env, now| c.handle_line(line, env, now))
    }

    fn tick(&mut self) -> TickOutcome {
        let outcome = self.with_env(|c, env, now| c.on_tick(env, now));
        self.host.step(DT);
        self.now += Duration::from_secs_f32(DT);
        outcome
    }

    /// Tick until something other than `EnRoute` happens.
    fn run(&mut self, max_ticks: usize) -> TickOutcome {
        for _ in 0..max_ticks {
            let outcome = self.tick();
            if outcome != TickOutcome::EnRoute {
                return outcome;
            }
        }
        TickOutcome::EnRoute
    }

    fn index(&self) -> usize {
        self.controller.path().map_or(usize::MAX, NavigationPath::index)
    }
}

fn request(line: &str) -> NavRequest {
    match NavCommand::parse(line) {
        Ok(NavCommand::Navigate(request)) => request,
        other => panic!("'{}' is not a navigate command: {:?}", line, other),
    }
}

#[test]
fn walks_to_destination_and_stops() {
    let mut rig = Rig::new();
    rig.command("locxyz 80 60 0").expect("reachable");
    assert_eq!(rig.controller.state(), NavState::Active);
    assert!(rig.host.messages_at(NoticeLevel::Info).iter().any(|m| m.starts_with("Navigating to loc")));

    let outcome = rig.run(2000);
    assert_eq!(outcome, TickOutcome::Arrived(Arrival::EndOfPath));
    assert_eq!(rig.controller.state(), NavState::Idle);
    assert!(rig.controller.path().is_none());
    assert!(!rig.host.forward, "forward is released on arrival");

    let distance = planar_distance(rig.host.position(), Vec3::new(80.0, 60.0, 0.0));
    assert!(distance < NavConfig::default().waypoint_progression_distance + 1.0, "stopped {} away", distance);
    assert!(rig.host.messages_at(NoticeLevel::Info).iter().any(|m| m.starts_with("Reached destination")));
}

#[test]
fn failed_resolution_keeps_active_path() {
    let mut rig = Rig::new();
    rig.command("locxyz 80 60 0").expect("reachable");
    let before = rig.controller.path().cloned().expect("path");

    for line in ["id 999", "wp nowhere", "door", "loc 1 2", "target"] {
        assert!(rig.command(line).is_err(), "'{}' should fail", line);
        let after = rig.controller.path().expect("still navigating");
        assert_eq!(after.destination_info(), before.destination_info(), "after '{}'", line);
        assert_eq!(after.revision(), before.revision());
        assert_eq!(rig.controller.state(), NavState::Active);
    }
    assert_eq!(rig.host.messages_at(NoticeLevel::Error).len(), 5);
}

#[test]
fn stop_while_idle_is_an_error_without_state_change() {
    let mut rig = Rig::new();
    let result = rig.command("stop");
    assert!(matches!(result, Err(NavError::NotActive)));
    assert_eq!(rig.host.messages_at(NoticeLevel::Error), vec!["No navigation path currently active"]);
    assert_eq!(rig.controller.state(), NavState::Idle);
    assert!(rig.controller.path().is_none());
}

#[test]
fn stop_releases_forward_and_clears() {
    let mut rig = Rig::new();
    rig.command("locxyz 80 60 0").expect("reachable");
    rig.tick();
    assert!(rig.host.forward);

    rig.command("stop").expect("active");
    assert!(!rig.host.forward);
    assert_eq!(rig.controller.state(), NavState::Idle);
    assert!(rig.host.messages_at(NoticeLevel::Info).contains(&"Stopping navigation"));
}

#[test]
fn radius_arrival_ignores_remaining_nodes() {
    let mut rig = Rig::new();
    rig.command("locxyz 80 60 0 distance=10").expect("reachable");
    rig.tick();
    assert!(!rig.controller.path().expect("path").is_at_end());

    rig.host.teleport(Vec3::new(74.0, 55.0, 0.0));
    assert_eq!(rig.tick(), TickOutcome::Arrived(Arrival::WithinStopDistance));
    assert_eq!(rig.controller.state(), NavState::Idle);
}

#[test]
fn line_of_sight_gates_radius_arrival() {
    let mut rig = Rig::new();
    rig.command("locxyz 80 60 0 distance=10 los=on").expect("reachable");
    rig.host.line_of_sight = false;
    rig.host.teleport(Vec3::new(74.0, 55.0, 0.0));

    assert_eq!(rig.tick(), TickOutcome::EnRoute);
    assert_eq!(rig.controller.state(), NavState::Active);

    rig.host.line_of_sight = true;
    assert_eq!(rig.tick(), TickOutcome::Arrived(Arrival::WithinStopDistance));
}

#[test]
fn evaluate_arrival_prefers_end_of_path() {
    let mut rig = Rig::new();
    rig.command("locxyz 9 5 0 distance=50").expect("reachable");
    let agent = rig.host.agent().expect("in game");
    assert_eq!(
        rig.controller.evaluate_arrival(&agent, &rig.host),
        Arrival::WithinStopDistance
    );

    if let Some(path) = rig.controller.path.as_mut() {
        while !path.is_at_end() {
            path.increment();
        }
    }
    assert_eq!(rig.controller.evaluate_arrival(&agent, &rig.host), Arrival::EndOfPath);
}

#[test]
fn pause_freezes_index_and_resume_continues() {
    let mut rig = Rig::new();
    rig.command("locxyz 80 60 0").expect("reachable");
    for _ in 0..20 {
        rig.tick();
    }

    rig.command("pause").expect("active");
    assert_eq!(rig.controller.state(), NavState::Paused);
    assert!(!rig.host.forward);
    assert!(rig.host.messages_at(NoticeLevel::Info).contains(&"Pausing navigation"));
    let index = rig.index();
    let position = rig.host.position();

    for _ in 0..300 {
        assert_eq!(rig.tick(), TickOutcome::Paused);
    }
    assert_eq!(rig.index(), index);
    assert_eq!(rig.host.position(), position);

    rig.command("pause").expect("paused");
    assert_eq!(rig.controller.state(), NavState::Active);
    assert_eq!(rig.index(), index);
    assert!(rig.host.messages_at(NoticeLevel::Info).contains(&"Resuming navigation"));
}

#[test]
fn pause_while_idle_warns() {
    let mut rig = Rig::new();
    assert!(matches!(rig.command("pause"), Err(NavError::NotActiveForPause)));
    assert_eq!(rig.host.messages_at(NoticeLevel::Warn), vec!["Navigation must be active to pause"]);
}

#[test]
fn stuck_agent_jumps_only_while_navigating() {
    let mut rig = Rig::new();
    rig.host.blocked = true;

    for _ in 0..30 {
        rig.tick();
    }
    assert_eq!(rig.host.jumps, 0, "idle agents never jump");

    rig.command("locxyz 80 60 0").expect("reachable");
    for _ in 0..30 {
        rig.tick();
    }
    assert!(rig.host.jumps > 0, "blocked agent should try to jump");
    assert!(!rig.host.jump_held, "jump is released right away");

    rig.command("pause").expect("active");
    let jumps = rig.host.jumps;
    for _ in 0..30 {
        rig.tick();
    }
    assert_eq!(rig.host.jumps, jumps, "paused agents never jump");
}

#[test]
fn stuck_recovery_skipped_while_levitating() {
    let mut rig = Rig::new();
    rig.host.blocked = true;
    if let Some(agent) = rig.host.agent_mut() {
        agent.levitating = true;
    }
    rig.command("locxyz 80 60 0").expect("reachable");
    for _ in 0..30 {
        rig.tick();
    }
    assert_eq!(rig.host.jumps, 0);
}

#[test]
fn recorded_waypoint_resolves_exactly() {
    let mut rig = Rig::new();
    let spot = Vec3::new(42.25, 17.5, 0.0);
    rig.host.teleport(spot);
    rig.command(r#"recordwaypoint "Home" by the well"#).expect("in game");
    rig.host.teleport(Vec3::new(5.0, 5.0, 0.0));

    rig.command("waypoint Home").expect("recorded");
    let path = rig.controller.path().expect("navigating");
    assert_eq!(path.destination_info().position, spot);
    assert_eq!(path.destination(), spot);

    let listed = rig.with_env(|c, env, _| c.list_waypoints(env)).expect("in game");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].description, "by the well");
    assert!(rig.host.messages_at(NoticeLevel::Info).contains(&"1 waypoint(s) for zone 1:"));
}

#[test]
fn record_without_name_prints_usage() {
    let mut rig = Rig::new();
    rig.command("rwp").expect("usage is not an error");
    assert_eq!(rig.book.len(1), 0);
    assert!(rig.host.messages_at(NoticeLevel::Info).iter().any(|m| m.starts_with("Usage")));
}

#[test]
fn click_on_arrival() {
    let mut rig = Rig::new();
    let door = rig.host.add_object(ObjectKind::Door, 4, "GATE", Vec3::new(30.0, 5.0, 0.0));
    rig.command("door id 4 click").expect("door exists");
    assert_eq!(rig.controller.click_target(), Some(door));

    assert_eq!(rig.run(1000), TickOutcome::Arrived(Arrival::EndOfPath));
    assert_eq!(rig.host.clicks, vec![door]);
}

#[test]
fn no_click_without_intent_or_with_cursor_item() {
    let mut rig = Rig::new();
    rig.host.add_object(ObjectKind::Door, 4, "GATE", Vec3::new(30.0, 5.0, 0.0));
    rig.command("door id 4").expect("door exists");
    assert_eq!(rig.controller.click_target(), None);
    rig.run(1000);
    assert!(rig.host.clicks.is_empty());

    rig.command("door id 4 click").expect("door exists");
    if let Some(agent) = rig.host.agent_mut() {
        agent.holding_cursor_item = true;
    }
    assert_eq!(rig.run(10), TickOutcome::Arrived(Arrival::EndOfPath));
    assert!(rig.host.clicks.is_empty());
}

#[test]
fn removed_click_target_keeps_navigating() {
    let mut rig = Rig::new();
    let item = rig.host.add_object(ObjectKind::GroundItem, 8, "Pelt", Vec3::new(60.0, 40.0, 0.0));
    rig.host.item_target = Some(8);
    rig.command("item click").expect("item targeted");
    assert_eq!(rig.controller.click_target(), Some(item));

    rig.controller.on_object_removed(item);
    assert_eq!(rig.controller.click_target(), None);
    assert_eq!(rig.controller.state(), NavState::Active);

    // Despawning in the world is noticed by the tick as well.
    rig.command("item click").expect("item still targeted");
    rig.host.remove_object(item);
    rig.tick();
    assert_eq!(rig.controller.click_target(), None);
    assert_eq!(rig.controller.state(), NavState::Active);
}

#[test]
fn zone_change_resets_everything() {
    let mut rig = Rig::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    rig.controller.subscribe(move |e: &PathEvent| {
        if let Ok(mut events) = sink.lock() {
            events.push(e.clone());
        }
    });

    rig.host.add_object(ObjectKind::Door, 4, "GATE", Vec3::new(30.0, 5.0, 0.0));
    rig.command("door id 4 click").expect("door exists");
    rig.tick();

    rig.with_env(|c, env, _| c.on_zone_change(Some(2), env));
    assert_eq!(rig.controller.state(), NavState::Idle);
    assert!(rig.controller.path().is_none());
    assert_eq!(rig.controller.click_target(), None);
    assert_eq!(rig.controller.zone(), Some(2));
    assert!(!rig.host.forward);

    let events = events.lock().expect("events");
    assert!(matches!(events.first(), Some(PathEvent::Updated(_))));
    assert_eq!(events.last(), Some(&PathEvent::Cleared));
}

#[test]
fn new_request_replaces_the_old_one() {
    let mut rig = Rig::new();
    rig.command("locxyz 80 60 0").expect("reachable");
    rig.command("locxyz 10 90 0").expect("reachable");
    let path = rig.controller.path().expect("navigating");
    assert_eq!(path.destination(), Vec3::new(10.0, 90.0, 0.0));
    assert_eq!(path.index(), 0);
}

#[test]
fn path_events_carry_overlay_payload() {
    let mut rig = Rig::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let id = rig.controller.subscribe(move |e: &PathEvent| {
        if let Ok(mut events) = sink.lock() {
            events.push(e.clone());
        }
    });

    rig.command("locxyz 80 60 0 distance=7").expect("reachable");
    {
        let events = events.lock().expect("events");
        let Some(PathEvent::Updated(snapshot)) = events.last() else {
            panic!("expected an update, got {:?}", events.last());
        };
        assert_eq!(snapshot.destination, Vec3::new(80.0, 60.0, 0.0));
        assert_eq!(snapshot.stop_distance, 7);
        assert_eq!(snapshot.nodes.first().copied(), Some(Vec3::new(5.0, 5.0, 0.0)));
    }

    assert!(rig.controller.unsubscribe(id));
    rig.command("stop").expect("active");
    let events = events.lock().expect("events");
    assert!(!events.contains(&PathEvent::Cleared), "unsubscribed observers see nothing");
}

#[test]
fn mesh_unavailable_and_no_path_are_distinct() {
    let mut rig = Rig::with_mesh(PolyNavMesh::default());
    assert!(matches!(rig.command("locxyz 80 60 0"), Err(NavError::MeshUnavailable)));
    assert!(rig
        .host
        .messages_at(NoticeLevel::Error)
        .contains(&"Cannot navigate - no mesh file loaded."));

    // Two islands split at x = 50.
    let mut rig = Rig::with_mesh(PolyNavMesh::grid(20, 20, 5.0, Vec3::ZERO, |col, _| col != 10));
    assert!(matches!(rig.command("locxyz 80 60 0"), Err(NavError::NoPathFound)));
    assert_eq!(rig.controller.state(), NavState::Idle);
}

#[test]
fn replan_without_path_stops_navigation() {
    let mut rig = Rig::new();
    rig.command("locxyz 80 60 0").expect("reachable");
    rig.host.teleport(Vec3::new(500.0, 500.0, 0.0));
    rig.now += rig.controller.config().replan_interval();

    assert_eq!(rig.tick(), TickOutcome::Lost);
    assert_eq!(rig.controller.state(), NavState::Idle);
    assert!(!rig.host.forward);
}

#[test]
fn movement_keys_break_or_pause() {
    let mut rig = Rig::new();
    rig.controller.config.autopause = true;
    rig.command("locxyz 80 60 0").expect("reachable");
    rig.with_env(|c, env, _| c.on_movement_key_pressed(env));
    assert_eq!(rig.controller.state(), NavState::Paused);

    rig.controller.config.autobreak = true;
    rig.with_env(|c, env, _| c.on_movement_key_pressed(env));
    assert_eq!(rig.controller.state(), NavState::Idle);

    let mut rig = Rig::new();
    rig.command("locxyz 80 60 0").expect("reachable");
    rig.with_env(|c, env, _| c.on_movement_key_pressed(env));
    assert_eq!(rig.controller.state(), NavState::Active, "neither autobreak nor autopause");
}

#[test]
fn default_options_set_and_reset() {
    let mut rig = Rig::new();
    rig.command("options set distance=12 los=on").expect("options");
    assert_eq!(rig.controller.default_options(), NavigationOptions { distance: 12, line_of_sight: true });

    rig.command("locxyz 80 60 0").expect("reachable");
    let options = rig.controller.path().expect("path").destination_info().options;
    assert_eq!(options, NavigationOptions { distance: 12, line_of_sight: true });

    rig.command("options reset").expect("options");
    assert_eq!(rig.controller.default_options(), NavigationOptions::default());
}

#[test]
fn path_queries_leave_navigation_alone() {
    let mut rig = Rig::new();
    let reachable = request("locxyz 35 5 0");
    let length = rig
        .with_env(|c, env, _| c.path_length(&reachable, env))
        .expect("path exists");
    assert!((length - 30.0).abs() < 1e-3, "length {}", length);
    assert!(rig.with_env(|c, env, _| c.can_navigate_to(&reachable, env)));

    let unknown = request("wp nowhere");
    assert!(rig.with_env(|c, env, _| c.path_length(&unknown, env)).is_none());
    assert!(!rig.with_env(|c, env, _| c.can_navigate_to(&unknown, env)));
    assert_eq!(rig.controller.state(), NavState::Idle);
    assert!(rig.controller.path().is_none());
}

#[test]
fn off_mesh_link_uses_tight_threshold_and_skips_replan() {
    // Islands x in [0, 20) and [30, 50), joined by a link.
    let mut mesh = PolyNavMesh::grid(10, 2, 5.0, Vec3::ZERO, |col, _| col != 4 && col != 5);
    mesh.add_link(Vec3::new(18.0, 0.0, 5.0), Vec3::new(32.0, 0.0, 5.0), true)
        .expect("link ends on mesh");
    let mut rig = Rig::with_mesh(mesh);
    rig.host.teleport(Vec3::new(2.0, 5.0, 0.0));

    rig.command("locxyz 48 5 0").expect("reachable over the link");
    rig.tick();
    assert_eq!(rig.index(), 1);
    let next = rig.controller.path().and_then(NavigationPath::next_node).expect("next node");
    assert_eq!(next.kind, NodeKind::OffMeshLink);

    // Inside the ordinary threshold but not the link one.
    rig.host.teleport(Vec3::new(15.0, 5.0, 0.0));
    rig.tick();
    assert_eq!(rig.index(), 1);

    let revision = rig.controller.path().map(NavigationPath::revision);
    rig.host.teleport(Vec3::new(17.5, 5.0, 0.0));
    rig.tick();
    assert_eq!(rig.index(), 2);
    assert_eq!(rig.controller.path().map(NavigationPath::revision), revision, "no re-plan on a link");
    assert!(rig.controller.path().is_some_and(NavigationPath::traversing_link));

    // The cadence re-plan also waits until the link is crossed.
    rig.host.teleport(Vec3::new(25.0, 5.0, 0.0));
    rig.now += rig.controller.config().replan_interval();
    assert_eq!(rig.tick(), TickOutcome::EnRoute);
    assert_eq!(rig.controller.path().map(NavigationPath::revision), revision);

    // A link that never finishes only holds the re-plan for one more interval.
    rig.host.teleport(Vec3::new(23.0, 5.0, 0.0));
    rig.now += rig.controller.config().replan_interval() / 2;
    assert_eq!(rig.tick(), TickOutcome::EnRoute);
    assert_eq!(rig.controller.path().map(NavigationPath::revision), revision);

    rig.now += rig.controller.config().replan_interval();
    assert_eq!(rig.tick(), TickOutcome::EnRoute);
    let path = rig.controller.path().expect("still navigating");
    assert_ne!(Some(path.revision()), revision, "overdue link forces a fresh search");
    assert!(!path.is_empty());
    assert_eq!(rig.controller.state(), NavState::Active);
}

#[test]
fn reload_without_source_reports_error() {
    let mut rig = Rig::new();
    assert!(matches!(rig.command("reload"), Err(NavError::Mesh(_))));
    assert_eq!(rig.host.messages_at(NoticeLevel::Error).len(), 1);
}

#[test]
fn help_lists_usage() {
    let mut rig = Rig::new();
    rig.command("help").expect("help");
    assert_eq!(rig.host.messages_at(NoticeLevel::Info).len(), HELP_LINES.len());
}
