use bevy::app::{AppExit, ScheduleRunnerPlugin};
use bevy::prelude::*;

use wayfarer::nav::host::{NoticeLevel, ObjectKind};
use wayfarer::nav::systems::step_simulated_host;
use wayfarer::nav::{
    NavClock, NavCommandLine, NavController, NavSet, NavigationFinished, NavigationPlugin, PathChanged, PathEvent,
    SimulatedHost,
};

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const DEMO_MESH: &str = "assets/demo_mesh.ron";

fn setup_file_logging() -> String {
    // Create logs directory if it doesn't exist
    let log_dir = PathBuf::from("logs");
    if !log_dir.exists() {
        fs::create_dir_all(&log_dir).expect("Failed to create logs directory");
    }

    cleanup_old_logs(&log_dir, 25);

    let now = chrono::Local::now();
    let log_filename = format!("wayfarer_{}.log", now.format("%Y%m%d_%H%M%S"));
    let log_path_str = log_dir.join(&log_filename).to_string_lossy().to_string();

    let file_appender = RollingFileAppender::new(
        Rotation::NEVER, // One file per run
        &log_dir,
        &log_filename
    );

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false);

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wayfarer=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    log_path_str
}

fn cleanup_old_logs(log_dir: &PathBuf, keep_count: usize) {
    if let Ok(entries) = fs::read_dir(log_dir) {
        let mut log_files: Vec<_> = entries
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|s| s.starts_with("wayfarer") && s.ends_with(".log"))
                    .unwrap_or(false)
            })
            .collect();

        // Oldest first
        log_files.sort_by_key(|e| e.metadata().ok().and_then(|m| m.modified().ok()));

        if log_files.len() > keep_count {
            for file in log_files.iter().take(log_files.len() - keep_count) {
                let _ = fs::remove_file(file.path());
            }
        }
    }
}

/// Command lines fed to the controller one at a time. The next line is sent
/// once the previous navigation finished.
#[derive(Resource)]
struct DemoScript {
    lines: Vec<String>,
    next: usize,
    /// Ticks to wait before giving up on the current line.
    budget: u64,
    started_at: u64,
}

impl DemoScript {
    fn new(lines: Vec<String>) -> Self {
        Self {
            lines,
            next: 0,
            budget: 60 * 60,
            started_at: 0,
        }
    }
}

fn default_script() -> Vec<String> {
    [
        "help",
        "locxyz 90 15 0",
        "rwp Camp by the east wall",
        "door GATE click",
        "waypoint Camp distance=8",
        "listwp",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn setup_world(mut commands: Commands) {
    let mut host = SimulatedHost::new(1, Vec3::new(5.0, 5.0, 0.0));
    host.add_object(ObjectKind::Door, 1, "GATE", Vec3::new(20.0, 75.0, 0.0));
    host.add_spawn(11, "a_wandering_merchant", Vec3::new(80.0, 80.0, 0.0));
    commands.insert_resource(host);
    info!("Demo world ready");
}

fn run_script(
    mut script: ResMut<DemoScript>,
    controller: Res<NavController>,
    clock: Res<NavClock>,
    mut lines: MessageWriter<NavCommandLine>,
    mut exit: MessageWriter<AppExit>,
) {
    let timed_out = clock.ticks().saturating_sub(script.started_at) > script.budget;
    if controller.is_active() && !timed_out {
        return;
    }
    if timed_out && controller.is_active() {
        warn!("Giving up after {} ticks", script.budget);
        lines.write(NavCommandLine("stop".to_string()));
    }

    let Some(line) = script.lines.get(script.next).cloned() else {
        info!("Demo script finished after {} ticks", clock.ticks());
        exit.write(AppExit::Success);
        return;
    };
    info!("> nav {}", line);
    script.next += 1;
    script.started_at = clock.ticks();
    lines.write(NavCommandLine(line));
}

fn report(
    mut finished: MessageReader<NavigationFinished>,
    mut changed: MessageReader<PathChanged>,
    mut host: ResMut<SimulatedHost>,
) {
    for NavigationFinished(outcome) in finished.read() {
        info!("Navigation finished: {:?} at {}", outcome, host.position());
    }
    for PathChanged(event) in changed.read() {
        if let PathEvent::Updated(snapshot) = event {
            debug!("Path revision {}: {} nodes", snapshot.revision, snapshot.nodes.len());
        }
    }
    for (level, message) in host.notices.drain(..) {
        if level >= NoticeLevel::Info {
            println!("[{:?}] {}", level, message);
        }
    }
}

fn main() {
    let log_file = setup_file_logging();
    println!("Wayfarer navigation demo - logging to {}", log_file);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let script = if args.is_empty() { default_script() } else { vec![args.join(" ")] };

    App::new()
        .add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(1.0 / 60.0))))
        .add_plugins(NavigationPlugin::<SimulatedHost>::default().with_mesh_file(DEMO_MESH))
        .insert_resource(DemoScript::new(script))
        .add_systems(PreStartup, setup_world)
        .add_systems(FixedUpdate, (
            run_script.before(NavSet::Input),
            step_simulated_host.after(NavSet::Output),
            report.after(step_simulated_host),
        ))
        .run();
}
