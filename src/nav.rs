//! Navmesh path following for a single agent.
//!
//! The core ([`NavController`] and everything below it) is plain Rust driven
//! through [`NavEnv`]. [`NavigationPlugin`] wires it into a Bevy app: the host
//! application is a resource implementing [`NavHost`], commands and host
//! events arrive as messages, and a fixed-tick system runs the control loop.

pub mod command;
pub mod config;
pub mod controller;
pub mod destination;
pub mod error;
pub mod host;
pub mod math;
pub mod mesh;
pub mod path;
pub mod profiling;
pub mod sim_host;
pub mod systems;
pub mod waypoints;

use bevy::prelude::*;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub use command::{NavCommand, OptionsCommand};
pub use config::NavConfig;
pub use controller::{Arrival, NavController, NavEnv, NavState, PathEvent, PathSnapshot, TickOutcome};
pub use destination::{DestinationInfo, DestinationKind, DestinationRequest, NavRequest, NavigationOptions};
pub use error::{MeshError, NavError};
pub use host::{NavHost, NoticeLevel, NotifyLevel, ObjectKind, ObjectRef, ZoneId};
pub use mesh::{NavMeshQuery, NodeKind, PathNode, PolyNavMesh};
pub use path::NavigationPath;
pub use sim_host::SimulatedHost;
pub use waypoints::{Waypoint, WaypointBook, WaypointStore};

use systems::{
    drive_navigation, handle_host_events, handle_nav_commands, handle_zone_changes, init_controller, load_nav_mesh,
    relay_path_events,
};

#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum NavSet {
    Input,  // Commands and host events
    Drive,  // The control loop
    Output, // Path change fan-out
}

/// Adds navigation for the host resource `H`.
///
/// The app must insert `H` itself. [`NavMesh`] starts empty unless a mesh
/// file is given or the app inserts one.
pub struct NavigationPlugin<H> {
    mesh_file: Option<PathBuf>,
    _host: PhantomData<fn() -> H>,
}

impl<H> Default for NavigationPlugin<H> {
    fn default() -> Self {
        Self {
            mesh_file: None,
            _host: PhantomData,
        }
    }
}

impl<H> NavigationPlugin<H> {
    pub fn with_mesh_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.mesh_file = Some(path.into());
        self
    }
}

impl<H: NavHost + Resource> Plugin for NavigationPlugin<H> {
    fn build(&self, app: &mut App) {
        app.insert_resource(Time::<Fixed>::from_hz(60.0)); // Replaced once NavConfig is loaded
        app.init_resource::<NavClock>();
        app.init_resource::<NavMesh>();
        app.init_resource::<Waypoints>();
        app.init_resource::<PathEventRelay>();

        app.add_message::<NavCommandLine>()
            .add_message::<NavCommandMessage>()
            .add_message::<ZoneChanged>()
            .add_message::<MovementKeyPressed>()
            .add_message::<ObjectRemoved>()
            .add_message::<PathChanged>()
            .add_message::<NavigationFinished>();

        app.configure_sets(FixedUpdate, (NavSet::Input, NavSet::Drive, NavSet::Output).chain());

        let mesh_file = self.mesh_file.clone();
        app.add_systems(
            Startup,
            (
                config::load_nav_config,
                init_controller,
                move |mesh: ResMut<NavMesh>| load_nav_mesh(mesh_file.as_deref(), mesh),
            )
                .chain(),
        );

        app.add_systems(
            FixedUpdate,
            (
                (handle_zone_changes::<H>, handle_nav_commands::<H>, handle_host_events::<H>)
                    .chain()
                    .in_set(NavSet::Input),
                drive_navigation::<H>.in_set(NavSet::Drive),
                relay_path_events.in_set(NavSet::Output),
            ),
        );
    }
}

/// Fixed-tick clock for the control loop. Advances once per driven tick,
/// independent of wall time.
#[derive(Resource, Debug, Clone)]
pub struct NavClock {
    ticks: u64,
    elapsed: Duration,
    tick_duration: Duration,
}

impl Default for NavClock {
    fn default() -> Self {
        Self::new(Duration::from_secs_f64(1.0 / 60.0))
    }
}

impl NavClock {
    pub fn new(tick_duration: Duration) -> Self {
        Self {
            ticks: 0,
            elapsed: Duration::ZERO,
            tick_duration,
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn now(&self) -> Duration {
        self.elapsed
    }

    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    pub fn set_tick_duration(&mut self, tick_duration: Duration) {
        self.tick_duration = tick_duration;
    }

    pub fn advance(&mut self) {
        self.ticks += 1;
        self.elapsed += self.tick_duration;
    }
}

/// The mesh the controller plans on.
#[derive(Resource)]
pub struct NavMesh(pub Box<dyn NavMeshQuery + Send + Sync>);

impl Default for NavMesh {
    fn default() -> Self {
        Self(Box::new(PolyNavMesh::default()))
    }
}

impl NavMesh {
    pub fn new(mesh: impl NavMeshQuery + Send + Sync + 'static) -> Self {
        Self(Box::new(mesh))
    }
}

#[derive(Resource)]
pub struct Waypoints(pub Box<dyn WaypointStore + Send + Sync>);

impl Default for Waypoints {
    fn default() -> Self {
        Self(Box::new(WaypointBook::default()))
    }
}

impl Waypoints {
    pub fn new(store: impl WaypointStore + Send + Sync + 'static) -> Self {
        Self(Box::new(store))
    }
}

/// Collects controller path events until the output set turns them into
/// [`PathChanged`] messages.
#[derive(Resource, Default, Clone)]
pub struct PathEventRelay(Arc<Mutex<Vec<PathEvent>>>);

impl PathEventRelay {
    pub fn push(&self, event: PathEvent) {
        match self.0.lock() {
            Ok(mut pending) => pending.push(event),
            Err(_) => warn!("Path event relay poisoned, dropping {:?}", event),
        }
    }

    pub fn drain(&self) -> Vec<PathEvent> {
        match self.0.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => Vec::new(),
        }
    }
}

// ============================================================================
// Messages
// ============================================================================

/// A raw command line, decoded (and any decode error announced) by the
/// command system.
#[derive(Message, Debug, Clone)]
pub struct NavCommandLine(pub String);

/// An already decoded command.
#[derive(Message, Debug, Clone)]
pub struct NavCommandMessage(pub NavCommand);

#[derive(Message, Debug, Clone, Copy)]
pub struct ZoneChanged(pub Option<ZoneId>);

/// The user pressed one of the host's own movement keys.
#[derive(Message, Debug, Clone, Copy)]
pub struct MovementKeyPressed;

/// A door or ground item despawned.
#[derive(Message, Debug, Clone, Copy)]
pub struct ObjectRemoved(pub ObjectRef);

#[derive(Message, Debug, Clone)]
pub struct PathChanged(pub PathEvent);

/// Navigation ended on its own: the agent arrived or the path was lost.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationFinished(pub TickOutcome);
