use bevy::prelude::*;

use super::{
    AxisOrder, DestinationInfo, DestinationKind, DestinationRequest, HeightMode, NavRequest, NavigationOptions,
    ObjectSelector,
};
use crate::nav::config::NavConfig;
use crate::nav::error::NavError;
use crate::nav::host::{AgentState, ObjectKind, SpawnInfo, WorldObject, WorldQueries};
use crate::nav::math::swap_ground_axes;
use crate::nav::waypoints::WaypointStore;

/// A `z_filter` at or above this disables the vertical filter.
const Z_FILTER_DISABLED: f32 = 10_000.0;

/// Resolve `request` against the current world.
///
/// Options start from `defaults` and are overridden by the request's
/// `key=value` tokens; malformed tokens are logged at debug and skipped.
pub fn resolve<W: WorldQueries + ?Sized>(
    request: &NavRequest,
    world: &W,
    waypoints: &dyn WaypointStore,
    config: &NavConfig,
    defaults: NavigationOptions,
) -> Result<DestinationInfo, NavError> {
    let agent = world.agent().ok_or(NavError::NotInGame)?;

    let mut info = match &request.destination {
        DestinationRequest::Target => {
            let spawn = world.targeted_spawn().ok_or(NavError::NoTarget)?;
            spawn_destination(&spawn, config, format!("target: {}", spawn.name))
        }
        DestinationRequest::SpawnId(raw) => {
            let id = raw
                .trim()
                .parse::<u32>()
                .map_err(|_| NavError::BadSpawnId(raw.clone()))?;
            let spawn = world.spawn_by_id(id).ok_or(NavError::SpawnNotFound(id))?;
            spawn_destination(&spawn, config, format!("spawn: {} ({})", spawn.name, spawn.id))
        }
        DestinationRequest::SpawnSearch(query) => {
            let spawn = world
                .search_spawns(query)
                .ok_or_else(|| NavError::SpawnSearchFailed(query.clone()))?;
            spawn_destination(&spawn, config, format!("spawn: {} ({})", spawn.name, spawn.id))
        }
        DestinationRequest::Object { kind, selector, click } => {
            let object = select_object(world, &agent, *kind, selector, config.z_filter).ok_or(match kind {
                ObjectKind::Door => NavError::NoDoor,
                ObjectKind::GroundItem => NavError::NoGroundItem,
            })?;
            let (dest_kind, noun) = match kind {
                ObjectKind::Door => (DestinationKind::Door, "door"),
                ObjectKind::GroundItem => (DestinationKind::GroundItem, "ground item"),
            };
            let mut info = DestinationInfo::new(dest_kind, object.position, format!("{}: {}", noun, object.name));
            info.object = Some(object.handle);
            info.click = *click;
            info
        }
        DestinationRequest::Waypoint(name) => {
            let waypoint = world
                .zone()
                .and_then(|zone| waypoints.waypoint(zone, name))
                .ok_or_else(|| NavError::WaypointNotFound(name.clone()))?;
            DestinationInfo::new(DestinationKind::Waypoint, waypoint.location, format!("waypoint: {}", name))
        }
        DestinationRequest::Location {
            components,
            order,
            height,
        } => location_destination(components, *order, *height, &agent)?,
    };

    info.options = defaults;
    let issues = info.options.apply_tokens(request.options.iter().map(String::as_str));
    for issue in issues {
        debug!("Ignoring option '{}': {}", issue.token, issue.reason);
    }

    Ok(info)
}

fn spawn_destination(spawn: &SpawnInfo, config: &NavConfig, label: String) -> DestinationInfo {
    let mut position = spawn.position;
    if config.use_spawn_floor_height {
        position.z = spawn.floor_height;
    }
    let mut info = DestinationInfo::new(DestinationKind::Spawn, position, label);
    info.spawn = Some(spawn.id);
    info
}

fn select_object<W: WorldQueries + ?Sized>(
    world: &W,
    agent: &AgentState,
    kind: ObjectKind,
    selector: &ObjectSelector,
    z_filter: f32,
) -> Option<WorldObject> {
    match selector {
        ObjectSelector::Targeted => world.targeted_object(kind),
        ObjectSelector::Id(raw) => {
            let id = raw.trim().parse::<u32>().ok()?;
            world.objects(kind).into_iter().find(|o| o.handle.id == id)
        }
        ObjectSelector::Nearest | ObjectSelector::Name(_) => {
            let prefix = match selector {
                ObjectSelector::Name(name) => Some(name.to_ascii_lowercase()),
                _ => None,
            };
            let matched = world.objects(kind).into_iter().filter(|o| {
                let name_ok = prefix
                    .as_deref()
                    .map_or(true, |p| o.name.to_ascii_lowercase().starts_with(p));
                let height_ok = z_filter >= Z_FILTER_DISABLED || (o.position.z - agent.position.z).abs() <= z_filter;
                name_ok && height_ok
            });
            // No match keeps whatever is targeted.
            matched
                .min_by(|a, b| {
                    a.position
                        .distance(agent.position)
                        .total_cmp(&b.position.distance(agent.position))
                })
                .or_else(|| world.targeted_object(kind))
        }
    }
}

fn location_destination(
    components: &[f32],
    order: AxisOrder,
    height: HeightMode,
    agent: &AgentState,
) -> Result<DestinationInfo, NavError> {
    let required = match height {
        HeightMode::Exact => 3,
        HeightMode::NearestFloor => 2,
    };
    if components.len() < required || components.len() > 3 || components.iter().any(|c| !c.is_finite()) {
        return Err(NavError::InvalidLocation(format!("{:?}", components)));
    }

    let (a, b) = (components[0], components[1]);
    // Height defaults to the agent's when only ground coordinates are given.
    let z = components.get(2).copied().unwrap_or(agent.position.z);
    let label = match height {
        HeightMode::NearestFloor => format!("loc: {}, {}, nearest to {}", a, b, z),
        HeightMode::Exact => format!("loc: {}, {}, {}", a, b, z),
    };

    let typed = Vec3::new(a, b, z);
    let position = match order {
        AxisOrder::YX => swap_ground_axes(typed),
        AxisOrder::XY => typed,
    };

    let mut info = DestinationInfo::new(DestinationKind::Location, position, label);
    info.height = height;
    Ok(info)
}
