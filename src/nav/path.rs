//! Path state for one navigation request.

use bevy::prelude::*;

use super::destination::{DestinationInfo, HeightMode};
use super::host::WorldQueries;
use super::math::{mesh_from_world, world_from_mesh};
use super::mesh::{Corridor, NavMeshQuery, NodeKind, PathNode};

/// The corridor and smoothed nodes towards one destination, plus how far
/// along them the agent is.
///
/// Nodes are stored in world space. `index` points at the node the agent is
/// walking to; it equals `len()` once the last node has been passed.
#[derive(Debug, Clone)]
pub struct NavigationPath {
    destination: DestinationInfo,
    /// Destination after height resolution, world space.
    end: Vec3,
    corridor: Corridor,
    nodes: Vec<PathNode>,
    index: usize,
    traversal_distance: f32,
    revision: u64,
}

impl NavigationPath {
    pub fn new(destination: DestinationInfo) -> Self {
        let end = destination.position;
        Self {
            destination,
            end,
            corridor: Corridor::default(),
            nodes: Vec::new(),
            index: 0,
            traversal_distance: 0.0,
            revision: 0,
        }
    }

    pub fn destination_info(&self) -> &DestinationInfo {
        &self.destination
    }

    /// Query a fresh path from `agent_position`. Returns whether a non-empty
    /// path was found; the index restarts at 0 either way.
    pub fn find_path(&mut self, agent_position: Vec3, mesh: &dyn NavMeshQuery) -> bool {
        let start = mesh_from_world(agent_position);
        let end = self.mesh_end(mesh);

        match mesh.find_path(start, end) {
            Some((corridor, nodes)) => {
                self.replace(corridor, nodes);
            }
            None => self.clear(),
        }
        self.index = 0;
        !self.nodes.is_empty()
    }

    /// Re-query from the agent's latest position.
    ///
    /// With `incremental` the existing corridor is reused from the polygon
    /// the agent now stands on, so progress along it is kept; otherwise (or
    /// when the agent left the corridor, or `force_full`) the corridor is
    /// searched again. Identical nodes keep the index. Otherwise it is
    /// re-mapped onto the new nodes: a path that has not started stays at 0,
    /// one in progress targets the first node after the agent, one at its
    /// end stays at the end.
    pub fn update_path(&mut self, agent_position: Vec3, mesh: &dyn NavMeshQuery, force_full: bool, incremental: bool) {
        let was_started = self.index > 0;
        let was_at_end = !self.nodes.is_empty() && self.is_at_end();

        let start = mesh_from_world(agent_position);
        let end = self.mesh_end(mesh);

        let continued = if incremental && !force_full {
            self.continue_corridor(start, end, mesh)
        } else {
            None
        };
        let unchanged = match continued.or_else(|| mesh.find_path(start, end)) {
            Some((corridor, nodes)) => self.replace(corridor, nodes),
            None => {
                self.clear();
                false
            }
        };

        self.index = if self.nodes.is_empty() {
            0
        } else if unchanged {
            self.index.min(self.nodes.len())
        } else if was_at_end {
            self.nodes.len()
        } else if was_started {
            1.min(self.nodes.len() - 1)
        } else {
            0
        };
    }

    fn continue_corridor(&self, start: Vec3, end: Vec3, mesh: &dyn NavMeshQuery) -> Option<(Corridor, Vec<PathNode>)> {
        let poly = mesh.locate(start)?;
        let at = self.corridor.position_of(poly)?;
        let mut corridor = self.corridor.clone();
        corridor.trim_front(at);
        let nodes = mesh.straight_path(start, end, &corridor);
        if nodes.is_empty() {
            return None;
        }
        Some((corridor, nodes))
    }

    fn mesh_end(&mut self, mesh: &dyn NavMeshQuery) -> Vec3 {
        let raw = mesh_from_world(self.destination.position);
        let end = match self.destination.height {
            HeightMode::Exact => raw,
            HeightMode::NearestFloor => mesh.nearest_floor(raw).unwrap_or_else(|| {
                debug!("No floor near {}, keeping the requested height", self.destination.position);
                raw
            }),
        };
        self.end = world_from_mesh(end);
        end
    }

    /// Returns whether the new nodes are identical to the old ones.
    fn replace(&mut self, corridor: Corridor, nodes: Vec<PathNode>) -> bool {
        let nodes: Vec<PathNode> = nodes
            .into_iter()
            .map(|n| PathNode::new(world_from_mesh(n.position), n.kind))
            .collect();
        let unchanged = !nodes.is_empty() && nodes == self.nodes;
        self.corridor = corridor;
        self.nodes = nodes;
        self.traversal_distance = self
            .nodes
            .windows(2)
            .map(|w| w[0].position.distance(w[1].position))
            .sum();
        self.revision += 1;
        unchanged
    }

    fn clear(&mut self) {
        self.corridor = Corridor::default();
        self.nodes.clear();
        self.traversal_distance = 0.0;
        self.revision += 1;
    }

    pub fn increment(&mut self) {
        if self.index < self.nodes.len() {
            self.index += 1;
        }
    }

    pub fn is_at_end(&self) -> bool {
        self.index >= self.nodes.len()
    }

    pub fn next_node(&self) -> Option<PathNode> {
        self.nodes.get(self.index).copied()
    }

    pub fn next_position(&self) -> Option<Vec3> {
        self.next_node().map(|n| n.position)
    }

    /// Where the path ends, after nearest-floor resolution.
    pub fn destination(&self) -> Vec3 {
        self.end
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn node(&self, i: usize) -> Option<PathNode> {
        self.nodes.get(i).copied()
    }

    pub fn nodes(&self) -> &[PathNode] {
        &self.nodes
    }

    pub fn corridor(&self) -> &Corridor {
        &self.corridor
    }

    /// Summed 3D length of the node sequence.
    pub fn traversal_distance(&self) -> f32 {
        self.traversal_distance
    }

    /// Bumped every time the nodes are recomputed.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn next_is_link(&self) -> bool {
        self.next_node().is_some_and(|n| n.kind == NodeKind::OffMeshLink)
    }

    /// The last node passed was a link entry, so the agent is somewhere on
    /// the link and likely off the mesh.
    pub fn traversing_link(&self) -> bool {
        self.index
            .checked_sub(1)
            .and_then(|i| self.nodes.get(i))
            .is_some_and(|n| n.kind == NodeKind::OffMeshLink)
    }

    pub fn can_see_destination<W: WorldQueries + ?Sized>(&self, world: &W) -> bool {
        world
            .agent()
            .is_some_and(|agent| world.line_of_sight(agent.position, self.end))
    }
}
