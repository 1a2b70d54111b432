//! NavMesh query service.
//!
//! The controller only depends on [`NavMeshQuery`]. [`PolyNavMesh`] is the
//! bundled implementation: convex polygons with shared-edge adjacency plus
//! off-mesh links, searched with A* over polygons and smoothed with a funnel
//! pass. All positions handled here are in mesh space (y up).

mod astar;
mod funnel;
mod poly_mesh;

#[cfg(test)]
mod tests;

use bevy::math::Vec3;
use serde::{Deserialize, Serialize};

use super::error::MeshError;

pub use poly_mesh::{LinkDescription, MeshDescription, OffMeshLink, PolyNavMesh};

pub type PolyRef = u32;
pub type LinkId = u32;

/// One polygon of a corridor and how it was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorridorStep {
    pub poly: PolyRef,
    /// Set when the polygon is reached through an off-mesh link rather than
    /// a shared edge.
    pub via_link: Option<LinkId>,
}

/// Polygon sequence connecting a start polygon to an end polygon.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corridor {
    pub steps: Vec<CorridorStep>,
}

impl Corridor {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn first_poly(&self) -> Option<PolyRef> {
        self.steps.first().map(|s| s.poly)
    }

    pub fn last_poly(&self) -> Option<PolyRef> {
        self.steps.last().map(|s| s.poly)
    }

    pub fn position_of(&self, poly: PolyRef) -> Option<usize> {
        self.steps.iter().position(|s| s.poly == poly)
    }

    /// Drop every step before `index`, so the corridor starts there. The new
    /// first step is no longer "entered" from anywhere.
    pub fn trim_front(&mut self, index: usize) {
        if index == 0 || index >= self.steps.len() {
            return;
        }
        self.steps.drain(..index);
        self.steps[0].via_link = None;
    }
}

/// What a straight-path node asks of the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// First node: the (clamped) start position.
    Start,
    /// Ordinary corner to walk to.
    Corner,
    /// Entry of an off-mesh link; the host traverses the link itself.
    OffMeshLink,
    /// Last node: the (clamped) destination.
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathNode {
    pub position: Vec3,
    pub kind: NodeKind,
}

impl PathNode {
    pub fn new(position: Vec3, kind: NodeKind) -> Self {
        Self { position, kind }
    }
}

pub trait NavMeshQuery {
    fn is_loaded(&self) -> bool;

    /// Polygon containing (or nearest to) `point`.
    fn locate(&self, point: Vec3) -> Option<PolyRef>;

    /// `point` dropped (or raised) onto the nearest walkable floor.
    fn nearest_floor(&self, point: Vec3) -> Option<Vec3>;

    /// Polygon corridor from `start` to `end`, or `None` when unreachable.
    fn find_corridor(&self, start: Vec3, end: Vec3) -> Option<Corridor>;

    /// Smooth `corridor` into walkable nodes. Empty when the corridor is.
    fn straight_path(&self, start: Vec3, end: Vec3, corridor: &Corridor) -> Vec<PathNode>;

    fn find_path(&self, start: Vec3, end: Vec3) -> Option<(Corridor, Vec<PathNode>)> {
        let corridor = self.find_corridor(start, end)?;
        let nodes = self.straight_path(start, end, &corridor);
        if nodes.is_empty() {
            return None;
        }
        Some((corridor, nodes))
    }

    fn reload(&mut self) -> Result<(), MeshError> {
        Err(MeshError::NoSource)
    }
}
