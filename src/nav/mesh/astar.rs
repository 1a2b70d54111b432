use bevy::prelude::*;
use fixedbitset::FixedBitSet;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::poly_mesh::PolyNavMesh;
use super::{Corridor, CorridorStep, LinkId, PolyRef};
use crate::nav::profiling::profile;

const MAX_ITERATIONS: usize = 65_536;
/// Slightly underestimate so the straight-line heuristic stays admissible.
const HEURISTIC_SCALE: f32 = 0.999;

#[derive(Clone, Copy, Debug)]
struct State {
    cost: f32,
    poly: PolyRef,
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for State {}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; ties broken on polygon for determinism.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.poly.cmp(&self.poly))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Clone, Copy)]
struct SearchNode {
    g: f32,
    /// Where the polygon was entered: portal midpoint, link exit or start.
    entry: Vec3,
    parent: Option<(PolyRef, Option<LinkId>)>,
}

/// A* over polygons. Each polygon keeps a single best entry point (edge
/// midpoint or link exit), which keeps the search on the polygon graph.
#[profile(2)]
pub(super) fn find_corridor(
    mesh: &PolyNavMesh,
    start: Vec3,
    start_poly: PolyRef,
    end: Vec3,
    end_poly: PolyRef,
) -> Option<Corridor> {
    let poly_count = mesh.polys.len();
    if start_poly as usize >= poly_count || end_poly as usize >= poly_count {
        return None;
    }

    if start_poly == end_poly {
        return Some(Corridor {
            steps: vec![CorridorStep { poly: start_poly, via_link: None }],
        });
    }

    let mut nodes: Vec<Option<SearchNode>> = vec![None; poly_count];
    let mut closed = FixedBitSet::with_capacity(poly_count);
    let mut open = BinaryHeap::new();

    nodes[start_poly as usize] = Some(SearchNode { g: 0.0, entry: start, parent: None });
    open.push(State {
        cost: start.distance(end) * HEURISTIC_SCALE,
        poly: start_poly,
    });

    let mut iterations = 0;
    while let Some(State { poly: current, .. }) = open.pop() {
        iterations += 1;
        if iterations > MAX_ITERATIONS {
            error!(
                "[NAVMESH] Corridor search exceeded {} iterations from poly {} to poly {}",
                MAX_ITERATIONS, start_poly, end_poly
            );
            return None;
        }

        if closed.contains(current as usize) {
            continue;
        }
        closed.insert(current as usize);

        if current == end_poly {
            return Some(reconstruct(&nodes, current));
        }

        let Some(node) = nodes[current as usize] else {
            continue;
        };
        let poly = &mesh.polys[current as usize];

        let edge_neighbors = poly.neighbors.iter().flatten().filter_map(|&next| {
            let (left, right) = mesh.portal(current, next)?;
            let mid = (left + right) * 0.5;
            Some((next, mid, None, node.entry.distance(mid)))
        });
        // Taking a link costs the walk to its entry plus the link itself.
        let link_neighbors = poly.links.iter().filter_map(|&link_id| {
            let (link_entry, exit, exit_poly) = mesh.link(link_id)?.traverse_from(current)?;
            let travel = node.entry.distance(link_entry) + link_entry.distance(exit);
            Some((exit_poly, exit, Some(link_id), travel))
        });

        for (next, entry, link, travel) in edge_neighbors.chain(link_neighbors) {
            if closed.contains(next as usize) {
                continue;
            }
            // The goal polygon is charged the final walk to `end` up front.
            let (g, h) = if next == end_poly {
                (node.g + travel + entry.distance(end), 0.0)
            } else {
                (node.g + travel, entry.distance(end) * HEURISTIC_SCALE)
            };
            let better = nodes[next as usize].map_or(true, |existing| g < existing.g);
            if better {
                nodes[next as usize] = Some(SearchNode {
                    g,
                    entry,
                    parent: Some((current, link)),
                });
                open.push(State {
                    cost: g + h,
                    poly: next,
                });
            }
        }
    }

    None
}

fn reconstruct(nodes: &[Option<SearchNode>], end: PolyRef) -> Corridor {
    let mut steps = Vec::new();
    let mut current = end;

    // Each node records how it was entered; walk back to the start.
    loop {
        let parent = nodes[current as usize].and_then(|n| n.parent);
        steps.push(CorridorStep {
            poly: current,
            via_link: parent.and_then(|(_, link)| link),
        });
        match parent {
            Some((prev, _)) => current = prev,
            None => break,
        }
    }

    steps.reverse();
    Corridor { steps }
}
