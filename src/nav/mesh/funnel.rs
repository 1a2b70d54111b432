use bevy::prelude::*;

use super::poly_mesh::PolyNavMesh;
use super::{Corridor, CorridorStep, NodeKind, PathNode};

const SAME_POINT_EPSILON_SQ: f32 = 1e-6;

/// Twice the signed area of `apex, a, b` on the ground plane. Positive when
/// `b` lies counter-clockwise of `a` as seen from `apex`.
pub(super) fn cross_xz(apex: Vec3, a: Vec3, b: Vec3) -> f32 {
    (a.x - apex.x) * (b.z - apex.z) - (a.z - apex.z) * (b.x - apex.x)
}

fn same_xz(a: Vec3, b: Vec3) -> bool {
    let dx = a.x - b.x;
    let dz = a.z - b.z;
    dx * dx + dz * dz < SAME_POINT_EPSILON_SQ
}

fn push_node(nodes: &mut Vec<PathNode>, position: Vec3, kind: NodeKind) {
    if let Some(last) = nodes.last_mut() {
        let duplicate = same_xz(last.position, position) && (last.position.y - position.y).abs() < 1e-3;
        if duplicate && last.kind != NodeKind::Start {
            if kind != NodeKind::Corner {
                last.kind = kind;
            }
            return;
        }
    }
    nodes.push(PathNode::new(position, kind));
}

/// Turn a corridor into walkable nodes. Start and end are clamped onto the
/// first and last polygons. Each off-mesh link splits the corridor: the link
/// entry is emitted as [`NodeKind::OffMeshLink`] and walking resumes from the
/// link exit.
pub(super) fn straight_path(mesh: &PolyNavMesh, start: Vec3, end: Vec3, corridor: &Corridor) -> Vec<PathNode> {
    let (Some(first), Some(last)) = (corridor.first_poly(), corridor.last_poly()) else {
        return Vec::new();
    };
    let poly_count = mesh.polys.len() as u32;
    if corridor.steps.iter().any(|s| s.poly >= poly_count) {
        warn!("[NAVMESH] Corridor references polygons outside the mesh");
        return Vec::new();
    }

    let start = mesh.closest_point(first, start);
    let end = mesh.closest_point(last, end);

    let mut nodes = vec![PathNode::new(start, NodeKind::Start)];
    let mut segment_begin = 0;
    let mut segment_start = start;

    for i in 1..corridor.steps.len() {
        let Some(link_id) = corridor.steps[i].via_link else {
            continue;
        };
        let from = corridor.steps[i - 1].poly;
        let Some((entry, exit, _)) = mesh.link(link_id).and_then(|l| l.traverse_from(from)) else {
            warn!("[NAVMESH] Link {} cannot be taken from poly {}", link_id, from);
            return Vec::new();
        };

        walk_segment(mesh, &corridor.steps[segment_begin..i], segment_start, entry, &mut nodes);
        push_node(&mut nodes, entry, NodeKind::OffMeshLink);
        push_node(&mut nodes, exit, NodeKind::Corner);
        segment_begin = i;
        segment_start = exit;
    }

    walk_segment(mesh, &corridor.steps[segment_begin..], segment_start, end, &mut nodes);
    nodes.push(PathNode::new(end, NodeKind::End));
    if nodes.len() > 2 {
        // The last corner may coincide with the end.
        let n = nodes.len();
        if same_xz(nodes[n - 2].position, end) && nodes[n - 2].kind == NodeKind::Corner {
            nodes.remove(n - 2);
        }
    }
    nodes
}

/// Corners of one walking segment, funnelled and then shortcut. Pushes the
/// corners between `start` and `end`, not the endpoints themselves.
fn walk_segment(mesh: &PolyNavMesh, steps: &[CorridorStep], start: Vec3, end: Vec3, nodes: &mut Vec<PathNode>) {
    let mut points = vec![start];
    string_pull(mesh, steps, start, end, &mut points);
    points.push(end);

    let kept = shortcut(mesh, &points);
    for &i in &kept[1..kept.len() - 1] {
        push_node(nodes, points[i], NodeKind::Corner);
    }
}

/// Shortest chain through `points` that keeps both ends and only skips
/// ahead along legs that stay on the mesh. Returns the kept indices.
fn shortcut(mesh: &PolyNavMesh, points: &[Vec3]) -> Vec<usize> {
    let n = points.len();
    let mut best = vec![f32::INFINITY; n];
    let mut prev = vec![0; n];
    best[0] = 0.0;

    for j in 1..n {
        for i in 0..j {
            let cost = best[i] + points[i].distance(points[j]);
            // Consecutive funnel corners are walkable by construction.
            if cost < best[j] && (i + 1 == j || mesh.segment_walkable(points[i], points[j])) {
                best[j] = cost;
                prev[j] = i;
            }
        }
    }

    let mut kept = vec![n - 1];
    let mut at = n - 1;
    while at > 0 {
        at = prev[at];
        kept.push(at);
    }
    kept.reverse();
    kept
}

/// Funnel ("simple stupid funnel") over the portals of one walking segment.
/// Appends the corners between `start` and `end` to `corners`.
fn string_pull(mesh: &PolyNavMesh, steps: &[CorridorStep], start: Vec3, end: Vec3, corners: &mut Vec<Vec3>) {
    let mut portals: Vec<(Vec3, Vec3)> = Vec::with_capacity(steps.len() + 1);
    portals.push((start, start));
    for pair in steps.windows(2) {
        match mesh.portal(pair[0].poly, pair[1].poly) {
            Some(portal) => portals.push(portal),
            None => warn!("[NAVMESH] No shared edge between poly {} and poly {}", pair[0].poly, pair[1].poly),
        }
    }
    portals.push((end, end));

    let mut apex = start;
    let mut left = start;
    let mut right = start;
    let (mut apex_index, mut left_index, mut right_index) = (0, 0, 0);

    let mut i = 1;
    while i < portals.len() {
        let (new_left, new_right) = portals[i];

        // Tighten the right side.
        if cross_xz(apex, right, new_right) >= 0.0 {
            if same_xz(apex, right) || cross_xz(apex, left, new_right) <= 0.0 {
                right = new_right;
                right_index = i;
            } else {
                // Right crossed over left: left becomes a corner.
                corners.push(left);
                apex = left;
                apex_index = left_index;
                left = apex;
                right = apex;
                left_index = apex_index;
                right_index = apex_index;
                i = apex_index + 1;
                continue;
            }
        }

        // Tighten the left side.
        if cross_xz(apex, left, new_left) <= 0.0 {
            if same_xz(apex, left) || cross_xz(apex, right, new_left) >= 0.0 {
                left = new_left;
                left_index = i;
            } else {
                corners.push(right);
                apex = right;
                apex_index = right_index;
                left = apex;
                right = apex;
                left_index = apex_index;
                right_index = apex_index;
                i = apex_index + 1;
                continue;
            }
        }

        i += 1;
    }
}
