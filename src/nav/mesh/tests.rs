/// Tests for the polygon navmesh: corridor search, funnel smoothing and links.
use super::*;
use bevy::math::{Vec2, Vec3};

fn open_grid(cols: usize, rows: usize) -> PolyNavMesh {
    PolyNavMesh::grid(cols, rows, 1.0, Vec3::ZERO, |_, _| true)
}

fn path_length(nodes: &[PathNode]) -> f32 {
    nodes.windows(2).map(|w| w[0].position.distance(w[1].position)).sum()
}

#[test]
fn grid_builds_neighbours_across_shared_edges() {
    let mesh = open_grid(3, 2);
    assert_eq!(mesh.poly_count(), 6);

    // Middle cell of the first row touches left, right and the cell above.
    let middle = &mesh.polys[1];
    let neighbours: Vec<PolyRef> = middle.neighbors.iter().flatten().copied().collect();
    assert_eq!(neighbours.len(), 3, "expected 3 neighbours, got {:?}", neighbours);
    assert!(neighbours.contains(&0));
    assert!(neighbours.contains(&2));
    assert!(neighbours.contains(&4));
}

#[test]
fn straight_corridor_smooths_to_start_and_end() {
    let mesh = open_grid(10, 1);
    let start = Vec3::new(0.5, 0.0, 0.5);
    let end = Vec3::new(9.5, 0.0, 0.5);

    let (corridor, nodes) = mesh.find_path(start, end).expect("open grid must have a path");
    assert_eq!(corridor.len(), 10);
    assert_eq!(nodes.len(), 2, "nothing to turn around: {:?}", nodes);
    assert_eq!(nodes[0].kind, NodeKind::Start);
    assert_eq!(nodes[1].kind, NodeKind::End);
    assert!(nodes[0].position.distance(start) < 1e-4);
    assert!(nodes[1].position.distance(end) < 1e-4);
}

#[test]
fn same_polygon_path_has_two_nodes() {
    let mesh = open_grid(2, 2);
    let start = Vec3::new(0.2, 0.0, 0.2);
    let end = Vec3::new(0.8, 0.0, 0.7);

    let (corridor, nodes) = mesh.find_path(start, end).expect("path inside one cell");
    assert_eq!(corridor.len(), 1);
    assert_eq!(nodes.first().map(|n| n.kind), Some(NodeKind::Start));
    assert_eq!(nodes.last().map(|n| n.kind), Some(NodeKind::End));
}

#[test]
fn path_bends_around_wall_without_crossing_it() {
    // Wall occupies column 5 for rows 0..8; the gap is at rows 8 and 9.
    let mesh = PolyNavMesh::grid(10, 10, 1.0, Vec3::ZERO, |col, row| !(col == 5 && row < 8));
    let start = Vec3::new(1.5, 0.0, 1.5);
    let end = Vec3::new(8.5, 0.0, 1.5);

    let (_, nodes) = mesh.find_path(start, end).expect("path around the wall");
    assert!(nodes.len() >= 4, "expected corners around the wall, got {:?}", nodes);
    assert_eq!(nodes[0].kind, NodeKind::Start);
    assert_eq!(nodes[nodes.len() - 1].kind, NodeKind::End);

    for pair in nodes.windows(2) {
        for step in 0..=20 {
            let p = pair[0].position.lerp(pair[1].position, step as f32 / 20.0);
            let inside_wall = p.x > 5.0 + 1e-3 && p.x < 6.0 - 1e-3 && p.z < 8.0 - 1e-3;
            assert!(!inside_wall, "segment {:?} -> {:?} crosses the wall at {:?}", pair[0], pair[1], p);
        }
    }

    let straight = start.distance(end);
    assert!(path_length(&nodes) > straight + 1.0, "detour must be longer than the blocked line");
}

#[test]
fn wall_detour_keeps_only_the_wall_corners() {
    // Column 5 is solid below row 8 on a 2 unit grid: x in [10, 12), z < 16.
    let mesh = PolyNavMesh::grid(10, 10, 2.0, Vec3::ZERO, |col, row| !(col == 5 && row < 8));
    let start = Vec3::new(3.0, 0.0, 3.0);
    let end = Vec3::new(17.0, 0.0, 3.0);

    let (_, nodes) = mesh.find_path(start, end).expect("path around the wall");
    let corners: Vec<Vec3> = nodes[1..nodes.len() - 1].iter().map(|n| n.position).collect();
    assert_eq!(corners.len(), 2, "nodes {:?}", nodes);
    assert!(corners[0].distance(Vec3::new(10.0, 0.0, 16.0)) < 1e-3, "nodes {:?}", nodes);
    assert!(corners[1].distance(Vec3::new(12.0, 0.0, 16.0)) < 1e-3, "nodes {:?}", nodes);

    let shortest = Vec2::new(7.0, 13.0).length() + 2.0 + Vec2::new(5.0, 13.0).length();
    assert!((path_length(&nodes) - shortest).abs() < 1e-3);
}

#[test]
fn segment_walkability_follows_the_outline() {
    // 4 x 4 cells with cell (1, 1) missing.
    let mesh = PolyNavMesh::grid(4, 4, 1.0, Vec3::ZERO, |col, row| !(col == 1 && row == 1));

    assert!(mesh.segment_walkable(Vec3::new(0.5, 0.0, 3.5), Vec3::new(3.5, 0.0, 2.5)));
    assert!(!mesh.segment_walkable(Vec3::new(0.5, 0.0, 1.5), Vec3::new(2.5, 0.0, 1.5)), "through the hole");
    // Corner to corner across the hole touches the outline only at its ends.
    assert!(!mesh.segment_walkable(Vec3::new(1.0, 0.0, 1.0), Vec3::new(2.0, 0.0, 2.0)));
    // Running along the hole's edge stays on the floor.
    assert!(mesh.segment_walkable(Vec3::new(0.5, 0.0, 1.0), Vec3::new(3.5, 0.0, 1.0)));
    // Leaving the grid.
    assert!(!mesh.segment_walkable(Vec3::new(3.5, 0.0, 3.5), Vec3::new(5.0, 0.0, 3.5)));
}

#[test]
fn disconnected_islands_have_no_corridor() {
    let mesh = PolyNavMesh::grid(10, 3, 1.0, Vec3::ZERO, |col, _| col != 4 && col != 5);
    let start = Vec3::new(0.5, 0.0, 1.5);
    let end = Vec3::new(9.5, 0.0, 1.5);

    assert!(mesh.locate(start).is_some());
    assert!(mesh.locate(end).is_some());
    assert!(mesh.find_corridor(start, end).is_none());
    assert!(mesh.find_path(start, end).is_none());
}

#[test]
fn off_mesh_link_joins_islands() {
    let mut mesh = PolyNavMesh::grid(10, 3, 1.0, Vec3::ZERO, |col, _| col != 4 && col != 5);
    let entry = Vec3::new(3.5, 0.0, 1.5);
    let exit = Vec3::new(6.5, 0.0, 1.5);
    let link = mesh.add_link(entry, exit, true).expect("both link ends are on the mesh");

    let start = Vec3::new(0.5, 0.0, 1.5);
    let end = Vec3::new(9.5, 0.0, 1.5);
    let (corridor, nodes) = mesh.find_path(start, end).expect("link makes the islands reachable");

    assert!(corridor.steps.iter().any(|s| s.via_link == Some(link)));
    let link_index = nodes
        .iter()
        .position(|n| n.kind == NodeKind::OffMeshLink)
        .expect("link entry must be tagged");
    assert!(nodes[link_index].position.distance(entry) < 1e-4);
    assert!(nodes[link_index + 1].position.distance(exit) < 1e-4);
    assert_eq!(nodes[0].kind, NodeKind::Start);
    assert_eq!(nodes[nodes.len() - 1].kind, NodeKind::End);

    // Bidirectional: the way back uses the same link from its far end.
    let (_, back) = mesh.find_path(end, start).expect("link is bidirectional");
    let back_link = back.iter().find(|n| n.kind == NodeKind::OffMeshLink).expect("link entry on the way back");
    assert!(back_link.position.distance(exit) < 1e-4);
}

#[test]
fn one_way_link_is_not_taken_backwards() {
    let mut mesh = PolyNavMesh::grid(10, 3, 1.0, Vec3::ZERO, |col, _| col != 4 && col != 5);
    mesh.add_link(Vec3::new(3.5, 0.0, 1.5), Vec3::new(6.5, 0.0, 1.5), false)
        .expect("link ends on mesh");

    let west = Vec3::new(0.5, 0.0, 1.5);
    let east = Vec3::new(9.5, 0.0, 1.5);
    assert!(mesh.find_path(west, east).is_some());
    assert!(mesh.find_path(east, west).is_none());
}

#[test]
fn link_off_the_mesh_is_rejected() {
    let mut mesh = open_grid(2, 2);
    let result = mesh.add_link(Vec3::new(0.5, 0.0, 0.5), Vec3::new(50.0, 0.0, 50.0), true);
    assert!(matches!(result, Err(MeshError::Invalid(_))));
}

#[test]
fn nearest_floor_snaps_height_within_extent() {
    let mesh = PolyNavMesh::grid(4, 4, 1.0, Vec3::new(0.0, 2.0, 0.0), |_, _| true);

    let floor = mesh.nearest_floor(Vec3::new(1.5, 9.0, 1.5)).expect("floor is 7 below");
    assert!((floor.y - 2.0).abs() < 1e-4);
    assert!((floor.x - 1.5).abs() < 1e-4);

    assert!(mesh.nearest_floor(Vec3::new(1.5, 40.0, 1.5)).is_none(), "too far above the floor");

    // Slightly outside the grid snaps onto the boundary.
    let edge = mesh.nearest_floor(Vec3::new(-1.0, 2.0, 1.5)).expect("within horizontal reach");
    assert!(edge.x.abs() < 1e-4);
}

#[test]
fn random_pairs_on_open_grid_walk_straight() {
    let mesh = open_grid(12, 12);
    let mut rng = fastrand::Rng::with_seed(7);

    for _ in 0..100 {
        let start = Vec3::new(rng.f32() * 12.0, 0.0, rng.f32() * 12.0);
        let end = Vec3::new(rng.f32() * 12.0, 0.0, rng.f32() * 12.0);

        let (_, nodes) = mesh.find_path(start, end).expect("open grid is fully connected");
        assert_eq!(nodes[0].kind, NodeKind::Start);
        assert_eq!(nodes[nodes.len() - 1].kind, NodeKind::End);

        // The grid is convex, so the smoothed path is the straight line.
        let length = path_length(&nodes);
        assert!(
            (length - start.distance(end)).abs() < 1e-3,
            "{:?} -> {:?}: length {} vs straight {}",
            start,
            end,
            length,
            start.distance(end)
        );
    }
}

#[test]
fn description_round_trips_through_ron() {
    let text = r#"(
        vertices: [(0.0, 0.0, 0.0), (4.0, 0.0, 0.0), (4.0, 0.0, 4.0), (0.0, 0.0, 4.0), (8.0, 0.0, 0.0), (8.0, 0.0, 4.0)],
        polygons: [[0, 1, 2, 3], [1, 4, 5, 2]],
        links: [(start: (1.0, 0.0, 1.0), end: (7.0, 0.0, 3.0), bidirectional: false)],
    )"#;
    let desc: MeshDescription = ron::from_str(text).expect("description parses");
    let mesh = PolyNavMesh::from_description(&desc).expect("description is valid");

    assert_eq!(mesh.poly_count(), 2);
    assert!(mesh.is_loaded());
    let link = mesh.link(0).expect("link 0 exists");
    assert_eq!((link.start_poly, link.end_poly), (0, 1));
    assert!(!link.bidirectional);
}

#[test]
fn invalid_description_is_rejected() {
    let desc = MeshDescription {
        vertices: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1.0]],
        polygons: vec![vec![0, 1, 9]],
        links: Vec::new(),
    };
    assert!(matches!(PolyNavMesh::from_description(&desc), Err(MeshError::Invalid(_))));
}

#[test]
fn reload_without_source_fails() {
    let mut mesh = open_grid(2, 2);
    assert!(matches!(mesh.reload(), Err(MeshError::NoSource)));
}

#[test]
fn corridor_trim_front_clears_entry_link() {
    let mut corridor = Corridor {
        steps: vec![
            CorridorStep { poly: 0, via_link: None },
            CorridorStep { poly: 3, via_link: Some(1) },
            CorridorStep { poly: 4, via_link: None },
        ],
    };
    assert_eq!(corridor.position_of(3), Some(1));

    corridor.trim_front(1);
    assert_eq!(corridor.len(), 2);
    assert_eq!(corridor.first_poly(), Some(3));
    assert_eq!(corridor.steps[0].via_link, None);

    // Out of range is a no-op.
    corridor.trim_front(5);
    assert_eq!(corridor.len(), 2);
}

#[test]
fn cross_sign_marks_left_turns_positive() {
    let apex = Vec3::ZERO;
    let a = Vec3::new(1.0, 0.0, 0.0);
    assert!(funnel::cross_xz(apex, a, Vec3::new(1.0, 0.0, 1.0)) > 0.0);
    assert!(funnel::cross_xz(apex, a, Vec3::new(1.0, 0.0, -1.0)) < 0.0);
}

#[test]
fn demo_mesh_routes_around_the_hole() {
    let desc: MeshDescription =
        ron::from_str(include_str!("../../../assets/demo_mesh.ron")).expect("demo mesh parses");
    let mesh = PolyNavMesh::from_description(&desc).expect("demo mesh is valid");
    assert_eq!(mesh.poly_count(), 14);

    // From the south-east corner to the far side of the hole.
    let (_, nodes) = mesh
        .find_path(Vec3::new(90.0, 0.0, 15.0), Vec3::new(60.0, 0.0, 60.0))
        .expect("path around the hole");
    for node in &nodes {
        let inside_hole = node.position.x > 25.0 + 1e-3
            && node.position.x < 75.0 - 1e-3
            && node.position.z > 25.0 + 1e-3
            && node.position.z < 50.0 - 1e-3;
        assert!(!inside_hole, "node {:?} inside the hole", node);
    }
    assert!(nodes.len() > 2, "must turn at least once: {:?}", nodes);
}
