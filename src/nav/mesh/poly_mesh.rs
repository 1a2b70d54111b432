use bevy::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::path::{Path, PathBuf};

use super::{Corridor, LinkId, NavMeshQuery, PathNode, PolyRef};
use crate::nav::error::MeshError;

/// Horizontal reach when snapping a point that lies outside every polygon.
const HORIZONTAL_EXTENT: f32 = 5.0;
/// Vertical reach when matching a point against polygon floors.
const VERTICAL_EXTENT: f32 = 10.0;
/// Ground-plane slack when testing whether a point lies on a polygon.
const ON_FLOOR_EPSILON_SQ: f32 = 1e-6;
/// Relative slack for parallel and touching segment tests.
const CONTACT_EPSILON: f32 = 1e-5;

/// On-disk (RON) form of a [`PolyNavMesh`]. Coordinates are mesh space.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshDescription {
    pub vertices: Vec<[f32; 3]>,
    /// Convex polygons as vertex index lists.
    pub polygons: Vec<Vec<u32>>,
    #[serde(default)]
    pub links: Vec<LinkDescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkDescription {
    pub start: [f32; 3],
    pub end: [f32; 3],
    #[serde(default = "default_bidirectional")]
    pub bidirectional: bool,
}

fn default_bidirectional() -> bool {
    true
}

#[derive(Debug, Clone)]
pub(super) struct Poly {
    pub verts: SmallVec<[u32; 6]>,
    /// Neighbour across edge `i` (from `verts[i]` to `verts[i + 1]`).
    pub neighbors: SmallVec<[Option<PolyRef>; 6]>,
    /// Off-mesh links that can be taken from this polygon.
    pub links: SmallVec<[LinkId; 2]>,
    pub center: Vec3,
}

/// Jump, ladder or teleport connection between two points on the mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct OffMeshLink {
    pub start: Vec3,
    pub end: Vec3,
    pub start_poly: PolyRef,
    pub end_poly: PolyRef,
    pub bidirectional: bool,
}

impl OffMeshLink {
    /// Entry point, exit point and exit polygon when taking the link from `poly`.
    pub fn traverse_from(&self, poly: PolyRef) -> Option<(Vec3, Vec3, PolyRef)> {
        if poly == self.start_poly {
            Some((self.start, self.end, self.end_poly))
        } else if self.bidirectional && poly == self.end_poly {
            Some((self.end, self.start, self.start_poly))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PolyNavMesh {
    pub(super) vertices: Vec<Vec3>,
    pub(super) polys: Vec<Poly>,
    pub(super) links: Vec<OffMeshLink>,
    /// Polygon edges with no neighbour: the outline of the walkable area.
    boundary: Vec<(Vec3, Vec3)>,
    source: Option<PathBuf>,
}

impl PolyNavMesh {
    pub fn from_description(desc: &MeshDescription) -> Result<Self, MeshError> {
        let vertex_count = desc.vertices.len() as u32;
        for (i, poly) in desc.polygons.iter().enumerate() {
            if poly.len() < 3 {
                return Err(MeshError::Invalid(format!("polygon {} has fewer than 3 vertices", i)));
            }
            if let Some(bad) = poly.iter().find(|&&v| v >= vertex_count) {
                return Err(MeshError::Invalid(format!("polygon {} references missing vertex {}", i, bad)));
            }
        }

        let vertices = desc.vertices.iter().map(|v| Vec3::from_array(*v)).collect();
        let mut mesh = Self::assemble(vertices, &desc.polygons);
        for link in &desc.links {
            mesh.add_link(Vec3::from_array(link.start), Vec3::from_array(link.end), link.bidirectional)?;
        }
        Ok(mesh)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, MeshError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let desc: MeshDescription = ron::from_str(&contents)?;
        let mut mesh = Self::from_description(&desc)?;
        mesh.source = Some(path.to_path_buf());
        info!(
            "Loaded navmesh from {}: {} polygons, {} links",
            path.display(),
            mesh.polys.len(),
            mesh.links.len()
        );
        Ok(mesh)
    }

    /// Flat grid of square cells on the `y = origin.y` plane. Cells for which
    /// `walkable(col, row)` is false are left out.
    pub fn grid(
        cols: usize,
        rows: usize,
        cell_size: f32,
        origin: Vec3,
        walkable: impl Fn(usize, usize) -> bool,
    ) -> Self {
        let mut vertices = Vec::with_capacity((cols + 1) * (rows + 1));
        for row in 0..=rows {
            for col in 0..=cols {
                vertices.push(origin + Vec3::new(col as f32 * cell_size, 0.0, row as f32 * cell_size));
            }
        }

        let index = |col: usize, row: usize| (row * (cols + 1) + col) as u32;
        let mut polygons = Vec::new();
        for row in 0..rows {
            for col in 0..cols {
                if !walkable(col, row) {
                    continue;
                }
                polygons.push(vec![
                    index(col, row),
                    index(col + 1, row),
                    index(col + 1, row + 1),
                    index(col, row + 1),
                ]);
            }
        }

        Self::assemble(vertices, &polygons)
    }

    fn assemble(vertices: Vec<Vec3>, polygons: &[Vec<u32>]) -> Self {
        let mut polys: Vec<Poly> = polygons
            .iter()
            .map(|indices| {
                let sum: Vec3 = indices.iter().map(|&i| vertices[i as usize]).sum();
                Poly {
                    verts: indices.iter().copied().collect(),
                    neighbors: SmallVec::from_elem(None, indices.len()),
                    links: SmallVec::new(),
                    center: sum / indices.len() as f32,
                }
            })
            .collect();

        // Polygons sharing an edge (in either direction) are neighbours.
        let mut edges: FxHashMap<(u32, u32), (PolyRef, usize)> = FxHashMap::default();
        for poly_idx in 0..polys.len() {
            let n = polys[poly_idx].verts.len();
            for edge in 0..n {
                let a = polys[poly_idx].verts[edge];
                let b = polys[poly_idx].verts[(edge + 1) % n];
                let key = (a.min(b), a.max(b));
                if let Some(&(other, other_edge)) = edges.get(&key) {
                    polys[poly_idx].neighbors[edge] = Some(other);
                    polys[other as usize].neighbors[other_edge] = Some(poly_idx as PolyRef);
                } else {
                    edges.insert(key, (poly_idx as PolyRef, edge));
                }
            }
        }

        let mut boundary = Vec::new();
        for poly in &polys {
            for (edge, neighbor) in poly.neighbors.iter().enumerate() {
                if neighbor.is_none() {
                    let a = vertices[poly.verts[edge] as usize];
                    let b = vertices[poly.verts[(edge + 1) % poly.verts.len()] as usize];
                    boundary.push((a, b));
                }
            }
        }

        Self {
            vertices,
            polys,
            links: Vec::new(),
            boundary,
            source: None,
        }
    }

    pub fn add_link(&mut self, start: Vec3, end: Vec3, bidirectional: bool) -> Result<LinkId, MeshError> {
        let start_poly = self
            .locate(start)
            .ok_or_else(|| MeshError::Invalid(format!("link start {} is off the mesh", start)))?;
        let end_poly = self
            .locate(end)
            .ok_or_else(|| MeshError::Invalid(format!("link end {} is off the mesh", end)))?;

        let id = self.links.len() as LinkId;
        self.links.push(OffMeshLink {
            start,
            end,
            start_poly,
            end_poly,
            bidirectional,
        });
        self.polys[start_poly as usize].links.push(id);
        if bidirectional && end_poly != start_poly {
            self.polys[end_poly as usize].links.push(id);
        }
        Ok(id)
    }

    pub fn poly_count(&self) -> usize {
        self.polys.len()
    }

    pub fn link(&self, id: LinkId) -> Option<&OffMeshLink> {
        self.links.get(id as usize)
    }

    pub fn center(&self, poly: PolyRef) -> Option<Vec3> {
        self.polys.get(poly as usize).map(|p| p.center)
    }

    pub(super) fn poly_vertex(&self, poly: &Poly, i: usize) -> Vec3 {
        self.vertices[poly.verts[i % poly.verts.len()] as usize]
    }

    fn contains_xz(&self, poly: &Poly, p: Vec3) -> bool {
        let n = poly.verts.len();
        let mut sign = 0.0f32;
        for i in 0..n {
            let a = self.poly_vertex(poly, i);
            let b = self.poly_vertex(poly, i + 1);
            let cross = (b.x - a.x) * (p.z - a.z) - (b.z - a.z) * (p.x - a.x);
            if cross.abs() <= f32::EPSILON {
                continue;
            }
            if sign == 0.0 {
                sign = cross.signum();
            } else if cross.signum() != sign {
                return false;
            }
        }
        true
    }

    /// Floor height of `poly` at the ground coordinates of `p`.
    fn height_at(&self, poly: &Poly, p: Vec3) -> f32 {
        let v0 = self.poly_vertex(poly, 0);
        for i in 1..poly.verts.len() - 1 {
            let v1 = self.poly_vertex(poly, i);
            let v2 = self.poly_vertex(poly, i + 1);
            let det = (v1.z - v2.z) * (v0.x - v2.x) + (v2.x - v1.x) * (v0.z - v2.z);
            if det.abs() <= f32::EPSILON {
                continue;
            }
            let w0 = ((v1.z - v2.z) * (p.x - v2.x) + (v2.x - v1.x) * (p.z - v2.z)) / det;
            let w1 = ((v2.z - v0.z) * (p.x - v2.x) + (v0.x - v2.x) * (p.z - v2.z)) / det;
            let w2 = 1.0 - w0 - w1;
            let eps = -1e-4;
            if w0 >= eps && w1 >= eps && w2 >= eps {
                return w0 * v0.y + w1 * v1.y + w2 * v2.y;
            }
        }
        poly.center.y
    }

    /// Closest point of `poly` to `p`, measured on the ground plane.
    pub(super) fn closest_point(&self, poly_ref: PolyRef, p: Vec3) -> Vec3 {
        let poly = &self.polys[poly_ref as usize];
        if self.contains_xz(poly, p) {
            return Vec3::new(p.x, self.height_at(poly, p), p.z);
        }

        let mut best = poly.center;
        let mut best_dist = f32::MAX;
        for i in 0..poly.verts.len() {
            let a = self.poly_vertex(poly, i);
            let b = self.poly_vertex(poly, i + 1);
            let ab = Vec2::new(b.x - a.x, b.z - a.z);
            let ap = Vec2::new(p.x - a.x, p.z - a.z);
            let len_sq = ab.length_squared();
            let t = if len_sq > 0.0 { (ap.dot(ab) / len_sq).clamp(0.0, 1.0) } else { 0.0 };
            let candidate = a.lerp(b, t);
            let dist = Vec2::new(candidate.x - p.x, candidate.z - p.z).length_squared();
            if dist < best_dist {
                best_dist = dist;
                best = candidate;
            }
        }
        best
    }

    /// Whether some polygon floor lies under `p`, edges included.
    fn on_floor(&self, p: Vec3) -> bool {
        (0..self.polys.len()).any(|i| {
            let closest = self.closest_point(i as PolyRef, p);
            Vec2::new(closest.x - p.x, closest.z - p.z).length_squared() <= ON_FLOOR_EPSILON_SQ
                && (closest.y - p.y).abs() <= VERTICAL_EXTENT
        })
    }

    /// Whether the straight segment `a..b` stays on the mesh, measured on the
    /// ground plane. Running along the outline counts as on the mesh.
    ///
    /// The segment is cut wherever it meets the outline; between two cuts it
    /// is either wholly on or wholly off the mesh, so one sample per piece
    /// decides it.
    pub(super) fn segment_walkable(&self, a: Vec3, b: Vec3) -> bool {
        let mut cuts: SmallVec<[f32; 16]> = SmallVec::new();
        cuts.push(0.0);
        cuts.push(1.0);
        for &(p, q) in &self.boundary {
            segment_contacts(a, b, p, q, &mut cuts);
        }
        cuts.sort_by(f32::total_cmp);

        cuts.windows(2)
            .filter(|w| w[1] - w[0] > CONTACT_EPSILON)
            .all(|w| self.on_floor(a.lerp(b, (w[0] + w[1]) * 0.5)))
    }

    /// Left and right end of the edge shared by `from` and `to`, as seen when
    /// walking from `from` into `to`.
    pub(super) fn portal(&self, from: PolyRef, to: PolyRef) -> Option<(Vec3, Vec3)> {
        let poly = self.polys.get(from as usize)?;
        let edge = poly.neighbors.iter().position(|n| *n == Some(to))?;
        let p = self.poly_vertex(poly, edge);
        let q = self.poly_vertex(poly, edge + 1);
        if super::funnel::cross_xz(poly.center, p, q) > 0.0 {
            Some((q, p))
        } else {
            Some((p, q))
        }
    }
}

/// Parameters along `a..b` (in `[0, 1]`) where it meets the edge `p..q` on
/// the ground plane. A collinear overlap contributes both of its ends.
fn segment_contacts(a: Vec3, b: Vec3, p: Vec3, q: Vec3, cuts: &mut SmallVec<[f32; 16]>) {
    let d = Vec2::new(b.x - a.x, b.z - a.z);
    let e = Vec2::new(q.x - p.x, q.z - p.z);
    let ap = Vec2::new(p.x - a.x, p.z - a.z);
    let (d_len, e_len) = (d.length(), e.length());
    if d_len <= f32::EPSILON || e_len <= f32::EPSILON {
        return;
    }

    let denom = d.perp_dot(e);
    if denom.abs() > CONTACT_EPSILON * d_len * e_len {
        let t = ap.perp_dot(e) / denom;
        let u = ap.perp_dot(d) / denom;
        let slack = CONTACT_EPSILON * 10.0;
        if (-slack..=1.0 + slack).contains(&t) && (-slack..=1.0 + slack).contains(&u) {
            cuts.push(t.clamp(0.0, 1.0));
        }
        return;
    }

    // Parallel: only a shared line matters.
    if ap.perp_dot(d).abs() / d_len > CONTACT_EPSILON * d_len.max(1.0) {
        return;
    }
    let len_sq = d_len * d_len;
    let aq = Vec2::new(q.x - a.x, q.z - a.z);
    for t in [ap.dot(d) / len_sq, aq.dot(d) / len_sq] {
        if (0.0..=1.0).contains(&t) {
            cuts.push(t);
        }
    }
}

impl NavMeshQuery for PolyNavMesh {
    fn is_loaded(&self) -> bool {
        !self.polys.is_empty()
    }

    fn locate(&self, point: Vec3) -> Option<PolyRef> {
        // Prefer a polygon directly above/below the point.
        let mut best: Option<(PolyRef, f32)> = None;
        for (i, poly) in self.polys.iter().enumerate() {
            if !self.contains_xz(poly, point) {
                continue;
            }
            let dy = (self.height_at(poly, point) - point.y).abs();
            if dy <= VERTICAL_EXTENT && best.map_or(true, |(_, d)| dy < d) {
                best = Some((i as PolyRef, dy));
            }
        }
        if let Some((poly, _)) = best {
            return Some(poly);
        }

        // Otherwise snap to the nearest polygon within reach.
        let mut nearest: Option<(PolyRef, f32)> = None;
        for i in 0..self.polys.len() {
            let closest = self.closest_point(i as PolyRef, point);
            let dy = (closest.y - point.y).abs();
            let dxz = Vec2::new(closest.x - point.x, closest.z - point.z).length();
            if dxz <= HORIZONTAL_EXTENT && dy <= VERTICAL_EXTENT && nearest.map_or(true, |(_, d)| dxz < d) {
                nearest = Some((i as PolyRef, dxz));
            }
        }
        nearest.map(|(poly, _)| poly)
    }

    fn nearest_floor(&self, point: Vec3) -> Option<Vec3> {
        let poly = self.locate(point)?;
        Some(self.closest_point(poly, point))
    }

    fn find_corridor(&self, start: Vec3, end: Vec3) -> Option<Corridor> {
        let start_poly = self.locate(start)?;
        let end_poly = self.locate(end)?;
        super::astar::find_corridor(self, start, start_poly, end, end_poly)
    }

    fn straight_path(&self, start: Vec3, end: Vec3, corridor: &Corridor) -> Vec<PathNode> {
        super::funnel::straight_path(self, start, end, corridor)
    }

    fn reload(&mut self) -> Result<(), MeshError> {
        let Some(source) = self.source.clone() else {
            return Err(MeshError::NoSource);
        };
        *self = Self::load(&source)?;
        Ok(())
    }
}
