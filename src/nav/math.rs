//! Coordinate conventions.
//!
//! Three spaces meet in this crate:
//!
//! - **World space** (host native): `x`, `y` on the ground plane, `z` up.
//!   Agent positions, destinations and everything sent to the host use it.
//! - **Mesh space**: the navmesh is y-up, so a world point `(x, y, z)` is
//!   stored as `(x, z, y)`. Path nodes are kept in mesh space.
//! - **Loc order**: coordinates typed by a user list `y` before `x`
//!   (`loc Y X Z`). Only the command decoder deals with it.

use bevy::math::{Vec2, Vec3};

#[inline]
pub fn mesh_from_world(p: Vec3) -> Vec3 {
    Vec3::new(p.x, p.z, p.y)
}

#[inline]
pub fn world_from_mesh(p: Vec3) -> Vec3 {
    Vec3::new(p.x, p.z, p.y)
}

/// Swap the two ground axes, converting between loc order and world order.
#[inline]
pub fn swap_ground_axes(p: Vec3) -> Vec3 {
    Vec3::new(p.y, p.x, p.z)
}

/// Distance on the world ground plane, ignoring height.
#[inline]
pub fn planar_distance(a: Vec3, b: Vec3) -> f32 {
    Vec2::new(a.x - b.x, a.y - b.y).length()
}

/// Heading in degrees `[0, 360)` from `from` towards `to`, measured from
/// world +y clockwise towards +x (the host's compass convention).
pub fn heading_towards(from: Vec3, to: Vec3) -> f32 {
    let degrees = (to.x - from.x).atan2(to.y - from.y).to_degrees();
    if degrees < 0.0 {
        degrees + 360.0
    } else if degrees >= 360.0 {
        degrees - 360.0
    } else {
        degrees
    }
}
