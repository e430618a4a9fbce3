//! Spatial utilities shared by the edit engine and garbage collector:
//! axis-aligned cubes, octant hashing and the raster linearization used to
//! index into leaf bricks and VBR chunks.
//!
//! Grounded on the reference octree's `spatial::Cube` / `spatial::math`
//! modules; `hash_region` and `flat_projection` are carried over almost
//! verbatim since they are general spatial math, independent of the
//! reference codebase's rendering-specific code.

pub mod vector;

use vector::V3c;

/// An axis-aligned cube described by its minimum corner and side length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cube {
    pub min_position: V3c<f32>,
    pub size: f32,
}

impl Cube {
    pub fn root_bounds(size: f32) -> Self {
        Self {
            min_position: V3c::unit(0.),
            size,
        }
    }

    pub fn contains(&self, position: &V3c<f32>) -> bool {
        position.x >= self.min_position.x
            && position.x < self.min_position.x + self.size
            && position.y >= self.min_position.y
            && position.y < self.min_position.y + self.size
            && position.z >= self.min_position.z
            && position.z < self.min_position.z + self.size
    }

    pub fn intersects_aabb(&self, aabb_min: V3c<f32>, aabb_max: V3c<f32>) -> bool {
        let my_max = self.min_position + V3c::unit(self.size);
        self.min_position.x < aabb_max.x
            && my_max.x > aabb_min.x
            && self.min_position.y < aabb_max.y
            && my_max.y > aabb_min.y
            && self.min_position.z < aabb_max.z
            && my_max.z > aabb_min.z
    }

    pub fn contained_by_aabb(&self, aabb_min: V3c<f32>, aabb_max: V3c<f32>) -> bool {
        let my_max = self.min_position + V3c::unit(self.size);
        self.min_position.x >= aabb_min.x
            && self.min_position.y >= aabb_min.y
            && self.min_position.z >= aabb_min.z
            && my_max.x <= aabb_max.x
            && my_max.y <= aabb_max.y
            && my_max.z <= aabb_max.z
    }

    /// The bounding box of one of the 8 octants of this cube.
    pub fn child_bounds_for(&self, octant: u8) -> Cube {
        Cube {
            min_position: self.min_position + octant_offset(octant) * (self.size / 2.),
            size: self.size / 2.,
        }
    }

    /// Closest point on/in the cube to `point`, used for sphere-shaped edits.
    pub fn closest_point(&self, point: V3c<f32>) -> V3c<f32> {
        let max = self.min_position + V3c::unit(self.size);
        V3c::new(
            point.x.clamp(self.min_position.x, max.x),
            point.y.clamp(self.min_position.y, max.y),
            point.z.clamp(self.min_position.z, max.z),
        )
    }
}

/// Offset (in units of half the parent size) of the given octant's min corner.
pub fn octant_offset(octant: u8) -> V3c<f32> {
    match octant {
        0 => V3c::new(0., 0., 0.),
        1 => V3c::new(1., 0., 0.),
        2 => V3c::new(0., 0., 1.),
        3 => V3c::new(1., 0., 1.),
        4 => V3c::new(0., 1., 0.),
        5 => V3c::new(1., 1., 0.),
        6 => V3c::new(0., 1., 1.),
        7 => V3c::new(1., 1., 1.),
        _ => panic!("invalid octant index: {octant}"),
    }
}

/// Maps a position relative to a cube's min corner to the octant (0..8)
/// containing it. Branchless, bit layout is x | (z<<1) | (y<<2).
pub fn hash_region(offset: &V3c<f32>, size: f32) -> u8 {
    let half_size = size / 2.0;
    (offset.x >= half_size) as u8
        + (offset.z >= half_size) as u8 * 2
        + (offset.y >= half_size) as u8 * 4
}

pub fn child_octant_for(bounds: &Cube, position: &V3c<f32>) -> u8 {
    debug_assert!(bounds.contains(position));
    hash_region(&(*position - bounds.min_position), bounds.size)
}

/// Raster (x + y*size + z*size^2) linearization of a 3d index, used both to
/// address leaf-brick occupancy bits and to linearize VBR chunk voxels.
pub fn flat_projection(x: u32, y: u32, z: u32, size: u32) -> u32 {
    x + (y * size) + (z * size * size)
}
