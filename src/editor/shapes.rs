//! Reference editors (§4.3): axis-aligned box, sphere, and single-voxel
//! point, each implementing [`super::VbrEditor`]. Each decides `Fill`/
//! `Clear`/`Unaffected` against its own bounding shape before the engine
//! ever reads a leaf, so untouched subtrees short-circuit at the highest
//! possible level.

use super::{EditDecision, VbrEditor};
use crate::color::Albedo;
use crate::spatial::vector::V3c;
use crate::spatial::Cube;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    Fill,
    Clear,
}

fn sq_dist_f32(a: V3c<f32>, b: V3c<f32>) -> f32 {
    let d = a - b;
    d.x * d.x + d.y * d.y + d.z * d.z
}

fn cube_farthest_point(bounds: &Cube, from: V3c<f32>) -> V3c<f32> {
    let max_corner = bounds.min_position + V3c::unit(bounds.size);
    let pick = |lo: f32, hi: f32, f: f32| if (f - lo).abs() > (f - hi).abs() { lo } else { hi };
    V3c::new(
        pick(bounds.min_position.x, max_corner.x, from.x),
        pick(bounds.min_position.y, max_corner.y, from.y),
        pick(bounds.min_position.z, max_corner.z, from.z),
    )
}

/// Fills or clears every voxel in `[min, max)`.
pub struct AabbEditor {
    pub min: V3c<u32>,
    pub max: V3c<u32>,
    pub mode: FillMode,
    pub color: Albedo,
}

impl AabbEditor {
    fn bounds_f32(&self) -> (V3c<f32>, V3c<f32>) {
        (self.min.into(), self.max.into())
    }

    fn contains_voxel(&self, position: V3c<u32>) -> bool {
        position.x >= self.min.x
            && position.x < self.max.x
            && position.y >= self.min.y
            && position.y < self.max.y
            && position.z >= self.min.z
            && position.z < self.max.z
    }
}

impl VbrEditor for AabbEditor {
    fn edit_node(&self, _level: usize, bounds: &Cube) -> EditDecision {
        let (aabb_min, aabb_max) = self.bounds_f32();
        if !bounds.intersects_aabb(aabb_min, aabb_max) {
            return EditDecision::Unaffected;
        }
        if bounds.contained_by_aabb(aabb_min, aabb_max) {
            return match self.mode {
                FillMode::Fill => EditDecision::Fill,
                FillMode::Clear => EditDecision::Clear,
            };
        }
        EditDecision::Proceed
    }

    fn fill_color(&self) -> Albedo {
        self.color
    }

    fn edit_voxel(
        &self,
        position: V3c<u32>,
        current: bool,
        current_color: Albedo,
    ) -> (bool, Albedo) {
        if !self.contains_voxel(position) {
            return (current, current_color);
        }
        match self.mode {
            FillMode::Fill => (true, self.color),
            FillMode::Clear => (false, current_color),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SphereMode {
    Fill,
    Clear,
    /// Recolors occupied voxels within the sphere; never changes occupancy.
    Paint,
}

pub struct SphereEditor {
    pub center: V3c<u32>,
    pub radius: u32,
    pub mode: SphereMode,
    pub color: Albedo,
}

impl SphereEditor {
    fn center_f32(&self) -> V3c<f32> {
        self.center.into()
    }

    fn radius_sq_f32(&self) -> f32 {
        (self.radius as f32) * (self.radius as f32)
    }
}

impl VbrEditor for SphereEditor {
    fn edit_node(&self, _level: usize, bounds: &Cube) -> EditDecision {
        let center = self.center_f32();
        let closest = bounds.closest_point(center);
        if sq_dist_f32(closest, center) > self.radius_sq_f32() {
            return EditDecision::Unaffected;
        }
        match self.mode {
            SphereMode::Paint => EditDecision::Proceed,
            SphereMode::Fill | SphereMode::Clear => {
                let farthest = cube_farthest_point(bounds, center);
                if sq_dist_f32(farthest, center) <= self.radius_sq_f32() {
                    match self.mode {
                        SphereMode::Fill => EditDecision::Fill,
                        SphereMode::Clear => EditDecision::Clear,
                        SphereMode::Paint => unreachable!(),
                    }
                } else {
                    EditDecision::Proceed
                }
            }
        }
    }

    fn fill_color(&self) -> Albedo {
        self.color
    }

    fn edit_voxel(
        &self,
        position: V3c<u32>,
        current: bool,
        current_color: Albedo,
    ) -> (bool, Albedo) {
        let within = position.distance_sq(&self.center) <= (self.radius as u64) * (self.radius as u64);
        match self.mode {
            SphereMode::Fill => {
                if within {
                    (true, self.color)
                } else {
                    (current, current_color)
                }
            }
            SphereMode::Clear => {
                if within {
                    (false, current_color)
                } else {
                    (current, current_color)
                }
            }
            SphereMode::Paint => {
                if within && current {
                    (true, self.color)
                } else {
                    (current, current_color)
                }
            }
        }
    }
}

/// Sets or clears exactly one voxel.
pub struct PointEditor {
    pub position: V3c<u32>,
    pub value: bool,
    pub color: Albedo,
}

impl VbrEditor for PointEditor {
    fn edit_node(&self, _level: usize, bounds: &Cube) -> EditDecision {
        let p: V3c<f32> = self.position.into();
        if bounds.contains(&p) {
            EditDecision::Proceed
        } else {
            EditDecision::Unaffected
        }
    }

    fn fill_color(&self) -> Albedo {
        self.color
    }

    fn edit_voxel(
        &self,
        position: V3c<u32>,
        current: bool,
        current_color: Albedo,
    ) -> (bool, Albedo) {
        if position == self.position {
            (self.value, self.color)
        } else {
            (current, current_color)
        }
    }
}
