//! Parallel recursive edit engine (§4.3): descends the geometry octree
//! (and, for color-fused edits, the color octree in lock-step), consulting
//! the editor's [`EditDecision`] at every subtree, and hash-conses the
//! rewritten nodes back into their pools.
//!
//! Grounded on the reference octree's `insert_at_lod_internal` descent
//! (`octree/update/insert.rs`) and its `Cube`/`child_sectant_for` spatial
//! helpers: the octant-bounds splitting and leaf-brick indexing are carried
//! over almost unchanged, generalized from a single mutating stack walk
//! over one typed voxel value into a pure, potentially-parallel rewrite
//! driven by an editor's four-way decision.

use crate::color::pool::ColorPool;
use crate::color::vbr::VbrChunk;
use crate::color::{Albedo, ColorPointer};
use crate::editor::{EditDecision, Editor, VbrEditor};
use crate::error::VoxDagError;
use crate::node_pool::{InnerNode, LeafBrick, NodePointer, NodePool};
use crate::parallel::{default_parallel_threshold, fan_out8};
use crate::spatial::vector::V3c;
use crate::spatial::{child_octant_for, flat_projection, octant_offset, Cube};

/// Descends the geometry octree, and optionally the color octree in
/// lock-step, rewriting whatever subtrees an [`Editor`]/[`VbrEditor`]
/// decides are in scope.
pub struct EditEngine<'a> {
    node_pool: &'a NodePool,
    color_pool: &'a ColorPool,
    parallel_threshold: usize,
}

impl<'a> EditEngine<'a> {
    pub fn new(node_pool: &'a NodePool, color_pool: &'a ColorPool) -> Self {
        Self {
            node_pool,
            color_pool,
            parallel_threshold: default_parallel_threshold(node_pool.config().level_count),
        }
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    fn root_bounds(&self) -> Cube {
        Cube::root_bounds(self.node_pool.config().world_side() as f32)
    }

    /// Applies a geometry-only edit, returning the new geometry root.
    pub fn edit<E: Editor>(&self, editor: &E, root: NodePointer) -> Result<NodePointer, VoxDagError> {
        let bounds = self.root_bounds();
        let ptr = self.rewrite_geometry(editor, 0, &bounds, root)?;
        log::debug!("geometry edit resolved root to {ptr:?}");
        Ok(ptr)
    }

    /// Applies a color-fused edit, returning the new `(geometry, color)` roots.
    pub fn edit_with_color<E: VbrEditor>(
        &self,
        editor: &E,
        geometry_root: NodePointer,
        color_root: ColorPointer,
    ) -> Result<(NodePointer, ColorPointer), VoxDagError> {
        let bounds = self.root_bounds();
        let result = self.rewrite_fused(editor, 0, &bounds, geometry_root, color_root)?;
        log::debug!(
            "fused edit resolved roots to geometry={:?} color={:?}",
            result.0, result.1
        );
        Ok(result)
    }

    // ---- geometry-only descent ----

    fn rewrite_geometry<E: Editor>(
        &self,
        editor: &E,
        level: usize,
        bounds: &Cube,
        ptr: NodePointer,
    ) -> Result<NodePointer, VoxDagError> {
        match editor.edit_node(level, bounds) {
            EditDecision::Unaffected => Ok(ptr),
            EditDecision::Clear => Ok(NodePointer::Null),
            EditDecision::Fill => Ok(NodePointer::Filled),
            EditDecision::Proceed => {
                if level == self.node_pool.config().leaf_level() {
                    self.rewrite_leaf_geometry(editor, bounds, ptr)
                } else if level < self.parallel_threshold {
                    self.rewrite_inner_parallel(editor, level, bounds, ptr)
                } else {
                    self.rewrite_inner_sequential(editor, level, bounds, ptr)
                }
            }
        }
    }

    fn rewrite_leaf_geometry<E: Editor>(
        &self,
        editor: &E,
        bounds: &Cube,
        ptr: NodePointer,
    ) -> Result<NodePointer, VoxDagError> {
        let brick = decode_leaf(self.node_pool, ptr);
        let mut out = LeafBrick(0);
        for z in 0..4u32 {
            for y in 0..4u32 {
                for x in 0..4u32 {
                    let idx = flat_projection(x, y, z, 4);
                    let global = voxel_coord(bounds, x, y, z);
                    let new_val = editor.edit_voxel(global, brick.get(idx));
                    out.set(idx, new_val);
                }
            }
        }
        self.node_pool.upsert_leaf(out)
    }

    fn rewrite_inner_sequential<E: Editor>(
        &self,
        editor: &E,
        level: usize,
        bounds: &Cube,
        ptr: NodePointer,
    ) -> Result<NodePointer, VoxDagError> {
        let children = decode_inner_children(self.node_pool, ptr);
        let mut new_children = [NodePointer::Null; 8];
        for octant in 0..8u8 {
            let child_bounds = bounds.child_bounds_for(octant);
            new_children[octant as usize] =
                self.rewrite_geometry(editor, level + 1, &child_bounds, children[octant as usize])?;
        }
        self.node_pool.upsert_inner(level, &InnerNode { children: new_children })
    }

    fn rewrite_inner_parallel<E: Editor>(
        &self,
        editor: &E,
        level: usize,
        bounds: &Cube,
        ptr: NodePointer,
    ) -> Result<NodePointer, VoxDagError> {
        let children = decode_inner_children(self.node_pool, ptr);
        let results = fan_out8(|octant| {
            let child_bounds = bounds.child_bounds_for(octant);
            self.rewrite_geometry(editor, level + 1, &child_bounds, children[octant as usize])
        });
        let mut new_children = [NodePointer::Null; 8];
        for (octant, result) in results.into_iter().enumerate() {
            new_children[octant] = result?;
        }
        self.node_pool.upsert_inner(level, &InnerNode { children: new_children })
    }

    // ---- fused geometry+color descent ----

    fn rewrite_fused<E: VbrEditor>(
        &self,
        editor: &E,
        level: usize,
        bounds: &Cube,
        geo_ptr: NodePointer,
        color_ptr: ColorPointer,
    ) -> Result<(NodePointer, ColorPointer), VoxDagError> {
        match editor.edit_node(level, bounds) {
            EditDecision::Unaffected => Ok((geo_ptr, color_ptr)),
            EditDecision::Clear => Ok((NodePointer::Null, ColorPointer::Null)),
            // Safe to return unconditionally: this is a bare enum value, not
            // yet packed. If it becomes the edit's own root it is stored as
            // ColorPool's root directly and never packed at all; if it ends
            // up as one of a parent's 8 children, upsert_color_node packs it
            // and materializes it into a VbrLeaf there if it doesn't fit.
            EditDecision::Fill => Ok((NodePointer::Filled, ColorPointer::SolidColor(editor.fill_color()))),
            EditDecision::Proceed => {
                if level == self.color_pool.config().leaf_level {
                    self.rewrite_color_leaf(editor, level, bounds, geo_ptr, color_ptr)
                } else if level < self.parallel_threshold {
                    self.rewrite_fused_inner_parallel(editor, level, bounds, geo_ptr, color_ptr)
                } else {
                    self.rewrite_fused_inner_sequential(editor, level, bounds, geo_ptr, color_ptr)
                }
            }
        }
    }

    fn rewrite_fused_inner_sequential<E: VbrEditor>(
        &self,
        editor: &E,
        level: usize,
        bounds: &Cube,
        geo_ptr: NodePointer,
        color_ptr: ColorPointer,
    ) -> Result<(NodePointer, ColorPointer), VoxDagError> {
        let geo_children = decode_inner_children(self.node_pool, geo_ptr);
        let color_children = decode_color_children(self.color_pool, color_ptr);
        let mut new_geo = [NodePointer::Null; 8];
        let mut new_color = [ColorPointer::Null; 8];
        for octant in 0..8u8 {
            let child_bounds = bounds.child_bounds_for(octant);
            let (g, c) = self.rewrite_fused(
                editor,
                level + 1,
                &child_bounds,
                geo_children[octant as usize],
                color_children[octant as usize],
            )?;
            new_geo[octant as usize] = g;
            new_color[octant as usize] = c;
        }
        self.finish_fused_inner(level, new_geo, new_color)
    }

    fn rewrite_fused_inner_parallel<E: VbrEditor>(
        &self,
        editor: &E,
        level: usize,
        bounds: &Cube,
        geo_ptr: NodePointer,
        color_ptr: ColorPointer,
    ) -> Result<(NodePointer, ColorPointer), VoxDagError> {
        let geo_children = decode_inner_children(self.node_pool, geo_ptr);
        let color_children = decode_color_children(self.color_pool, color_ptr);
        let results = fan_out8(|octant| {
            let child_bounds = bounds.child_bounds_for(octant);
            self.rewrite_fused(
                editor,
                level + 1,
                &child_bounds,
                geo_children[octant as usize],
                color_children[octant as usize],
            )
        });
        let mut new_geo = [NodePointer::Null; 8];
        let mut new_color = [ColorPointer::Null; 8];
        for (octant, result) in results.into_iter().enumerate() {
            let (g, c) = result?;
            new_geo[octant] = g;
            new_color[octant] = c;
        }
        self.finish_fused_inner(level, new_geo, new_color)
    }

    fn finish_fused_inner(
        &self,
        level: usize,
        new_geo: [NodePointer; 8],
        new_color: [ColorPointer; 8],
    ) -> Result<(NodePointer, ColorPointer), VoxDagError> {
        let geo = self.node_pool.upsert_inner(level, &InnerNode { children: new_geo })?;
        let color = self.upsert_color_node(level, new_color)?;
        Ok((geo, color))
    }

    /// Inserts an 8-way color node at `level`, folding it down to
    /// `Null`/`SolidColor` first if every child already agrees (the
    /// color-tree analogue of §4.2's Null/Filled normalization, extended
    /// since `SolidColor` is permitted at any depth, not just the root —
    /// §9 Open Questions).
    ///
    /// Any child that is a `SolidColor` too wide for the 30-bit tagged
    /// pointer field is materialized into an exact `VbrLeaf`-backed subtree
    /// before the node is packed, so a node's child words never carry a
    /// `SolidColor` that would corrupt on `pack`/`unpack` (§3.2).
    fn upsert_color_node(&self, level: usize, children: [ColorPointer; 8]) -> Result<ColorPointer, VoxDagError> {
        if children.iter().all(|c| matches!(c, ColorPointer::Null)) {
            return Ok(ColorPointer::Null);
        }
        if let ColorPointer::SolidColor(first) = children[0] {
            if children[1..].iter().all(|c| *c == ColorPointer::SolidColor(first)) {
                return Ok(ColorPointer::SolidColor(first));
            }
        }
        let mut packable = children;
        for child in packable.iter_mut() {
            if let ColorPointer::SolidColor(color) = *child {
                if !color.fits_solid_color_field() {
                    *child = self.materialize_solid_color(level + 1, color)?;
                }
            }
        }
        self.color_pool.upsert_node(packable)
    }

    /// Builds an exact representation of a uniformly-colored subtree rooted
    /// at `level`, for a color that would corrupt if folded straight to a
    /// packed `SolidColor` (§3.2). Descends through identical `Node`
    /// children down to the color leaf level, where a flat `VbrChunk` stores
    /// the color's full 32 bits exactly.
    fn materialize_solid_color(&self, level: usize, color: Albedo) -> Result<ColorPointer, VoxDagError> {
        if level == self.color_pool.config().leaf_level {
            let side = self.node_pool.config().side_at_level(level);
            let voxel_count = (side as u64).pow(3) as usize;
            let chunk = VbrChunk::encode(&vec![color; voxel_count]);
            return self.color_pool.set_leaf(None, &chunk);
        }
        let child = self.materialize_solid_color(level + 1, color)?;
        self.upsert_color_node(level, [child; 8])
    }

    /// Handles a subtree at the color octree's own leaf level `K`: decodes
    /// the existing VBR chunk (or uniform Null/SolidColor fill) for every
    /// voxel in this cube, decodes the matching geometry occupancy bits
    /// (which may span several geometry leaf bricks if `K` sits above the
    /// geometry leaf level), threads each voxel through `edit_voxel`, then
    /// re-encodes both the color chunk and the geometry subtree.
    fn rewrite_color_leaf<E: VbrEditor>(
        &self,
        editor: &E,
        level: usize,
        bounds: &Cube,
        geo_ptr: NodePointer,
        color_ptr: ColorPointer,
    ) -> Result<(NodePointer, ColorPointer), VoxDagError> {
        let side = self.node_pool.config().side_at_level(level);
        let voxel_count = (side as u64).pow(3) as usize;

        let old_colors: Vec<Albedo> = match color_ptr {
            ColorPointer::Null => vec![Albedo::default(); voxel_count],
            ColorPointer::SolidColor(c) => vec![c; voxel_count],
            ColorPointer::VbrLeaf(idx) => self.color_pool.read_leaf_chunk(idx).decode_all(),
            ColorPointer::Node(_) => unreachable!("color node below its own leaf level"),
        };
        let old_bits = decode_geometry_bits(self.node_pool, geo_ptr, level, side);

        let mut new_bits = vec![false; voxel_count];
        let mut new_colors = vec![Albedo::default(); voxel_count];
        for z in 0..side {
            for y in 0..side {
                for x in 0..side {
                    let idx = flat_projection(x, y, z, side) as usize;
                    let global = voxel_coord(bounds, x, y, z);
                    let (bit, color) = editor.edit_voxel(global, old_bits[idx], old_colors[idx]);
                    new_bits[idx] = bit;
                    new_colors[idx] = color;
                }
            }
        }

        let new_geo = build_geometry_subtree(self.node_pool, level, side, &new_bits)?;
        let new_color = self.encode_color_leaf(color_ptr, &new_colors)?;
        Ok((new_geo, new_color))
    }

    fn encode_color_leaf(
        &self,
        previous: ColorPointer,
        colors: &[Albedo],
    ) -> Result<ColorPointer, VoxDagError> {
        let first = colors[0];
        if first.fits_solid_color_field() && colors.iter().all(|c| *c == first) {
            return Ok(ColorPointer::SolidColor(first));
        }
        let chunk = VbrChunk::encode(colors);
        let existing = match previous {
            ColorPointer::VbrLeaf(idx) => Some(idx),
            _ => None,
        };
        self.color_pool.set_leaf(existing, &chunk)
    }
}

fn voxel_coord(bounds: &Cube, x: u32, y: u32, z: u32) -> V3c<u32> {
    let global = bounds.min_position + V3c::new(x as f32, y as f32, z as f32);
    V3c::new(global.x as u32, global.y as u32, global.z as u32)
}

fn decode_leaf(pool: &NodePool, ptr: NodePointer) -> LeafBrick {
    match ptr {
        NodePointer::Null => LeafBrick(0),
        NodePointer::Filled => LeafBrick(u64::MAX),
        NodePointer::Address(addr) => pool.read_leaf(addr),
    }
}

fn decode_inner_children(pool: &NodePool, ptr: NodePointer) -> [NodePointer; 8] {
    match ptr {
        NodePointer::Null => [NodePointer::Null; 8],
        NodePointer::Filled => [NodePointer::Filled; 8],
        NodePointer::Address(addr) => pool.read_inner(addr).children,
    }
}

fn decode_color_children(pool: &ColorPool, ptr: ColorPointer) -> [ColorPointer; 8] {
    match ptr {
        ColorPointer::Null => [ColorPointer::Null; 8],
        ColorPointer::SolidColor(c) => [ColorPointer::SolidColor(c); 8],
        ColorPointer::Node(idx) => pool.read_node(idx),
        ColorPointer::VbrLeaf(_) => unreachable!("color leaf above its own leaf level"),
    }
}

/// Decodes every voxel of the geometry subtree rooted at `(ptr, level)`
/// into a flat, raster-ordered bit vector of length `side^3`. Used when the
/// color tree's leaf level sits above the geometry leaf level, so a single
/// VBR chunk rewrite needs occupancy for more than one geometry brick.
fn decode_geometry_bits(pool: &NodePool, ptr: NodePointer, level: usize, side: u32) -> Vec<bool> {
    let n = (side as u64).pow(3) as usize;
    match ptr {
        NodePointer::Null => vec![false; n],
        NodePointer::Filled => vec![true; n],
        NodePointer::Address(addr) => {
            if level == pool.config().leaf_level() {
                debug_assert_eq!(side, 4, "geometry leaf brick must be 4 voxels wide");
                let brick = pool.read_leaf(addr);
                (0..64).map(|i| brick.get(i)).collect()
            } else {
                let inner = pool.read_inner(addr);
                let child_side = side / 2;
                let mut out = vec![false; n];
                for octant in 0..8u8 {
                    let child_bits =
                        decode_geometry_bits(pool, inner.children[octant as usize], level + 1, child_side);
                    scatter_octant(&mut out, &child_bits, octant, side, child_side);
                }
                out
            }
        }
    }
}

/// Inverse of [`decode_geometry_bits`]: rebuilds real geometry nodes from a
/// flat bit vector, hash-consing (and Null/Filled normalizing) every node it
/// constructs on the way back up.
fn build_geometry_subtree(
    pool: &NodePool,
    level: usize,
    side: u32,
    bits: &[bool],
) -> Result<NodePointer, VoxDagError> {
    if level == pool.config().leaf_level() {
        debug_assert_eq!(side, 4, "geometry leaf brick must be 4 voxels wide");
        let mut brick = LeafBrick(0);
        for i in 0..64u32 {
            brick.set(i, bits[i as usize]);
        }
        pool.upsert_leaf(brick)
    } else {
        let child_side = side / 2;
        let mut children = [NodePointer::Null; 8];
        for octant in 0..8u8 {
            let child_bits = gather_octant(bits, octant, side, child_side);
            children[octant as usize] = build_geometry_subtree(pool, level + 1, child_side, &child_bits)?;
        }
        pool.upsert_inner(level, &InnerNode { children })
    }
}

fn octant_base(octant: u8, child_side: u32) -> (u32, u32, u32) {
    let off = octant_offset(octant);
    (off.x as u32 * child_side, off.y as u32 * child_side, off.z as u32 * child_side)
}

fn scatter_octant(out: &mut [bool], child: &[bool], octant: u8, side: u32, child_side: u32) {
    let (ox, oy, oz) = octant_base(octant, child_side);
    for z in 0..child_side {
        for y in 0..child_side {
            for x in 0..child_side {
                let gi = flat_projection(x + ox, y + oy, z + oz, side) as usize;
                let li = flat_projection(x, y, z, child_side) as usize;
                out[gi] = child[li];
            }
        }
    }
}

fn gather_octant(bits: &[bool], octant: u8, side: u32, child_side: u32) -> Vec<bool> {
    let (ox, oy, oz) = octant_base(octant, child_side);
    let mut out = vec![false; (child_side as u64).pow(3) as usize];
    for z in 0..child_side {
        for y in 0..child_side {
            for x in 0..child_side {
                let gi = flat_projection(x + ox, y + oy, z + oz, side) as usize;
                let li = flat_projection(x, y, z, child_side) as usize;
                out[li] = bits[gi];
            }
        }
    }
    out
}

/// Read-only point query used by `VoxDag::get_voxel` and the test suite:
/// descends both trees directly rather than going through an editor.
pub fn sample_point(node_pool: &NodePool, color_pool: &ColorPool, position: V3c<u32>) -> (bool, Albedo) {
    let leaf_level = node_pool.config().leaf_level();
    let color_leaf_level = color_pool.config().leaf_level;
    let position_f: V3c<f32> = position.into();

    let mut geo_ptr = node_pool.get_root();
    let mut color_ptr = color_pool.get_root();
    let mut bounds = Cube::root_bounds(node_pool.config().world_side() as f32);
    let mut sampled_color: Option<Albedo> = None;

    for level in 0.. {
        if level == color_leaf_level {
            sampled_color = Some(sample_color_at(color_pool, &bounds, color_ptr, position_f));
        }
        if level == leaf_level {
            let occupied = sample_geometry_at(node_pool, geo_ptr, &bounds, position_f);
            return (occupied, sampled_color.unwrap_or(Albedo::default()));
        }

        let octant = child_octant_for(&bounds, &position_f);
        geo_ptr = match geo_ptr {
            NodePointer::Null => NodePointer::Null,
            NodePointer::Filled => NodePointer::Filled,
            NodePointer::Address(addr) => node_pool.read_inner(addr).children[octant as usize],
        };
        if level < color_leaf_level {
            color_ptr = match color_ptr {
                ColorPointer::Null => ColorPointer::Null,
                ColorPointer::SolidColor(c) => ColorPointer::SolidColor(c),
                ColorPointer::Node(idx) => color_pool.read_node(idx)[octant as usize],
                ColorPointer::VbrLeaf(_) => unreachable!("color leaf above its own leaf level"),
            };
        }
        bounds = bounds.child_bounds_for(octant);
    }
    unreachable!("level counter is unbounded, loop always returns at the leaf level")
}

fn sample_geometry_at(pool: &NodePool, ptr: NodePointer, bounds: &Cube, position: V3c<f32>) -> bool {
    match ptr {
        NodePointer::Null => false,
        NodePointer::Filled => true,
        NodePointer::Address(addr) => {
            let local = position - bounds.min_position;
            let idx = flat_projection(local.x as u32, local.y as u32, local.z as u32, 4);
            pool.read_leaf(addr).get(idx)
        }
    }
}

fn sample_color_at(pool: &ColorPool, bounds: &Cube, ptr: ColorPointer, position: V3c<f32>) -> Albedo {
    match ptr {
        ColorPointer::Null => Albedo::default(),
        ColorPointer::SolidColor(c) => c,
        ColorPointer::VbrLeaf(idx) => {
            let side = bounds.size as u32;
            let local = position - bounds.min_position;
            let index = flat_projection(local.x as u32, local.y as u32, local.z as u32, side);
            pool.read_leaf_chunk(idx).decode(index)
        }
        ColorPointer::Node(_) => unreachable!("color node at its own leaf level"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Albedo;
    use crate::config::{ColorPoolConfig, NodePoolConfig};
    use crate::editor::shapes::{AabbEditor, FillMode, PointEditor, SphereEditor, SphereMode};

    fn small_world() -> (NodePool, ColorPool) {
        let node_cfg = NodePoolConfig {
            level_count: 4,
            top_level_count: 1,
            word_bits_per_page: 8,
            page_bits_per_bucket: 1,
            bucket_bits_per_top_level: 3,
            bucket_bits_per_bottom_level: 4,
        };
        let color_cfg = ColorPoolConfig {
            leaf_level: node_cfg.leaf_level(),
            node_bits_per_node_page: 4,
            word_bits_per_leaf_page: 9,
            node_page_count: 8,
            leaf_page_count: 8,
            keep_history: false,
        };
        let node_pool = NodePool::new(node_cfg).unwrap();
        let color_pool = ColorPool::new(color_cfg, node_cfg.leaf_level()).unwrap();
        (node_pool, color_pool)
    }

    #[test]
    fn fill_aabb_then_readback_matches_inside_and_outside() {
        let (node_pool, color_pool) = small_world();
        let world_side = node_pool.config().world_side();
        let red = Albedo::rgba(255, 0, 0, 255);
        let editor = AabbEditor {
            min: V3c::new(0, 0, 0),
            max: V3c::new(world_side, world_side, world_side),
            mode: FillMode::Fill,
            color: red,
        };
        let engine = EditEngine::new(&node_pool, &color_pool);
        let (geo, color) = engine
            .edit_with_color(&editor, node_pool.get_root(), color_pool.get_root())
            .unwrap();
        node_pool.set_root(geo);
        color_pool.set_root(color);
        assert_eq!(geo, NodePointer::Filled);
        assert_eq!(color, ColorPointer::SolidColor(red));

        let (occ, c) = sample_point(&node_pool, &color_pool, V3c::new(0, 0, 0));
        assert!(occ);
        assert_eq!(c, red);
        let (occ, c) = sample_point(&node_pool, &color_pool, V3c::new(world_side - 1, world_side - 1, world_side - 1));
        assert!(occ);
        assert_eq!(c, red);
    }

    #[test]
    fn clearing_a_sphere_carves_a_hole_in_a_filled_world() {
        let (node_pool, color_pool) = small_world();
        let world_side = node_pool.config().world_side();
        let red = Albedo::rgba(255, 0, 0, 255);
        let fill = AabbEditor {
            min: V3c::new(0, 0, 0),
            max: V3c::new(world_side, world_side, world_side),
            mode: FillMode::Fill,
            color: red,
        };
        let engine = EditEngine::new(&node_pool, &color_pool);
        let (geo, color) = engine
            .edit_with_color(&fill, node_pool.get_root(), color_pool.get_root())
            .unwrap();
        node_pool.set_root(geo);
        color_pool.set_root(color);

        let center = V3c::new(world_side / 2, world_side / 2, world_side / 2);
        let carve = SphereEditor {
            center,
            radius: 2,
            mode: SphereMode::Clear,
            color: Albedo::default(),
        };
        let (geo, color) = engine
            .edit_with_color(&carve, node_pool.get_root(), color_pool.get_root())
            .unwrap();
        node_pool.set_root(geo);
        color_pool.set_root(color);

        assert_ne!(geo, NodePointer::Filled);
        assert_ne!(geo, NodePointer::Null);
        let (occ, _) = sample_point(&node_pool, &color_pool, center);
        assert!(!occ);
        let (occ, c) = sample_point(&node_pool, &color_pool, V3c::new(0, 0, 0));
        assert!(occ);
        assert_eq!(c, red);
    }

    #[test]
    fn repeating_an_identical_fill_is_a_hash_cons_no_op() {
        let (node_pool, color_pool) = small_world();
        let world_side = node_pool.config().world_side();
        let editor = AabbEditor {
            min: V3c::new(0, 0, 0),
            max: V3c::new(world_side / 2, world_side / 2, world_side / 2),
            mode: FillMode::Fill,
            color: Albedo::rgba(0, 255, 0, 255),
        };
        let engine = EditEngine::new(&node_pool, &color_pool);
        let (geo1, color1) = engine
            .edit_with_color(&editor, node_pool.get_root(), color_pool.get_root())
            .unwrap();
        node_pool.set_root(geo1);
        color_pool.set_root(color1);
        let (geo2, color2) = engine
            .edit_with_color(&editor, node_pool.get_root(), color_pool.get_root())
            .unwrap();
        assert_eq!(geo1, geo2);
        assert_eq!(color1, color2);
    }

    #[test]
    fn disjoint_fills_commute() {
        let world_side;
        let (a_geo, a_color) = {
            let (node_pool, color_pool) = small_world();
            world_side = node_pool.config().world_side();
            let engine = EditEngine::new(&node_pool, &color_pool);
            let a = PointEditor {
                position: V3c::new(0, 0, 0),
                value: true,
                color: Albedo::rgba(10, 20, 30, 255),
            };
            let b = PointEditor {
                position: V3c::new(world_side - 1, world_side - 1, world_side - 1),
                value: true,
                color: Albedo::rgba(40, 50, 60, 255),
            };
            let (g, c) = engine.edit_with_color(&a, node_pool.get_root(), color_pool.get_root()).unwrap();
            node_pool.set_root(g);
            color_pool.set_root(c);
            let (g, c) = engine.edit_with_color(&b, node_pool.get_root(), color_pool.get_root()).unwrap();
            (g, c)
        };
        let (b_geo, b_color) = {
            let (node_pool, color_pool) = small_world();
            let engine = EditEngine::new(&node_pool, &color_pool);
            let a = PointEditor {
                position: V3c::new(0, 0, 0),
                value: true,
                color: Albedo::rgba(10, 20, 30, 255),
            };
            let b = PointEditor {
                position: V3c::new(world_side - 1, world_side - 1, world_side - 1),
                value: true,
                color: Albedo::rgba(40, 50, 60, 255),
            };
            let (g, c) = engine.edit_with_color(&b, node_pool.get_root(), color_pool.get_root()).unwrap();
            node_pool.set_root(g);
            color_pool.set_root(c);
            let (g, c) = engine.edit_with_color(&a, node_pool.get_root(), color_pool.get_root()).unwrap();
            (g, c)
        };
        assert_eq!(a_geo, b_geo);
        assert_eq!(a_color, b_color);
    }

    #[test]
    fn geometry_only_edit_leaves_color_pool_untouched() {
        let (node_pool, color_pool) = small_world();
        let world_side = node_pool.config().world_side();
        let editor = AabbEditor {
            min: V3c::new(0, 0, 0),
            max: V3c::new(world_side, world_side, world_side),
            mode: FillMode::Fill,
            color: Albedo::default(),
        };
        let engine = EditEngine::new(&node_pool, &color_pool);
        let geo = engine.edit(&editor, node_pool.get_root()).unwrap();
        assert_eq!(geo, NodePointer::Filled);
    }

    /// Full alpha doesn't fit the 30-bit `SolidColor` field, so once a
    /// non-uniform edit forces it into a packed color-node child it must
    /// come back exactly, not truncated to 6 bits of alpha.
    #[test]
    fn full_alpha_survives_a_packed_color_node_child() {
        let (node_pool, color_pool) = small_world();
        let world_side = node_pool.config().world_side();
        let red = Albedo::rgba(255, 0, 0, 255);
        assert!(!red.fits_solid_color_field());

        let fill = AabbEditor {
            min: V3c::new(0, 0, 0),
            max: V3c::new(world_side, world_side, world_side),
            mode: FillMode::Fill,
            color: red,
        };
        let engine = EditEngine::new(&node_pool, &color_pool);
        let (geo, color) = engine
            .edit_with_color(&fill, node_pool.get_root(), color_pool.get_root())
            .unwrap();
        node_pool.set_root(geo);
        color_pool.set_root(color);

        // Carving a single point forces the fill's SolidColor(red) subtrees
        // that remain untouched to become children of a packed color node.
        let carve = PointEditor {
            position: V3c::new(world_side - 1, world_side - 1, world_side - 1),
            value: false,
            color: Albedo::default(),
        };
        let (geo, color) = engine
            .edit_with_color(&carve, node_pool.get_root(), color_pool.get_root())
            .unwrap();
        node_pool.set_root(geo);
        color_pool.set_root(color);

        let (occ, c) = sample_point(&node_pool, &color_pool, V3c::new(0, 0, 0));
        assert!(occ);
        assert_eq!(c, red);
        assert_eq!(c.a(), 255);
    }

    /// A color leaf level one level above the geometry leaf covers an 8^3
    /// region spanning 8 separate 4^3 geometry bricks; exercises the
    /// `decode_geometry_bits`/`build_geometry_subtree` multi-brick path.
    #[test]
    fn shallow_color_leaf_spans_multiple_geometry_bricks() {
        let node_cfg = NodePoolConfig {
            level_count: 4,
            top_level_count: 1,
            word_bits_per_page: 8,
            page_bits_per_bucket: 1,
            bucket_bits_per_top_level: 3,
            bucket_bits_per_bottom_level: 4,
        };
        let color_cfg = ColorPoolConfig {
            leaf_level: node_cfg.leaf_level() - 1,
            node_bits_per_node_page: 4,
            word_bits_per_leaf_page: 10,
            node_page_count: 8,
            leaf_page_count: 8,
            keep_history: false,
        };
        let node_pool = NodePool::new(node_cfg).unwrap();
        let color_pool = ColorPool::new(color_cfg, node_cfg.leaf_level()).unwrap();
        let engine = EditEngine::new(&node_pool, &color_pool);

        // Fill only the front-bottom-left quarter of the first 8^3 octant,
        // so the color leaf sees a non-uniform region split across bricks.
        let blue = Albedo::rgba(0, 0, 255, 255);
        let editor = AabbEditor {
            min: V3c::new(0, 0, 0),
            max: V3c::new(4, 8, 8),
            mode: FillMode::Fill,
            color: blue,
        };
        let (geo, color) = engine
            .edit_with_color(&editor, node_pool.get_root(), color_pool.get_root())
            .unwrap();
        node_pool.set_root(geo);
        color_pool.set_root(color);

        let (occ, c) = sample_point(&node_pool, &color_pool, V3c::new(0, 0, 0));
        assert!(occ);
        assert_eq!(c, blue);
        let (occ, c) = sample_point(&node_pool, &color_pool, V3c::new(2, 6, 6));
        assert!(occ);
        assert_eq!(c, blue);
        let (occ, _) = sample_point(&node_pool, &color_pool, V3c::new(6, 0, 0));
        assert!(!occ);
    }
}
