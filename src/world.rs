//! Top-level handle combining a geometry [`NodePool`] and a color
//! [`ColorPool`] behind a single API (§4): submit edits, sample voxels,
//! flush dirty pages to a backend, and run garbage collection.
//!
//! Grounded on the reference octree's `Octree<T>` facade (`octree/mod.rs`):
//! same fallible-constructor convention (`new() -> Result<Self, _>`), same
//! idea of a thin owning wrapper over the pools doing the real work.

use crate::color::pool::ColorPool;
use crate::color::{Albedo, ColorPointer};
use crate::config::{ColorPoolConfig, NodePoolConfig};
use crate::editor::engine::{sample_point, EditEngine};
use crate::editor::{Editor, VbrEditor};
use crate::error::VoxDagError;
use crate::gc;
use crate::node_pool::{NodePointer, NodePool};
use crate::paged_store::Backend;
use crate::spatial::vector::V3c;

/// Owns the geometry and color pools for one voxel world and exposes the
/// edit/query/GC surface callers use.
///
/// `apply`/`apply_geometry` take `&self`: both pools use interior
/// mutability (hash-consing buckets, paged-vector free lists, and the root
/// pointer are all lock- or atomic-guarded), so concurrent edits never need
/// exclusive access. `garbage_collect` takes `&mut self` because it rebuilds
/// both pools wholesale and swaps them in; the borrow checker enforces the
/// "no GC while an edit is outstanding" rule (§9) for free, since no `&self`
/// edit call can be in flight while something holds `&mut self`.
pub struct VoxDag {
    node_pool: NodePool,
    color_pool: ColorPool,
}

impl VoxDag {
    pub fn new() -> Result<Self, VoxDagError> {
        Self::with_config(NodePoolConfig::default(), ColorPoolConfig::default())
    }

    pub fn with_config(
        node_config: NodePoolConfig,
        color_config: ColorPoolConfig,
    ) -> Result<Self, VoxDagError> {
        let node_pool = NodePool::new(node_config)?;
        let color_pool = ColorPool::new(color_config, node_pool.config().leaf_level())?;
        Ok(Self {
            node_pool,
            color_pool,
        })
    }

    pub fn node_pool(&self) -> &NodePool {
        &self.node_pool
    }

    pub fn color_pool(&self) -> &ColorPool {
        &self.color_pool
    }

    /// Applies a geometry-only edit; the color tree is left untouched.
    pub fn apply_geometry<E: Editor>(&self, editor: &E) -> Result<(), VoxDagError> {
        let engine = EditEngine::new(&self.node_pool, &self.color_pool);
        let root = engine.edit(editor, self.node_pool.get_root())?;
        self.node_pool.set_root(root);
        Ok(())
    }

    /// Applies a color-fused edit, rewriting geometry and color in lock-step.
    pub fn apply<E: VbrEditor>(&self, editor: &E) -> Result<(), VoxDagError> {
        let engine = EditEngine::new(&self.node_pool, &self.color_pool);
        let (geo_root, color_root) =
            engine.edit_with_color(editor, self.node_pool.get_root(), self.color_pool.get_root())?;
        self.node_pool.set_root(geo_root);
        self.color_pool.set_root(color_root);
        Ok(())
    }

    /// Reads back one voxel's occupancy and color.
    pub fn get_voxel(&self, position: V3c<u32>) -> (bool, Albedo) {
        sample_point(&self.node_pool, &self.color_pool, position)
    }

    pub fn get_root(&self) -> (NodePointer, ColorPointer) {
        (self.node_pool.get_root(), self.color_pool.get_root())
    }

    pub fn flush_geometry(&self, backend: &mut dyn Backend) {
        self.node_pool.flush(backend);
    }

    pub fn flush_color(&self, backend: &mut dyn Backend) {
        self.color_pool.flush(backend);
    }

    /// Runs a mark-sweep-compact pass (§4.5), replacing both pools with
    /// compacted shadows built from only the nodes still reachable from
    /// their current roots.
    pub fn garbage_collect(&mut self) -> Result<(), VoxDagError> {
        let (node_pool, color_pool) = gc::collect(&self.node_pool, &self.color_pool)?;
        self.node_pool = node_pool;
        self.color_pool = color_pool;
        Ok(())
    }
}
