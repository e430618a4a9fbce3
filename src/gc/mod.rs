//! Garbage collection (§4.5): a parallel mark-sweep-compact pass that
//! rewrites every live node into a fresh pool pair and returns remapped
//! roots, leaving the old pools' now-dead pages marked for release on the
//! next flush.
//!
//! Grounded on the reference octree's `ObjectPool` free-list bookkeeping,
//! generalized from per-erase slot reclamation to a whole-pool mark/sweep:
//! the hash-consed geometry DAG can share a node across many parents, so
//! nothing can be freed in place without first knowing no other subtree
//! still points at it.

use crate::color::pool::ColorPool;
use crate::color::ColorPointer;
use crate::error::VoxDagError;
use crate::node_pool::{InnerNode, NodePointer, NodePool};
use crate::paged_store::PagedStore;
use crate::parallel::{default_parallel_threshold, fan_out8};
use dashmap::{DashMap, DashSet};
use std::collections::HashSet;

/// Rebuilds `node_pool`/`color_pool` into a fresh, compacted pair containing
/// only nodes reachable from their current roots. The old pools are left
/// untouched except that any of their resident pages absent from the new
/// pair are marked freed, so a subsequent `flush` on the returned pools
/// still emits the matching `Unbind` ops.
pub fn collect(
    node_pool: &NodePool,
    color_pool: &ColorPool,
) -> Result<(NodePool, ColorPool), VoxDagError> {
    let total_before = node_pool.node_count();

    let reachable = mark(node_pool, node_pool.get_root());
    let live = reachable.len() as u64;
    log::info!(
        "garbage collection: {live} live nodes, {} dead out of {total_before} stored",
        total_before.saturating_sub(live)
    );

    let shadow_nodes = NodePool::new(*node_pool.config())?;
    let memo: DashMap<(usize, u32), NodePointer> = DashMap::new();
    let new_geo_root = sweep_compact_geometry(node_pool, &shadow_nodes, &memo, 0, node_pool.get_root())?;
    shadow_nodes.set_root(new_geo_root);

    let shadow_colors = ColorPool::new(*color_pool.config(), shadow_nodes.config().leaf_level())?;
    let new_color_root = sweep_compact_color(color_pool, &shadow_colors, color_pool.get_root())?;
    shadow_colors.set_root(new_color_root);

    swap(node_pool.store(), shadow_nodes.store());
    swap(color_pool.node_store(), shadow_colors.node_store());
    swap(color_pool.leaf_store(), shadow_colors.leaf_store());

    log::info!(
        "garbage collection compacted to {} live nodes",
        shadow_nodes.node_count()
    );

    Ok((shadow_nodes, shadow_colors))
}

/// Parallel BFS from `root`, recording every reachable `(level, address)`
/// pair in a concurrent set. Reads only; never mutates `pool`.
fn mark(pool: &NodePool, root: NodePointer) -> DashSet<(usize, u32)> {
    let reachable = DashSet::new();
    mark_recurse(pool, 0, root, &reachable);
    reachable
}

fn mark_recurse(pool: &NodePool, level: usize, ptr: NodePointer, reachable: &DashSet<(usize, u32)>) {
    let addr = match ptr {
        NodePointer::Address(addr) => addr,
        _ => return,
    };
    if !reachable.insert((level, addr)) {
        return;
    }
    if level == pool.config().leaf_level() {
        return;
    }
    let children = pool.read_inner(addr).children;
    if level < default_parallel_threshold(pool.config().level_count) {
        fan_out8(|octant| mark_recurse(pool, level + 1, children[octant as usize], reachable));
    } else {
        for child in children {
            mark_recurse(pool, level + 1, child, reachable);
        }
    }
}

/// Emits every node reachable from `ptr` into `shadow` via normal upsert,
/// recursively rewriting child pointers to their shadow addresses. `memo`
/// is the address map: it also lets two parents sharing a subtree pay for
/// the upsert only once.
fn sweep_compact_geometry(
    pool: &NodePool,
    shadow: &NodePool,
    memo: &DashMap<(usize, u32), NodePointer>,
    level: usize,
    ptr: NodePointer,
) -> Result<NodePointer, VoxDagError> {
    let addr = match ptr {
        NodePointer::Address(addr) => addr,
        sentinel => return Ok(sentinel),
    };
    if let Some(existing) = memo.get(&(level, addr)) {
        return Ok(*existing);
    }

    let new_ptr = if level == pool.config().leaf_level() {
        shadow.upsert_leaf(pool.read_leaf(addr))?
    } else {
        let children = pool.read_inner(addr).children;
        let threshold = default_parallel_threshold(pool.config().level_count);
        let new_children = if level < threshold {
            let results = fan_out8(|octant| {
                sweep_compact_geometry(pool, shadow, memo, level + 1, children[octant as usize])
            });
            let mut out = [NodePointer::Null; 8];
            for (octant, result) in results.into_iter().enumerate() {
                out[octant] = result?;
            }
            out
        } else {
            let mut out = [NodePointer::Null; 8];
            for (octant, child) in children.into_iter().enumerate() {
                out[octant] = sweep_compact_geometry(pool, shadow, memo, level + 1, child)?;
            }
            out
        };
        shadow.upsert_inner(level, &InnerNode { children: new_children })?
    };

    memo.insert((level, addr), new_ptr);
    Ok(new_ptr)
}

/// Color-tree analogue of [`sweep_compact_geometry`]. No memoization: the
/// color octree is a plain tree (never hash-consed), so no two parents ever
/// share a `Node`/`VbrLeaf` index.
fn sweep_compact_color(
    pool: &ColorPool,
    shadow: &ColorPool,
    ptr: ColorPointer,
) -> Result<ColorPointer, VoxDagError> {
    match ptr {
        ColorPointer::Null | ColorPointer::SolidColor(_) => Ok(ptr),
        ColorPointer::VbrLeaf(idx) => {
            let chunk = pool.read_leaf_chunk(idx);
            shadow.set_leaf(None, &chunk)
        }
        ColorPointer::Node(idx) => {
            let children = pool.read_node(idx);
            let mut new_children = [ColorPointer::Null; 8];
            for (octant, child) in children.into_iter().enumerate() {
                new_children[octant] = sweep_compact_color(pool, shadow, child)?;
            }
            shadow.upsert_node(new_children)
        }
    }
}

/// Marks every page resident in `old` but absent from `shadow` as freed in
/// `shadow`, so `shadow`'s own next `flush` emits the `Unbind` ops the old
/// store's pages still need (§4.5 "Swap").
fn swap(old: &PagedStore, shadow: &PagedStore) {
    let old_resident: HashSet<u32> = old.resident_pages().into_iter().collect();
    let shadow_resident: HashSet<u32> = shadow.resident_pages().into_iter().collect();
    for &stale in old_resident.difference(&shadow_resident) {
        shadow.free_page(stale);
    }
}
