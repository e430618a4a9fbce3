//! Editor capability set (§4.3): the interface callers implement to
//! describe a structural edit, and the decision type the engine consults
//! at every subtree during its recursive rewrite.

pub mod engine;
pub mod shapes;

use crate::color::Albedo;
use crate::spatial::vector::V3c;
use crate::spatial::Cube;

/// What to do with the subtree rooted at the cube the engine is currently
/// visiting, as decided by an [`Editor`]/[`VbrEditor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditDecision {
    /// Leave this subtree exactly as it is; don't even read it.
    Unaffected,
    /// Replace this subtree with the empty (Null) subtree.
    Clear,
    /// Replace this subtree with the fully-occupied (Filled) subtree.
    Fill,
    /// Recurse: either into 8 child octants, or (at leaf level) into the 64
    /// individual voxels via `edit_voxel`.
    Proceed,
}

/// A pure geometry-only editor. `bounds` is the cube currently being
/// visited; implementations decide against their shape's bounding volume
/// before the engine ever reads a leaf.
pub trait Editor: Sync {
    fn edit_node(&self, level: usize, bounds: &Cube) -> EditDecision;
    fn edit_voxel(&self, position: V3c<u32>, current: bool) -> bool;
}

/// A color-fused editor (§4.3): the same decisions, plus a color value
/// threaded through both calls so a single descent rewrites geometry and
/// color together.
pub trait VbrEditor: Sync {
    fn edit_node(&self, level: usize, bounds: &Cube) -> EditDecision;
    fn fill_color(&self) -> Albedo;
    fn edit_voxel(&self, position: V3c<u32>, current: bool, current_color: Albedo) -> (bool, Albedo);
}

/// Every color-fused editor is usable where a geometry-only `Editor` is
/// expected, simply discarding the color half of its decision. This lets
/// `AabbEditor`/`SphereEditor`/`PointEditor` (all `VbrEditor`s) serve both
/// `VoxDag::apply` and `VoxDag::apply_geometry` without a second set of
/// shape implementations.
impl<T: VbrEditor> Editor for T {
    fn edit_node(&self, level: usize, bounds: &Cube) -> EditDecision {
        VbrEditor::edit_node(self, level, bounds)
    }

    fn edit_voxel(&self, position: V3c<u32>, current: bool) -> bool {
        VbrEditor::edit_voxel(self, position, current, Albedo::default()).0
    }
}
