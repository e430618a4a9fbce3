//! Shared fan-out helper for the 8-way parallelism the edit engine and the
//! garbage collector both need (§5: "spawn 8-way fan-out tasks ... via
//! `rayon::join`"). Factored out once rather than hand-nested at every call
//! site.

/// Runs `f(0)..f(7)` as a balanced tree of `rayon::join` calls and returns
/// the 8 results in octant order. `f` must be safely callable from several
/// threads at once (it closes over shared pool/editor references, never
/// mutable state).
pub fn fan_out8<F, R>(f: F) -> [R; 8]
where
    F: Fn(u8) -> R + Sync,
    R: Send,
{
    let ((r0, r1), (r2, r3)) = rayon::join(
        || rayon::join(|| f(0), || f(1)),
        || rayon::join(|| f(2), || f(3)),
    );
    let ((r4, r5), (r6, r7)) = rayon::join(
        || rayon::join(|| f(4), || f(5)),
        || rayon::join(|| f(6), || f(7)),
    );
    [r0, r1, r2, r3, r4, r5, r6, r7]
}

/// Below this level (closer to the root) the engine/GC fan out onto the
/// rayon pool; at or below it recursion stays sequential, since octants
/// near the leaves cover too few voxels to amortize task spawn overhead
/// (§4.3 "`T` is chosen so that each spawned task touches many thousands of
/// voxels").
pub fn default_parallel_threshold(level_count: usize) -> usize {
    level_count.saturating_sub(4).max(1)
}
