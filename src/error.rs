//! Crate-wide error type. A single `thiserror` enum rather than one type per
//! component, since every fallible entry point (pool construction, upsert,
//! edit submission) funnels into the same submission queue and the caller
//! handles all of these the same way: surface and stop.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoxDagError {
    /// A `NodePool` upsert exhausted the target bucket's capacity. Not
    /// retried automatically; the caller must run a `GarbageCollector` pass
    /// or reconfigure with more bucket capacity at that level.
    #[error("bucket at level {level} is full ({used}/{capacity} words)")]
    OutOfBuckets {
        level: usize,
        used: u32,
        capacity: u32,
    },

    /// The `ColorPool`'s paged vector (node or leaf store) ran out of pages.
    #[error("paged vector exhausted its page budget ({used}/{capacity} words)")]
    OutOfPages { used: u32, capacity: u32 },

    /// A configuration value failed validation at construction time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An `Editor`/`VbrEditor` implementation violated its contract, e.g.
    /// returned `Fill` below the voxel level, or `Proceed` at the voxel
    /// level. Treated as a programmer bug in the editor, not a data error.
    #[error("editor contract violated: {0}")]
    InvalidEditor(String),

    /// A garbage collection pass was requested while an edit was still
    /// outstanding. GC and edits share the single-threaded submission queue
    /// (§5); this variant exists for callers that bypass that queue directly.
    #[error("garbage collection requested while an edit is still outstanding")]
    GcInProgress,
}
