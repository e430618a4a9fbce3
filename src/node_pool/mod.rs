//! Hash-consed geometry octree storage (§4.2).
//!
//! Every distinct inner node or leaf brick is stored at most once per
//! bucket; `upsert_inner`/`upsert_leaf` are find-or-insert over a bucket
//! selected by `hash(words) mod buckets_at_level`. Grounded on the reference
//! octree's per-level `ObjectPool` sizing (`brick_dim`/`nodes_per_level`
//! tuning in `Octree::new`), generalized from typed slot reuse to raw word
//! hash-consing.

use crate::config::NodePoolConfig;
use crate::error::VoxDagError;
use crate::paged_store::PagedStore;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

/// Sentinel: an empty subtree.
pub const NULL_PTR: u32 = u32::MAX;
/// Sentinel: a subtree whose every voxel is set.
pub const FILLED_PTR: u32 = u32::MAX - 1;

/// A word-addressed reference into a `NodePool`, or one of the two sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePointer {
    Null,
    Filled,
    Address(u32),
}

impl NodePointer {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            NULL_PTR => NodePointer::Null,
            FILLED_PTR => NodePointer::Filled,
            addr => NodePointer::Address(addr),
        }
    }

    pub fn to_raw(self) -> u32 {
        match self {
            NodePointer::Null => NULL_PTR,
            NodePointer::Filled => FILLED_PTR,
            NodePointer::Address(addr) => addr,
        }
    }

    pub fn is_sentinel(self) -> bool {
        !matches!(self, NodePointer::Address(_))
    }
}

/// Contents of one inner node: up to 8 children, indexed by octant (§3.1
/// z-y-x major order). `Null` children are implicit (absent from `children`
/// but present as `NodePointer::Null` once unpacked).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerNode {
    pub children: [NodePointer; 8],
}

impl InnerNode {
    pub fn childmask(&self) -> u8 {
        let mut mask = 0u8;
        for (octant, child) in self.children.iter().enumerate() {
            if !matches!(child, NodePointer::Null) {
                mask |= 1 << octant;
            }
        }
        mask
    }

    /// Encodes this node as `[childmask] + [present child pointer words]`.
    pub fn to_words(&self) -> Vec<u32> {
        let mut words = vec![self.childmask() as u32];
        for child in &self.children {
            if !matches!(child, NodePointer::Null) {
                words.push(child.to_raw());
            }
        }
        words
    }

    pub fn from_words(words: &[u32]) -> Self {
        let mask = words[0] as u8;
        let mut children = [NodePointer::Null; 8];
        let mut cursor = 1;
        for octant in 0..8u8 {
            if mask & (1 << octant) != 0 {
                children[octant as usize] = NodePointer::from_raw(words[cursor]);
                cursor += 1;
            }
        }
        Self { children }
    }

    /// `Null` if every child is Null, `Filled` if every child is Filled, else
    /// `Proceed` (the caller upserts the node as-is).
    pub fn normalize(&self) -> Option<NodePointer> {
        if self.children.iter().all(|c| matches!(c, NodePointer::Null)) {
            return Some(NodePointer::Null);
        }
        if self
            .children
            .iter()
            .all(|c| matches!(c, NodePointer::Filled))
        {
            return Some(NodePointer::Filled);
        }
        None
    }
}

/// A 4x4x4 packed voxel brick: 64 bits across two words, bit index given by
/// `flat_projection(x, y, z, 4)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafBrick(pub u64);

impl LeafBrick {
    pub fn get(&self, index: u32) -> bool {
        (self.0 >> index) & 1 != 0
    }

    pub fn set(&mut self, index: u32, value: bool) {
        if value {
            self.0 |= 1 << index;
        } else {
            self.0 &= !(1 << index);
        }
    }

    pub fn to_words(self) -> [u32; 2] {
        [(self.0 & 0xFFFF_FFFF) as u32, (self.0 >> 32) as u32]
    }

    pub fn from_words(words: &[u32]) -> Self {
        Self(words[0] as u64 | ((words[1] as u64) << 32))
    }

    /// `Null` if all-zero, `Filled` if all-one, else `None`.
    pub fn normalize(self) -> Option<NodePointer> {
        if self.0 == 0 {
            Some(NodePointer::Null)
        } else if self.0 == u64::MAX {
            Some(NodePointer::Filled)
        } else {
            None
        }
    }
}

fn hash_words(words: &[u32]) -> u64 {
    // FNV-1a, 64-bit.
    let mut hash: u64 = 0xcbf29ce484222325;
    for &word in words {
        for byte in word.to_le_bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
    }
    hash
}

/// Per-level bucket layout: a contiguous run of word ranges, each `bucket_words` wide.
struct LevelLayout {
    bucket_base: u32,
    bucket_count: u32,
}

struct Bucket {
    used_words: AtomicU32,
    lock: Mutex<()>,
}

/// Reads a variable-length node (inner or leaf) starting at `word_offset`,
/// given the level it lives at (leaves are fixed 2 words; inner nodes are
/// `1 + popcount(childmask)` words).
fn node_size_words(store: &PagedStore, word_offset: u32, is_leaf_level: bool) -> u32 {
    if is_leaf_level {
        2
    } else {
        let header = store.read_words(word_offset, 1)[0];
        1 + (header as u8).count_ones()
    }
}

pub struct NodePool {
    config: NodePoolConfig,
    store: PagedStore,
    layouts: Vec<LevelLayout>,
    buckets: Vec<Bucket>,
    root: Mutex<NodePointer>,
}

impl NodePool {
    pub fn new(config: NodePoolConfig) -> Result<Self, VoxDagError> {
        config.validate()?;
        let page_count = (config.total_buckets() as u32) * config.pages_per_bucket();
        let store = PagedStore::new(page_count, config.page_words());

        let mut layouts = Vec::with_capacity(config.level_count);
        let mut buckets = Vec::new();
        let mut next_bucket = 0u32;
        for level in 0..config.level_count {
            let bucket_count = config.buckets_at_level(level);
            layouts.push(LevelLayout {
                bucket_base: next_bucket,
                bucket_count,
            });
            for _ in 0..bucket_count {
                buckets.push(Bucket {
                    used_words: AtomicU32::new(0),
                    lock: Mutex::new(()),
                });
            }
            next_bucket += bucket_count;
        }

        Ok(Self {
            config,
            store,
            layouts,
            buckets,
            root: Mutex::new(NodePointer::Null),
        })
    }

    pub fn config(&self) -> &NodePoolConfig {
        &self.config
    }

    pub fn store(&self) -> &PagedStore {
        &self.store
    }

    pub fn get_root(&self) -> NodePointer {
        *self.root.lock()
    }

    pub fn set_root(&self, root: NodePointer) {
        *self.root.lock() = root;
    }

    fn bucket_for(&self, level: usize, words: &[u32]) -> usize {
        let layout = &self.layouts[level];
        let slot = (hash_words(words) % layout.bucket_count as u64) as u32;
        (layout.bucket_base + slot) as usize
    }

    fn is_leaf_level(&self, level: usize) -> bool {
        level == self.config.leaf_level()
    }

    /// Find-or-insert `words` at `level`. Returns the node's word offset.
    fn upsert_words(&self, level: usize, words: &[u32]) -> Result<u32, VoxDagError> {
        let bucket_idx = self.bucket_for(level, words);
        let bucket_words = self.config.bucket_words();
        let bucket_base_words = bucket_idx as u32 * bucket_words;
        let is_leaf = self.is_leaf_level(level);

        // Unlocked scan over the acquire-loaded used prefix.
        let scan_limit = self.buckets[bucket_idx].used_words.load(Ordering::Acquire);
        if let Some(found) = self.scan_bucket(bucket_base_words, 0, scan_limit, words, is_leaf) {
            return Ok(found);
        }

        // Locked scan of the tail, then append.
        let _guard = self.buckets[bucket_idx].lock.lock();
        let used = self.buckets[bucket_idx].used_words.load(Ordering::Acquire);
        if let Some(found) = self.scan_bucket(bucket_base_words, scan_limit, used, words, is_leaf)
        {
            return Ok(found);
        }

        if used as u64 + words.len() as u64 > bucket_words as u64 {
            log::trace!(
                "node pool bucket {bucket_idx} at level {level} is full ({used}/{bucket_words})"
            );
            return Err(VoxDagError::OutOfBuckets {
                level,
                used,
                capacity: bucket_words,
            });
        }

        let offset = bucket_base_words + used;
        self.store.write_words(offset, words);
        self.buckets[bucket_idx]
            .used_words
            .store(used + words.len() as u32, Ordering::Release);
        log::trace!("node pool upsert appended {} words at bucket {bucket_idx}, level {level}, offset {offset}", words.len());
        Ok(offset)
    }

    fn scan_bucket(
        &self,
        bucket_base_words: u32,
        from: u32,
        to: u32,
        needle: &[u32],
        is_leaf: bool,
    ) -> Option<u32> {
        let mut cursor = from;
        while cursor < to {
            let offset = bucket_base_words + cursor;
            let size = node_size_words(&self.store, offset, is_leaf);
            let candidate = self.store.read_words(offset, size);
            if candidate == needle {
                return Some(offset);
            }
            cursor += size;
        }
        None
    }

    /// Upserts a leaf brick, applying Null/Filled normalization first.
    pub fn upsert_leaf(&self, brick: LeafBrick) -> Result<NodePointer, VoxDagError> {
        if let Some(sentinel) = brick.normalize() {
            return Ok(sentinel);
        }
        let words = brick.to_words();
        let offset = self.upsert_words(self.config.leaf_level(), &words)?;
        Ok(NodePointer::Address(offset))
    }

    /// Upserts an inner node at `level`, applying Null/Filled normalization first.
    pub fn upsert_inner(
        &self,
        level: usize,
        node: &InnerNode,
    ) -> Result<NodePointer, VoxDagError> {
        if let Some(sentinel) = node.normalize() {
            return Ok(sentinel);
        }
        let words = node.to_words();
        let offset = self.upsert_words(level, &words)?;
        Ok(NodePointer::Address(offset))
    }

    pub fn read_inner(&self, offset: u32) -> InnerNode {
        let header = self.store.read_words(offset, 1)[0];
        let count = 1 + (header as u8).count_ones();
        let words = self.store.read_words(offset, count);
        InnerNode::from_words(&words)
    }

    pub fn read_leaf(&self, offset: u32) -> LeafBrick {
        let words = self.store.read_words(offset, 2);
        LeafBrick::from_words(&words)
    }

    pub fn flush(&self, backend: &mut dyn crate::paged_store::Backend) {
        self.store.flush(backend);
    }

    /// Counts every stored node across every bucket at every level, by
    /// walking each bucket's used prefix. Only used by the garbage
    /// collector's before/after logging (§10.1); not on any hot path.
    pub fn node_count(&self) -> u64 {
        let mut total = 0u64;
        for (level, layout) in self.layouts.iter().enumerate() {
            let is_leaf = self.is_leaf_level(level);
            let bucket_words = self.config.bucket_words();
            for bucket_offset in 0..layout.bucket_count {
                let bucket_idx = (layout.bucket_base + bucket_offset) as usize;
                let used = self.buckets[bucket_idx].used_words.load(Ordering::Acquire);
                let bucket_base_words = bucket_idx as u32 * bucket_words;
                let mut cursor = 0u32;
                while cursor < used {
                    let offset = bucket_base_words + cursor;
                    let size = node_size_words(&self.store, offset, is_leaf);
                    cursor += size;
                    total += 1;
                }
            }
        }
        total
    }
}
