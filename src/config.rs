//! Configuration structs for `NodePool` and `ColorPool` (§6). Both are plain
//! data with a `validate` method invoked from the owning pool's constructor,
//! mirroring the reference octree's fallible `Octree::new() -> Result<..>`
//! convention rather than panicking on a bad value.

use crate::error::VoxDagError;

/// Fully parameterizes a [`crate::node_pool::NodePool`].
#[derive(Debug, Clone, Copy)]
pub struct NodePoolConfig {
    /// Number of stored node levels, root at level 0. The leaf level
    /// (packing a 4x4x4 voxel brick into 64 bits) is `level_count - 1`.
    pub level_count: usize,
    /// Number of levels (counted from the root) considered "top" levels for
    /// bucket sizing purposes; they get `bucket_bits_per_top_level` buckets
    /// each instead of `bucket_bits_per_bottom_level`.
    pub top_level_count: usize,
    /// log2 of the number of words per page.
    pub word_bits_per_page: u32,
    /// log2 of the number of pages per bucket.
    pub page_bits_per_bucket: u32,
    /// log2 of the bucket count for each of the top levels.
    pub bucket_bits_per_top_level: u32,
    /// log2 of the bucket count for each of the remaining (bottom) levels.
    pub bucket_bits_per_bottom_level: u32,
}

impl Default for NodePoolConfig {
    /// A 2^17-voxel-per-axis world (§3.1's default `L = 17`): the leaf level
    /// packs a 4x4x4 brick (2 of the 17 halvings), so 15 further inner
    /// halvings from the root land on the brick, i.e. `level_count = 16`
    /// stored levels (root at level 0, leaf at level 15).
    fn default() -> Self {
        Self {
            level_count: 16,
            top_level_count: 4,
            word_bits_per_page: 10,  // 1024 words/page
            page_bits_per_bucket: 2, // 4 pages/bucket
            bucket_bits_per_top_level: 7,
            bucket_bits_per_bottom_level: 11,
        }
    }
}

impl NodePoolConfig {
    pub fn validate(&self) -> Result<(), VoxDagError> {
        if self.level_count < 3 {
            return Err(VoxDagError::InvalidConfig(format!(
                "level_count must be >= 3, got {}",
                self.level_count
            )));
        }
        if self.top_level_count == 0 || self.top_level_count >= self.level_count {
            return Err(VoxDagError::InvalidConfig(format!(
                "top_level_count must be in 1..level_count, got {}",
                self.top_level_count
            )));
        }
        if self.bucket_bits_per_top_level > self.bucket_bits_per_bottom_level {
            return Err(VoxDagError::InvalidConfig(
                "bucket_bits_per_top_level must be <= bucket_bits_per_bottom_level".into(),
            ));
        }
        let total_words = self.total_capacity_words();
        if total_words.is_none() {
            return Err(VoxDagError::InvalidConfig(
                "total word capacity does not fit in 32 bits".into(),
            ));
        }
        Ok(())
    }

    pub fn page_words(&self) -> u32 {
        1 << self.word_bits_per_page
    }

    pub fn pages_per_bucket(&self) -> u32 {
        1 << self.page_bits_per_bucket
    }

    pub fn bucket_words(&self) -> u32 {
        self.pages_per_bucket() * self.page_words()
    }

    pub fn leaf_level(&self) -> usize {
        self.level_count - 1
    }

    /// Side length, in voxels, of the cube a node at `level` covers. The
    /// leaf level always covers a 4-voxel brick edge; each level above it
    /// doubles that.
    pub fn side_at_level(&self, level: usize) -> u32 {
        4u32 << (self.leaf_level() - level)
    }

    /// Side length of the whole world (the root's cube), in voxels.
    pub fn world_side(&self) -> u32 {
        self.side_at_level(0)
    }

    pub fn buckets_at_level(&self, level: usize) -> u32 {
        if level < self.top_level_count {
            1 << self.bucket_bits_per_top_level
        } else {
            1 << self.bucket_bits_per_bottom_level
        }
    }

    pub fn total_buckets(&self) -> u64 {
        (0..self.level_count)
            .map(|l| self.buckets_at_level(l) as u64)
            .sum()
    }

    fn total_capacity_words(&self) -> Option<u32> {
        let total_buckets = self.total_buckets();
        let total_words = total_buckets.checked_mul(self.bucket_words() as u64)?;
        u32::try_from(total_words).ok()
    }
}

/// Fully parameterizes a [`crate::color::pool::ColorPool`].
#[derive(Debug, Clone, Copy)]
pub struct ColorPoolConfig {
    /// The color octree's own leaf level; must be `<= geometry leaf_level`.
    pub leaf_level: usize,
    /// log2 of the number of (8-word) color inner nodes per node page.
    pub node_bits_per_node_page: u32,
    /// log2 of the number of words per leaf (VBR chunk) page.
    pub word_bits_per_leaf_page: u32,
    /// Total node pages available to the color-node paged vector.
    pub node_page_count: u32,
    /// Total leaf pages available to the color-leaf paged vector.
    pub leaf_page_count: u32,
    /// When false, `set_leaf` reuses the existing leaf slot if the new chunk
    /// fits, instead of always allocating a fresh slot.
    pub keep_history: bool,
}

impl Default for ColorPoolConfig {
    fn default() -> Self {
        Self {
            leaf_level: 15,
            node_bits_per_node_page: 6, // 64 nodes/page * 8 words = 512 words/page
            word_bits_per_leaf_page: 10,
            node_page_count: 1 << 12,
            leaf_page_count: 1 << 14,
            keep_history: false,
        }
    }
}

impl ColorPoolConfig {
    pub fn validate(&self, geometry_leaf_level: usize) -> Result<(), VoxDagError> {
        if self.leaf_level > geometry_leaf_level {
            return Err(VoxDagError::InvalidConfig(format!(
                "color leaf_level ({}) must be <= geometry leaf_level ({})",
                self.leaf_level, geometry_leaf_level
            )));
        }
        if self.node_page_count == 0 || self.leaf_page_count == 0 {
            return Err(VoxDagError::InvalidConfig(
                "node_page_count and leaf_page_count must be > 0".into(),
            ));
        }
        Ok(())
    }

    pub fn node_page_words(&self) -> u32 {
        (1 << self.node_bits_per_node_page) * 8
    }

    pub fn leaf_page_words(&self) -> u32 {
        1 << self.word_bits_per_leaf_page
    }
}
