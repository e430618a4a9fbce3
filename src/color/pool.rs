//! Storage for the color octree: fixed-stride inner nodes (8 tagged
//! pointers) in one paged vector, variable-length VBR leaf chunks in
//! another. Grounded on the reference octree's dual `ObjectPool`
//! structure (separate pools per node shape), applied here to the two
//! distinct record shapes the color tree needs.

use super::vbr::VbrChunk;
use super::ColorPointer;
use crate::config::ColorPoolConfig;
use crate::error::VoxDagError;
use crate::paged_store::paged_vec::PagedVec;
use parking_lot::Mutex;

pub struct ColorPool {
    config: ColorPoolConfig,
    nodes: PagedVec,
    leaves: PagedVec,
    root: Mutex<ColorPointer>,
}

impl ColorPool {
    pub fn new(config: ColorPoolConfig, geometry_leaf_level: usize) -> Result<Self, VoxDagError> {
        config.validate(geometry_leaf_level)?;
        let nodes = PagedVec::new(
            config.node_page_count,
            config.node_page_words(),
            8, // 8 tagged pointers per color inner node
        );
        // Leaf slots are sized in words; capacity-prefixed, so the stride is
        // the configured page width itself (one page == one slot upper bound).
        let leaves = PagedVec::new(
            config.leaf_page_count,
            config.leaf_page_words(),
            config.leaf_page_words(),
        );
        Ok(Self {
            config,
            nodes,
            leaves,
            root: Mutex::new(ColorPointer::Null),
        })
    }

    pub fn config(&self) -> &ColorPoolConfig {
        &self.config
    }

    /// Backing store for the fixed-stride color-node vector. Exposed for the
    /// garbage collector's page-staleness transfer (§4.5 "Swap").
    pub fn node_store(&self) -> &crate::paged_store::PagedStore {
        self.nodes.store()
    }

    /// Backing store for the variable-length VBR-leaf vector.
    pub fn leaf_store(&self) -> &crate::paged_store::PagedStore {
        self.leaves.store()
    }

    pub fn get_root(&self) -> ColorPointer {
        *self.root.lock()
    }

    pub fn set_root(&self, root: ColorPointer) {
        *self.root.lock() = root;
    }

    /// Inserts an 8-way color node, returning a `ColorPointer::Node`.
    pub fn upsert_node(&self, children: [ColorPointer; 8]) -> Result<ColorPointer, VoxDagError> {
        let slot = self.nodes.allocate()?;
        let words: Vec<u32> = children.iter().map(|c| c.pack()).collect();
        self.nodes.write(slot, &words);
        Ok(ColorPointer::Node(slot))
    }

    pub fn read_node(&self, index: u32) -> [ColorPointer; 8] {
        let words = self.nodes.read(index, 8);
        let mut children = [ColorPointer::Null; 8];
        for (slot, word) in children.iter_mut().zip(words) {
            *slot = ColorPointer::unpack(word);
        }
        children
    }

    /// Writes a VBR chunk into a fresh (or, if `!keep_history` and it fits,
    /// reused) leaf slot and returns a `ColorPointer::VbrLeaf`.
    pub fn set_leaf(
        &self,
        existing: Option<u32>,
        chunk: &VbrChunk,
    ) -> Result<ColorPointer, VoxDagError> {
        let mut words = chunk.to_words();
        let capacity_words = words.len() as u32 + 1;
        if capacity_words > self.leaves.stride_words() {
            return Err(VoxDagError::OutOfPages {
                used: capacity_words,
                capacity: self.leaves.stride_words(),
            });
        }

        let reuse_slot = existing.filter(|&slot| {
            !self.config.keep_history && self.slot_capacity(slot) >= capacity_words
        });

        let slot = match reuse_slot {
            Some(slot) => slot,
            None => {
                let slot = self.leaves.allocate()?;
                if let Some(old) = existing {
                    if !self.config.keep_history {
                        self.leaves.free(old);
                    }
                }
                slot
            }
        };

        let mut payload = vec![words.len() as u32];
        payload.append(&mut words);
        self.leaves.write(slot, &payload);
        Ok(ColorPointer::VbrLeaf(slot))
    }

    fn slot_capacity(&self, slot: u32) -> u32 {
        self.leaves.read(slot, 1)[0]
    }

    pub fn read_leaf_chunk(&self, index: u32) -> VbrChunk {
        let declared_len = self.leaves.read(index, 1)[0];
        let payload = self.leaves.read(index, 1 + declared_len);
        VbrChunk::from_words(&payload[1..])
    }

    pub fn flush(&self, backend: &mut dyn crate::paged_store::Backend) {
        self.nodes.flush(backend);
        self.leaves.flush(backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Albedo;

    fn test_config() -> ColorPoolConfig {
        ColorPoolConfig {
            leaf_level: 0,
            node_bits_per_node_page: 3,
            word_bits_per_leaf_page: 8,
            node_page_count: 4,
            leaf_page_count: 4,
            keep_history: false,
        }
    }

    #[test]
    fn node_round_trips_through_read() {
        let pool = ColorPool::new(test_config(), 2).unwrap();
        let mut children = [ColorPointer::Null; 8];
        children[0] = ColorPointer::SolidColor(Albedo::rgba(1, 2, 3, 4));
        let ptr = pool.upsert_node(children).unwrap();
        match ptr {
            ColorPointer::Node(idx) => assert_eq!(pool.read_node(idx), children),
            _ => panic!("expected Node"),
        }
    }

    #[test]
    fn leaf_chunk_round_trips() {
        let pool = ColorPool::new(test_config(), 2).unwrap();
        let colors = vec![Albedo::rgba(9, 9, 9, 255); 8];
        let chunk = VbrChunk::encode(&colors);
        let ptr = pool.set_leaf(None, &chunk).unwrap();
        match ptr {
            ColorPointer::VbrLeaf(idx) => {
                let restored = pool.read_leaf_chunk(idx);
                assert_eq!(restored.decode_all(), colors);
            }
            _ => panic!("expected VbrLeaf"),
        }
    }

    #[test]
    fn leaf_reuses_slot_when_not_keeping_history_and_it_fits() {
        let pool = ColorPool::new(test_config(), 2).unwrap();
        let chunk_a = VbrChunk::encode(&vec![Albedo::rgba(1, 0, 0, 255); 8]);
        let ptr_a = pool.set_leaf(None, &chunk_a).unwrap();
        let slot_a = match ptr_a {
            ColorPointer::VbrLeaf(idx) => idx,
            _ => panic!(),
        };
        let chunk_b = VbrChunk::encode(&vec![Albedo::rgba(2, 0, 0, 255); 8]);
        let ptr_b = pool.set_leaf(Some(slot_a), &chunk_b).unwrap();
        assert_eq!(ptr_b, ColorPointer::VbrLeaf(slot_a));
    }
}
