//! Paged, lazily-materialized word storage (§4.1).
//!
//! A `PagedStore` is a logical array of `page_count` pages, each
//! `page_words` words wide. Pages start *absent* and are materialized on
//! first write; reads of absent pages return zeros. Every resident page
//! tracks the `[lo, hi)` word range touched since the last flush, and
//! `flush` drains that dirty state into a sequence of [`PageOp`]s applied to
//! a [`Backend`].
//!
//! Grounded on the reference octree's `ObjectPool` (lazy slot materialization
//! and free-list bookkeeping) generalized from fixed-size typed slots to
//! raw word pages, since the core here must stay agnostic to node shape.

pub mod paged_vec;

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

struct Page {
    words: Vec<u32>,
    dirty_lo: u32,
    dirty_hi: u32,
}

impl Page {
    fn new(page_words: u32) -> Self {
        Self {
            words: vec![0; page_words as usize],
            dirty_lo: u32::MAX,
            dirty_hi: 0,
        }
    }

    fn mark_dirty(&mut self, lo: u32, hi: u32) {
        self.dirty_lo = self.dirty_lo.min(lo);
        self.dirty_hi = self.dirty_hi.max(hi);
    }

    fn is_dirty(&self) -> bool {
        self.dirty_lo < self.dirty_hi
    }
}

/// One diff entry emitted by [`PagedStore::flush`] for a [`Backend`] to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOp {
    Bind {
        page_id: u32,
        offset_words: u32,
        words: Vec<u32>,
    },
    Unbind {
        page_id: u32,
    },
}

/// External collaborator consuming a [`PagedStore`]'s flush diff. The core
/// never names a graphics API; an in-memory mirror ([`InMemoryBackend`]) is
/// provided for tests, but a memory-mapped file or GPU sparse buffer binder
/// implements the same trait.
pub trait Backend {
    fn apply(&mut self, ops: &[PageOp]);
}

/// Reference backend: a flat `Vec` of optional page buffers, used by tests
/// and as the template for a real (mmap/GPU) implementation.
#[derive(Default)]
pub struct InMemoryBackend {
    pages: Vec<Option<Vec<u32>>>,
}

impl InMemoryBackend {
    pub fn page(&self, page_id: u32) -> Option<&[u32]> {
        self.pages
            .get(page_id as usize)
            .and_then(|p| p.as_deref())
    }
}

impl Backend for InMemoryBackend {
    fn apply(&mut self, ops: &[PageOp]) {
        for op in ops {
            match op {
                PageOp::Bind {
                    page_id,
                    offset_words,
                    words,
                } => {
                    let idx = *page_id as usize;
                    if self.pages.len() <= idx {
                        self.pages.resize(idx + 1, None);
                    }
                    let page = self.pages[idx].get_or_insert_with(Vec::new);
                    let end = *offset_words as usize + words.len();
                    if page.len() < end {
                        page.resize(end, 0);
                    }
                    page[*offset_words as usize..end].copy_from_slice(words);
                }
                PageOp::Unbind { page_id } => {
                    if let Some(slot) = self.pages.get_mut(*page_id as usize) {
                        *slot = None;
                    }
                }
            }
        }
    }
}

/// A logical address space of fixed-size pages, lazily materialized.
pub struct PagedStore {
    page_words: u32,
    pages: Vec<RwLock<Option<Page>>>,
    freed: Vec<AtomicBool>,
}

impl PagedStore {
    pub fn new(page_count: u32, page_words: u32) -> Self {
        let mut pages = Vec::with_capacity(page_count as usize);
        pages.resize_with(page_count as usize, || RwLock::new(None));
        let mut freed = Vec::with_capacity(page_count as usize);
        freed.resize_with(page_count as usize, || AtomicBool::new(false));
        Self {
            page_words,
            pages,
            freed,
        }
    }

    pub fn page_words(&self) -> u32 {
        self.page_words
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Word-addressed capacity of the whole store.
    pub fn total_words(&self) -> u64 {
        self.page_count() as u64 * self.page_words as u64
    }

    fn split(&self, word_offset: u32) -> (u32, u32) {
        (
            word_offset / self.page_words,
            word_offset % self.page_words,
        )
    }

    /// Returns the page's contents, or zeros if the page was never written.
    pub fn read_page(&self, page_id: u32) -> Vec<u32> {
        match self.pages[page_id as usize].read().as_ref() {
            Some(page) => page.words.clone(),
            None => vec![0; self.page_words as usize],
        }
    }

    /// Reads `count` words starting at `word_offset`, possibly spanning
    /// several pages.
    pub fn read_words(&self, word_offset: u32, count: u32) -> Vec<u32> {
        let mut out = Vec::with_capacity(count as usize);
        let mut remaining = count;
        let mut offset = word_offset;
        while remaining > 0 {
            let (page_id, in_page) = self.split(offset);
            let take = remaining.min(self.page_words - in_page);
            let page = self.read_page(page_id);
            out.extend_from_slice(&page[in_page as usize..(in_page + take) as usize]);
            offset += take;
            remaining -= take;
        }
        out
    }

    pub fn write_page(&self, page_id: u32, offset: u32, words: &[u32]) {
        if words.is_empty() {
            return;
        }
        let mut slot = self.pages[page_id as usize].write();
        let page = slot.get_or_insert_with(|| Page::new(self.page_words));
        let end = offset as usize + words.len();
        debug_assert!(end <= page.words.len(), "write_page out of page bounds");
        page.words[offset as usize..end].copy_from_slice(words);
        page.mark_dirty(offset, end as u32);
        self.freed[page_id as usize].store(false, Ordering::Relaxed);
    }

    /// Writes `words` starting at `word_offset`, splitting across pages as
    /// needed. Used by `NodePool`/`ColorPool` appends, whose node/chunk data
    /// may straddle a page boundary.
    pub fn write_words(&self, word_offset: u32, words: &[u32]) {
        let mut remaining = words;
        let mut offset = word_offset;
        while !remaining.is_empty() {
            let (page_id, in_page) = self.split(offset);
            let take = (self.page_words - in_page).min(remaining.len() as u32) as usize;
            self.write_page(page_id, in_page, &remaining[..take]);
            remaining = &remaining[take..];
            offset += take as u32;
        }
    }

    pub fn zero_page(&self, page_id: u32, offset: u32, count: u32) {
        let zeros = vec![0u32; count as usize];
        self.write_page(page_id, offset, &zeros);
    }

    pub fn free_page(&self, page_id: u32) {
        *self.pages[page_id as usize].write() = None;
        self.freed[page_id as usize].store(true, Ordering::Relaxed);
    }

    /// Page ids currently materialized (written at least once and not yet
    /// freed). Used by the garbage collector to transfer staleness: any
    /// page resident before a GC swap that the shadow store never touches
    /// must still be told to unbind on the next flush (§4.5 "Swap").
    pub fn resident_pages(&self) -> Vec<u32> {
        self.pages
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.read().as_ref().map(|_| id as u32))
            .collect()
    }

    /// Drains dirty/freed tracking into a diff and applies it to `backend`.
    pub fn flush(&self, backend: &mut dyn Backend) -> Vec<PageOp> {
        let mut ops = Vec::new();
        for (page_id, slot) in self.pages.iter().enumerate() {
            let mut guard = slot.write();
            if let Some(page) = guard.as_mut() {
                if page.is_dirty() {
                    ops.push(PageOp::Bind {
                        page_id: page_id as u32,
                        offset_words: page.dirty_lo,
                        words: page.words[page.dirty_lo as usize..page.dirty_hi as usize].to_vec(),
                    });
                    page.dirty_lo = u32::MAX;
                    page.dirty_hi = 0;
                }
            }
        }
        for (page_id, freed) in self.freed.iter().enumerate() {
            if freed.swap(false, Ordering::Relaxed) {
                ops.push(PageOp::Unbind {
                    page_id: page_id as u32,
                });
            }
        }
        log::debug!(
            "paged store flush: {} binds/unbinds emitted",
            ops.len()
        );
        backend.apply(&ops);
        ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_of_absent_pages_are_zero() {
        let store = PagedStore::new(4, 16);
        assert_eq!(store.read_page(2), vec![0u32; 16]);
    }

    #[test]
    fn write_then_read_round_trips() {
        let store = PagedStore::new(4, 16);
        store.write_words(5, &[1, 2, 3]);
        assert_eq!(store.read_words(5, 3), vec![1, 2, 3]);
        assert_eq!(store.read_words(0, 5), vec![0, 0, 0, 0, 0]);
    }

    #[test]
    fn write_crossing_page_boundary() {
        let store = PagedStore::new(4, 4);
        store.write_words(2, &[10, 20, 30, 40]);
        assert_eq!(store.read_words(2, 4), vec![10, 20, 30, 40]);
        assert_eq!(store.read_page(0)[2..4], [10, 20]);
        assert_eq!(store.read_page(1)[0..2], [30, 40]);
    }

    #[test]
    fn flush_emits_bind_then_clears_dirty() {
        let store = PagedStore::new(2, 8);
        store.write_words(0, &[7, 8, 9]);
        let mut backend = InMemoryBackend::default();
        let ops = store.flush(&mut backend);
        assert_eq!(ops.len(), 1);
        assert_eq!(backend.page(0).unwrap()[0..3], [7, 8, 9]);

        // nothing dirty anymore: second flush is a no-op
        let ops2 = store.flush(&mut backend);
        assert!(ops2.is_empty());
    }

    #[test]
    fn free_page_emits_unbind() {
        let store = PagedStore::new(2, 8);
        store.write_words(0, &[1]);
        let mut backend = InMemoryBackend::default();
        store.flush(&mut backend);
        store.free_page(0);
        let ops = store.flush(&mut backend);
        assert_eq!(ops, vec![PageOp::Unbind { page_id: 0 }]);
        assert!(backend.page(0).is_none());
    }
}
