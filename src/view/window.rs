//! Page Window - sparse map of loaded rows
//!
//! Rows are loaded a page at a time (pages are aligned to `page_size`) and
//! kept for the `max_pages` most recently touched pages. Older pages are
//! dropped wholesale and simply reload on the next miss.
//!
//! # Loads
//! ```text
//! begin_load(i) ──► store query (no lock held) ──► complete(load, rows)
//!       │                                              │
//!       └─ None if page already loading                └─ discarded if clear()
//!                                                         ran in between
//! ```

use crate::store::Message;
use std::collections::{BTreeMap, HashSet, VecDeque};

/// Ticket for an in-flight page load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLoad {
    /// First row index of the page
    pub offset: u64,
    generation: u64,
}

/// Loaded rows of a paged view, indexed by filtered row position
#[derive(Debug)]
pub struct PageWindow {
    rows: BTreeMap<u64, Message>,
    page_size: usize,
    max_pages: usize,
    /// Page offsets, most recently touched first
    recent: VecDeque<u64>,
    loading: HashSet<u64>,
    /// Bumped by `clear`; loads from an older generation are dropped
    generation: u64,
}

impl PageWindow {
    pub fn new(page_size: usize, max_pages: usize) -> Self {
        Self {
            rows: BTreeMap::new(),
            page_size: page_size.max(1),
            max_pages: max_pages.max(1),
            recent: VecDeque::new(),
            loading: HashSet::new(),
            generation: 0,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// First row index of the page holding `index`
    pub fn page_start(&self, index: u64) -> u64 {
        let size = self.page_size as u64;
        index / size * size
    }

    /// Loaded row at `index`, marking its page as recently used
    pub fn get(&mut self, index: u64) -> Option<&Message> {
        if !self.rows.contains_key(&index) {
            return None;
        }
        self.touch(self.page_start(index));
        self.rows.get(&index)
    }

    /// Loaded row at `index` without touching recency
    pub fn peek(&self, index: u64) -> Option<&Message> {
        self.rows.get(&index)
    }

    pub fn contains(&self, index: u64) -> bool {
        self.rows.contains_key(&index)
    }

    /// Claim the page holding `index` for loading
    ///
    /// Returns `None` when another caller is already loading that page.
    pub fn begin_load(&mut self, index: u64) -> Option<PageLoad> {
        let offset = self.page_start(index);
        if !self.loading.insert(offset) {
            return None;
        }
        Some(PageLoad {
            offset,
            generation: self.generation,
        })
    }

    pub fn is_loading(&self, index: u64) -> bool {
        self.loading.contains(&self.page_start(index))
    }

    /// Merge a loaded page, replacing any entries at the same indices
    ///
    /// An empty page only releases its claim and does not take a slot.
    ///
    /// Returns false if the window was cleared since the load began; the
    /// rows then belong to an outdated filter and are dropped.
    pub fn complete(&mut self, load: PageLoad, rows: Vec<Message>) -> bool {
        if load.generation != self.generation {
            return false;
        }
        self.loading.remove(&load.offset);

        // past the end of the view: nothing to retain
        if rows.is_empty() {
            return true;
        }

        for (i, row) in rows.into_iter().take(self.page_size).enumerate() {
            self.rows.insert(load.offset + i as u64, row);
        }

        self.touch(load.offset);
        self.evict();
        true
    }

    /// Release a page claim after a failed load, keeping loaded rows
    pub fn abort(&mut self, load: PageLoad) {
        if load.generation == self.generation {
            self.loading.remove(&load.offset);
        }
    }

    /// Drop every row and pending load
    pub fn clear(&mut self) {
        self.rows.clear();
        self.recent.clear();
        self.loading.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    /// Number of loaded rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of pages currently retained
    pub fn loaded_pages(&self) -> usize {
        self.recent.len()
    }

    fn touch(&mut self, offset: u64) {
        if self.recent.front() == Some(&offset) {
            return;
        }
        self.recent.retain(|&page| page != offset);
        self.recent.push_front(offset);
    }

    fn evict(&mut self) {
        while self.recent.len() > self.max_pages {
            let Some(page) = self.recent.pop_back() else {
                break;
            };
            let end = page + self.page_size as u64;
            let stale: Vec<u64> = self.rows.range(page..end).map(|(&i, _)| i).collect();
            for index in stale {
                self.rows.remove(&index);
            }
            tracing::trace!(offset = page, "Evicted page from window");
        }
    }
}
