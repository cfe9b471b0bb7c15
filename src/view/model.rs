//! Messages View - lazy, filterable, paged view over a message store
//!
//! The view owns three caches, all created empty and refilled on demand:
//!
//! - **window**: loaded row previews, fetched a page at a time
//! - **row count**: number of rows under the current criteria
//! - **full cache**: LRU of fully hydrated messages
//!
//! # Threads
//!
//! A consumer thread reads rows and changes the filter; a producer thread
//! reports arrivals through `message_arrived`. The producer never touches
//! the window, it only invalidates the row count and announces the new row
//! through a `ViewEvent`. Store calls run without any view lock held.
//!
//! # Failures
//!
//! Store errors never reach the caller. They are logged and the view
//! degrades: the row count reads 0, a failed page stays a placeholder,
//! `index_of` falls back to an estimate and `full_message` returns the
//! preview it was given.

use crate::config::ViewConfig;
use crate::feed::MessageListener;
use crate::store::{Criteria, Message, MessageFilter, MessageKey, MessageStore};
use crate::view::columns::{self, Cell, Column};
use crate::view::count::CachedRowCount;
use crate::view::lru::{CacheStats, LruCache};
use crate::view::window::PageWindow;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Change signals for whoever renders the view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewEvent {
    /// Everything may have changed; redraw from scratch
    Reset,
    /// One row was appended at `index`
    RowAppended { index: u64 },
}

/// Where a message sits in the view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum RowPosition {
    /// Position reported by the store under the current criteria
    Exact(u64),
    /// Guess from the message id, used when the store lookup failed
    ///
    /// Only right when the view shows one channel without gaps in its
    /// message ids.
    Estimated(u64),
}

impl RowPosition {
    pub fn index(&self) -> u64 {
        match self {
            RowPosition::Exact(i) | RowPosition::Estimated(i) => *i,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, RowPosition::Exact(_))
    }
}

/// Snapshot of the view's cache state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewStats {
    pub loaded_rows: usize,
    pub loaded_pages: usize,
    pub row_count_known: bool,
    pub full_cache: CacheStats,
}

impl std::fmt::Display for ViewStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Rows: {}, Pages: {}, Count cached: {}, Full cache: {}/{} ({:.0}% hits)",
            self.loaded_rows,
            self.loaded_pages,
            self.row_count_known,
            self.full_cache.entries,
            self.full_cache.capacity,
            self.full_cache.hit_rate() * 100.0
        )
    }
}

/// Paged, filtered view over a message store
pub struct MessagesView {
    store: Arc<dyn MessageStore>,
    criteria: RwLock<Arc<Criteria>>,
    window: Mutex<PageWindow>,
    row_count: CachedRowCount,
    full_cache: Mutex<LruCache<Message>>,
    events: broadcast::Sender<ViewEvent>,
    config: ViewConfig,
}

impl MessagesView {
    /// Create a view over `store` showing messages matching `criteria`
    pub fn new(store: Arc<dyn MessageStore>, criteria: Criteria, config: ViewConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        Self {
            store,
            criteria: RwLock::new(Arc::new(criteria)),
            window: Mutex::new(PageWindow::new(config.page_size, config.max_pages)),
            row_count: CachedRowCount::new(),
            full_cache: Mutex::new(LruCache::new(config.full_cache_capacity)),
            events,
            config,
        }
    }

    /// Receiver for `Reset` and `RowAppended` events
    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.events.subscribe()
    }

    /// The criteria currently applied
    pub fn criteria(&self) -> Arc<Criteria> {
        Arc::clone(&self.criteria.read())
    }

    /// The channel the view is scoped to, if any
    pub fn scope(&self) -> Option<u32> {
        self.criteria.read().channel
    }

    pub fn filter(&self) -> MessageFilter {
        self.criteria.read().filter.clone()
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    // ==================== Reading ====================

    /// Number of rows under the current criteria
    ///
    /// Served from cache when known. Concurrent callers may both query the
    /// store; a result computed across an invalidation is returned but not
    /// cached.
    pub fn row_count(&self) -> u64 {
        let epoch = match self.row_count.get() {
            Ok(count) => return count,
            Err(epoch) => epoch,
        };

        let criteria = self.criteria();
        match self.store.count(&criteria) {
            Ok(count) => {
                self.row_count.publish(epoch, count);
                count
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to count messages");
                0
            }
        }
    }

    /// Row preview at `index`, loading its page on a miss
    ///
    /// `None` is the placeholder: the row does not exist, its page failed
    /// to load, or another caller is loading that page right now.
    pub fn row_at(&self, index: u64) -> Option<Message> {
        let (load, criteria) = {
            let mut window = self.window.lock();
            if let Some(row) = window.get(index) {
                return Some(row.clone());
            }
            let load = window.begin_load(index)?;
            (load, self.criteria())
        };

        tracing::debug!(
            offset = load.offset,
            length = self.config.page_size,
            "Loading page"
        );

        let result = self.store.query(
            &criteria,
            load.offset,
            self.config.page_size,
            self.config.payload_preview_length,
        );

        let mut window = self.window.lock();
        match result {
            Ok(rows) => {
                let loaded = rows.len();
                if !window.complete(load, rows) {
                    tracing::debug!(offset = load.offset, "Discarded page loaded before reset");
                    return None;
                }
                tracing::trace!(offset = load.offset, rows = loaded, "Page loaded");
            }
            Err(e) => {
                tracing::error!(offset = load.offset, error = %e, "Failed to load page");
                window.abort(load);
                return None;
            }
        }

        window.peek(index).cloned()
    }

    /// Cell for one column of the row at `index`
    pub fn value_at(&self, index: u64, column: Column) -> Cell {
        match self.row_at(index) {
            Some(row) => columns::render(&row, column, self.config.payload_preview_length),
            None => column.placeholder(),
        }
    }

    /// Fully hydrated version of a previously loaded row
    ///
    /// Served from the LRU cache when possible. If the point lookup fails
    /// the preview itself is returned.
    pub fn full_message(&self, preview: &Message) -> Message {
        let key = preview.key().to_string();

        if let Some(full) = self.full_cache.lock().get(&key) {
            return full.clone();
        }

        match self.store.get(preview.key()) {
            Ok(full) => {
                self.full_cache.lock().insert(key, full.clone());
                full
            }
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Error retrieving full message");
                preview.clone()
            }
        }
    }

    /// Fully hydrated message at `index`, if that row is loaded or loadable
    pub fn full_message_at(&self, index: u64) -> Option<Message> {
        let preview = self.row_at(index)?;
        Some(self.full_message(&preview))
    }

    /// Position of `key` in the view
    ///
    /// `None` when the store reports the message missing or filtered out.
    /// When the lookup itself fails, falls back to `message_id - 1`, which
    /// is only a guess.
    pub fn index_of(&self, key: MessageKey) -> Option<RowPosition> {
        let criteria = self.criteria();
        match self.store.index_of(&criteria, key) {
            Ok(found) => found.map(RowPosition::Exact),
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Failed to look up row index");
                Some(RowPosition::Estimated(
                    u64::from(key.message_id).saturating_sub(1),
                ))
            }
        }
    }

    // ==================== Changing what is shown ====================

    /// Scope the view to one channel, or to all channels with `None`
    pub fn set_scope(&self, channel: Option<u32>) {
        {
            let mut criteria = self.criteria.write();
            *criteria = Arc::new(criteria.with_scope(channel));
        }
        tracing::debug!(channel = ?channel, "Scope changed");
        self.reset();
    }

    /// Replace the message filter, keeping the scope
    pub fn set_filter(&self, filter: MessageFilter) {
        {
            let mut criteria = self.criteria.write();
            *criteria = Arc::new(criteria.with_filter(filter));
        }
        tracing::debug!("Filter changed");
        self.reset();
    }

    /// Drop cached full messages without touching the window
    pub fn clear_full_cache(&self) {
        self.full_cache.lock().clear();
    }

    /// Clear all cached state and tell subscribers to redraw
    ///
    /// The criteria must already be replaced: the count epoch bump here is
    /// what rejects counts computed under the old criteria.
    fn reset(&self) {
        self.window.lock().clear();
        self.row_count.invalidate();
        self.full_cache.lock().clear();
        let _ = self.events.send(ViewEvent::Reset);
    }

    // ==================== Change feed ====================

    /// A message was appended to the store
    ///
    /// Always invalidates the row count. If the message matches the current
    /// criteria, asks the store for its row and announces it. When that
    /// lookup fails, or the store cannot place the message, subscribers get
    /// a `Reset` instead. Assumes messages are only ever appended: a message
    /// landing in the middle of the filtered order would need a full reset.
    pub fn message_arrived(&self, message: &Message) {
        self.row_count.invalidate();

        let criteria = self.criteria();
        if !criteria.matches(message) {
            tracing::trace!(key = %message.key(), "Arrival outside current view");
            return;
        }

        // a cached count may already include this message, so ask the store
        let event = match self.store.index_of(&criteria, message.key()) {
            Ok(Some(index)) => {
                tracing::trace!(key = %message.key(), index, "Row appended");
                ViewEvent::RowAppended { index }
            }
            Ok(None) => {
                tracing::debug!(key = %message.key(), "Arrived message not found in view");
                ViewEvent::Reset
            }
            Err(e) => {
                tracing::error!(key = %message.key(), error = %e, "Failed to place arrived message");
                ViewEvent::Reset
            }
        };

        let _ = self.events.send(event);
    }

    pub fn stats(&self) -> ViewStats {
        let (loaded_rows, loaded_pages) = {
            let window = self.window.lock();
            (window.len(), window.loaded_pages())
        };

        ViewStats {
            loaded_rows,
            loaded_pages,
            row_count_known: self.row_count.is_known(),
            full_cache: self.full_cache.lock().stats(),
        }
    }
}

impl MessageListener for MessagesView {
    fn message_arrived(&self, message: &Message) {
        MessagesView::message_arrived(self, message);
    }
}
