//! Paged message views
//!
//! A `MessagesView` presents the messages matching a `Criteria` as a
//! virtual table of `row_count()` rows. Only pages that are looked at are
//! loaded, and only a bounded number of them stay in memory.

pub mod columns;
mod count;
mod lru;
mod model;
mod window;

pub use columns::{Cell, Column, ColumnKind};
pub use count::{CachedRowCount, CountEpoch};
pub use lru::{CacheStats, LruCache};
pub use model::{MessagesView, RowPosition, ViewEvent, ViewStats};
pub use window::{PageLoad, PageWindow};
