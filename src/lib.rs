//! # framelog
//!
//! Browse captured WebSocket messages as a lazily loaded, filterable table.
//!
//! ## Features
//!
//! - **Paged loading**: rows are fetched a page at a time and only a bounded
//!   number of pages stay in memory
//! - **Filtering**: scope to one channel, hide directions or opcodes
//! - **Live updates**: views learn about new messages through a change feed
//! - **Degrades, never fails**: store errors are logged and the view shows
//!   placeholders or cached data
//!
//! ## Modules
//!
//! - [`store`]: Message types, filter criteria and the SQLite store
//! - [`view`]: Paged view, column model and caches
//! - [`feed`]: New-message notifications
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use framelog::config::ViewConfig;
//! use framelog::feed::{ChangeFeed, MessageRecorder};
//! use framelog::store::{Criteria, Direction, NewMessage, SqliteStore};
//! use framelog::view::{Column, MessagesView};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(SqliteStore::open("messages.db")?);
//!     let feed = Arc::new(ChangeFeed::default());
//!     let recorder = MessageRecorder::new(store.clone(), feed.clone());
//!
//!     // Show text frames of channel 1
//!     let view = Arc::new(MessagesView::new(
//!         store,
//!         Criteria::all().channel(1).opcode(1),
//!         ViewConfig::default(),
//!     ));
//!     feed.register(view.clone())?;
//!
//!     recorder.record(NewMessage::text(1, Direction::Outgoing, "hello"))?;
//!
//!     for row in 0..view.row_count() {
//!         println!("{}", view.value_at(row, Column::Payload));
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod feed;
pub mod store;
pub mod view;

pub use config::Config;
pub use feed::{ChangeFeed, MessageListener, MessageRecorder};
pub use store::{Criteria, Message, MessageFilter, MessageKey, MessageStore, SqliteStore};
pub use view::{MessagesView, RowPosition, ViewEvent};
