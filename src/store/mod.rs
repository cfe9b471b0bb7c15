//! Message Store
//!
//! The durable, append-only record of captured messages that paged views
//! read from:
//!
//! - **types**: `Message`, `MessageKey`, `NewMessage`, `Direction`, `Payload`
//! - **criteria**: `Criteria` / `MessageFilter` and their evaluator
//! - **sqlite**: SQLite-backed `MessageStore`
//! - **error**: Error types
//!
//! # Ordering
//!
//! Every store defines one authoritative order for the messages matching a
//! criteria value: append order. Row indices handed out by `query` and
//! `index_of` are positions in that order.

pub mod criteria;
pub mod error;
pub mod sqlite;
pub mod types;

pub use criteria::{Criteria, MessageFilter};
pub use error::{StoreError, StoreResult};
pub use sqlite::{ChannelSummary, SqliteStore};
pub use types::{opcode, Direction, Message, MessageKey, NewMessage, Payload};

/// Backing store for paged message views
///
/// Calls are synchronous and may block on I/O; callers must not hold locks
/// of their own across them.
pub trait MessageStore: Send + Sync {
    /// Number of messages matching the criteria
    fn count(&self, criteria: &Criteria) -> StoreResult<u64>;

    /// Up to `length` matching messages starting at row `offset`, in order
    ///
    /// Payloads are cut to at most `preview_limit` characters (text) or
    /// bytes (binary); `payload_length` still reports the full size.
    fn query(
        &self,
        criteria: &Criteria,
        offset: u64,
        length: usize,
        preview_limit: usize,
    ) -> StoreResult<Vec<Message>>;

    /// Fully hydrated message by key
    fn get(&self, key: MessageKey) -> StoreResult<Message>;

    /// Zero-based row of `key` among messages matching the criteria
    ///
    /// `Ok(None)` when the message does not exist or is filtered out.
    fn index_of(&self, criteria: &Criteria, key: MessageKey) -> StoreResult<Option<u64>>;

    /// Append a message, assigning the next message id of its channel
    fn append(&self, message: NewMessage) -> StoreResult<Message>;
}
