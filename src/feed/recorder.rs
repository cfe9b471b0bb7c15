//! Store-then-notify entry point for captured messages

use super::ChangeFeed;
use crate::store::{Message, MessageStore, NewMessage, StoreResult};
use std::sync::Arc;

/// Appends captured messages and announces them on the feed
///
/// The store assigns the message id, so listeners always see the message
/// exactly as a later query would return it.
pub struct MessageRecorder {
    store: Arc<dyn MessageStore>,
    feed: Arc<ChangeFeed>,
}

impl MessageRecorder {
    pub fn new(store: Arc<dyn MessageStore>, feed: Arc<ChangeFeed>) -> Self {
        Self { store, feed }
    }

    /// Append `message` and notify listeners
    ///
    /// Listeners are not notified when the append fails.
    pub fn record(&self, message: NewMessage) -> StoreResult<Message> {
        let stored = self.store.append(message)?;
        self.feed.publish(&stored);
        Ok(stored)
    }

    pub fn feed(&self) -> &Arc<ChangeFeed> {
        &self.feed
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }
}
