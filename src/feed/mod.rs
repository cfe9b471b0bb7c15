//! Change Feed
//!
//! Tells open views that a message was captured.
//!
//! ## Architecture
//!
//! - **ChangeFeed**: registry of listeners, notified synchronously on publish
//! - **MessageRecorder**: appends to the store, then publishes the stored message
//!
//! Listeners run on the producer's thread and must not block for long.

mod hub;
mod recorder;

pub use hub::{ChangeFeed, FeedError, ListenerId};
pub use recorder::MessageRecorder;

use crate::store::Message;

/// Receives every message appended through the feed
pub trait MessageListener: Send + Sync {
    fn message_arrived(&self, message: &Message);
}
