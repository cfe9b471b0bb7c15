//! Listener registry for new-message notifications

use super::MessageListener;
use crate::config::FeedConfig;
use crate::store::Message;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a registered listener
pub type ListenerId = String;

/// Fans new messages out to registered listeners
pub struct ChangeFeed {
    listeners: RwLock<HashMap<ListenerId, Arc<dyn MessageListener>>>,
    config: FeedConfig,
}

impl ChangeFeed {
    pub fn new(config: FeedConfig) -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Register a listener
    ///
    /// Returns the listener ID on success, or an error if the listener
    /// limit has been reached.
    pub fn register(&self, listener: Arc<dyn MessageListener>) -> Result<ListenerId, FeedError> {
        let mut listeners = self.listeners.write();
        if listeners.len() >= self.config.max_listeners {
            return Err(FeedError::TooManyListeners(self.config.max_listeners));
        }

        let id = Uuid::new_v4().to_string();
        listeners.insert(id.clone(), listener);

        tracing::debug!(listener_id = %id, "Listener registered");
        Ok(id)
    }

    /// Remove a listener; returns false if it was not registered
    pub fn unregister(&self, id: &str) -> bool {
        let removed = self.listeners.write().remove(id).is_some();
        if removed {
            tracing::debug!(listener_id = %id, "Listener unregistered");
        }
        removed
    }

    /// Deliver `message` to every listener, returning how many were notified
    pub fn publish(&self, message: &Message) -> usize {
        // snapshot so listeners may register or unregister while being notified
        let listeners: Vec<Arc<dyn MessageListener>> =
            self.listeners.read().values().cloned().collect();

        for listener in &listeners {
            listener.message_arrived(message);
        }

        tracing::trace!(key = %message.key(), listeners = listeners.len(), "Message published");
        listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(FeedConfig::default())
    }
}

/// Feed errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("Too many listeners (limit {0})")]
    TooManyListeners(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Direction, NewMessage};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Collector {
        seen: Mutex<Vec<Message>>,
    }

    impl MessageListener for Collector {
        fn message_arrived(&self, message: &Message) {
            self.seen.lock().push(message.clone());
        }
    }

    fn message(id: u32) -> Message {
        NewMessage::text(1, Direction::Incoming, "hi").into_message(id)
    }

    #[test]
    fn test_publish_reaches_all_listeners() {
        let feed = ChangeFeed::default();
        let a = Arc::new(Collector::default());
        let b = Arc::new(Collector::default());
        feed.register(a.clone()).unwrap();
        feed.register(b.clone()).unwrap();

        assert_eq!(feed.publish(&message(1)), 2);
        assert_eq!(a.seen.lock().len(), 1);
        assert_eq!(b.seen.lock()[0].message_id, 1);
    }

    #[test]
    fn test_unregister() {
        let feed = ChangeFeed::default();
        let collector = Arc::new(Collector::default());
        let id = feed.register(collector.clone()).unwrap();

        assert!(feed.unregister(&id));
        assert!(!feed.unregister(&id));
        assert_eq!(feed.listener_count(), 0);

        assert_eq!(feed.publish(&message(1)), 0);
        assert!(collector.seen.lock().is_empty());
    }

    #[test]
    fn test_listener_limit() {
        let feed = ChangeFeed::new(FeedConfig { max_listeners: 2 });
        for _ in 0..2 {
            feed.register(Arc::new(Collector::default())).unwrap();
        }

        let result = feed.register(Arc::new(Collector::default()));
        assert_eq!(result, Err(FeedError::TooManyListeners(2)));
        assert_eq!(feed.listener_count(), 2);
    }

    #[test]
    fn test_ids_are_unique() {
        let feed = ChangeFeed::default();
        let first = feed.register(Arc::new(Collector::default())).unwrap();
        let second = feed.register(Arc::new(Collector::default())).unwrap();
        assert_ne!(first, second);
    }
}
