//! Observer registration for engine notifications
//!
//! Each engine owns one bus. Events are delivered to every subscriber in
//! emission order; there is no ordering between different buses.

use parking_lot::Mutex;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

/// Fan-out of events to any number of `mpsc` receivers
#[derive(Debug)]
pub struct EventBus<E> {
    subscribers: Arc<Mutex<Vec<Sender<E>>>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            subscribers: self.subscribers.clone(),
        }
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<E: Clone> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new observer
    pub fn subscribe(&self) -> Receiver<E> {
        let (tx, rx) = channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver an event to every live subscriber
    ///
    /// Subscribers whose receiver has been dropped are pruned.
    pub fn emit(&self, event: E) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        let bus = EventBus::new();
        let rx = bus.subscribe();

        for i in 0..5 {
            bus.emit(i);
        }

        let received: Vec<i32> = rx.try_iter().collect();
        assert_eq!(received, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let bus = EventBus::new();
        let keep = bus.subscribe();
        let gone = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(gone);
        bus.emit("tick");

        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(keep.try_recv(), Ok("tick"));
    }

    #[test]
    fn test_clone_shares_subscribers() {
        let bus = EventBus::new();
        let other = bus.clone();
        let rx = bus.subscribe();

        other.emit(7u8);
        assert_eq!(rx.try_recv(), Ok(7));
    }
}
