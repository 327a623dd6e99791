//! In-memory event bus backed by `std::sync::mpsc`.

use std::sync::{Mutex, mpsc};

use thiserror::Error;

use crate::bus::{EventBus, Subscription};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Publish failed due to internal lock poisoning.
    #[error("event bus lock poisoned")]
    Poisoned,
}

/// In-memory pub/sub bus.
///
/// - No IO / no async
/// - Fan-out to every live subscriber
/// - Dropped subscribers are pruned on the next publish
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    subscribers: Mutex<Vec<mpsc::Sender<M>>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered senders. Dropped subscribers are only pruned on
    /// publish, so this may still count them until the next one.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|subs| subs.len()).unwrap_or(0)
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = BusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut subs = self.subscribers.lock().map_err(|_| BusError::Poisoned)?;

        subs.retain(|tx| tx.send(message.clone()).is_ok());
        if subs.is_empty() {
            tracing::debug!("published to a bus with no live subscribers");
        }

        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();

        // A poisoned lock still yields a subscription; it just never fires.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn every_subscriber_receives_every_message() {
        let bus = InMemoryEventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish("gas,true,".to_string()).unwrap();
        bus.publish("premium,false,".to_string()).unwrap();

        assert_eq!(a.drain(), vec!["gas,true,", "premium,false,"]);
        assert_eq!(b.drain(), vec!["gas,true,", "premium,false,"]);
        assert!(a.drain().is_empty());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = InMemoryEventBus::new();
        let keep = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(1u8).unwrap();
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(keep.drain(), vec![1]);
    }

    #[test]
    fn subscribers_added_after_a_publish_are_counted() {
        let bus = InMemoryEventBus::new();
        let _first = bus.subscribe();
        bus.publish(1u8).unwrap();

        let _second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn messages_published_from_other_threads_are_drained_in_order() {
        let bus = Arc::new(InMemoryEventBus::new());
        let sub = bus.subscribe();

        let publisher = Arc::clone(&bus);
        thread::spawn(move || {
            for n in 0..10u32 {
                publisher.publish(n).unwrap();
            }
        })
        .join()
        .unwrap();

        assert_eq!(sub.drain(), (0..10).collect::<Vec<_>>());
    }
}
