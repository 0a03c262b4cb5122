//! # Subscriptions
//!
//! Each subscription owns a bounded FIFO of pending events. When the queue
//! is full, the oldest event is dropped and the subscription is marked
//! lossy; the flag is sticky and visible on every subsequent delivery.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use super::event::Event;

#[derive(Debug)]
struct QueueInner {
    events: VecDeque<Event>,
    lossy: bool,
}

/// Bounded per-subscription FIFO
#[derive(Debug)]
pub(crate) struct SubscriptionQueue {
    capacity: usize,
    inner: Mutex<QueueInner>,
}

impl SubscriptionQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(QueueInner {
                events: VecDeque::with_capacity(capacity.min(64)),
                lossy: false,
            }),
        }
    }

    /// Push one event, dropping the oldest entry on overflow.
    pub(crate) fn push(&self, event: Event) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if inner.events.len() >= self.capacity {
            inner.events.pop_front();
            inner.lossy = true;
        }
        inner.events.push_back(event);
    }

    /// Drain all pending events.
    pub(crate) fn drain(&self) -> Delivery {
        let Ok(mut inner) = self.inner.lock() else {
            return Delivery {
                events: Vec::new(),
                lossy: false,
            };
        };
        Delivery {
            events: inner.events.drain(..).collect(),
            lossy: inner.lossy,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().map(|i| i.events.len()).unwrap_or(0)
    }
}

/// One batch of delivered events
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Pending events in commit order
    pub events: Vec<Event>,
    /// True once this subscription has ever dropped an event
    pub lossy: bool,
}

/// Handle held by a live consumer.
///
/// The bus keeps the owning side; this handle carries only the subscription
/// id and a reference to its queue, never a reference back to the bus.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: Uuid,
    principal: String,
    pub(crate) queue: Arc<SubscriptionQueue>,
}

impl Subscription {
    pub(crate) fn new(principal: &str, queue: Arc<SubscriptionQueue>) -> Self {
        Self {
            id: Uuid::new_v4(),
            principal: principal.to_string(),
            queue,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// Drain everything queued since the last poll, in commit order.
    pub fn poll(&self) -> Delivery {
        self.queue.drain()
    }

    /// Number of undelivered events.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::event::WriterTransition;

    fn event(n: i64) -> Event {
        Event::MessageDeleted {
            id: n,
            ts: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_fifo_order() {
        let queue = SubscriptionQueue::new(16);
        queue.push(event(1));
        queue.push(event(2));
        queue.push(event(3));

        let delivery = queue.drain();
        assert!(!delivery.lossy);
        let ids: Vec<i64> = delivery
            .events
            .iter()
            .map(|e| match e {
                Event::MessageDeleted { id, .. } => *id,
                _ => panic!("unexpected event"),
            })
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_overflow_drops_oldest_and_sets_lossy() {
        let queue = SubscriptionQueue::new(3);
        for n in 1..=5 {
            queue.push(event(n));
        }

        let delivery = queue.drain();
        assert!(delivery.lossy);
        assert_eq!(delivery.events.len(), 3);
        // The two oldest were dropped, the newest survive.
        assert!(matches!(delivery.events[0], Event::MessageDeleted { id: 3, .. }));
        assert!(matches!(delivery.events[2], Event::MessageDeleted { id: 5, .. }));
    }

    #[test]
    fn test_lossy_flag_is_sticky() {
        let queue = SubscriptionQueue::new(1);
        queue.push(event(1));
        queue.push(event(2)); // drops 1, marks lossy

        assert!(queue.drain().lossy);

        // Later deliveries with no further drops still report lossy.
        queue.push(event(3));
        assert!(queue.drain().lossy);
    }

    #[test]
    fn test_drain_empties_queue() {
        let queue = SubscriptionQueue::new(8);
        queue.push(Event::writer_changed(WriterTransition::Acquired, "writer1"));
        assert_eq!(queue.len(), 1);

        let first = queue.drain();
        assert_eq!(first.events.len(), 1);
        assert_eq!(queue.len(), 0);
        assert!(queue.drain().events.is_empty());
    }
}
