//! # Event Fan-Out
//!
//! The bus owns its subscribers and destroys them on unsubscribe. Fan-out
//! runs under a single publish section so every subscription observes the
//! same total order; pushing into a bounded queue never blocks, so a slow
//! consumer cannot delay a lock transition.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use uuid::Uuid;

use crate::lock::state::LockSnapshot;
use crate::observability::Logger;

use super::errors::{BusError, BusResult};
use super::event::Event;
use super::subscriber::{Subscription, SubscriptionQueue};

struct SubscriberEntry {
    principal: String,
    queue: Arc<SubscriptionQueue>,
}

/// Last broadcast lock state, compared field-wise (timestamps excluded).
type LockStateKey = (u8, Option<String>, bool);

/// Ordered, process-local publish/subscribe fan-out.
pub struct EventBus {
    queue_capacity: usize,
    subscribers: RwLock<HashMap<Uuid, SubscriberEntry>>,
    /// Held across each fan-out so deliveries share one total order
    publish_serial: Mutex<()>,
    /// Monotonic publish counter, for operator logs
    sequence: AtomicU64,
    last_lock_state: Mutex<Option<LockStateKey>>,
}

impl EventBus {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            queue_capacity,
            subscribers: RwLock::new(HashMap::new()),
            publish_serial: Mutex::new(()),
            sequence: AtomicU64::new(0),
            last_lock_state: Mutex::new(None),
        }
    }

    /// Register a subscriber and hand back its handle.
    ///
    /// The new queue immediately receives a synthetic `lock_state` built
    /// from `snapshot`, so the consumer starts from a consistent view.
    pub fn subscribe(&self, principal: &str, snapshot: &LockSnapshot) -> Subscription {
        let queue = Arc::new(SubscriptionQueue::new(self.queue_capacity));
        queue.push(Event::lock_state(snapshot));

        let subscription = Subscription::new(principal, Arc::clone(&queue));
        if let Ok(mut subscribers) = self.subscribers.write() {
            subscribers.insert(
                subscription.id(),
                SubscriberEntry {
                    principal: principal.to_string(),
                    queue,
                },
            );
        }
        subscription
    }

    /// Remove a subscription and release its resources.
    ///
    /// Returns the principal the subscription belonged to, so presence
    /// tracking can react.
    pub fn unsubscribe(&self, id: Uuid) -> BusResult<String> {
        let mut subscribers = self
            .subscribers
            .write()
            .map_err(|_| BusError::Internal("subscriber registry poisoned".into()))?;
        subscribers
            .remove(&id)
            .map(|entry| entry.principal)
            .ok_or(BusError::SubscriptionNotFound)
    }

    /// Publish one committed event to every live subscription.
    pub fn publish(&self, event: Event) {
        let _serial = match self.publish_serial.lock() {
            Ok(guard) => guard,
            Err(_) => {
                Logger::error("BUS_PUBLISH_SERIAL_POISONED", &[]);
                return;
            }
        };

        self.sequence.fetch_add(1, Ordering::SeqCst);

        if let Event::LockState {
            lock_value,
            ref holder,
            writer_enabled,
            ..
        } = event
        {
            if let Ok(mut last) = self.last_lock_state.lock() {
                *last = Some((lock_value, holder.clone(), writer_enabled));
            }
        }

        let Ok(subscribers) = self.subscribers.read() else {
            return;
        };
        for entry in subscribers.values() {
            entry.queue.push(event.clone());
        }
    }

    /// Re-emit `lock_state` if it changed since the last broadcast.
    ///
    /// Returns true when an event was published. Driven by a periodic tick;
    /// guards subscribers against lost updates.
    pub fn reconcile(&self, snapshot: &LockSnapshot) -> bool {
        let key: LockStateKey = (
            snapshot.lock_value,
            snapshot.holder.clone(),
            snapshot.writer_enabled,
        );

        let changed = self
            .last_lock_state
            .lock()
            .map(|last| last.as_ref() != Some(&key))
            .unwrap_or(false);

        if changed {
            self.publish(Event::lock_state(snapshot));
        }
        changed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Number of events published so far.
    pub fn published(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::event::WriterTransition;
    use chrono::Utc;

    fn free_snapshot() -> LockSnapshot {
        LockSnapshot {
            lock_value: 1,
            holder: None,
            writer_enabled: true,
            ts: Utc::now(),
        }
    }

    fn held_snapshot(owner: &str) -> LockSnapshot {
        LockSnapshot {
            lock_value: 0,
            holder: Some(owner.to_string()),
            writer_enabled: true,
            ts: Utc::now(),
        }
    }

    #[test]
    fn test_subscribe_delivers_initial_snapshot() {
        let bus = EventBus::new(16);
        let sub = bus.subscribe("reader1", &free_snapshot());

        let delivery = sub.poll();
        assert_eq!(delivery.events.len(), 1);
        assert!(matches!(
            delivery.events[0],
            Event::LockState { lock_value: 1, .. }
        ));

        // No intervening mutation: exactly one event, nothing more.
        assert!(sub.poll().events.is_empty());
    }

    #[test]
    fn test_all_subscribers_see_same_order() {
        let bus = EventBus::new(16);
        let a = bus.subscribe("a", &free_snapshot());
        let b = bus.subscribe("b", &free_snapshot());

        bus.publish(Event::writer_changed(WriterTransition::Acquired, "writer1"));
        bus.publish(Event::MessageCreated {
            id: 1,
            author: "writer1".to_string(),
            body: "a".to_string(),
            ts: Utc::now(),
        });
        bus.publish(Event::writer_changed(WriterTransition::Released, "writer1"));

        for sub in [&a, &b] {
            let events = sub.poll().events;
            assert_eq!(events.len(), 4); // snapshot + 3
            assert!(matches!(events[0], Event::LockState { .. }));
            assert!(matches!(
                events[1],
                Event::WriterChanged {
                    event: WriterTransition::Acquired,
                    ..
                }
            ));
            assert!(matches!(events[2], Event::MessageCreated { id: 1, .. }));
            assert!(matches!(
                events[3],
                Event::WriterChanged {
                    event: WriterTransition::Released,
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_unsubscribe_releases_entry() {
        let bus = EventBus::new(16);
        let sub = bus.subscribe("reader1", &free_snapshot());
        assert_eq!(bus.subscriber_count(), 1);

        let principal = bus.unsubscribe(sub.id()).unwrap();
        assert_eq!(principal, "reader1");
        assert_eq!(bus.subscriber_count(), 0);

        assert!(matches!(
            bus.unsubscribe(sub.id()),
            Err(BusError::SubscriptionNotFound)
        ));
    }

    #[test]
    fn test_reconcile_emits_only_on_change() {
        let bus = EventBus::new(16);
        let sub = bus.subscribe("reader1", &free_snapshot());
        sub.poll(); // drop the snapshot

        // Nothing was ever broadcast: first reconcile emits.
        assert!(bus.reconcile(&free_snapshot()));
        assert_eq!(sub.poll().events.len(), 1);

        // Same state again: silent.
        assert!(!bus.reconcile(&free_snapshot()));
        assert!(sub.poll().events.is_empty());

        // State changed: emits again.
        assert!(bus.reconcile(&held_snapshot("writer1")));
        let events = sub.poll().events;
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            Event::LockState { holder: Some(h), .. } if h == "writer1"
        ));
    }

    #[test]
    fn test_slow_subscriber_does_not_block_publisher() {
        let bus = EventBus::new(2);
        let sub = bus.subscribe("slow", &free_snapshot());

        // Publish far past capacity; publish never blocks or fails.
        for n in 0..100 {
            bus.publish(Event::MessageDeleted {
                id: n,
                ts: Utc::now(),
            });
        }

        let delivery = sub.poll();
        assert!(delivery.lossy);
        assert_eq!(delivery.events.len(), 2);
        assert!(matches!(delivery.events[1], Event::MessageDeleted { id: 99, .. }));
    }
}
