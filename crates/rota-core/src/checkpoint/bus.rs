//! In-process checkpoint event fan-out.
//!
//! Each subscriber owns a bounded queue; a slow subscriber loses events to
//! its overflow counter instead of blocking the publisher. Delivery within
//! one subscriber preserves publication order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};

use crate::domain::CheckpointEvent;

const DEFAULT_QUEUE_CAPACITY: usize = 256;

struct SubscriberSlot {
    sender: SyncSender<CheckpointEvent>,
    overflow: Arc<AtomicU64>,
}

/// Handle returned by [`CheckpointBus::subscribe`]; dropping it (or calling
/// `unsubscribe`) detaches the queue.
pub struct Subscription {
    id: usize,
    receiver: Receiver<CheckpointEvent>,
    overflow: Arc<AtomicU64>,
}

impl Subscription {
    pub fn id(&self) -> usize {
        self.id
    }

    /// Next queued event, if any.
    pub fn try_recv(&self) -> Option<CheckpointEvent> {
        self.receiver.try_recv().ok()
    }

    /// Drain everything currently queued, in publication order.
    pub fn drain(&self) -> Vec<CheckpointEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Events dropped because this subscriber's queue was full.
    pub fn overflow_count(&self) -> u64 {
        self.overflow.load(Ordering::SeqCst)
    }
}

/// Bounded-queue pub/sub for checkpoint events.
pub struct CheckpointBus {
    subscribers: Mutex<HashMap<usize, SubscriberSlot>>,
    next_id: AtomicUsize,
    capacity: usize,
}

impl Default for CheckpointBus {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}

impl CheckpointBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(0),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = std::sync::mpsc::sync_channel(self.capacity);
        let overflow = Arc::new(AtomicU64::new(0));
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers
            .lock()
            .expect("subscriber table poisoned")
            .insert(
                id,
                SubscriberSlot {
                    sender,
                    overflow: overflow.clone(),
                },
            );
        Subscription {
            id,
            receiver,
            overflow,
        }
    }

    pub fn unsubscribe(&self, subscription: &Subscription) {
        self.subscribers
            .lock()
            .expect("subscriber table poisoned")
            .remove(&subscription.id);
    }

    /// Deliver to every live subscriber without blocking; returns how many
    /// queues accepted the event.
    pub fn publish(&self, event: &CheckpointEvent) -> usize {
        let mut delivered = 0;
        let mut dead: Vec<usize> = Vec::new();
        let mut subscribers = self.subscribers.lock().expect("subscriber table poisoned");

        for (id, slot) in subscribers.iter() {
            match slot.sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    slot.overflow.fetch_add(1, Ordering::SeqCst);
                    tracing::warn!(subscriber = id, "checkpoint queue full; event dropped");
                }
                Err(TrySendError::Disconnected(_)) => dead.push(*id),
            }
        }
        for id in dead {
            subscribers.remove(&id);
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("subscriber table poisoned")
            .len()
    }
}
