// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event bus core: subscriber registry, priority queue, dispatcher task.

use crate::error::{BusError, HandlerError};
use async_trait::async_trait;
use parking_lot::Mutex;
use pylon_core::auth::Permission;
use pylon_core::event::{EventDescriptor, EventPriority};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::warn;

/// An event as delivered to subscribers.
#[derive(Debug, Clone)]
pub struct BusEvent {
    pub descriptor: &'static EventDescriptor,
    pub payload: Arc<serde_json::Value>,
}

impl BusEvent {
    pub fn new(descriptor: &'static EventDescriptor, payload: serde_json::Value) -> Self {
        Self { descriptor, payload: Arc::new(payload) }
    }
}

/// Receiving end of a subscription.
///
/// Handlers must not call back into `subscribe`/`unsubscribe` inline; the
/// registry lock is held for the duration of `deliver`. Spawn instead.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, event: &BusEvent) -> Result<(), HandlerError>;
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

struct Subscriber {
    id: SubscriberId,
    permissions: HashSet<Permission>,
    sink: Arc<dyn EventSink>,
}

impl Subscriber {
    fn wants(&self, descriptor: &EventDescriptor) -> bool {
        self.permissions.contains(&descriptor.required_permission)
    }
}

/// A queued non-instant event. Orders by priority, then FIFO by sequence.
struct Queued {
    priority: EventPriority,
    seq: u64,
    event: BusEvent,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    // Reversed so the max-heap pops the lowest (priority, seq) pair first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.priority.cmp(&self.priority).then_with(|| other.seq.cmp(&self.seq))
    }
}

struct BusInner {
    subscribers: RwLock<Vec<Subscriber>>,
    queue: Mutex<BinaryHeap<Queued>>,
    seq: AtomicU64,
    next_id: AtomicU64,
    notify: Notify,
    closed: AtomicBool,
}

impl BusInner {
    /// Deliver one event to every authorized subscriber, in registration
    /// order. The registry read guard is held across delivery so that
    /// `unsubscribe` (a write) cannot return while a dispatch to the
    /// removed handler is still possible.
    async fn dispatch(&self, event: &BusEvent) {
        let subscribers = self.subscribers.read().await;
        for sub in subscribers.iter().filter(|s| s.wants(event.descriptor)) {
            if let Err(e) = sub.sink.deliver(event).await {
                warn!(
                    event = event.descriptor.id,
                    subscriber = sub.id.0,
                    error = %e,
                    "event handler failed"
                );
            }
        }
    }
}

/// Prioritized pub/sub hub. Cheap to clone; all clones share one registry
/// and queue.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: RwLock::new(Vec::new()),
                queue: Mutex::new(BinaryHeap::new()),
                seq: AtomicU64::new(0),
                next_id: AtomicU64::new(0),
                notify: Notify::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Spawn the dispatcher task that drains the priority queue.
    ///
    /// Call once at startup. The task exits after `close` once the queue
    /// has drained.
    pub fn start(&self) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            loop {
                let next = inner.queue.lock().pop();
                match next {
                    Some(queued) => inner.dispatch(&queued.event).await,
                    None => {
                        if inner.closed.load(AtomicOrdering::Acquire) {
                            break;
                        }
                        inner.notify.notified().await;
                    }
                }
            }
        })
    }

    /// Register a sink with the permissions it is authorized for.
    pub async fn subscribe(
        &self,
        sink: Arc<dyn EventSink>,
        permissions: HashSet<Permission>,
    ) -> SubscriberId {
        let id = SubscriberId(self.inner.next_id.fetch_add(1, AtomicOrdering::Relaxed));
        let mut subscribers = self.inner.subscribers.write().await;
        subscribers.push(Subscriber { id, permissions, sink });
        id
    }

    /// Remove a subscription. After this returns, the handler will not be
    /// invoked again.
    pub async fn unsubscribe(&self, id: SubscriberId) {
        let mut subscribers = self.inner.subscribers.write().await;
        subscribers.retain(|s| s.id != id);
    }

    /// Enqueue a non-instant event. Does not suspend; dispatch happens on
    /// the dispatcher task in priority order, FIFO within a priority.
    pub fn publish(
        &self,
        descriptor: &'static EventDescriptor,
        payload: serde_json::Value,
    ) -> Result<(), BusError> {
        if descriptor.priority == EventPriority::Instant {
            return Err(BusError::InstantOnQueue(descriptor.id));
        }
        if self.inner.closed.load(AtomicOrdering::Acquire) {
            return Err(BusError::Closed);
        }
        let seq = self.inner.seq.fetch_add(1, AtomicOrdering::Relaxed);
        self.inner.queue.lock().push(Queued {
            priority: descriptor.priority,
            seq,
            event: BusEvent::new(descriptor, payload),
        });
        self.inner.notify.notify_one();
        Ok(())
    }

    /// Publish an instant event: every currently-registered authorized
    /// handler has run before this returns.
    pub async fn publish_instant(
        &self,
        descriptor: &'static EventDescriptor,
        payload: serde_json::Value,
    ) -> Result<(), BusError> {
        if self.inner.closed.load(AtomicOrdering::Acquire) {
            return Err(BusError::Closed);
        }
        let event = BusEvent::new(descriptor, payload);
        self.inner.dispatch(&event).await;
        Ok(())
    }

    /// Stop accepting events. The dispatcher drains what is already queued
    /// and then exits; await the handle from `start` to observe the drain.
    pub fn close(&self) {
        self.inner.closed.store(true, AtomicOrdering::Release);
        self.inner.notify.notify_one();
    }

    /// Number of events waiting on the queue (diagnostics).
    pub fn queued_len(&self) -> usize {
        self.inner.queue.lock().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
