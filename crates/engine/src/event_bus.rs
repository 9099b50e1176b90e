// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-owner fan-out from the registry to every connected client (spec
//! §5, §9 "Observer pattern"). Each client gets a bounded outbound queue;
//! a slow client drops its oldest buffered event rather than stalling the
//! broadcast for everyone else.

use companion_core::Event;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Per-client outbound queue capacity before the oldest buffered event is
/// dropped to make room for the newest one (spec §9).
pub const CLIENT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

struct ClientQueue {
    events: Mutex<VecDeque<Event>>,
    notify: Notify,
    closed: AtomicBool,
}

/// The receiving half handed to a connection task; `recv` resolves as soon
/// as an event is queued, or `None` once [`EventBus::unregister`] is
/// called and the queue has drained.
pub struct ClientHandle {
    shared: Arc<ClientQueue>,
}

impl ClientHandle {
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            if let Some(event) = self.shared.events.lock().pop_front() {
                return Some(event);
            }
            if self.shared.closed.load(Ordering::Acquire) {
                return None;
            }
            self.shared.notify.notified().await;
        }
    }
}

/// Owns every connected client's outbound queue. Lives on a single task;
/// nothing else touches `clients` directly (spec §9 "single-owner task").
#[derive(Default)]
pub struct EventBus {
    clients: HashMap<ClientId, Arc<ClientQueue>>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new client and returns its id plus the receiving half
    /// of its outbound queue.
    pub fn register(&mut self) -> (ClientId, ClientHandle) {
        let id = ClientId(self.next_id);
        self.next_id += 1;
        let shared = Arc::new(ClientQueue { events: Mutex::new(VecDeque::new()), notify: Notify::new(), closed: AtomicBool::new(false) });
        self.clients.insert(id, shared.clone());
        (id, ClientHandle { shared })
    }

    pub fn unregister(&mut self, id: ClientId) {
        if let Some(shared) = self.clients.remove(&id) {
            shared.closed.store(true, Ordering::Release);
            shared.notify.notify_one();
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Broadcasts `event` to every registered client, dropping the oldest
    /// queued event for any client whose queue is already at capacity.
    pub fn broadcast(&self, event: Event) {
        for shared in self.clients.values() {
            Self::enqueue(shared, event.clone());
        }
    }

    /// Sends `event` to a single client (used for query responses, which
    /// aren't meant for the whole room).
    pub fn send_to(&self, id: ClientId, event: Event) {
        if let Some(shared) = self.clients.get(&id) {
            Self::enqueue(shared, event);
        }
    }

    fn enqueue(shared: &Arc<ClientQueue>, event: Event) {
        let mut queue = shared.events.lock();
        if queue.len() >= CLIENT_QUEUE_CAPACITY {
            queue.pop_front();
            tracing::warn!("client outbound queue full; dropped oldest event");
        }
        queue.push_back(event);
        drop(queue);
        shared.notify.notify_one();
    }
}

#[cfg(test)]
#[path = "event_bus_tests.rs"]
mod tests;
