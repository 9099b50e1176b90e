// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use companion_core::ConversationId;

fn event(tag: &str) -> Event {
    Event::ErrorDetected { conversation_id: ConversationId::new("c1"), message: tag.to_string() }
}

#[tokio::test]
async fn broadcast_reaches_every_registered_client() {
    let mut bus = EventBus::new();
    let (_id_a, mut a) = bus.register();
    let (_id_b, mut b) = bus.register();

    bus.broadcast(event("hello"));

    assert_eq!(a.recv().await, Some(event("hello")));
    assert_eq!(b.recv().await, Some(event("hello")));
}

#[tokio::test]
async fn send_to_targets_a_single_client() {
    let mut bus = EventBus::new();
    let (id_a, mut a) = bus.register();
    let (_id_b, mut b) = bus.register();

    bus.send_to(id_a, event("only-a"));

    assert_eq!(a.recv().await, Some(event("only-a")));
    tokio::select! {
        _ = b.recv() => panic!("client b should not have received anything"),
        _ = tokio::time::sleep(std::time::Duration::from_millis(20)) => {}
    }
}

#[tokio::test]
async fn unregister_drains_then_closes_the_queue() {
    let mut bus = EventBus::new();
    let (id, mut handle) = bus.register();
    bus.broadcast(event("buffered"));

    bus.unregister(id);

    assert_eq!(handle.recv().await, Some(event("buffered")));
    assert_eq!(handle.recv().await, None);
}

#[tokio::test]
async fn full_queue_drops_the_oldest_event() {
    let mut bus = EventBus::new();
    let (_id, mut handle) = bus.register();

    for i in 0..CLIENT_QUEUE_CAPACITY + 1 {
        bus.broadcast(event(&i.to_string()));
    }

    let first = handle.recv().await.unwrap();
    assert_eq!(first, event("1"));
}

#[test]
fn client_count_tracks_registration_and_unregistration() {
    let mut bus = EventBus::new();
    assert_eq!(bus.client_count(), 0);
    let (id, _handle) = bus.register();
    assert_eq!(bus.client_count(), 1);
    bus.unregister(id);
    assert_eq!(bus.client_count(), 0);
}
