//! Chat flows: rooms, ordering, live fan-out, reset.

mod common;

use hackd::chat::PubSubEvent;
use hackd::DomainError;
use std::time::Duration;

#[tokio::test]
async fn test_general_room_exists_after_start() {
    let system = common::start().await;
    let rooms = system.hub.list_rooms().await.unwrap();
    assert_eq!(rooms, vec!["general".to_string()]);
}

#[tokio::test]
async fn test_history_order_matches_send_order() {
    let system = common::start().await;
    let hub = &system.hub;

    hub.create_room("Room1").await.unwrap();
    hub.send_message("Room1", "A", "uno").await.unwrap();
    hub.send_message("Room1", "B", "dos").await.unwrap();
    hub.send_message("Room1", "C", "tres").await.unwrap();

    let history = hub.history("Room1").await.unwrap();
    let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["uno", "dos", "tres"]);
    assert_eq!(history[0].author, "A");
}

#[tokio::test]
async fn test_duplicate_room_rejected() {
    let system = common::start().await;
    let hub = &system.hub;

    hub.create_room("Room1").await.unwrap();
    let dup = hub.create_room("Room1").await;
    assert_eq!(dup, Err(DomainError::RoomExists("Room1".into())));
}

#[tokio::test]
async fn test_send_to_missing_room_is_dropped_silently() {
    let system = common::start().await;
    let hub = &system.hub;

    // The cast itself succeeds; the holder drops and logs it.
    hub.send_message("nowhere", "A", "lost").await.unwrap();

    let missing = hub.history("nowhere").await;
    assert_eq!(missing, Err(DomainError::RoomNotFound("nowhere".into())));
}

#[tokio::test]
async fn test_subscriber_sees_messages_after_append() {
    let system = common::start().await;
    let hub = &system.hub;

    hub.create_room("Room1").await.unwrap();
    let (id, mut feed) = hub.subscribe("Room1");

    hub.send_message("Room1", "A", "uno").await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(2), feed.recv())
        .await
        .expect("no event within 2s")
        .expect("feed closed");
    match event {
        PubSubEvent::NewMessage(message) => {
            assert_eq!(message.content, "uno");
            // The broadcast happens after the append: history already
            // contains the message.
            let history = hub.history("Room1").await.unwrap();
            assert_eq!(history.len(), 1);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    hub.unsubscribe("Room1", id);
    hub.send_message("Room1", "B", "dos").await.unwrap();
    // Give the worker a moment, then confirm nothing else arrived.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(feed.try_recv().is_err());
}

#[tokio::test]
async fn test_chat_reset_leaves_single_empty_general() {
    let system = common::start().await;
    let hub = &system.hub;

    hub.create_room("Room1").await.unwrap();
    hub.send_message("general", "A", "uno").await.unwrap();
    hub.chat_reset().await.unwrap();

    assert_eq!(hub.list_rooms().await.unwrap(), vec!["general".to_string()]);
    assert!(hub.history("general").await.unwrap().is_empty());
    assert_eq!(
        hub.history("Room1").await,
        Err(DomainError::RoomNotFound("Room1".into()))
    );
}

#[tokio::test]
async fn test_single_host_cluster_info() {
    let system = common::start().await;
    let info = system.hub.cluster_info();
    assert_eq!(info.role, "holder");
    assert_eq!(info.chat_holder.as_deref(), Some("hackd"));
    assert!(info.peers.is_empty());
}
