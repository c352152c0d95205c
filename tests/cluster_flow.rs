//! Two-node cluster: election, forwarding, relayed fan-out.

mod common;

use hackd::chat::PubSubEvent;
use std::time::Duration;

#[tokio::test]
async fn test_second_node_forwards_to_holder() {
    let node_a = common::start_node("node-a", Some("127.0.0.1:17411"), &[]).await;
    let node_b = common::start_node("node-b", None, &["127.0.0.1:17411"]).await;

    // Election: A started first and holds the singleton; B forwards.
    assert_eq!(node_a.hub.cluster_info().role, "holder");
    let info_b = node_b.hub.cluster_info();
    assert_eq!(info_b.role, "forwarder");
    assert_eq!(info_b.chat_holder.as_deref(), Some("node-a"));

    // A room created through B is visible from both nodes.
    node_b.hub.create_room("shared").await.unwrap();
    let rooms_a = node_a.hub.list_rooms().await.unwrap();
    assert!(rooms_a.contains(&"shared".to_string()));
    let rooms_b = node_b.hub.list_rooms().await.unwrap();
    assert!(rooms_b.contains(&"shared".to_string()));

    // Messages sent from B land in the holder's history, in send order.
    node_b.hub.send_message("shared", "bee", "uno").await.unwrap();
    node_b.hub.send_message("shared", "bee", "dos").await.unwrap();

    let history = wait_for_history(&node_b.hub, "shared", 2).await;
    let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["uno", "dos"]);

    let history_a = node_a.hub.history("shared").await.unwrap();
    assert_eq!(history_a.len(), 2);
}

#[tokio::test]
async fn test_holder_relays_room_events_to_peers() {
    let node_a = common::start_node("relay-a", Some("127.0.0.1:17412"), &[]).await;
    let node_b = common::start_node("relay-b", None, &["127.0.0.1:17412"]).await;

    node_b.hub.create_room("feed").await.unwrap();
    let (_id, mut events) = node_b.hub.subscribe("feed");

    node_a.hub.send_message("feed", "aye", "hola").await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(3), events.recv())
        .await
        .expect("no relayed event within 3s")
        .expect("feed closed");
    match event {
        PubSubEvent::NewMessage(message) => {
            assert_eq!(message.room, "feed");
            assert_eq!(message.content, "hola");
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn test_peer_monitoring_and_ping() {
    let node_a = common::start_node("mon-a", Some("127.0.0.1:17413"), &[]).await;

    // Watch membership events on the holder before the peer arrives.
    let (_id, mut cluster_events) = node_a.hub.pubsub().subscribe(hackd::chat::CLUSTER_TOPIC);

    let node_b = common::start_node("mon-b", None, &["127.0.0.1:17413"]).await;

    let event = tokio::time::timeout(Duration::from_secs(3), cluster_events.recv())
        .await
        .expect("no membership event within 3s")
        .expect("bus closed");
    assert_eq!(event, PubSubEvent::NodeUp("mon-b".to_string()));

    let pings = node_b.hub.ping_peers().await;
    assert_eq!(pings.len(), 1);
    assert_eq!(pings[0], ("mon-a".to_string(), true));
}

/// Poll history until the expected count arrives (casts cross a network
/// hop here, so a single read can race the append).
async fn wait_for_history(
    hub: &hackd::Hub,
    room: &str,
    expected: usize,
) -> Vec<hackd::model::ChatMessage> {
    for _ in 0..50 {
        if let Ok(history) = hub.history(room).await {
            if history.len() >= expected {
                return history;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("history for {room} never reached {expected} messages");
}
