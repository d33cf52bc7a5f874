use beacon_core::{ClientMessage, ConnectionId, SignalKind};
use beacon_server::Coordinator;
use std::collections::HashSet;

use crate::integration::init_tracing;
use crate::utils::{
    TestClient, expect_error, expect_participants, expect_user_connected,
    expect_user_disconnected, members_of, room_exists,
};

#[tokio::test]
async fn test_two_peers_meet_and_one_leaves() {
    init_tracing();
    let coordinator = Coordinator::new();

    let mut x = TestClient::connect(&coordinator);
    let mut y = TestClient::connect(&coordinator);

    assert!(x.join("r1").await.is_empty());
    assert!(expect_participants(x.next().await).is_empty());

    assert_eq!(y.join("r1").await, vec![x.id]);
    assert_eq!(expect_participants(y.next().await), HashSet::from([x.id]));
    assert_eq!(expect_user_connected(x.next().await), y.id);
    y.assert_silent();

    assert!(
        x.send_signal(y.id, SignalKind::Offer, r#"{"type":"offer","sdp":"v=0"}"#)
            .await
    );
    match y.next().await {
        beacon_core::ServerMessage::Offer { from, offer } => {
            assert_eq!(from, x.id);
            assert_eq!(offer.get(), r#"{"type":"offer","sdp":"v=0"}"#);
        }
        other => panic!("expected offer, got {:?}", other),
    }

    y.disconnect().await;
    assert_eq!(expect_user_disconnected(x.next().await), y.id);
    assert_eq!(members_of(&coordinator, "r1").await, Some(HashSet::from([x.id])));
    assert!(room_exists(&coordinator, "r1"));
}

#[tokio::test]
async fn test_repeated_join_is_idempotent() {
    init_tracing();
    let coordinator = Coordinator::new();

    let mut a = TestClient::connect(&coordinator);
    let mut b = TestClient::connect(&coordinator);

    a.join("lobby").await;
    b.join("lobby").await;
    a.drain();
    b.drain();

    assert_eq!(b.join("lobby").await, vec![a.id]);
    assert_eq!(expect_participants(b.next().await), HashSet::from([a.id]));
    a.assert_silent();

    assert_eq!(
        members_of(&coordinator, "lobby").await,
        Some(HashSet::from([a.id, b.id]))
    );
}

#[tokio::test]
async fn test_empty_room_id_is_rejected_without_state_change() {
    init_tracing();
    let coordinator = Coordinator::new();
    let mut client = TestClient::connect(&coordinator);

    let err = ClientMessage::parse(r#"{"event":"join-room","data":""}"#).unwrap_err();
    coordinator.reject(client.id, err);

    let reason = expect_error(client.next().await);
    assert!(reason.starts_with("Failed to join room"), "{reason}");
    assert_eq!(coordinator.stats().rooms, 0);
    assert!(coordinator.registry().rooms_of(&client.id).is_empty());
}

#[tokio::test]
async fn test_malformed_non_join_frame_is_ignored() {
    init_tracing();
    let coordinator = Coordinator::new();
    let mut client = TestClient::connect(&coordinator);

    let err = ClientMessage::parse(r#"{"event":"offer","data":{"offer":{}}}"#).unwrap_err();
    coordinator.reject(client.id, err);

    client.assert_silent();
}

#[tokio::test]
async fn test_join_from_unregistered_connection_fails() {
    init_tracing();
    let coordinator = Coordinator::new();
    let ghost = ConnectionId::new();

    let result = coordinator
        .join(ghost, beacon_core::RoomId::parse("r").unwrap())
        .await;

    assert!(matches!(
        result,
        Err(beacon_server::RelayError::ConnectionNotFound(id)) if id == ghost
    ));
    assert!(!room_exists(&coordinator, "r"));
    assert_eq!(coordinator.stats().rooms, 0);
}

#[tokio::test]
async fn test_failed_join_keeps_occupied_room() {
    init_tracing();
    let coordinator = Coordinator::new();

    let mut member = TestClient::connect(&coordinator);
    member.join("r").await;
    member.drain();

    let result = coordinator
        .join(ConnectionId::new(), beacon_core::RoomId::parse("r").unwrap())
        .await;

    assert!(result.is_err());
    assert_eq!(members_of(&coordinator, "r").await, Some(HashSet::from([member.id])));
    member.assert_silent();
}

#[tokio::test]
async fn test_handle_dispatches_client_frames() {
    init_tracing();
    let coordinator = Coordinator::new();
    let mut a = TestClient::connect(&coordinator);

    let join = ClientMessage::parse(r#"{"event":"join-room","data":"via-frame"}"#).unwrap();
    coordinator.handle(a.id, join).await;
    assert!(expect_participants(a.next().await).is_empty());

    let leave = ClientMessage::parse(r#"{"event":"leave-room","data":"via-frame"}"#).unwrap();
    coordinator.handle(a.id, leave).await;
    assert!(!room_exists(&coordinator, "via-frame"));
}

#[tokio::test]
async fn test_handle_swallows_failed_join() {
    init_tracing();
    let coordinator = Coordinator::new();
    let client = TestClient::connect(&coordinator);
    client.disconnect().await;

    let join = ClientMessage::parse(r#"{"event":"join-room","data":"late"}"#).unwrap();
    coordinator.handle(client.id, join).await;

    assert!(!room_exists(&coordinator, "late"));
    assert_eq!(coordinator.stats().rooms, 0);
}
