use beacon_core::{ConnectionId, SignalKind};
use beacon_server::Coordinator;

use crate::integration::init_tracing;
use crate::utils::TestClient;

#[tokio::test]
async fn test_unknown_target_is_dropped_silently() {
    init_tracing();
    let coordinator = Coordinator::new();

    let mut sender = TestClient::connect(&coordinator);
    let mut peer = TestClient::connect(&coordinator);
    sender.join("r").await;
    peer.join("r").await;
    sender.drain();
    peer.drain();

    let delivered = sender
        .send_signal(ConnectionId::new(), SignalKind::Offer, r#"{"sdp":"x"}"#)
        .await;

    assert!(!delivered);
    sender.assert_silent();
    peer.assert_silent();
}

#[tokio::test]
async fn test_target_in_another_room_is_not_reachable() {
    init_tracing();
    let coordinator = Coordinator::new();

    let mut a = TestClient::connect(&coordinator);
    let mut b = TestClient::connect(&coordinator);
    a.join("left-wing").await;
    b.join("right-wing").await;
    a.drain();
    b.drain();

    assert!(!a.send_signal(b.id, SignalKind::Offer, "{}").await);
    b.assert_silent();
    a.assert_silent();
}

#[tokio::test]
async fn test_target_that_never_joined_is_not_reachable() {
    init_tracing();
    let coordinator = Coordinator::new();

    let mut a = TestClient::connect(&coordinator);
    let mut idle = TestClient::connect(&coordinator);
    a.join("r").await;
    a.drain();

    assert!(!a.send_signal(idle.id, SignalKind::Candidate, "{}").await);
    idle.assert_silent();
}

#[tokio::test]
async fn test_target_that_left_is_not_reachable() {
    init_tracing();
    let coordinator = Coordinator::new();

    let mut a = TestClient::connect(&coordinator);
    let mut b = TestClient::connect(&coordinator);
    let mut c = TestClient::connect(&coordinator);
    for client in [&a, &b, &c] {
        client.join("r").await;
    }
    b.leave("r").await;
    a.drain();
    b.drain();
    c.drain();

    assert!(!a.send_signal(b.id, SignalKind::Answer, "{}").await);
    b.assert_silent();
    c.assert_silent();
}
