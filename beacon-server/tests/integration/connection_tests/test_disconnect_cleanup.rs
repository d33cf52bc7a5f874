use beacon_server::Coordinator;
use std::collections::HashSet;

use crate::integration::init_tracing;
use crate::utils::{
    TestClient, expect_participants, expect_user_connected, expect_user_disconnected, members_of,
    room_exists,
};

#[tokio::test]
async fn test_sole_member_disconnect_deletes_room() {
    init_tracing();
    let coordinator = Coordinator::new();

    let z = TestClient::connect(&coordinator);
    z.join("r2").await;
    assert!(room_exists(&coordinator, "r2"));

    z.disconnect().await;
    assert!(!room_exists(&coordinator, "r2"));
    assert_eq!(coordinator.stats().rooms, 0);
    assert_eq!(coordinator.stats().connections, 0);

    // A later join recreates the room from scratch.
    let mut w = TestClient::connect(&coordinator);
    assert!(w.join("r2").await.is_empty());
    assert!(expect_participants(w.next().await).is_empty());
    assert_eq!(members_of(&coordinator, "r2").await, Some(HashSet::from([w.id])));
}

#[tokio::test]
async fn test_disconnect_without_join_is_noop() {
    init_tracing();
    let coordinator = Coordinator::new();

    let mut bystander = TestClient::connect(&coordinator);
    bystander.join("quiet").await;
    bystander.drain();

    let lurker = TestClient::connect(&coordinator);
    lurker.disconnect().await;

    bystander.assert_silent();
    assert_eq!(coordinator.stats().connections, 1);
    assert_eq!(coordinator.stats().rooms, 1);
}

#[tokio::test]
async fn test_disconnect_is_processed_once() {
    init_tracing();
    let coordinator = Coordinator::new();

    let mut stayer = TestClient::connect(&coordinator);
    let leaver = TestClient::connect(&coordinator);
    stayer.join("r").await;
    leaver.join("r").await;
    stayer.drain();

    tokio::join!(leaver.disconnect(), leaver.disconnect());

    assert_eq!(expect_user_disconnected(stayer.next().await), leaver.id);
    stayer.assert_silent();
}

#[tokio::test]
async fn test_leave_then_disconnect_broadcasts_once() {
    init_tracing();
    let coordinator = Coordinator::new();

    let mut stayer = TestClient::connect(&coordinator);
    let leaver = TestClient::connect(&coordinator);
    stayer.join("r").await;
    leaver.join("r").await;
    stayer.drain();

    let _ = tokio::join!(leaver.leave("r"), leaver.disconnect());

    assert_eq!(expect_user_disconnected(stayer.next().await), leaver.id);
    stayer.assert_silent();
    assert_eq!(
        members_of(&coordinator, "r").await,
        Some(HashSet::from([stayer.id]))
    );
}

#[tokio::test]
async fn test_explicit_leave_of_last_member_deletes_room() {
    init_tracing();
    let coordinator = Coordinator::new();

    let solo = TestClient::connect(&coordinator);
    solo.join("brief").await;

    assert!(solo.leave("brief").await);
    assert!(!room_exists(&coordinator, "brief"));
    assert!(coordinator.registry().rooms_of(&solo.id).is_empty());

    assert!(!solo.leave("brief").await);
}

#[tokio::test]
async fn test_join_between_unregister_and_leave_skips_departed_member() {
    init_tracing();
    let coordinator = Coordinator::new();

    let x = TestClient::connect(&coordinator);
    let mut y = TestClient::connect(&coordinator);
    let mut z = TestClient::connect(&coordinator);
    x.join("r").await;
    y.join("r").await;
    y.drain();

    // First half of a disconnect: x is gone from the registry but its leave
    // has not reached the room yet.
    assert!(coordinator.registry().unregister(&x.id).is_some());

    assert_eq!(z.join("r").await, vec![y.id]);
    assert_eq!(expect_participants(z.next().await), HashSet::from([y.id]));
    assert_eq!(expect_user_disconnected(y.next().await), x.id);
    assert_eq!(expect_user_connected(y.next().await), z.id);

    // The late leave finds nothing to do and announces nothing.
    assert!(!x.leave("r").await);
    y.assert_silent();
    z.assert_silent();
    assert_eq!(
        members_of(&coordinator, "r").await,
        Some(HashSet::from([y.id, z.id]))
    );
}
