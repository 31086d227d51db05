//! Join races: simultaneous joins, duplicate nicknames across rooms, and
//! join-lock behavior under concurrency.

mod common;

use common::Harness;
use quiz_rush_server::protocol::{ClientMessage, ErrorKind, ServerMessage};
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn same_nickname_same_pin_exactly_one_wins() {
    let harness = Arc::new(Harness::new());
    let (_host, pin, _) = harness.create_room().await;

    let mut clients = Vec::new();
    let mut tasks = Vec::new();
    for _ in 0..2 {
        let client = harness.connect();
        let socket_id = client.socket_id;
        clients.push(client);
        let server = Arc::clone(&harness.server);
        let raw_pin = pin.as_str().to_string();
        tasks.push(tokio::spawn(async move {
            server
                .handle_client_message(socket_id, ClientMessage::JoinRoom {
                    pin: raw_pin,
                    nickname: "Zoe".to_string(),
                })
                .await;
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let mut joined = 0;
    let mut conflicted = 0;
    for client in &mut clients {
        if client.has(|m| matches!(m, ServerMessage::RoomJoined(_))) {
            joined += 1;
        }
        if client.has(|m| {
            matches!(
                m,
                ServerMessage::Error {
                    error: ErrorKind::Conflict,
                    ..
                }
            )
        }) {
            conflicted += 1;
        }
    }
    assert_eq!(joined, 1, "exactly one join must succeed");
    assert_eq!(conflicted, 1, "the loser gets a Conflict error");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_distinct_joins_all_succeed() {
    let harness = Arc::new(Harness::new());
    let (_host, pin, _) = harness.create_room().await;

    let mut clients = Vec::new();
    let mut tasks = Vec::new();
    for index in 0..10 {
        let client = harness.connect();
        let socket_id = client.socket_id;
        clients.push(client);
        let server = Arc::clone(&harness.server);
        let raw_pin = pin.as_str().to_string();
        tasks.push(tokio::spawn(async move {
            server
                .handle_client_message(socket_id, ClientMessage::JoinRoom {
                    pin: raw_pin,
                    nickname: format!("Player{index}"),
                })
                .await;
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    for client in &mut clients {
        assert!(client.has(|m| matches!(m, ServerMessage::RoomJoined(_))));
    }
}

#[tokio::test]
async fn same_nickname_on_different_pins_both_succeed() {
    let harness = Harness::new();
    let (_host_a, pin_a, _) = harness.create_room().await;
    let (_host_b, pin_b, _) = harness.create_room().await;
    assert_ne!(pin_a, pin_b);

    let (_zoe_a, _) = harness.join_player(&pin_a, "Zoe").await;
    let (_zoe_b, _) = harness.join_player(&pin_b, "Zoe").await;
}

#[tokio::test]
async fn sequential_duplicate_nickname_conflicts() {
    let harness = Harness::new();
    let (_host, pin, _) = harness.create_room().await;
    let (_zoe, _) = harness.join_player(&pin, "Zoe").await;

    // The first join completed, so its join lock is released; the refusal
    // comes from the room's uniqueness invariant.
    let mut dup = harness.connect();
    harness
        .send(&dup, ClientMessage::JoinRoom {
            pin: pin.as_str().to_string(),
            nickname: "zoe".to_string(),
        })
        .await;
    assert!(dup.has(|m| matches!(
        m,
        ServerMessage::Error {
            error: ErrorKind::Conflict,
            ..
        }
    )));
}

#[tokio::test]
async fn one_socket_cannot_hold_two_roles() {
    let harness = Harness::new();
    let (_host, pin, _) = harness.create_room().await;

    let (alice, _) = harness.join_player(&pin, "Alice").await;
    let mut alice = alice;
    harness
        .send(&alice, ClientMessage::JoinRoom {
            pin: pin.as_str().to_string(),
            nickname: "AliceAgain".to_string(),
        })
        .await;
    assert!(alice.has(|m| matches!(
        m,
        ServerMessage::Error {
            error: ErrorKind::Conflict,
            ..
        }
    )));
}
