//! Liveness probe integration tests

mod common;

use common::{connected, pong, wait_until_live, MockWsServer};
use ddp_client::Session;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[tokio::test]
async fn ping_pong_resolves_with_success() {
    let server = MockWsServer::new().await;
    let session = Session::connect(server.url()).await.unwrap();
    wait_until_live(&session).await;

    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let sink = outcomes.clone();
    session
        .ping_pong("p1", Duration::from_secs(5), move |err| {
            sink.lock().unwrap().push(err.is_none());
        })
        .await;

    common::eventually("the pong handler to fire", || {
        let outcomes = outcomes.clone();
        async move { !outcomes.lock().unwrap().is_empty() }
    })
    .await;
    assert_eq!(*outcomes.lock().unwrap(), vec![true]);

    session.close().await;
    server.shutdown().await;
}

#[tokio::test]
async fn anonymous_pings_resolve_in_enrollment_order() {
    let server = MockWsServer::with_handler(|msg: String| async move {
        let value: Value = serde_json::from_str(&msg).unwrap();
        match value["msg"].as_str() {
            Some("connect") => vec![connected("the-session")],
            // anonymous probe gets an anonymous reply
            Some("ping") => vec![pong(value["id"].as_str())],
            _ => vec![],
        }
    })
    .await;
    let session = Session::connect(server.url()).await.unwrap();
    wait_until_live(&session).await;

    let order = Arc::new(Mutex::new(Vec::new()));
    for n in 1..=3 {
        let order = order.clone();
        session
            .ping_pong("", Duration::from_secs(5), move |err| {
                assert!(err.is_none());
                order.lock().unwrap().push(n);
            })
            .await;
    }

    common::eventually("all three pongs", || {
        let order = order.clone();
        async move { order.lock().unwrap().len() == 3 }
    })
    .await;
    assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);

    session.close().await;
    server.shutdown().await;
}

#[tokio::test]
async fn unexpected_pongs_are_discarded() {
    let server = MockWsServer::with_handler(|msg: String| async move {
        let value: Value = serde_json::from_str(&msg).unwrap();
        match value["msg"].as_str() {
            Some("connect") => vec![connected("the-session"), pong(Some("nobody"))],
            Some("method") => vec![common::result_ok(value["id"].as_str().unwrap(), 1.into())],
            _ => vec![],
        }
    })
    .await;
    let session = Session::connect(server.url()).await.unwrap();
    wait_until_live(&session).await;

    // the stray pong must not crash the dispatcher
    assert!(session.call("probe", vec![]).await.is_ok());

    session.close().await;
    server.shutdown().await;
}

#[tokio::test]
async fn unanswered_pings_time_out() {
    // answers the handshake but swallows pings
    let server = MockWsServer::with_handler(|msg: String| async move {
        let value: Value = serde_json::from_str(&msg).unwrap();
        match value["msg"].as_str() {
            Some("connect") => vec![connected("the-session")],
            _ => vec![],
        }
    })
    .await;
    let session = Session::connect(server.url()).await.unwrap();
    wait_until_live(&session).await;

    let timeouts = Arc::new(AtomicUsize::new(0));
    let counter = timeouts.clone();
    session
        .ping_pong("t1", Duration::from_millis(50), move |err| {
            assert!(err.is_some());
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await;

    common::eventually("the timeout handler to fire", || {
        let timeouts = timeouts.clone();
        async move { timeouts.load(Ordering::SeqCst) == 1 }
    })
    .await;

    session.close().await;
    server.shutdown().await;
}

#[tokio::test]
async fn server_pings_are_answered_with_pongs() {
    // respond to the handshake, then probe the client
    let server = MockWsServer::with_handler(|msg: String| async move {
        let value: Value = serde_json::from_str(&msg).unwrap();
        match value["msg"].as_str() {
            Some("connect") => vec![
                connected("the-session"),
                serde_json::json!({"msg": "ping", "id": "srv-1"}).to_string(),
            ],
            _ => vec![],
        }
    })
    .await;

    let mut server = server;
    let session = Session::connect(server.url()).await.unwrap();
    wait_until_live(&session).await;

    let mut saw_pong = false;
    while let Some(frame) = server.wait_for_message().await {
        let value: Value = serde_json::from_str(&frame).unwrap();
        if value["msg"] == "pong" {
            assert_eq!(value["id"], "srv-1");
            saw_pong = true;
            break;
        }
    }
    assert!(saw_pong);

    session.close().await;
    server.shutdown().await;
}
