//! Synchronized setup over real HTTP against an in-process relay

mod common;

use axum::http::StatusCode;
use common::{spawn_relay, unreachable_host, RelayMode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use syncsuite::distributed::{HttpStateChannel, RemoteState, RemoteStateStatus, StateChannel, TransportError};
use syncsuite::setup::{Consumer, PhaseState, Producer, SetupBuilder, SetupPhase, Terminal};
use syncsuite::NodeIdentity;

fn follower(host: &str, ordinal: usize, total: usize) -> SetupBuilder {
    SetupBuilder::new()
        .producer(Producer::no_arg(|| panic!("followers never run phase A")))
        .consumer(Consumer::payload(|_| {}))
        .node(NodeIdentity::new(ordinal, total).unwrap())
        .channel(Arc::new(HttpStateChannel::new(host).unwrap()))
        .poll_interval(Duration::from_millis(10))
        .wait_timeout(Duration::from_secs(10))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn three_nodes_share_payload_over_http() {
    let relay = spawn_relay(RelayMode::Normal).await;
    let producer_calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for ordinal in [3, 2, 1] {
        let calls = producer_calls.clone();
        let seen = seen.clone();
        let mut setup = SetupBuilder::new()
            .producer(Producer::no_arg(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(100));
                b"postgres://10.0.0.9/test".to_vec()
            }))
            .consumer(Consumer::payload(move |data| seen.lock().unwrap().push((ordinal, data))))
            .node(NodeIdentity::new(ordinal, 3).unwrap())
            .channel(Arc::new(HttpStateChannel::new(&relay.base_url).unwrap()))
            .poll_interval(Duration::from_millis(10))
            .build()
            .unwrap();

        handles.push(tokio::spawn(async move { setup.run().await }));
    }

    for handle in handles {
        assert!(handle.await.unwrap());
    }

    assert_eq!(producer_calls.load(Ordering::SeqCst), 1);
    let mut seen = seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(
        seen,
        vec![
            (1, b"postgres://10.0.0.9/test".to_vec()),
            (2, b"postgres://10.0.0.9/test".to_vec()),
            (3, b"postgres://10.0.0.9/test".to_vec()),
        ]
    );

    assert_eq!(relay.posts(), 1);
    assert_eq!(relay.content_types(), vec!["application/json".to_string()]);
    let record: serde_json::Value = serde_json::from_slice(&relay.record().unwrap()).unwrap();
    assert_eq!(record["State"], 2);
    assert_eq!(record["Data"], "cG9zdGdyZXM6Ly8xMC4wLjAuOS90ZXN0");
}

#[tokio::test]
async fn producer_failure_reaches_followers() {
    let relay = spawn_relay(RelayMode::Normal).await;

    let mut producer = SetupBuilder::new()
        .producer(Producer::no_arg(|| syncsuite::setup::fail("migrations failed")))
        .consumer(Consumer::payload(|_| {}))
        .node(NodeIdentity::new(1, 2).unwrap())
        .channel(Arc::new(HttpStateChannel::new(&relay.base_url).unwrap()))
        .build()
        .unwrap();
    assert!(!producer.run().await);

    let mut node2 = follower(&relay.base_url, 2, 2).build().unwrap();
    assert!(!node2.run().await);
    assert_eq!(node2.phase(), SetupPhase::Done(Terminal::FailedAt(syncsuite::setup::Phase::A)));
    assert_eq!(
        node2.summary().failure.unwrap().message,
        "BeforeSuite on Node 1 failed"
    );
}

#[tokio::test]
async fn unreachable_sync_host() {
    let host = unreachable_host().await;
    let mut setup = follower(&host, 2, 3).build().unwrap();

    assert!(!setup.run().await);
    let summary = setup.summary();
    assert_eq!(summary.state, Some(PhaseState::Failed));
    assert_eq!(summary.failure.unwrap().message, "Failed to fetch BeforeSuite state");
}

#[tokio::test]
async fn non_200_response_is_a_fetch_failure() {
    let relay = spawn_relay(RelayMode::Status(StatusCode::SERVICE_UNAVAILABLE)).await;
    let channel = HttpStateChannel::new(&relay.base_url).unwrap();

    let err = channel.observe().await.unwrap_err();
    assert!(matches!(err, TransportError::Fetch { .. }));
    assert!(err.reason().contains("503"));

    let mut setup = follower(&relay.base_url, 2, 2).build().unwrap();
    assert!(!setup.run().await);
    assert_eq!(
        setup.summary().failure.unwrap().message,
        "Failed to fetch BeforeSuite state"
    );
    // Transport errors are not retried
    assert_eq!(relay.gets(), 2);
}

#[tokio::test]
async fn malformed_record_is_a_decode_failure() {
    let relay = spawn_relay(RelayMode::Body("{\"State\": \"passed\"")).await;

    let mut setup = follower(&relay.base_url, 2, 2).build().unwrap();
    assert!(!setup.run().await);
    assert_eq!(
        setup.summary().failure.unwrap().message,
        "Failed to decode BeforeSuite state"
    );
}

#[tokio::test]
async fn unknown_state_is_a_decode_failure() {
    let relay = spawn_relay(RelayMode::Body(r#"{"Data":null,"State":9}"#)).await;
    let channel = HttpStateChannel::new(&relay.base_url).unwrap();

    assert!(matches!(channel.observe().await, Err(TransportError::Decode { .. })));
}

#[tokio::test]
async fn fresh_relay_reads_as_pending() {
    let relay = spawn_relay(RelayMode::Normal).await;
    let channel = HttpStateChannel::new(&format!("{}/", relay.base_url)).unwrap();

    let state = channel.observe().await.unwrap();
    assert_eq!(state, RemoteState::pending());

    channel.publish(&RemoteState::passed(vec![0, 255])).await;
    let state = channel.observe().await.unwrap();
    assert_eq!(state.state, RemoteStateStatus::Passed);
    assert_eq!(state.data, vec![0, 255]);
}

#[tokio::test]
async fn follower_times_out_against_silent_producer() {
    let relay = spawn_relay(RelayMode::Normal).await;

    let mut setup = follower(&relay.base_url, 2, 2)
        .wait_timeout(Duration::from_millis(200))
        .build()
        .unwrap();

    assert!(!setup.run().await);
    let summary = setup.summary();
    assert_eq!(summary.state, Some(PhaseState::TimedOut));
    assert_eq!(
        summary.failure.unwrap().message,
        "Timed out waiting for BeforeSuite on Node 1"
    );
    assert!(relay.gets() >= 2);
}
