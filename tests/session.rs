//! Reconnect and keepalive behavior of the session runner

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use wstun::client::{Client, SessionState, SessionTiming};
use wstun::codec::Pipeline;
use wstun::common::registry::CONNECTION_KEY;
use wstun::session::Message;

use common::{fake_tun, forwarder, FakeConnection, FakeDialer, WriteOutcome};

const RETRY: Duration = Duration::from_secs(3);

#[tokio::test(start_paused = true)]
async fn test_reconnects_after_failed_dials() {
    let (tun, _handle) = fake_tun();
    let fwd = forwarder(tun, Pipeline::default());
    let registry = fwd.registry.clone();
    let stats = fwd.stats.clone();
    let dialer = FakeDialer::new(3, Vec::new());
    let client = Arc::new(Client::new(dialer.clone(), fwd));
    let mut state = client.subscribe();

    let start = Instant::now();
    let task = tokio::spawn({
        let client = client.clone();
        async move { client.run().await }
    });

    state
        .wait_for(|s| *s == SessionState::Connected)
        .await
        .unwrap();

    assert!(start.elapsed() >= RETRY * 3);
    let attempts = dialer.attempts();
    assert_eq!(attempts.len(), 4);
    for pair in attempts.windows(2) {
        assert!(pair[1] - pair[0] >= RETRY);
    }
    assert!(registry.get(CONNECTION_KEY).is_some());
    assert_eq!(stats.dial_failures(), 3);
    assert_eq!(stats.sessions(), 1);

    task.abort();
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_timeouts_keep_session() {
    let (tun, _handle) = fake_tun();
    let fwd = forwarder(tun, Pipeline::default());
    let registry = fwd.registry.clone();
    let conn = FakeConnection::scripted(Vec::new(), WriteOutcome::Timeout);
    let dialer = FakeDialer::new(0, vec![conn.clone()]);
    let client = Arc::new(Client::new(dialer.clone(), fwd));

    let task = tokio::spawn({
        let client = client.clone();
        async move { client.run().await }
    });

    tokio::time::sleep(Duration::from_secs(31)).await;

    assert_eq!(client.state(), SessionState::Connected);
    assert!(conn.texts_sent() >= 9);
    assert!(!conn.is_closed());
    assert_eq!(dialer.attempts().len(), 1);
    assert!(registry.get(CONNECTION_KEY).is_some());

    let deadline = conn.last_deadline().unwrap();
    assert!(deadline > Instant::now());
    assert!(deadline <= Instant::now() + Duration::from_secs(5));

    task.abort();
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_sent_on_connect() {
    let (tun, _handle) = fake_tun();
    let fwd = forwarder(tun, Pipeline::default());
    let conn = FakeConnection::new();
    let dialer = FakeDialer::new(0, vec![conn.clone()]);
    let client = Arc::new(Client::new(dialer.clone(), fwd));
    let mut state = client.subscribe();

    let task = tokio::spawn({
        let client = client.clone();
        async move { client.run().await }
    });
    state
        .wait_for(|s| *s == SessionState::Connected)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(conn.texts_sent(), 1);
    assert!(conn.last_deadline().is_some());

    task.abort();
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_write_error_ends_session() {
    let (tun, mut handle) = fake_tun();
    let fwd = forwarder(tun, Pipeline::default());
    let first = FakeConnection::scripted(
        vec![
            WriteOutcome::Ok,
            WriteOutcome::Ok,
            WriteOutcome::Timeout,
            WriteOutcome::Fail,
        ],
        WriteOutcome::Ok,
    );
    let second = FakeConnection::new();
    let dialer = FakeDialer::new(0, vec![first.clone(), second.clone()]);
    let client = Arc::new(Client::new(dialer.clone(), fwd));

    let task = tokio::spawn({
        let client = client.clone();
        async move { client.run().await }
    });

    // ok at 0s and 3s, timeout at 6s, failure at 9s, redial right away
    tokio::time::sleep(Duration::from_secs(8)).await;
    assert!(!first.is_closed());
    assert_eq!(dialer.attempts().len(), 1);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(first.is_closed());
    assert_eq!(first.texts_sent(), 4);
    assert_eq!(dialer.attempts().len(), 2);
    assert_eq!(client.state(), SessionState::Connected);
    assert!(second.texts_sent() >= 1);

    // The new session has its own inbound loop
    second.push(Message::Binary(vec![0x45; 40]));
    assert_eq!(handle.written.recv().await.unwrap(), vec![0x45; 40]);

    task.abort();
}

#[tokio::test(start_paused = true)]
async fn test_custom_timing() {
    let (tun, _handle) = fake_tun();
    let fwd = forwarder(tun, Pipeline::default());
    let dialer = FakeDialer::new(2, Vec::new());
    let client = Arc::new(Client::new(dialer.clone(), fwd).with_timing(SessionTiming {
        retry_delay: Duration::from_millis(500),
        ..Default::default()
    }));
    let mut state = client.subscribe();

    let start = Instant::now();
    let task = tokio::spawn({
        let client = client.clone();
        async move { client.run().await }
    });
    state
        .wait_for(|s| *s == SessionState::Connected)
        .await
        .unwrap();

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < RETRY);

    task.abort();
}
