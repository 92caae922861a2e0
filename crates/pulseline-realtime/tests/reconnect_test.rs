// Integration tests for the connection manager
//
// These drive the full actor against scripted in-memory connections: every
// open attempt, frame, and failure is controlled by the test, and the
// assertions pin down exactly how many attempts the manager makes.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use pulseline_core::connection::{ConnectionState, StreamRole};
use pulseline_core::event::kinds;
use pulseline_core::memory::{CollectingHandler, ScriptedTransport};
use pulseline_realtime::{
    ConnectionManager, EventDispatcher, ManagerConfig, ManagerEvent, ReconnectPolicy, Visibility,
};

const NOTIFICATION_JSON: &str = r#"{"id":42,"type":"lesson_update","title":"t","message":"m","isRead":false,"createdAt":"2025-11-03T10:15:00Z"}"#;

fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy::new()
        .with_initial_delay(Duration::from_millis(10))
        .with_max_delay(Duration::from_millis(40))
        .with_max_attempts(5)
}

async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..300 {
        if cond() {
            return;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

fn manager_with(
    transport: &Arc<ScriptedTransport>,
    config: ManagerConfig,
) -> (ConnectionManager, Arc<EventDispatcher>) {
    let dispatcher = Arc::new(EventDispatcher::new());
    let manager = ConnectionManager::new(
        transport.clone(),
        dispatcher.clone(),
        config,
    );
    (manager, dispatcher)
}

#[tokio::test]
async fn test_connect_opens_stream_and_dispatches_frames() {
    let transport = Arc::new(ScriptedTransport::new());
    let feeder = transport.push_connection();
    let (manager, dispatcher) = manager_with(&transport, ManagerConfig::default());
    let handler = Arc::new(CollectingHandler::new());
    dispatcher.on(kinds::NOTIFICATION, handler.clone()).await;

    manager.connect(StreamRole::Student);
    wait_until("connected", || manager.is_connected()).await;

    feeder.frame(kinds::NOTIFICATION, NOTIFICATION_JSON);
    for _ in 0..300 {
        if handler.len().await == 1 {
            break;
        }
        sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(handler.len().await, 1);
    assert_eq!(transport.roles(), vec![StreamRole::Student]);
}

#[tokio::test]
async fn test_connect_is_idempotent_while_active() {
    let transport = Arc::new(ScriptedTransport::new());
    let _feeder = transport.push_connection();
    let (manager, _dispatcher) = manager_with(&transport, ManagerConfig::default());

    manager.connect(StreamRole::Tutor);
    wait_until("connected", || manager.is_connected()).await;
    manager.connect(StreamRole::Tutor);
    manager.connect(StreamRole::Tutor);

    sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.open_count(), 1);
    assert!(manager.is_connected());
}

#[tokio::test]
async fn test_reconnects_after_stream_error() {
    let transport = Arc::new(ScriptedTransport::new());
    let feeder = transport.push_connection();
    let _second = transport.push_connection();
    let config = ManagerConfig::new().with_reconnect(fast_policy());
    let (manager, _dispatcher) = manager_with(&transport, config);
    let mut events = manager.subscribe();

    manager.connect(StreamRole::Student);
    wait_until("first connection", || manager.is_connected()).await;
    assert_eq!(events.recv().await.unwrap(), ManagerEvent::Restored);

    feeder.error("connection reset");
    wait_until("reconnection", || {
        transport.open_count() == 2 && manager.is_connected()
    })
    .await;
    assert_eq!(events.recv().await.unwrap(), ManagerEvent::Restored);
}

#[tokio::test]
async fn test_reconnects_when_server_closes_the_stream() {
    let transport = Arc::new(ScriptedTransport::new());
    let feeder = transport.push_connection();
    let _second = transport.push_connection();
    let config = ManagerConfig::new().with_reconnect(fast_policy());
    let (manager, _dispatcher) = manager_with(&transport, config);

    manager.connect(StreamRole::Student);
    wait_until("first connection", || manager.is_connected()).await;

    drop(feeder);
    wait_until("reconnection after close", || {
        transport.open_count() == 2 && manager.is_connected()
    })
    .await;
}

#[tokio::test]
async fn test_gives_up_after_max_attempts_without_retry_storm() {
    let transport = Arc::new(ScriptedTransport::new());
    for _ in 0..3 {
        transport.push_failure("connection refused");
    }
    let policy = ReconnectPolicy::new()
        .with_initial_delay(Duration::from_millis(5))
        .with_max_delay(Duration::from_millis(20))
        .with_max_attempts(3);
    let config = ManagerConfig::new().with_reconnect(policy);
    let (manager, _dispatcher) = manager_with(&transport, config);
    let mut events = manager.subscribe();

    manager.connect(StreamRole::Student);

    let gave_up = timeout(Duration::from_secs(2), async {
        loop {
            if events.recv().await.unwrap() == ManagerEvent::GaveUp {
                break;
            }
        }
    })
    .await;
    assert!(gave_up.is_ok(), "never received the give-up signal");
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(manager.retry_exhausted());
    assert_eq!(transport.open_count(), 3);

    // Terminal means terminal: no further attempt until an explicit connect.
    sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.open_count(), 3);

    // A manual reconnect resets the budget and goes straight to an attempt.
    let _feeder = transport.push_connection();
    manager.connect(StreamRole::Student);
    wait_until("manual reconnect", || manager.is_connected()).await;
    assert!(!manager.retry_exhausted());
    assert_eq!(transport.open_count(), 4);
}

#[tokio::test]
async fn test_disconnect_is_intentional_and_idempotent() {
    let transport = Arc::new(ScriptedTransport::new());
    let feeder = transport.push_connection();
    let (manager, dispatcher) = manager_with(&transport, ManagerConfig::default());
    let handler = Arc::new(CollectingHandler::new());
    dispatcher.on(kinds::NOTIFICATION, handler.clone()).await;

    manager.connect(StreamRole::Student);
    wait_until("connected", || manager.is_connected()).await;

    manager.disconnect();
    manager.disconnect();
    wait_until("disconnected", || {
        manager.state() == ConnectionState::Disconnected
    })
    .await;

    // Frames pushed after the disconnect go nowhere.
    feeder.frame(kinds::NOTIFICATION, NOTIFICATION_JSON);
    sleep(Duration::from_millis(50)).await;
    assert!(handler.is_empty().await);
    assert_eq!(transport.open_count(), 1);
}

#[tokio::test]
async fn test_brief_hide_keeps_the_connection() {
    let transport = Arc::new(ScriptedTransport::new());
    let _feeder = transport.push_connection();
    let config = ManagerConfig::new().with_hidden_grace(Duration::from_millis(80));
    let (manager, _dispatcher) = manager_with(&transport, config);

    manager.connect(StreamRole::Student);
    wait_until("connected", || manager.is_connected()).await;

    manager.set_visibility(Visibility::Hidden);
    sleep(Duration::from_millis(20)).await;
    manager.set_visibility(Visibility::Visible);

    sleep(Duration::from_millis(120)).await;
    assert!(manager.is_connected());
    assert_eq!(transport.open_count(), 1);
}

#[tokio::test]
async fn test_hide_past_grace_suspends_then_foreground_reconnects_once() {
    let transport = Arc::new(ScriptedTransport::new());
    let _first = transport.push_connection();
    let _second = transport.push_connection();
    let config = ManagerConfig::new().with_hidden_grace(Duration::from_millis(30));
    let (manager, _dispatcher) = manager_with(&transport, config);

    manager.connect(StreamRole::Student);
    wait_until("connected", || manager.is_connected()).await;

    manager.set_visibility(Visibility::Hidden);
    wait_until("suspension", || {
        manager.state() == ConnectionState::Suspended
    })
    .await;
    assert_eq!(transport.open_count(), 1);

    // Still hidden: nothing may attempt a connection.
    sleep(Duration::from_millis(60)).await;
    assert_eq!(transport.open_count(), 1);

    manager.set_visibility(Visibility::Visible);
    wait_until("resumed connection", || manager.is_connected()).await;
    assert_eq!(transport.open_count(), 2);
}

#[tokio::test]
async fn test_no_attempts_start_while_hidden() {
    let transport = Arc::new(ScriptedTransport::new());
    let (manager, _dispatcher) = manager_with(&transport, ManagerConfig::default());

    manager.set_visibility(Visibility::Hidden);
    manager.connect(StreamRole::Student);

    sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.open_count(), 0);

    let _feeder = transport.push_connection();
    manager.set_visibility(Visibility::Visible);
    wait_until("deferred connect ran", || manager.is_connected()).await;
    assert_eq!(transport.open_count(), 1);
}

#[tokio::test]
async fn test_intentional_disconnect_survives_foregrounding() {
    let transport = Arc::new(ScriptedTransport::new());
    let _feeder = transport.push_connection();
    let config = ManagerConfig::new().with_hidden_grace(Duration::from_millis(20));
    let (manager, _dispatcher) = manager_with(&transport, config);

    manager.connect(StreamRole::Student);
    wait_until("connected", || manager.is_connected()).await;

    manager.set_visibility(Visibility::Hidden);
    wait_until("suspension", || {
        manager.state() == ConnectionState::Suspended
    })
    .await;

    manager.disconnect();
    manager.set_visibility(Visibility::Visible);

    sleep(Duration::from_millis(60)).await;
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(transport.open_count(), 1);
}
