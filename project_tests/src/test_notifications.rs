//! # Notification Channel Integration Tests
//!
//! The STOMP transport and the reconnecting connector over a real WebSocket
//! served by the mock backend. Delays are shortened to milliseconds; the
//! paused-clock timing checks live next to the connector itself.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use pm_client::models::{Notification, NotificationKind};
use pm_client::notifications::{
    ChannelTransport, ConnectTarget, ConnectionState, ConnectorConfig, NotificationConnector,
    StompTransport, TransportEvent, NOTIFICATION_QUEUE,
};
use pm_client::stores::NotificationStore;
use project_tests::{notification_json, wait_until, within, MockServer, StompPush};

const HEARTBEAT: Duration = Duration::from_secs(10);

fn transport(server: &MockServer) -> StompTransport {
    StompTransport::new(&server.base_url(), HEARTBEAT).unwrap()
}

#[tokio::test]
async fn transport_handshake_subscribe_and_messages() {
    let server = MockServer::start().await;
    let transport = transport(&server);
    let cancel = CancellationToken::new();
    let mut events = transport.open(&ConnectTarget::new("uid-1", 42), cancel.clone());

    assert_eq!(within("open", events.recv()).await, Some(TransportEvent::Opened));

    let connect = server.connect_frames().remove(0);
    assert_eq!(connect.get("accept-version"), Some("1.2"));
    assert_eq!(connect.get("heart-beat"), Some("10000,10000"));
    assert_eq!(connect.get("userId"), Some("uid-1"));
    assert_eq!(connect.get("host"), Some("127.0.0.1"));

    wait_until("SUBSCRIBE", || !server.subscribe_frames().is_empty()).await;
    let subscribe = server.subscribe_frames().remove(0);
    assert_eq!(subscribe.get("destination"), Some(NOTIFICATION_QUEUE));
    assert_eq!(subscribe.get("id"), Some("sub-0"));

    server.push_notification(notification_json("n-1", "LEVEL_UP", "Level 3"));
    match within("message", events.recv()).await {
        Some(TransportEvent::Message(body)) => {
            let notification: Notification = serde_json::from_str(&body).unwrap();
            assert_eq!(notification.id, "n-1");
            assert_eq!(notification.kind, NotificationKind::LevelUp);
        }
        other => panic!("unexpected event: {:?}", other),
    }

    server.push(StompPush::Batch(vec![
        notification_json("n-2", "ESSENCE_GAINED", "+5").to_string(),
        notification_json("n-3", "ESSENCE_GAINED", "+7").to_string(),
    ]));
    for expected in ["n-2", "n-3"] {
        match within("batched message", events.recv()).await {
            Some(TransportEvent::Message(body)) => {
                let notification: Notification = serde_json::from_str(&body).unwrap();
                assert_eq!(notification.id, expected);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    server.push(StompPush::Error("bad subscription".into()));
    assert_eq!(
        within("error", events.recv()).await,
        Some(TransportEvent::Error("bad subscription".into()))
    );
    assert_eq!(within("end of link", events.recv()).await, None);
}

#[tokio::test]
async fn transport_reports_close_and_goes_quiet_on_cancel() {
    let server = MockServer::start().await;
    let transport = transport(&server);

    let mut dropped = transport.open(&ConnectTarget::new("uid-1", 1), CancellationToken::new());
    assert_eq!(within("open", dropped.recv()).await, Some(TransportEvent::Opened));
    server.push(StompPush::Drop);
    assert_eq!(within("close", dropped.recv()).await, Some(TransportEvent::Closed));

    let cancel = CancellationToken::new();
    let mut cancelled = transport.open(&ConnectTarget::new("uid-1", 1), cancel.clone());
    assert_eq!(within("open", cancelled.recv()).await, Some(TransportEvent::Opened));
    cancel.cancel();
    assert_eq!(within("silent end", cancelled.recv()).await, None);
    wait_until("DISCONNECT frame", || server.stomp_disconnects() == 1).await;
}

#[tokio::test]
async fn silent_broker_trips_the_heart_beat_watchdog() {
    let server = MockServer::start().await;
    server.set_heart_beat("100,100");
    let transport = StompTransport::new(&server.base_url(), Duration::from_millis(100)).unwrap();
    let mut events = transport.open(&ConnectTarget::new("uid-1", 1), CancellationToken::new());

    assert_eq!(within("open", events.recv()).await, Some(TransportEvent::Opened));
    assert_eq!(server.connect_frames()[0].get("heart-beat"), Some("100,100"));

    // Beats go out every 100 ms; 200 ms without a byte from the broker is fatal.
    assert_eq!(
        within("watchdog", events.recv()).await,
        Some(TransportEvent::Error("heart-beat timeout".into()))
    );
    assert_eq!(within("end of link", events.recv()).await, None);
    wait_until("client heart-beat", || server.heart_beats() >= 1).await;
}

#[tokio::test]
async fn unreachable_endpoint_is_an_error() {
    let server = MockServer::start().await;
    let url = server.base_url();
    drop(server);
    // Give the aborted listener a moment to release the port.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let transport = StompTransport::new(&url, HEARTBEAT).unwrap();
    let mut events = transport.open(&ConnectTarget::new("uid-1", 1), CancellationToken::new());
    assert!(matches!(
        within("connect failure", events.recv()).await,
        Some(TransportEvent::Error(_))
    ));
}

#[tokio::test]
async fn connector_feeds_store_and_reconnects_after_drop() {
    let server = MockServer::start().await;
    let connector = NotificationConnector::new(
        Arc::new(transport(&server)),
        ConnectorConfig {
            base_delay: Duration::from_millis(50),
            max_attempts: 5,
        },
    );
    let store = NotificationStore::new(Duration::from_secs(60));
    store.attach(&connector);

    let order = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&order);
    let second = connector.add_listener(move |n| seen.lock().unwrap().push(n.id.clone()));

    connector.connect("uid-7", 7);
    connector.connect("uid-7", 7);
    wait_until("connected", || connector.is_connected()).await;
    connector.connect("uid-7", 7);
    assert_eq!(server.stomp_sessions(), 1);

    server.push_notification(notification_json("n-1", "ESSENCE_GAINED", "+10 essence"));
    wait_until("first notification", || store.state().notifications.len() == 1).await;
    assert_eq!(store.state().current_toast.map(|t| t.id), Some("n-1".to_string()));
    assert_eq!(*order.lock().unwrap(), vec!["n-1".to_string()]);

    server.push(StompPush::Drop);
    wait_until("second session", || server.stomp_sessions() == 2).await;
    wait_until("reconnected", || connector.is_connected()).await;
    assert_eq!(connector.status().attempts, 0);

    assert!(connector.remove_listener(second));
    server.push_notification(notification_json("n-2", "SOMETHING_NEW", "Surprise"));
    wait_until("second notification", || store.state().notifications.len() == 2).await;
    let newest = store.state().notifications.remove(0);
    assert_eq!(newest.id, "n-2");
    assert_eq!(newest.kind, NotificationKind::Unknown);
    assert_eq!(order.lock().unwrap().len(), 1);
    assert_eq!(store.unread_count(), 2);

    connector.disconnect();
    assert_eq!(connector.state(), ConnectionState::Disconnected);
    wait_until("DISCONNECT frame", || server.stomp_disconnects() == 1).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.stomp_sessions(), 2);
    assert_eq!(connector.listener_count(), 1);

    connector.connect("uid-7", 7);
    wait_until("connected again", || connector.is_connected()).await;
    assert_eq!(server.connect_frames().len(), 3);
    connector.disconnect();
}

#[tokio::test]
async fn connector_gives_up_after_max_attempts() {
    let server = MockServer::start().await;
    server.set_accepting(false);
    let connector = NotificationConnector::new(
        Arc::new(transport(&server)),
        ConnectorConfig {
            base_delay: Duration::from_millis(20),
            max_attempts: 2,
        },
    );

    connector.connect("uid-9", 9);
    wait_until("exhausted", || connector.status().exhausted).await;
    assert_eq!(server.stomp_sessions(), 3);
    assert_eq!(connector.status().attempts, 2);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.stomp_sessions(), 3);
    assert_eq!(connector.state(), ConnectionState::Disconnected);

    // An explicit connect still works once the endpoint is back.
    server.set_accepting(true);
    connector.connect("uid-9", 9);
    wait_until("connected", || connector.is_connected()).await;
    assert_eq!(connector.status().attempts, 0);
    connector.disconnect();
}
