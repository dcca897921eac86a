//! # Notification connector
//!
//! Owns at most one live transport link and keeps it up with a bounded
//! linear backoff: after the n-th consecutive failure the next attempt is
//! scheduled `n * base_delay` later, until `max_attempts` reattempts have
//! failed. A successful open resets the counter.
//!
//! Inbound messages are decoded as [`Notification`]s and handed to every
//! registered listener in registration order.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::transport::{ChannelTransport, ConnectTarget, TransportEvent};
use crate::models::Notification;

/// Handle returned by [`NotificationConnector::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&Notification) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(5),
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorStatus {
    pub state: ConnectionState,
    /// Consecutive failed attempts since the last successful open.
    pub attempts: u32,
    pub retry_pending: bool,
    /// Retries are used up; only an explicit `connect` starts a new link.
    pub exhausted: bool,
}

struct Inner {
    state: ConnectionState,
    attempts: u32,
    // Bumped for every new link and on disconnect. Events of older links are dropped.
    generation: u64,
    link: Option<CancellationToken>,
    retry: Option<CancellationToken>,
    target: Option<ConnectTarget>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

/// A link claimed under the lock, waiting to be opened outside it.
struct PendingLink {
    target: ConnectTarget,
    cancel: CancellationToken,
    generation: u64,
}

struct Shared {
    config: ConnectorConfig,
    transport: Arc<dyn ChannelTransport>,
    inner: Mutex<Inner>,
}

/// Cheap to clone; clones share the same link and listeners.
#[derive(Clone)]
pub struct NotificationConnector {
    shared: Arc<Shared>,
}

impl NotificationConnector {
    pub fn new(transport: Arc<dyn ChannelTransport>, config: ConnectorConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                transport,
                inner: Mutex::new(Inner {
                    state: ConnectionState::Disconnected,
                    attempts: 0,
                    generation: 0,
                    link: None,
                    retry: None,
                    target: None,
                    listeners: Vec::new(),
                    next_listener: 0,
                }),
            }),
        }
    }

    /// Opens the link for `user_id`. A no-op while connecting or connected.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self, user_id: impl Into<String>, account_id: i64) {
        self.shared.connect(ConnectTarget::new(user_id, account_id));
    }

    /// Tears the link down and cancels any scheduled reattempt. Listeners stay registered.
    pub fn disconnect(&self) {
        let mut inner = self.shared.lock();
        if let Some(link) = inner.link.take() {
            link.cancel();
        }
        if let Some(retry) = inner.retry.take() {
            retry.cancel();
        }
        inner.generation += 1;
        inner.attempts = 0;
        inner.target = None;
        if inner.state != ConnectionState::Disconnected {
            log::info!("Notification channel disconnected");
        }
        inner.state = ConnectionState::Disconnected;
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        let mut inner = self.shared.lock();
        let id = ListenerId(inner.next_listener);
        inner.next_listener += 1;
        inner.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Returns whether `id` was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut inner = self.shared.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|(l, _)| *l != id);
        inner.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.shared.lock().listeners.len()
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn status(&self) -> ConnectorStatus {
        let inner = self.shared.lock();
        ConnectorStatus {
            state: inner.state,
            attempts: inner.attempts,
            retry_pending: inner.retry.is_some(),
            exhausted: inner.state == ConnectionState::Disconnected
                && inner.retry.is_none()
                && inner.attempts >= self.shared.config.max_attempts,
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn connect(self: &Arc<Self>, target: ConnectTarget) {
        let link = {
            let mut inner = self.lock();
            if inner.state != ConnectionState::Disconnected {
                log::warn!("Notification channel already connected or connecting");
                return;
            }
            Self::begin_link(&mut inner, target)
        };
        self.open_link(link);
    }

    /// Moves to `Connecting` and claims a new generation. Runs under the lock
    /// so a concurrent `disconnect` either precedes it or cancels this link.
    fn begin_link(inner: &mut Inner, target: ConnectTarget) -> PendingLink {
        inner.state = ConnectionState::Connecting;
        inner.generation += 1;
        let cancel = CancellationToken::new();
        inner.link = Some(cancel.clone());
        inner.target = Some(target.clone());
        PendingLink {
            target,
            cancel,
            generation: inner.generation,
        }
    }

    fn open_link(self: &Arc<Self>, link: PendingLink) {
        log::info!(
            "Connecting notification channel for user {} (account {})",
            link.target.user_id,
            link.target.account_id
        );
        let events = self.transport.open(&link.target, link.cancel);
        tokio::spawn(Arc::clone(self).drive(events, link.generation));
    }

    /// Called when a reattempt timer fires. `None` if the timer was cancelled,
    /// the connector was disconnected, or a link is already up.
    fn claim_retry(&self, token: &CancellationToken) -> Option<PendingLink> {
        let mut inner = self.lock();
        if token.is_cancelled() {
            return None;
        }
        inner.retry = None;
        let target = inner.target.clone()?;
        if inner.state != ConnectionState::Disconnected {
            return None;
        }
        Some(Self::begin_link(&mut inner, target))
    }

    async fn drive(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        generation: u64,
    ) {
        loop {
            match events.recv().await {
                Some(TransportEvent::Opened) => {
                    let mut inner = self.lock();
                    if inner.generation != generation {
                        return;
                    }
                    inner.state = ConnectionState::Connected;
                    inner.attempts = 0;
                    if let Some(retry) = inner.retry.take() {
                        retry.cancel();
                    }
                    log::info!("Notification channel connected");
                }
                Some(TransportEvent::Message(body)) => {
                    let listeners: Vec<Listener> = {
                        let inner = self.lock();
                        if inner.generation != generation {
                            return;
                        }
                        inner.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
                    };
                    match serde_json::from_str::<Notification>(&body) {
                        Ok(notification) => {
                            log::debug!("Notification received: {:?}", notification.kind);
                            for listener in &listeners {
                                listener(&notification);
                            }
                        }
                        Err(e) => log::warn!("Dropping unreadable notification: {} ({})", e, body),
                    }
                }
                Some(TransportEvent::Error(reason)) => {
                    log::error!("Notification channel error: {}", reason);
                    self.link_lost(generation);
                    return;
                }
                Some(TransportEvent::Closed) | None => {
                    log::info!("Notification channel closed");
                    self.link_lost(generation);
                    return;
                }
            }
        }
    }

    fn link_lost(self: &Arc<Self>, generation: u64) {
        let mut inner = self.lock();
        if inner.generation != generation {
            return;
        }
        inner.state = ConnectionState::Disconnected;
        if let Some(link) = inner.link.take() {
            link.cancel();
        }
        self.schedule_retry(&mut inner);
    }

    fn schedule_retry(self: &Arc<Self>, inner: &mut Inner) {
        if let Some(old) = inner.retry.take() {
            old.cancel();
        }
        if inner.attempts >= self.config.max_attempts {
            log::error!(
                "Max reconnection attempts reached ({}), giving up",
                self.config.max_attempts
            );
            return;
        }

        inner.attempts += 1;
        let delay = self.config.base_delay * inner.attempts;
        log::info!(
            "Attempting to reconnect ({}/{}) in {:?}",
            inner.attempts,
            self.config.max_attempts,
            delay
        );

        let token = CancellationToken::new();
        inner.retry = Some(token.clone());
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    log::debug!("Scheduled reconnect cancelled");
                }
                _ = sleep(delay) => {
                    if let Some(link) = shared.claim_retry(&token) {
                        shared.open_link(link);
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationKind;

    #[derive(Default)]
    struct ScriptedTransport {
        links: Mutex<Vec<(ConnectTarget, mpsc::UnboundedSender<TransportEvent>, CancellationToken)>>,
    }

    impl ScriptedTransport {
        fn opens(&self) -> usize {
            self.links.lock().unwrap().len()
        }

        fn emit(&self, link: usize, event: TransportEvent) {
            let links = self.links.lock().unwrap();
            let _ = links[link].1.send(event);
        }

        fn emit_last(&self, event: TransportEvent) {
            let last = self.opens() - 1;
            self.emit(last, event);
        }

        fn cancelled(&self, link: usize) -> bool {
            self.links.lock().unwrap()[link].2.is_cancelled()
        }
    }

    impl ChannelTransport for ScriptedTransport {
        fn open(
            &self,
            target: &ConnectTarget,
            cancel: CancellationToken,
        ) -> mpsc::UnboundedReceiver<TransportEvent> {
            let (tx, rx) = mpsc::unbounded_channel();
            self.links.lock().unwrap().push((target.clone(), tx, cancel));
            rx
        }
    }

    const BASE: Duration = Duration::from_secs(5);

    fn setup() -> (Arc<ScriptedTransport>, NotificationConnector) {
        let transport = Arc::new(ScriptedTransport::default());
        let connector = NotificationConnector::new(transport.clone(), ConnectorConfig::default());
        (transport, connector)
    }

    async fn settle() {
        sleep(Duration::from_millis(1)).await;
    }

    fn message(id: &str) -> TransportEvent {
        TransportEvent::Message(format!(
            r#"{{"id":"{}","type":"ESSENCE_GAINED","title":"+5","message":"","icon":"","essenceAmount":5,"timestamp":"t","read":false}}"#,
            id
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn connect_is_a_noop_while_connecting_or_connected() {
        let (transport, connector) = setup();
        connector.connect("uid", 1);
        connector.connect("uid", 1);
        assert_eq!(transport.opens(), 1);
        assert_eq!(connector.state(), ConnectionState::Connecting);

        transport.emit(0, TransportEvent::Opened);
        settle().await;
        assert!(connector.is_connected());
        connector.connect("uid", 1);
        assert_eq!(transport.opens(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reattempt_delay_grows_linearly() {
        let (transport, connector) = setup();
        connector.connect("uid", 1);
        transport.emit(0, TransportEvent::Closed);
        settle().await;
        assert_eq!(
            connector.status(),
            ConnectorStatus {
                state: ConnectionState::Disconnected,
                attempts: 1,
                retry_pending: true,
                exhausted: false,
            }
        );

        sleep(BASE - Duration::from_millis(100)).await;
        assert_eq!(transport.opens(), 1);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(transport.opens(), 2);

        transport.emit(1, TransportEvent::Error("refused".into()));
        settle().await;
        assert_eq!(connector.status().attempts, 2);
        sleep(BASE * 2 - Duration::from_millis(100)).await;
        assert_eq!(transport.opens(), 2);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(transport.opens(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let (transport, connector) = setup();
        connector.connect("uid", 1);

        for attempt in 1..=5u32 {
            transport.emit_last(TransportEvent::Closed);
            settle().await;
            assert_eq!(connector.status().attempts, attempt);
            sleep(BASE * attempt + Duration::from_millis(10)).await;
            assert_eq!(transport.opens(), attempt as usize + 1);
        }

        transport.emit_last(TransportEvent::Closed);
        settle().await;
        sleep(Duration::from_secs(3600)).await;
        assert_eq!(transport.opens(), 6);
        let status = connector.status();
        assert!(status.exhausted);
        assert!(!status.retry_pending);
        assert_eq!(status.state, ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_open_resets_counter() {
        let (transport, connector) = setup();
        connector.connect("uid", 1);
        transport.emit(0, TransportEvent::Closed);
        settle().await;
        sleep(BASE + Duration::from_millis(10)).await;
        transport.emit(1, TransportEvent::Closed);
        settle().await;
        assert_eq!(connector.status().attempts, 2);

        sleep(BASE * 2 + Duration::from_millis(10)).await;
        transport.emit(2, TransportEvent::Opened);
        settle().await;
        assert_eq!(connector.status().attempts, 0);
        assert!(connector.is_connected());

        // The next failure starts again from the base delay.
        transport.emit(2, TransportEvent::Closed);
        settle().await;
        assert_eq!(connector.status().attempts, 1);
        sleep(BASE + Duration::from_millis(10)).await;
        assert_eq!(transport.opens(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn listeners_run_in_order_and_removal_is_exact() {
        let (transport, connector) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let ids: Vec<ListenerId> = ["a", "b", "c"]
            .into_iter()
            .map(|name| {
                let seen = seen.clone();
                connector.add_listener(move |n: &Notification| {
                    assert_eq!(n.kind, NotificationKind::EssenceGained);
                    seen.lock().unwrap().push(format!("{}:{}", name, n.id));
                })
            })
            .collect();

        connector.connect("uid", 1);
        transport.emit(0, TransportEvent::Opened);
        transport.emit(0, message("1"));
        settle().await;
        assert_eq!(*seen.lock().unwrap(), vec!["a:1", "b:1", "c:1"]);

        assert!(connector.remove_listener(ids[1]));
        assert!(!connector.remove_listener(ids[1]));
        transport.emit(0, TransportEvent::Message("not json".into()));
        transport.emit(0, message("2"));
        settle().await;
        assert_eq!(*seen.lock().unwrap(), vec!["a:1", "b:1", "c:1", "a:2", "c:2"]);
        assert!(connector.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_is_safe_and_allows_reconnect() {
        let (transport, connector) = setup();
        connector.add_listener(|_| {});
        connector.disconnect();

        connector.connect("uid", 1);
        transport.emit(0, TransportEvent::Closed);
        settle().await;
        assert!(connector.status().retry_pending);

        connector.disconnect();
        assert!(transport.cancelled(0));
        sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.opens(), 1);
        assert_eq!(connector.listener_count(), 1);

        connector.connect("uid", 1);
        assert_eq!(transport.opens(), 2);
        connector.disconnect();
        assert!(transport.cancelled(1));

        // Events from a torn-down link change nothing.
        transport.emit(1, TransportEvent::Opened);
        settle().await;
        assert_eq!(connector.state(), ConnectionState::Disconnected);
        assert_eq!(connector.status().attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_racing_a_fired_retry_leaves_no_live_link() {
        let (transport, connector) = setup();
        connector.connect("uid", 1);
        transport.emit(0, TransportEvent::Closed);
        settle().await;
        let token = connector.shared.lock().retry.clone().unwrap();

        // Timer claims the slot, then disconnect lands before the link is opened.
        let link = connector.shared.claim_retry(&token).unwrap();
        assert_eq!(connector.state(), ConnectionState::Connecting);
        connector.disconnect();
        connector.shared.open_link(link);

        assert_eq!(transport.opens(), 2);
        assert!(transport.cancelled(1));
        transport.emit(1, TransportEvent::Opened);
        settle().await;
        assert_eq!(connector.state(), ConnectionState::Disconnected);

        // The timer itself fires later and finds nothing to reopen.
        sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.opens(), 2);
        assert_eq!(connector.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_fired_after_disconnect_is_a_noop() {
        let (transport, connector) = setup();
        connector.connect("uid", 1);
        transport.emit(0, TransportEvent::Closed);
        settle().await;
        let token = connector.shared.lock().retry.clone().unwrap();

        connector.disconnect();
        assert!(connector.shared.claim_retry(&token).is_none());
        assert_eq!(transport.opens(), 1);
        assert_eq!(connector.state(), ConnectionState::Disconnected);
    }
}
