//! # Notification transport
//!
//! The seam between the connector and the wire. [`ChannelTransport::open`]
//! starts one link in the background and reports its lifecycle as
//! [`TransportEvent`]s; cancelling the token tears the link down silently.
//!
//! [`StompTransport`] speaks STOMP 1.2 over the raw WebSocket endpoint that
//! the backend's SockJS handler exposes at `<base>/ws/websocket`.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::stomp::{negotiate_heartbeat, Command, Frame};
use crate::error::{ClientError, ClientResult};

/// Destination the backend routes per-user notifications to.
pub const NOTIFICATION_QUEUE: &str = "/user/queue/notifications";

/// Who the link is opened for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    /// Identity-provider uid, sent as the `userId` CONNECT header.
    pub user_id: String,
    /// Backend account id of the same user.
    pub account_id: i64,
}

impl ConnectTarget {
    pub fn new(user_id: impl Into<String>, account_id: i64) -> Self {
        Self {
            user_id: user_id.into(),
            account_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Session established and subscription sent.
    Opened,
    /// Body of one inbound message.
    Message(String),
    /// Protocol or socket failure. The link is gone.
    Error(String),
    /// The peer closed the link.
    Closed,
}

pub trait ChannelTransport: Send + Sync + 'static {
    /// Starts one link. Events stop after the first `Error` or `Closed`, or
    /// as soon as `cancel` fires.
    fn open(
        &self,
        target: &ConnectTarget,
        cancel: CancellationToken,
    ) -> mpsc::UnboundedReceiver<TransportEvent>;
}

#[derive(Debug, Clone)]
pub struct StompTransport {
    ws_url: Url,
    heartbeat: Duration,
}

impl StompTransport {
    /// Derives the WebSocket endpoint from the REST base URL.
    pub fn new(api_base: &str, heartbeat: Duration) -> ClientResult<Self> {
        let mut ws_url = Url::parse(api_base)?;
        let scheme = match ws_url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        ws_url
            .set_scheme(scheme)
            .map_err(|_| ClientError::UnsupportedUrl(api_base.to_string()))?;
        let path = format!("{}/ws/websocket", ws_url.path().trim_end_matches('/'));
        ws_url.set_path(&path);
        Ok(Self { ws_url, heartbeat })
    }

    pub fn url(&self) -> &Url {
        &self.ws_url
    }
}

impl ChannelTransport for StompTransport {
    fn open(
        &self,
        target: &ConnectTarget,
        cancel: CancellationToken,
    ) -> mpsc::UnboundedReceiver<TransportEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_link(
            self.ws_url.clone(),
            self.heartbeat,
            target.clone(),
            cancel,
            tx,
        ));
        rx
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn run_link(
    ws_url: Url,
    heartbeat: Duration,
    target: ConnectTarget,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    log::info!("Connecting notification channel: {}", ws_url);

    let connected = tokio::select! {
        _ = cancel.cancelled() => return,
        res = connect_async(ws_url.as_str()) => res,
    };
    let ws_stream = match connected {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            log::error!("Failed to open notification channel: {}", e);
            let _ = events.send(TransportEvent::Error(e.to_string()));
            return;
        }
    };
    let (mut write, mut read) = ws_stream.split();

    let beat_ms = heartbeat.as_millis() as u64;
    let connect = Frame::new(Command::Connect)
        .header("accept-version", "1.2")
        .header("host", ws_url.host_str().unwrap_or("localhost"))
        .header("heart-beat", format!("{},{}", beat_ms, beat_ms))
        .header("userId", target.user_id.as_str());
    if let Err(e) = write.send(WsMessage::Text(connect.encode().into())).await {
        log::error!("Failed to send CONNECT: {}", e);
        let _ = events.send(TransportEvent::Error(e.to_string()));
        return;
    }

    let mut send_every: Option<Duration> = None;
    let mut expect_within: Option<Duration> = None;
    let mut next_beat: Option<Instant> = None;
    let mut last_seen = Instant::now();

    loop {
        let silence_deadline = expect_within.map(|d| last_seen + d * 2);

        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                log::info!("Notification channel shutting down...");
                let bye = Frame::new(Command::Disconnect).encode();
                let _ = write.send(WsMessage::Text(bye.into())).await;
                let _ = write.close().await;
                return;
            }
            _ = sleep_until_opt(silence_deadline) => {
                log::warn!("No heart-beat from broker, dropping link");
                let _ = events.send(TransportEvent::Error("heart-beat timeout".into()));
                let _ = write.close().await;
                return;
            }
            _ = sleep_until_opt(next_beat) => {
                if let Err(e) = write.send(WsMessage::Text("\n".into())).await {
                    log::error!("Failed to send heart-beat: {}", e);
                    let _ = events.send(TransportEvent::Error(e.to_string()));
                    return;
                }
                next_beat = send_every.map(|d| Instant::now() + d);
            }
            msg = read.next() => {
                last_seen = Instant::now();
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        log::trace!("Received STOMP data: {:?}", text.as_str());
                        for parsed in Frame::frames(text.as_str()) {
                            let frame = match parsed {
                                Ok(frame) => frame,
                                Err(e) => {
                                    log::warn!("Dropping unreadable STOMP frame: {}", e);
                                    break;
                                }
                            };
                            match frame.command {
                                Command::Connected => {
                                    let (send, expect) =
                                        negotiate_heartbeat((beat_ms, beat_ms), frame.heart_beat());
                                    send_every = send;
                                    expect_within = expect;
                                    next_beat = send_every.map(|d| Instant::now() + d);

                                    let subscribe = Frame::new(Command::Subscribe)
                                        .header("id", "sub-0")
                                        .header("destination", NOTIFICATION_QUEUE)
                                        .encode();
                                    if let Err(e) = write.send(WsMessage::Text(subscribe.into())).await {
                                        log::error!("Failed to subscribe: {}", e);
                                        let _ = events.send(TransportEvent::Error(e.to_string()));
                                        return;
                                    }
                                    log::info!("Subscribed to {}", NOTIFICATION_QUEUE);
                                    let _ = events.send(TransportEvent::Opened);
                                }
                                Command::Message => {
                                    let _ = events.send(TransportEvent::Message(frame.body));
                                }
                                Command::Error => {
                                    let reason = frame
                                        .get("message")
                                        .map(str::to_string)
                                        .unwrap_or(frame.body);
                                    log::error!("STOMP error: {}", reason);
                                    let _ = events.send(TransportEvent::Error(reason));
                                    let _ = write.close().await;
                                    return;
                                }
                                other => log::debug!("Ignoring {} frame", other),
                            }
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        log::info!("Notification channel closed");
                        let _ = events.send(TransportEvent::Closed);
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        log::error!("Notification channel error: {}", e);
                        let _ = events.send(TransportEvent::Error(e.to_string()));
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_websocket_url() {
        let t = StompTransport::new("http://localhost:8080", Duration::from_secs(10)).unwrap();
        assert_eq!(t.url().as_str(), "ws://localhost:8080/ws/websocket");

        let t = StompTransport::new("https://api.example.com/backend/", Duration::from_secs(10)).unwrap();
        assert_eq!(t.url().as_str(), "wss://api.example.com/backend/ws/websocket");
    }
}
