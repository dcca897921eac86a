//! # Push notifications
//!
//! Gamification events arrive over STOMP on a WebSocket. [`stomp`] is the
//! frame codec, [`transport`] runs one link and [`connector`] keeps a link
//! up with bounded linear backoff and fans messages out to listeners.

pub mod connector;
pub mod stomp;
pub mod transport;

pub use connector::{
    ConnectionState, ConnectorConfig, ConnectorStatus, ListenerId, NotificationConnector,
};
pub use stomp::{Command, Frame, Frames, StompError};
pub use transport::{
    ChannelTransport, ConnectTarget, StompTransport, TransportEvent, NOTIFICATION_QUEUE,
};
