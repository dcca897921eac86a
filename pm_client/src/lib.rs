//! # pm_client
//!
//! Client library for the Personal Manager backend. It bundles everything a
//! front end needs to talk to the REST/WebSocket API:
//!
//! - **`retrieve`**: the `ApiClient` that joins paths, attaches bearer tokens and
//!   applies the 401/403 policy.
//! - **`models`** / **`services`**: typed DTOs and one service per resource family.
//! - **`stores`**: watch-channel backed state containers with optimistic updates.
//! - **`auth`** / **`routes`**: identity-provider session and the route guard.
//! - **`notifications`**: the STOMP push channel and its reconnecting connector.
//! - **`configs`** / **`loggers`** (feature gated): layered configuration and logging setup.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod auth;
pub mod error;
pub mod models;
pub mod notifications;
pub mod retrieve;
pub mod routes;
pub mod services;
pub mod stores;

#[cfg(feature = "configs")]
pub mod configs;
#[cfg(feature = "loggers")]
pub mod loggers;

pub use error::{ClientError, ClientResult};
