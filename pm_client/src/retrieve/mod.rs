//! # Data Retrieval Module
//!
//! Home of the HTTP plumbing shared by every service in `crate::services`.
//! Services only describe paths and payloads; request building, token
//! injection, retry of reads and the handling of rejected sessions all live
//! in [`api_client`].

/// REST client with bearer-token injection and the 401/403 session policy.
pub mod api_client;

pub use api_client::{Anonymous, ApiClient, ApiResponse, Credentials, Query};
