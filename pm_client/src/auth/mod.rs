//! # Authentication
//!
//! Sign-in goes through an [`IdentityProvider`] (Firebase in production).
//! [`AuthStore`] holds the resulting session and hands out fresh ID tokens;
//! [`SessionCredentials`] plugs that store into the REST client so every
//! `/api` call carries the token and a `401` signs the user out.

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use thiserror::Error;

pub mod firebase;
pub mod store;

pub use firebase::FirebaseIdentity;
pub use store::{AuthState, AuthStore, SessionCredentials, TOKEN_REFRESH_MARGIN};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("an account already exists for this email")]
    EmailExists,

    #[error("password is too weak: {0}")]
    WeakPassword(String),

    #[error("session expired, sign in again")]
    SessionExpired,

    #[error("identity provider error {code}: {message}")]
    Provider { code: u16, message: String },

    #[error("identity provider unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid identity provider URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("unexpected identity provider response: {0}")]
    Json(#[from] serde_json::Error),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// The signed-in account as the identity provider knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
}

/// Tokens issued by a sign-in or a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySession {
    pub user: AuthUser,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

pub trait IdentityProvider: Send + Sync {
    fn sign_in<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, AuthResult<IdentitySession>>;

    fn sign_up<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, AuthResult<IdentitySession>>;

    /// Exchanges a refresh token for a new ID token.
    fn refresh<'a>(&'a self, session: &'a IdentitySession) -> BoxFuture<'a, AuthResult<IdentitySession>>;
}
