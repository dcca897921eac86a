//! Firebase Authentication over its REST API.
//!
//! - `accounts:signInWithPassword` / `accounts:signUp` on the Identity Toolkit
//! - `token` on the Secure Token service for refreshes
//!
//! Both are keyed by the project's web API key.

use chrono::Utc;
use futures_util::future::BoxFuture;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use super::{AuthError, AuthResult, AuthUser, IdentityProvider, IdentitySession};

pub const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1/";
pub const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/";

/// Token lifetime assumed when the response does not state one.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordGrant {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Deserialize)]
struct TokenGrant {
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
    user_id: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
}

pub struct FirebaseIdentity {
    http: reqwest::Client,
    api_key: String,
    identity_base: Url,
    token_base: Url,
}

impl FirebaseIdentity {
    pub fn new(api_key: impl Into<String>) -> AuthResult<Self> {
        Self::with_endpoints(api_key, IDENTITY_TOOLKIT_URL, SECURE_TOKEN_URL)
    }

    /// Points the provider at other endpoints, e.g. the Auth emulator.
    pub fn with_endpoints(
        api_key: impl Into<String>,
        identity_base: &str,
        token_base: &str,
    ) -> AuthResult<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            identity_base: directory_url(identity_base)?,
            token_base: directory_url(token_base)?,
        })
    }

    async fn password_grant(
        &self,
        operation: &str,
        email: &str,
        password: &str,
    ) -> AuthResult<IdentitySession> {
        // "./" keeps "accounts:..." from being read as a URL scheme.
        let url = self
            .identity_base
            .join(&format!("./accounts:{}", operation))?;
        let body = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        let response = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;
        let grant: PasswordGrant = read_json(response).await?;

        Ok(IdentitySession {
            user: AuthUser {
                uid: grant.local_id,
                email: grant.email.or_else(|| Some(email.to_string())),
            },
            id_token: grant.id_token,
            refresh_token: grant.refresh_token,
            expires_at: expires_at(grant.expires_in.as_deref()),
        })
    }
}

impl IdentityProvider for FirebaseIdentity {
    fn sign_in<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, AuthResult<IdentitySession>> {
        Box::pin(self.password_grant("signInWithPassword", email, password))
    }

    fn sign_up<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, AuthResult<IdentitySession>> {
        Box::pin(self.password_grant("signUp", email, password))
    }

    fn refresh<'a>(&'a self, session: &'a IdentitySession) -> BoxFuture<'a, AuthResult<IdentitySession>> {
        Box::pin(async move {
            let url = self.token_base.join("token")?;
            let response = self
                .http
                .post(url)
                .query(&[("key", self.api_key.as_str())])
                .json(&json!({
                    "grant_type": "refresh_token",
                    "refresh_token": session.refresh_token,
                }))
                .send()
                .await?;
            let grant: TokenGrant = read_json(response).await?;

            Ok(IdentitySession {
                user: AuthUser {
                    uid: grant.user_id,
                    email: session.user.email.clone(),
                },
                id_token: grant.id_token,
                refresh_token: grant.refresh_token,
                expires_at: expires_at(grant.expires_in.as_deref()),
            })
        })
    }
}

fn directory_url(base: &str) -> AuthResult<Url> {
    if base.ends_with('/') {
        Ok(Url::parse(base)?)
    } else {
        Ok(Url::parse(&format!("{}/", base))?)
    }
}

fn expires_at(expires_in: Option<&str>) -> chrono::DateTime<Utc> {
    let secs = expires_in
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(DEFAULT_EXPIRES_IN_SECS);
    Utc::now() + chrono::Duration::seconds(secs)
}

async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> AuthResult<T> {
    let status = response.status();
    let text = response.text().await?;
    if status.is_success() {
        return Ok(serde_json::from_str(&text)?);
    }
    log::error!("Identity provider rejected request: {} {}", status, text);
    Err(map_error(status, &text))
}

fn map_error(status: StatusCode, body: &str) -> AuthError {
    let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) else {
        return AuthError::Provider {
            code: status.as_u16(),
            message: body.to_string(),
        };
    };
    let message = envelope.error.message;
    let code = if envelope.error.code == 0 {
        status.as_u16()
    } else {
        envelope.error.code
    };

    match message.as_str() {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "INVALID_EMAIL" => {
            AuthError::InvalidCredentials
        }
        "EMAIL_EXISTS" => AuthError::EmailExists,
        "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "USER_NOT_FOUND" | "USER_DISABLED" => {
            AuthError::SessionExpired
        }
        m if m.starts_with("WEAK_PASSWORD") => AuthError::WeakPassword(
            m.split_once(" : ")
                .map(|(_, detail)| detail.to_string())
                .unwrap_or_default(),
        ),
        _ => AuthError::Provider { code, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_body(message: &str) -> String {
        json!({ "error": { "code": 400, "message": message, "errors": [] } }).to_string()
    }

    #[test]
    fn maps_firebase_error_codes() {
        let bad = StatusCode::BAD_REQUEST;
        assert!(matches!(map_error(bad, &error_body("INVALID_PASSWORD")), AuthError::InvalidCredentials));
        assert!(matches!(map_error(bad, &error_body("EMAIL_EXISTS")), AuthError::EmailExists));
        assert!(matches!(map_error(bad, &error_body("TOKEN_EXPIRED")), AuthError::SessionExpired));
        match map_error(bad, &error_body("WEAK_PASSWORD : Password should be at least 6 characters")) {
            AuthError::WeakPassword(detail) => assert_eq!(detail, "Password should be at least 6 characters"),
            other => panic!("unexpected: {:?}", other),
        }
        match map_error(bad, &error_body("QUOTA_EXCEEDED")) {
            AuthError::Provider { code, message } => {
                assert_eq!(code, 400);
                assert_eq!(message, "QUOTA_EXCEEDED");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn non_json_error_keeps_status() {
        match map_error(StatusCode::BAD_GATEWAY, "upstream down") {
            AuthError::Provider { code, message } => {
                assert_eq!(code, 502);
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn endpoint_bases_get_a_trailing_slash() {
        let url = directory_url("http://localhost:9099/identitytoolkit.googleapis.com/v1").unwrap();
        assert_eq!(
            url.join("./accounts:signUp").unwrap().as_str(),
            "http://localhost:9099/identitytoolkit.googleapis.com/v1/accounts:signUp"
        );
    }
}
