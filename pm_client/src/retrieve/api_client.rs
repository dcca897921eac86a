//! # REST API Client
//!
//! Asynchronous wrapper around `reqwest` shared by every service. It joins
//! relative paths onto the configured base URL, attaches the bearer token of
//! the current session to `/api` calls and applies the session policy for
//! rejected requests:
//!
//! - `401 Unauthorized` clears the session (logout + redirect) and surfaces
//!   as [`ClientError::Unauthorized`].
//! - `403 Forbidden` is only logged.
//!
//! Reads go through a transient-retry middleware; mutations are sent exactly once.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use reqwest::{
    header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE},
    Method, StatusCode, Url,
};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{ClientError, ClientResult};

/// Query parameters appended to a request URL.
pub type Query = [(String, String)];

/// Source of the bearer token and sink for session rejections.
///
/// Implemented by the auth session; tests plug in fixed tokens.
pub trait Credentials: Send + Sync {
    /// Token for the `Authorization` header, or `None` when signed out.
    fn bearer_token(&self) -> BoxFuture<'_, Option<String>>;

    /// Called once per `401` response.
    fn session_rejected(&self) -> BoxFuture<'_, ()>;
}

/// Credentials for unauthenticated use. Never attaches a token.
#[derive(Debug, Default, Clone, Copy)]
pub struct Anonymous;

impl Credentials for Anonymous {
    fn bearer_token(&self) -> BoxFuture<'_, Option<String>> {
        Box::pin(async { None })
    }

    fn session_rejected(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

/// A standardized container for API responses.
///
/// Wraps the deserialized data along with metadata about the HTTP exchange.
#[derive(Debug)]
pub struct ApiResponse<T> {
    /// The deserialized response body. `None` for an empty 2xx body.
    pub data: Option<T>,
    /// The raw body returned by the server if the request failed.
    pub error_body: Option<String>,
    /// The numeric HTTP status code.
    pub status: u16,
    /// Indicates if the status code was in the 2xx range.
    pub success: bool,
    /// The headers returned by the server.
    pub headers: HeaderMap,
}

impl<T> ApiResponse<T> {
    /// Converts a failed exchange into the matching [`ClientError`].
    pub fn into_result(self) -> ClientResult<Option<T>> {
        if self.success {
            return Ok(self.data);
        }
        if self.status == StatusCode::UNAUTHORIZED.as_u16() {
            return Err(ClientError::Unauthorized);
        }
        Err(ClientError::Status {
            status: self.status,
            body: self.error_body.unwrap_or_default(),
        })
    }
}

/// HTTP client bound to one backend and one session.
pub struct ApiClient {
    /// Client used for GET requests, with transient retries.
    reader: ClientWithMiddleware,
    /// Client used for mutations. Never retries.
    writer: ClientWithMiddleware,
    /// The base URL to which all relative paths are joined.
    base_url: Url,
    credentials: Arc<dyn Credentials>,
}

impl ApiClient {
    /// Creates a client for `base_url` (e.g. `http://localhost:8080`). A path
    /// prefix on the base (`https://host/backend`) is kept for every request.
    ///
    /// `read_retries` bounds the exponential-backoff retries applied to GET requests.
    ///
    /// # Errors
    /// Returns [`ClientError::Url`] if `base_url` is not an absolute URL.
    pub fn new(
        base_url: &str,
        credentials: Arc<dyn Credentials>,
        read_retries: u32,
    ) -> ClientResult<Self> {
        let mut base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::UnsupportedUrl(base_url.to_string()));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = reqwest::Client::new();

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(read_retries);
        let reader = ClientBuilder::new(http.clone())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        let writer = ClientBuilder::new(http).build();

        Ok(Self {
            reader,
            writer,
            base_url,
            credentials,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves an API path (`/api/todos`) below the base URL, prefix included.
    pub fn endpoint(&self, path: &str) -> ClientResult<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Performs one HTTP exchange.
    ///
    /// Non-2xx statuses do not fail here; they come back with `success == false`
    /// after the 401/403 policy has run.
    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        query: &Query,
        body: Option<&B>,
    ) -> ClientResult<ApiResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let full_url = self.endpoint(path)?;
        let client = if method == Method::GET {
            &self.reader
        } else {
            &self.writer
        };
        let mut req = client.request(method.clone(), full_url);

        if !query.is_empty() {
            req = req.query(query);
        }

        // Only our own API gets the session token.
        if path.starts_with("/api") {
            match self.credentials.bearer_token().await {
                Some(token) => {
                    req = req.header(AUTHORIZATION, format!("Bearer {}", token));
                }
                None => log::warn!("No auth token available for request: {}", path),
            }
        }

        if let Some(b) = body {
            let json_body = serde_json::to_string(b)?;
            req = req.header(CONTENT_TYPE, "application/json").body(json_body);
        }

        let response: reqwest::Response = req.send().await?;
        let status = response.status();
        let resp_headers = response.headers().clone();
        let text = response.text().await?;

        if status.is_success() {
            let data = if text.trim().is_empty() {
                None
            } else {
                Some(serde_json::from_str::<T>(&text)?)
            };
            return Ok(ApiResponse {
                data,
                error_body: None,
                status: status.as_u16(),
                success: true,
                headers: resp_headers,
            });
        }

        log::error!("Request failed: {} {} -> {}", method, path, status);
        match status {
            StatusCode::UNAUTHORIZED => {
                log::error!("401 Unauthorized - logging out");
                self.credentials.session_rejected().await;
            }
            StatusCode::FORBIDDEN => {
                log::error!("403 Forbidden - access denied for {}", path);
            }
            _ => {}
        }

        Ok(ApiResponse {
            data: None,
            error_body: Some(text),
            status: status.as_u16(),
            success: false,
            headers: resp_headers,
        })
    }

    /// GET that must return a body.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &Query) -> ClientResult<T> {
        self.request::<T, ()>(Method::GET, path, query, None)
            .await?
            .into_result()?
            .ok_or_else(|| ClientError::EmptyBody(path.to_string()))
    }

    pub async fn post<B, T>(&self, path: &str, query: &Query, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request::<T, B>(Method::POST, path, query, Some(body))
            .await?
            .into_result()?
            .ok_or_else(|| ClientError::EmptyBody(path.to_string()))
    }

    /// POST whose response body is ignored.
    pub async fn post_unit<B>(&self, path: &str, query: &Query, body: &B) -> ClientResult<()>
    where
        B: Serialize + ?Sized,
    {
        self.request::<serde_json::Value, B>(Method::POST, path, query, Some(body))
            .await?
            .into_result()
            .map(|_| ())
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request::<T, B>(Method::PUT, path, &[], Some(body))
            .await?
            .into_result()?
            .ok_or_else(|| ClientError::EmptyBody(path.to_string()))
    }

    /// PUT whose response body is ignored.
    pub async fn put_unit<B>(&self, path: &str, body: &B) -> ClientResult<()>
    where
        B: Serialize + ?Sized,
    {
        self.request::<serde_json::Value, B>(Method::PUT, path, &[], Some(body))
            .await?
            .into_result()
            .map(|_| ())
    }

    pub async fn delete(&self, path: &str) -> ClientResult<()> {
        self.request::<serde_json::Value, ()>(Method::DELETE, path, &[], None)
            .await?
            .into_result()
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_401_maps_to_unauthorized() {
        let resp: ApiResponse<()> = ApiResponse {
            data: None,
            error_body: Some("nope".into()),
            status: 401,
            success: false,
            headers: HeaderMap::new(),
        };
        assert!(matches!(resp.into_result(), Err(ClientError::Unauthorized)));
    }

    #[test]
    fn failed_403_keeps_status_and_body() {
        let resp: ApiResponse<()> = ApiResponse {
            data: None,
            error_body: Some("denied".into()),
            status: 403,
            success: false,
            headers: HeaderMap::new(),
        };
        match resp.into_result() {
            Err(ClientError::Status { status, body }) => {
                assert_eq!(status, 403);
                assert_eq!(body, "denied");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn endpoints_keep_the_base_path_prefix() {
        let client = ApiClient::new("https://pm.example.com/backend", Arc::new(Anonymous), 0).unwrap();
        assert_eq!(client.base_url().as_str(), "https://pm.example.com/backend/");
        assert_eq!(
            client.endpoint("/api/todos/3").unwrap().as_str(),
            "https://pm.example.com/backend/api/todos/3"
        );

        let root = ApiClient::new("http://localhost:8080", Arc::new(Anonymous), 0).unwrap();
        assert_eq!(root.endpoint("/api/users/me").unwrap().as_str(), "http://localhost:8080/api/users/me");
    }

    #[test]
    fn rejects_relative_base_url() {
        let result = ApiClient::new("not a url", Arc::new(Anonymous), 0);
        assert!(matches!(result, Err(ClientError::Url(_))));
    }
}
