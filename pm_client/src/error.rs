use thiserror::Error;

/// Errors surfaced by the REST layer, the services and the stores.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("unsupported endpoint URL: {0}")]
    UnsupportedUrl(String),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered 401; the session has already been cleared.
    #[error("unauthorized: session rejected by the server")]
    Unauthorized,

    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("the server returned no body for {0}")]
    EmptyBody(String),

    #[error("{0} is required for this operation")]
    MissingField(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// HTTP status of the failure, when the server produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Unauthorized => Some(401),
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
