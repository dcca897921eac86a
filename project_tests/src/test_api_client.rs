//! # `ApiClient` and Session Integration Tests
//!
//! Runs the REST client against the in-process mock backend:
//!
//! - bearer tokens go to `/api` paths only, and a missing token does not block the call;
//! - `401` runs the session policy, `403` is only logged;
//! - the real Firebase provider signs in, refreshes near expiry and maps its error codes;
//! - a rejected session signs the user out and sends the navigator to `/login`.

use std::sync::Arc;

use serde_json::{json, Value};

use pm_client::auth::{AuthError, AuthStore, SessionCredentials};
use pm_client::error::ClientError;
use pm_client::notifications::StompTransport;
use pm_client::retrieve::{Anonymous, ApiClient};
use pm_client::routes::{Navigator, Route};
use pm_client::services::{TodoService, UserService};
use project_tests::{MockServer, StaticToken, TEST_API_KEY};

#[tokio::test]
async fn bearer_token_only_on_api_paths() {
    let server = MockServer::start().await;
    server.respond_json("GET", "/api/users/me", json!({ "id": 4, "userTag": "ada" }));
    server.respond_json("GET", "/health", json!({ "status": "UP" }));

    let client = server.api_client(Arc::new(StaticToken::new("tok-1")));
    let _: Value = client.get("/api/users/me", &[]).await.unwrap();
    let _: Value = client.get("/health", &[]).await.unwrap();

    let me = server.requests_to("GET", "/api/users/me");
    assert_eq!(me[0].authorization.as_deref(), Some("Bearer tok-1"));
    let health = server.requests_to("GET", "/health");
    assert_eq!(health[0].authorization, None);
}

#[tokio::test]
async fn base_path_prefix_is_kept_for_rest_and_websocket() {
    let server = MockServer::start().await;
    server.respond_json("GET", "/backend/api/todos", json!({ "ungroupedTodos": [], "groupedTodos": [] }));

    let base = format!("{}/backend/", server.base_url());
    let client = ApiClient::new(&base, Arc::new(StaticToken::new("tok-1")), 0).unwrap();
    let todos = TodoService::new(Arc::new(client));
    todos.get_todos().await.unwrap();

    let calls = server.requests_to("GET", "/backend/api/todos");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].authorization.as_deref(), Some("Bearer tok-1"));
    assert!(server.requests_to("GET", "/api/todos").is_empty());

    let transport = StompTransport::new(&base, std::time::Duration::from_secs(10)).unwrap();
    assert_eq!(transport.url().path(), "/backend/ws/websocket");
}

#[tokio::test]
async fn missing_token_still_sends_the_request() {
    let server = MockServer::start().await;
    server.respond_json("GET", "/api/todos", json!({ "ungroupedTodos": [], "groupedTodos": [] }));

    let todos = TodoService::new(server.api_client(Arc::new(Anonymous)));
    let view = todos.get_todos().await.unwrap();
    assert!(view.is_empty());
    assert_eq!(server.requests_to("GET", "/api/todos")[0].authorization, None);
}

#[tokio::test]
async fn unauthorized_runs_session_policy_forbidden_does_not() {
    let server = MockServer::start().await;
    server.respond("GET", "/api/wallets", 401, "");
    server.respond("GET", "/api/wallets/9", 403, r#"{"error":"not yours"}"#);

    let credentials = Arc::new(StaticToken::new("tok-1"));
    let client = server.api_client(credentials.clone());

    let err = client.get::<Value>("/api/wallets", &[]).await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized));
    assert_eq!(err.status(), Some(401));
    assert_eq!(credentials.rejections(), 1);

    match client.get::<Value>("/api/wallets/9", &[]).await.unwrap_err() {
        ClientError::Status { status, body } => {
            assert_eq!(status, 403);
            assert!(body.contains("not yours"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(credentials.rejections(), 1);
}

#[tokio::test]
async fn empty_success_body() {
    let server = MockServer::start().await;
    server.respond("GET", "/api/users/me", 200, "");
    server.respond("DELETE", "/api/todos/3", 204, "");

    let client = server.api_client(Arc::new(StaticToken::new("t")));
    let err = client.get::<Value>("/api/users/me", &[]).await.unwrap_err();
    assert!(matches!(err, ClientError::EmptyBody(path) if path == "/api/users/me"));
    client.delete("/api/todos/3").await.unwrap();

    // Read failures come back as "no identity".
    let users = UserService::new(client);
    assert_eq!(users.get_user_identity().await, None);
}

#[tokio::test]
async fn session_token_flows_into_requests_and_401_signs_out() {
    let server = MockServer::start().await;
    server.stub_sign_in("uid-1", "ada@example.com", "id-1", 3600);
    server.respond_json("GET", "/api/todos", json!({ "ungroupedTodos": [], "groupedTodos": [] }));

    let auth = AuthStore::new(Arc::new(server.firebase()));
    let navigator = Navigator::default();
    assert_eq!(navigator.navigate(Route::Todo, false), Route::Login);

    let user = auth.login("ada@example.com", "pw").await.unwrap();
    assert_eq!(user.uid, "uid-1");
    assert_eq!(navigator.complete_login(), Route::Todo);

    let sign_in = server.requests_to("POST", "/identitytoolkit/v1/accounts:signInWithPassword").remove(0);
    assert_eq!(sign_in.query_pairs(), vec![("key".to_string(), TEST_API_KEY.to_string())]);
    assert_eq!(sign_in.json()["returnSecureToken"], json!(true));

    let credentials = Arc::new(SessionCredentials::new(auth.clone(), navigator.clone()));
    let todos = TodoService::new(server.api_client(credentials));
    todos.get_todos().await.unwrap();
    assert_eq!(
        server.requests_to("GET", "/api/todos")[0].authorization.as_deref(),
        Some("Bearer id-1")
    );

    server.respond("GET", "/api/todos", 401, "");
    let err = todos.get_todos().await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized));
    assert!(!auth.is_authenticated());
    assert_eq!(navigator.current().route, Route::Login);
    assert_eq!(navigator.current().redirect, Some(Route::Todo));

    // Signed out now: the next call goes out without a token.
    let _ = todos.get_todos().await;
    let calls = server.requests_to("GET", "/api/todos");
    assert_eq!(calls.last().and_then(|r| r.authorization.clone()), None);
}

#[tokio::test]
async fn token_close_to_expiry_is_refreshed_before_use() {
    let server = MockServer::start().await;
    server.stub_sign_in("uid-2", "bob@example.com", "id-old", 30);
    server.stub_token_refresh("uid-2", "id-new");
    server.respond_json("GET", "/api/users/me", json!({ "id": 2 }));

    let auth = AuthStore::new(Arc::new(server.firebase()));
    auth.login("bob@example.com", "pw").await.unwrap();

    let credentials = Arc::new(SessionCredentials::new(auth.clone(), Navigator::default()));
    let users = UserService::new(server.api_client(credentials));
    let me = users.get_user_identity().await.unwrap();
    assert_eq!(me.id, Some(2));

    assert_eq!(
        server.requests_to("GET", "/api/users/me")[0].authorization.as_deref(),
        Some("Bearer id-new")
    );
    let refresh = server.requests_to("POST", "/securetoken/v1/token").remove(0);
    assert_eq!(refresh.json()["grant_type"], json!("refresh_token"));
    assert_eq!(refresh.json()["refresh_token"], json!("refresh-uid-2"));

    // The refreshed token is good for an hour: no second refresh.
    users.get_user_identity().await.unwrap();
    assert_eq!(server.requests_to("POST", "/securetoken/v1/token").len(), 1);
}

#[tokio::test]
async fn provider_errors_are_mapped_and_recorded() {
    let server = MockServer::start().await;
    server.respond(
        "POST",
        "/identitytoolkit/v1/accounts:signInWithPassword",
        400,
        json!({ "error": { "code": 400, "message": "INVALID_LOGIN_CREDENTIALS" } }).to_string(),
    );
    server.respond(
        "POST",
        "/identitytoolkit/v1/accounts:signUp",
        400,
        json!({ "error": { "code": 400, "message": "EMAIL_EXISTS" } }).to_string(),
    );

    let auth = AuthStore::new(Arc::new(server.firebase()));
    let err = auth.login("ada@example.com", "nope").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    assert_eq!(auth.error().as_deref(), Some("invalid email or password"));
    assert!(!auth.is_loading());

    let err = auth.signup("ada@example.com", "pw123456").await.unwrap_err();
    assert!(matches!(err, AuthError::EmailExists));
    auth.clear_error();
    assert_eq!(auth.error(), None);
    assert_eq!(auth.jwt_token().await, None);
}
