use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::BoxFuture;
use tokio::sync::{watch, Mutex};

use super::{AuthError, AuthResult, AuthUser, IdentityProvider, IdentitySession};
use crate::retrieve::Credentials;
use crate::routes::{Navigator, Route};
use crate::stores::Reactive;

/// An ID token this close to expiry is refreshed before use.
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub current_user: Option<AuthUser>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        self.current_user.is_some()
    }

    pub fn user_email(&self) -> Option<&str> {
        self.current_user.as_ref().and_then(|u| u.email.as_deref())
    }

    pub fn user_id(&self) -> Option<&str> {
        self.current_user.as_ref().map(|u| u.uid.as_str())
    }
}

/// The signed-in session and its auth-state channel.
#[derive(Clone)]
pub struct AuthStore {
    provider: Arc<dyn IdentityProvider>,
    state: Arc<Reactive<AuthState>>,
    // Held across refreshes so concurrent callers wait for one refresh.
    session: Arc<Mutex<Option<IdentitySession>>>,
}

impl AuthStore {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            state: Arc::new(Reactive::new(AuthState::default())),
            session: Arc::new(Mutex::new(None)),
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.snapshot()
    }

    /// Fires on every sign-in, sign-out and error change.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.state.read(|s| s.current_user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read(AuthState::is_authenticated)
    }

    pub fn user_email(&self) -> Option<String> {
        self.state.read(|s| s.user_email().map(str::to_string))
    }

    pub fn user_id(&self) -> Option<String> {
        self.state.read(|s| s.user_id().map(str::to_string))
    }

    pub fn is_loading(&self) -> bool {
        self.state.read(|s| s.is_loading)
    }

    pub fn error(&self) -> Option<String> {
        self.state.read(|s| s.error.clone())
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthResult<AuthUser> {
        self.begin();
        let result = self.provider.sign_in(email, password).await;
        self.finish(result, "Login failed").await
    }

    pub async fn signup(&self, email: &str, password: &str) -> AuthResult<AuthUser> {
        self.begin();
        let result = self.provider.sign_up(email, password).await;
        self.finish(result, "Signup failed").await
    }

    /// Drops the session locally. Never fails.
    pub async fn logout(&self) {
        self.session.lock().await.take();
        self.state.update(|s| {
            if let Some(user) = s.current_user.take() {
                log::info!("User signed out: {}", user.email.as_deref().unwrap_or(&user.uid));
            }
            s.error = None;
            s.is_loading = false;
        });
    }

    pub fn clear_error(&self) {
        self.state.update(|s| s.error = None);
    }

    /// Current ID token, refreshed first when it is about to expire.
    ///
    /// `None` when signed out or when the refresh fails.
    pub async fn jwt_token(&self) -> Option<String> {
        let mut session = self.session.lock().await;
        let Some(current) = session.as_ref() else {
            log::debug!("No user logged in, cannot fetch JWT token");
            return None;
        };

        let margin = chrono::Duration::seconds(TOKEN_REFRESH_MARGIN.as_secs() as i64);
        if current.expires_at - Utc::now() > margin {
            return Some(current.id_token.clone());
        }

        let refreshed = self.provider.refresh(current).await;
        match refreshed {
            Ok(fresh) => {
                log::debug!("ID token refreshed for {}", fresh.user.uid);
                let token = fresh.id_token.clone();
                *session = Some(fresh);
                Some(token)
            }
            Err(e) => {
                log::error!("Error refreshing JWT token: {}", e);
                None
            }
        }
    }

    fn begin(&self) {
        self.state.update(|s| {
            s.error = None;
            s.is_loading = true;
        });
    }

    async fn finish(
        &self,
        result: AuthResult<IdentitySession>,
        fallback: &str,
    ) -> AuthResult<AuthUser> {
        match result {
            Ok(session) => {
                let user = session.user.clone();
                *self.session.lock().await = Some(session);
                log::info!("User authenticated: {}", user.email.as_deref().unwrap_or(&user.uid));
                self.state.update(|s| {
                    s.current_user = Some(user.clone());
                    s.is_loading = false;
                });
                Ok(user)
            }
            Err(e) => {
                log::error!("{}: {}", fallback, e);
                let msg = match &e {
                    AuthError::Provider { message, .. } if message.is_empty() => fallback.to_string(),
                    other => other.to_string(),
                };
                self.state.update(|s| {
                    s.error = Some(msg);
                    s.is_loading = false;
                });
                Err(e)
            }
        }
    }
}

/// [`Credentials`] backed by the auth session.
///
/// A rejected session signs the user out and sends the navigator to the
/// login route unless it is already there.
#[derive(Clone)]
pub struct SessionCredentials {
    auth: AuthStore,
    navigator: Navigator,
}

impl SessionCredentials {
    pub fn new(auth: AuthStore, navigator: Navigator) -> Self {
        Self { auth, navigator }
    }
}

impl Credentials for SessionCredentials {
    fn bearer_token(&self) -> BoxFuture<'_, Option<String>> {
        Box::pin(self.auth.jwt_token())
    }

    fn session_rejected(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.auth.logout().await;
            if self.navigator.current().route != Route::Login {
                self.navigator.redirect_to_login();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeProvider {
        lifetime: chrono::Duration,
        refreshes: AtomicUsize,
        fail_refresh: bool,
    }

    impl FakeProvider {
        fn new(lifetime_secs: i64, fail_refresh: bool) -> Self {
            Self {
                lifetime: chrono::Duration::seconds(lifetime_secs),
                refreshes: AtomicUsize::new(0),
                fail_refresh,
            }
        }

        fn session(&self, email: &str, token: &str) -> IdentitySession {
            IdentitySession {
                user: AuthUser {
                    uid: format!("uid-{}", email),
                    email: Some(email.to_string()),
                },
                id_token: token.to_string(),
                refresh_token: "refresh".to_string(),
                expires_at: Utc::now() + self.lifetime,
            }
        }
    }

    impl IdentityProvider for FakeProvider {
        fn sign_in<'a>(
            &'a self,
            email: &'a str,
            password: &'a str,
        ) -> BoxFuture<'a, AuthResult<IdentitySession>> {
            Box::pin(async move {
                if password == "secret" {
                    Ok(self.session(email, "token-0"))
                } else {
                    Err(AuthError::InvalidCredentials)
                }
            })
        }

        fn sign_up<'a>(
            &'a self,
            email: &'a str,
            _password: &'a str,
        ) -> BoxFuture<'a, AuthResult<IdentitySession>> {
            Box::pin(async move { Ok(self.session(email, "token-new")) })
        }

        fn refresh<'a>(
            &'a self,
            session: &'a IdentitySession,
        ) -> BoxFuture<'a, AuthResult<IdentitySession>> {
            Box::pin(async move {
                if self.fail_refresh {
                    return Err(AuthError::SessionExpired);
                }
                let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
                let email = session.user.email.clone().unwrap_or_default();
                Ok(self.session(&email, &format!("token-{}", n)))
            })
        }
    }

    #[tokio::test]
    async fn login_and_logout_update_state() {
        let store = AuthStore::new(Arc::new(FakeProvider::new(3600, false)));
        let mut rx = store.subscribe();
        assert!(!store.is_authenticated());

        let err = store.login("a@b.c", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(store.error().as_deref(), Some("invalid email or password"));

        store.login("a@b.c", "secret").await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(store.is_authenticated());
        assert_eq!(store.user_email().as_deref(), Some("a@b.c"));
        assert_eq!(store.user_id().as_deref(), Some("uid-a@b.c"));
        assert_eq!(store.error(), None);
        assert_eq!(store.jwt_token().await.as_deref(), Some("token-0"));

        store.logout().await;
        assert!(!store.is_authenticated());
        assert_eq!(store.jwt_token().await, None);
    }

    #[tokio::test]
    async fn token_near_expiry_is_refreshed() {
        let provider = Arc::new(FakeProvider::new(30, false));
        let store = AuthStore::new(provider.clone());
        store.signup("x@y.z", "pw").await.unwrap();

        assert_eq!(store.jwt_token().await.as_deref(), Some("token-1"));
        assert_eq!(store.jwt_token().await.as_deref(), Some("token-2"));
        assert_eq!(provider.refreshes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_refresh_yields_no_token() {
        let store = AuthStore::new(Arc::new(FakeProvider::new(10, true)));
        store.login("a@b.c", "secret").await.unwrap();
        assert_eq!(store.jwt_token().await, None);
        assert!(store.is_authenticated());
    }

    #[tokio::test]
    async fn rejected_session_logs_out_and_redirects_once() {
        let store = AuthStore::new(Arc::new(FakeProvider::new(3600, false)));
        store.login("a@b.c", "secret").await.unwrap();
        let navigator = Navigator::new(Route::Todo);
        let credentials = SessionCredentials::new(store.clone(), navigator.clone());

        assert_eq!(credentials.bearer_token().await.as_deref(), Some("token-0"));
        credentials.session_rejected().await;
        assert!(!store.is_authenticated());
        assert_eq!(navigator.current().route, Route::Login);
        assert_eq!(navigator.current().redirect, Some(Route::Todo));

        let mut rx = navigator.subscribe();
        credentials.session_rejected().await;
        assert!(!rx.has_changed().unwrap());
        assert_eq!(credentials.bearer_token().await, None);
    }
}
