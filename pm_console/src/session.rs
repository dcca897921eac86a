use std::sync::Arc;

use anyhow::{Context, Result};
use pm_client::auth::firebase::SECURE_TOKEN_URL;
use pm_client::auth::{AuthStore, FirebaseIdentity, SessionCredentials};
use pm_client::configs::ClientConfig;
use pm_client::retrieve::ApiClient;
use pm_client::routes::{Navigator, Route};
use pm_client::services::Services;

/// A signed-in connection to the backend.
pub struct Session {
    pub config: ClientConfig,
    pub auth: AuthStore,
    pub services: Services,
}

impl Session {
    /// Signs in with the configured credentials and wires the REST client to the session.
    pub async fn sign_in(config: ClientConfig) -> Result<Session> {
        let api_key = config
            .firebase_api_key
            .clone()
            .context("no Firebase API key configured (PM_FIREBASE_API_KEY)")?;
        let identity = match config.identity_url.as_deref() {
            Some(identity_url) => FirebaseIdentity::with_endpoints(
                api_key,
                identity_url,
                config.secure_token_url.as_deref().unwrap_or(SECURE_TOKEN_URL),
            )?,
            None => FirebaseIdentity::new(api_key)?,
        };

        let auth = AuthStore::new(Arc::new(identity));
        let navigator = Navigator::default();
        navigator.navigate(Route::Home, auth.is_authenticated());

        let (email, password) = config.credentials()?;
        let user = auth
            .login(email, password)
            .await
            .with_context(|| format!("sign-in failed for {}", email))?;
        let landed = navigator.complete_login();
        log::info!("Signed in as {} ({}), at {}", email, user.uid, landed);

        let credentials = SessionCredentials::new(auth.clone(), navigator.clone());
        let client = ApiClient::new(config.api_base_url(), Arc::new(credentials), config.read_retries())
            .with_context(|| format!("invalid API base URL {}", config.api_base_url()))?;

        Ok(Session {
            services: Services::new(Arc::new(client)),
            config,
            auth,
        })
    }

    pub fn user_id(&self) -> Option<String> {
        self.auth.user_id()
    }
}
