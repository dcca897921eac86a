use std::sync::Arc;

use crate::error::ClientResult;
use crate::models::user::UpdateUserTagRequest;
use crate::models::UserIdentity;
use crate::retrieve::ApiClient;

const API_URL: &str = "/api/users/me";

#[derive(Clone)]
pub struct UserService {
    client: Arc<ApiClient>,
}

impl UserService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    /// The signed-in user's profile. Failures are logged and read as `None`.
    pub async fn get_user_identity(&self) -> Option<UserIdentity> {
        match self.client.get(API_URL, &[]).await {
            Ok(identity) => Some(identity),
            Err(e) => {
                log::error!("Error fetching user identity: {}", e);
                None
            }
        }
    }

    pub async fn update_user_tag(
        &self,
        email: Option<&str>,
        user_tag: &str,
    ) -> ClientResult<UserIdentity> {
        log::info!("Updating user tag to {}", user_tag);
        self.client
            .put(API_URL, &UpdateUserTagRequest { email, user_tag })
            .await
    }
}
