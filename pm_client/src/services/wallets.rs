use std::sync::Arc;

use crate::error::ClientResult;
use crate::models::{
    CreateWalletRequest, GrantWalletPermissionRequest, UpdateWalletPermissionRequest,
    UpdateWalletRequest, Wallet, WalletPermission,
};
use crate::retrieve::ApiClient;

const API_URL: &str = "/api/wallets";

#[derive(Clone)]
pub struct WalletService {
    client: Arc<ApiClient>,
}

impl WalletService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub async fn create(&self, request: &CreateWalletRequest) -> ClientResult<Wallet> {
        self.client.post(API_URL, &[], request).await
    }

    pub async fn update(&self, id: i64, request: &UpdateWalletRequest) -> ClientResult<Wallet> {
        self.client.put(&format!("{}/{}", API_URL, id), request).await
    }

    pub async fn delete(&self, id: i64) -> ClientResult<()> {
        self.client.delete(&format!("{}/{}", API_URL, id)).await
    }

    pub async fn get(&self, id: i64) -> ClientResult<Wallet> {
        self.client.get(&format!("{}/{}", API_URL, id), &[]).await
    }

    /// Wallets the signed-in user owns or has been granted.
    pub async fn list_for_current_user(&self) -> ClientResult<Vec<Wallet>> {
        self.client.get(API_URL, &[]).await
    }

    pub async fn list_for_tenant(&self, tenant_id: i64) -> ClientResult<Vec<Wallet>> {
        self.client
            .get(&format!("{}/tenant/{}", API_URL, tenant_id), &[])
            .await
    }

    pub async fn grant_permission(
        &self,
        wallet_id: i64,
        request: &GrantWalletPermissionRequest,
    ) -> ClientResult<WalletPermission> {
        self.client
            .post(&format!("{}/{}/permissions", API_URL, wallet_id), &[], request)
            .await
    }

    pub async fn update_permission(
        &self,
        wallet_id: i64,
        user_id: i64,
        request: &UpdateWalletPermissionRequest,
    ) -> ClientResult<WalletPermission> {
        self.client
            .put(
                &format!("{}/{}/permissions/{}", API_URL, wallet_id, user_id),
                request,
            )
            .await
    }

    pub async fn revoke_permission(&self, wallet_id: i64, user_id: i64) -> ClientResult<()> {
        self.client
            .delete(&format!("{}/{}/permissions/{}", API_URL, wallet_id, user_id))
            .await
    }

    pub async fn list_permissions(&self, wallet_id: i64) -> ClientResult<Vec<WalletPermission>> {
        self.client
            .get(&format!("{}/{}/permissions", API_URL, wallet_id), &[])
            .await
    }
}
