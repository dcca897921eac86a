use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub owner_id: i64,
    pub owner_email: String,
    #[serde(default)]
    pub tenant_id: Option<i64>,
    #[serde(default)]
    pub tenant_name: Option<String>,
    /// Epoch milliseconds.
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub balance: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWalletRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWalletRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WalletRole {
    Read,
    Write,
}

impl fmt::Display for WalletRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WalletRole::Read => "READ",
            WalletRole::Write => "WRITE",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletPermission {
    pub id: i64,
    pub wallet_id: i64,
    pub wallet_name: String,
    pub user_id: i64,
    pub user_email: String,
    pub role: WalletRole,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantWalletPermissionRequest {
    pub user_id: i64,
    pub role: WalletRole,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateWalletPermissionRequest {
    pub role: WalletRole,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_wallet_without_optional_fields() {
        let wallet: Wallet = serde_json::from_value(json!({
            "id": 1, "name": "Main", "ownerId": 2, "ownerEmail": "a@b.c",
            "createdAt": 1700000000000i64, "updatedAt": 1700000000000i64
        }))
        .unwrap();
        assert_eq!(wallet.tenant_id, None);
        assert_eq!(wallet.balance, None);
    }

    #[test]
    fn grant_request_uses_wire_names() {
        let req = GrantWalletPermissionRequest {
            user_id: 9,
            role: WalletRole::Write,
        };
        assert_eq!(serde_json::to_value(req).unwrap(), json!({ "userId": 9, "role": "WRITE" }));
    }
}
