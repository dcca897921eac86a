use serde::{Deserialize, Serialize};

/// The signed-in user's profile as served by `/api/users/me`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub user_tag: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub border_color: Option<String>,
    #[serde(default)]
    pub equipped_emoji: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateUserTagRequest<'a> {
    pub email: Option<&'a str>,
    pub user_tag: &'a str,
}
