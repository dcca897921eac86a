use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    EssenceGained,
    LevelUp,
    AchievementUnlocked,
    RewardUnlocked,
    /// A kind this client does not know yet.
    #[serde(other)]
    Unknown,
}

/// A gamification event pushed on `/user/queue/notifications`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub essence_amount: Option<i64>,
    #[serde(default)]
    pub new_level: Option<u32>,
    #[serde(default)]
    pub achievement_id: Option<String>,
    #[serde(default)]
    pub achievement_name: Option<String>,
    #[serde(default)]
    pub reward_id: Option<String>,
    #[serde(default)]
    pub reward_name: Option<String>,
    /// Server timestamp, kept as sent.
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub read: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_level_up() {
        let n: Notification = serde_json::from_value(json!({
            "id": "n-1", "type": "LEVEL_UP", "title": "Level up!",
            "message": "You reached level 3", "icon": "star",
            "newLevel": 3, "timestamp": "2025-01-01T10:00:00", "read": false
        }))
        .unwrap();
        assert_eq!(n.kind, NotificationKind::LevelUp);
        assert_eq!(n.new_level, Some(3));
    }

    #[test]
    fn unknown_kind_does_not_fail() {
        let n: Notification =
            serde_json::from_value(json!({ "id": "x", "type": "STREAK_LOST", "title": "t" }))
                .unwrap();
        assert_eq!(n.kind, NotificationKind::Unknown);
        assert!(!n.read);
    }
}
