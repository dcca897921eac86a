//! # Data Transfer Objects
//!
//! Plain records mirroring the JSON shapes of the Personal Manager API. Field
//! names follow the wire format exactly (the backend mixes `snake_case` and
//! `camelCase`), so most fields carry an explicit `serde` rename.
//!
//! - **`todo`**: todos, todo groups and the grouped list view.
//! - **`habit`**: habits, habit logs and the per-day completion status.
//! - **`accounting`**: transactions, categories, summaries and CSV rows.
//! - **`wallet`**: wallets and their sharing permissions.
//! - **`user`**: the signed-in user's identity card.
//! - **`notification`**: gamification notifications pushed over STOMP.

use serde::{Deserialize, Deserializer};

pub mod accounting;
pub mod habit;
pub mod notification;
pub mod todo;
pub mod user;
pub mod wallet;

pub use accounting::{
    AccountingSummary, CreateTransactionCategoryRequest, Transaction, TransactionCategory,
    TransactionCsvRow, TransactionQuery, TransactionSummary, TransactionType,
    UncategorizedTransactions, UpdateTransactionCategoryRequest,
};
pub use habit::{
    day_status, is_goal_met, DayOfWeek, DayStatus, HabitData, HabitDraft, HabitFrequency,
    HabitLog, HabitLogEntry, HabitType, LogField,
};
pub use notification::{Notification, NotificationKind};
pub use todo::{Todo, TodoFilter, TodoGroup, TodoId, TodoPayload, TodosView};
pub use user::UserIdentity;
pub use wallet::{
    CreateWalletRequest, GrantWalletPermissionRequest, UpdateWalletPermissionRequest,
    UpdateWalletRequest, Wallet, WalletPermission, WalletRole,
};

/// Treats an explicit JSON `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
