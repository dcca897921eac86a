//! # REST services
//!
//! Thin wrappers over [`ApiClient`]: each one knows the paths and payload
//! shapes of one resource family and nothing else. Errors are returned
//! untouched; deciding what to record or re-raise is the stores' job.

use std::sync::Arc;

use crate::retrieve::ApiClient;

pub mod accounting;
pub mod categories;
pub mod habits;
pub mod todo;
pub mod users;
pub mod wallets;

pub use accounting::AccountingService;
pub use categories::TransactionCategoryService;
pub use habits::HabitsService;
pub use todo::TodoService;
pub use users::UserService;
pub use wallets::WalletService;

/// Every service, sharing one client.
#[derive(Clone)]
pub struct Services {
    pub todos: TodoService,
    pub habits: HabitsService,
    pub accounting: AccountingService,
    pub categories: TransactionCategoryService,
    pub wallets: WalletService,
    pub users: UserService,
}

impl Services {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            todos: TodoService::new(client.clone()),
            habits: HabitsService::new(client.clone()),
            accounting: AccountingService::new(client.clone()),
            categories: TransactionCategoryService::new(client.clone()),
            wallets: WalletService::new(client.clone()),
            users: UserService::new(client),
        }
    }
}
