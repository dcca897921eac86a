use std::sync::Arc;

use tokio::sync::watch;

use super::Reactive;
use crate::services::AccountingService;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountingState {
    /// Transactions still waiting for a category, as reported by the server.
    pub uncategorized_count: u64,
    pub is_loading: bool,
}

/// Badge counter for the accounting views.
#[derive(Clone)]
pub struct AccountingStore {
    service: AccountingService,
    state: Arc<Reactive<AccountingState>>,
}

impl AccountingStore {
    pub fn new(service: AccountingService) -> Self {
        Self {
            service,
            state: Arc::new(Reactive::new(AccountingState::default())),
        }
    }

    pub fn state(&self) -> AccountingState {
        self.state.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<AccountingState> {
        self.state.subscribe()
    }

    pub fn uncategorized_count(&self) -> u64 {
        self.state.read(|s| s.uncategorized_count)
    }

    /// Refreshes the counter. Any failure resets it to zero.
    pub async fn fetch_uncategorized_count(&self, wallet_id: Option<i64>) {
        self.state.update(|s| s.is_loading = true);
        let result = self.service.get_transactions_to_categorize(wallet_id).await;
        self.state.update(|s| {
            s.uncategorized_count = match result {
                Ok(page) => page.total_elements,
                Err(e) => {
                    log::error!("Error fetching uncategorized count: {}", e);
                    0
                }
            };
            s.is_loading = false;
        });
    }

    pub fn clear_uncategorized_count(&self) {
        self.state.update(|s| s.uncategorized_count = 0);
    }
}
