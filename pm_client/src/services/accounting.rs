use std::sync::Arc;

use crate::error::ClientResult;
use crate::models::{
    AccountingSummary, Transaction, TransactionCsvRow, TransactionQuery, TransactionSummary,
    UncategorizedTransactions,
};
use crate::retrieve::ApiClient;

const API_URL: &str = "/api/transactions";

/// Page requested when listing transactions to categorize.
const TO_CATEGORIZE_PAGE: u32 = 0;
const TO_CATEGORIZE_SIZE: u32 = 100;

#[derive(Clone)]
pub struct AccountingService {
    client: Arc<ApiClient>,
}

impl AccountingService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub async fn get_accounting_summary(
        &self,
        query: TransactionQuery,
        wallet_id: Option<i64>,
    ) -> ClientResult<AccountingSummary> {
        let params = query.into_pairs(wallet_id);
        self.client
            .get(&format!("{}/summary", API_URL), &params)
            .await
    }

    pub async fn get_transactions_summary(
        &self,
        query: TransactionQuery,
        wallet_id: Option<i64>,
    ) -> ClientResult<Vec<TransactionSummary>> {
        let params = query.into_pairs(wallet_id);
        self.client.get(API_URL, &params).await
    }

    pub async fn import_transactions_from_csv(
        &self,
        rows: &[TransactionCsvRow],
        wallet_id: Option<i64>,
    ) -> ClientResult<()> {
        let params = TransactionQuery::new().into_pairs(wallet_id);
        log::info!("Importing {} CSV rows", rows.len());
        self.client
            .post_unit(&format!("{}/csv", API_URL), &params, rows)
            .await
    }

    pub async fn get_transactions_to_categorize(
        &self,
        wallet_id: Option<i64>,
    ) -> ClientResult<UncategorizedTransactions> {
        let params = TransactionQuery::new()
            .param("page", TO_CATEGORIZE_PAGE)
            .param("size", TO_CATEGORIZE_SIZE)
            .into_pairs(wallet_id);
        let page: UncategorizedTransactions = self
            .client
            .get(&format!("{}/to-categorize", API_URL), &params)
            .await?;
        log::debug!(
            "{} transactions to categorize ({} on this page)",
            page.total_elements,
            page.transactions.len()
        );
        Ok(page)
    }

    pub async fn categorize_transactions(&self, transactions: &[Transaction]) -> ClientResult<()> {
        self.client
            .put_unit(&format!("{}/categorize", API_URL), transactions)
            .await
    }
}
