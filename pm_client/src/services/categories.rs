use std::sync::Arc;

use serde::Serialize;

use crate::error::ClientResult;
use crate::models::{
    CreateTransactionCategoryRequest, TransactionCategory, UpdateTransactionCategoryRequest,
};
use crate::retrieve::ApiClient;

const API_URL: &str = "/api/transaction-categories";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReorderRequest<'a> {
    category_ids: &'a [i64],
}

#[derive(Clone)]
pub struct TransactionCategoryService {
    client: Arc<ApiClient>,
}

impl TransactionCategoryService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    /// All categories as a flat list.
    pub async fn get_all(&self) -> ClientResult<Vec<TransactionCategory>> {
        self.client.get(API_URL, &[]).await
    }

    /// Root categories with their sub-categories filled in.
    pub async fn get_roots(&self) -> ClientResult<Vec<TransactionCategory>> {
        self.client.get(&format!("{}/root", API_URL), &[]).await
    }

    pub async fn get(&self, id: i64) -> ClientResult<TransactionCategory> {
        self.client.get(&format!("{}/{}", API_URL, id), &[]).await
    }

    pub async fn create(
        &self,
        request: &CreateTransactionCategoryRequest,
    ) -> ClientResult<TransactionCategory> {
        self.client.post(API_URL, &[], request).await
    }

    pub async fn update(
        &self,
        id: i64,
        request: &UpdateTransactionCategoryRequest,
    ) -> ClientResult<TransactionCategory> {
        self.client.put(&format!("{}/{}", API_URL, id), request).await
    }

    pub async fn delete(&self, id: i64) -> ClientResult<()> {
        self.client.delete(&format!("{}/{}", API_URL, id)).await
    }

    /// Persists the display order given by `category_ids`.
    pub async fn reorder(&self, category_ids: &[i64]) -> ClientResult<()> {
        self.client
            .put_unit(&format!("{}/reorder", API_URL), &ReorderRequest { category_ids })
            .await
    }
}
